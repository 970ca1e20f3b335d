//! Consumer side of the profile-change topic
//!
//! Records the latest snapshot per user. Redeliveries of an already
//! processed publication are acknowledged without being applied again.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use wt_common::{AckNack, ProfileChangeEvent, QueuedMessage};
use wt_queue::MessageHandler;

const DEFAULT_DEDUP_CAPACITY: usize = 10_000;

/// Bounded set of recently processed keys, oldest evicted first
struct RecentKeys {
    keys: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl RecentKeys {
    fn new(capacity: usize) -> Self {
        Self {
            keys: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    fn insert(&mut self, key: String) {
        if !self.keys.insert(key.clone()) {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
    }
}

pub struct ProfileChangeHandler {
    latest: DashMap<String, ProfileChangeEvent>,
    recent: Mutex<RecentKeys>,
    processed: AtomicU64,
}

impl Default for ProfileChangeHandler {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}

impl ProfileChangeHandler {
    pub fn new(dedup_capacity: usize) -> Self {
        Self {
            latest: DashMap::new(),
            recent: Mutex::new(RecentKeys::new(dedup_capacity)),
            processed: AtomicU64::new(0),
        }
    }

    /// Last snapshot seen for a user
    pub fn latest(&self, user_id: &str) -> Option<ProfileChangeEvent> {
        self.latest.get(user_id).map(|e| e.value().clone())
    }

    /// Publications applied, excluding acknowledged duplicates
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    fn apply(&self, event: ProfileChangeEvent) {
        // Out-of-order deliveries must not roll a snapshot back
        let newer = self
            .latest
            .get(&event.id)
            .map(|current| {
                (event.updated_at, event.mq_issued_at)
                    >= (current.updated_at, current.mq_issued_at)
            })
            .unwrap_or(true);
        if newer {
            self.latest.insert(event.id.clone(), event);
        }
    }
}

#[async_trait]
impl MessageHandler for ProfileChangeHandler {
    async fn handle(&self, message: &QueuedMessage) -> AckNack {
        let event: ProfileChangeEvent = match serde_json::from_slice(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    queue = %message.queue_identifier,
                    message_id = %message.id,
                    error = %e,
                    "Dropping malformed profile event"
                );
                return AckNack::Nack { requeue: false };
            }
        };

        let key = event.dedup_key();
        if self.recent.lock().contains(&key) {
            debug!(
                user_id = %event.id,
                message_id = %message.id,
                redelivered = message.redelivered,
                "Duplicate profile event acknowledged"
            );
            return AckNack::Ack;
        }

        info!(
            queue = %message.queue_identifier,
            user_id = %event.id,
            email = %event.email,
            updated_at = event.updated_at,
            mq_issued_at = %event.mq_issued_at,
            "Received profile change"
        );

        self.apply(event);
        self.recent.lock().insert(key);
        self.processed.fetch_add(1, Ordering::SeqCst);
        AckNack::Ack
    }
}
