//! In-process channel with broker-like settlement semantics.
//!
//! Messages move from `ready` to `in_flight` on receive and leave only on
//! ack. A requeueing nack puts the message back at the head of the queue and
//! marks it redelivered.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;
use wt_common::QueuedMessage;

use crate::{QueueConsumer, QueueError, QueuePublisher, Result};

#[derive(Debug, Clone)]
struct Envelope {
    id: String,
    payload: Vec<u8>,
    deliveries: u32,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Envelope>,
    in_flight: HashMap<String, Envelope>,
    dead_letters: Vec<Envelope>,
    closed: bool,
}

pub struct InMemoryQueue {
    name: String,
    state: Mutex<QueueState>,
    notify: Notify,
    next_handle: AtomicU64,
}

impl InMemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Messages waiting to be received
    pub fn ready_len(&self) -> usize {
        self.state.lock().ready.len()
    }

    /// Messages received but not yet settled
    pub fn in_flight_len(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Payloads dropped by a non-requeueing nack
    pub fn dead_letters(&self) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .dead_letters
            .iter()
            .map(|e| e.payload.clone())
            .collect()
    }

    /// Return every unsettled message to the queue, as a broker does when a
    /// consumer connection drops.
    pub fn recover_unacked(&self) -> usize {
        let mut state = self.state.lock();
        let recovered: Vec<Envelope> = state.in_flight.drain().map(|(_, e)| e).collect();
        let count = recovered.len();
        for envelope in recovered {
            state.ready.push_front(envelope);
        }
        drop(state);
        self.notify.notify_waiters();
        count
    }

    /// Stop accepting publishes; `receive` returns `None` once drained.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_waiters();
    }

    fn try_take(&self) -> Option<QueuedMessage> {
        let mut state = self.state.lock();
        let mut envelope = state.ready.pop_front()?;
        envelope.deliveries += 1;

        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst).to_string();
        let message = QueuedMessage {
            id: envelope.id.clone(),
            payload: envelope.payload.clone(),
            receipt_handle: handle.clone(),
            redelivered: envelope.deliveries > 1,
            queue_identifier: self.name.clone(),
        };
        state.in_flight.insert(handle, envelope);
        Some(message)
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[async_trait]
impl QueuePublisher for InMemoryQueue {
    fn identifier(&self) -> &str {
        &self.name
    }

    async fn publish(&self, payload: Vec<u8>) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(QueueError::Closed(self.name.clone()));
            }
            state.ready.push_back(Envelope {
                id: id.clone(),
                payload,
                deliveries: 0,
            });
        }
        self.notify.notify_waiters();
        debug!(queue = %self.name, message_id = %id, "Published message");
        Ok(id)
    }
}

#[async_trait]
impl QueueConsumer for InMemoryQueue {
    fn identifier(&self) -> &str {
        &self.name
    }

    async fn receive(&self) -> Result<Option<QueuedMessage>> {
        loop {
            // Register interest before checking so a publish between the
            // check and the await is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.try_take() {
                return Ok(Some(message));
            }
            if self.is_closed() {
                return Ok(None);
            }
            notified.await;
        }
    }

    async fn ack(&self, receipt_handle: &str) -> Result<()> {
        self.state
            .lock()
            .in_flight
            .remove(receipt_handle)
            .map(|_| ())
            .ok_or_else(|| QueueError::UnknownReceipt(receipt_handle.to_string()))
    }

    async fn nack(&self, receipt_handle: &str, requeue: bool) -> Result<()> {
        {
            let mut state = self.state.lock();
            let envelope = state
                .in_flight
                .remove(receipt_handle)
                .ok_or_else(|| QueueError::UnknownReceipt(receipt_handle.to_string()))?;
            if requeue {
                state.ready.push_front(envelope);
            } else {
                state.dead_letters.push(envelope);
            }
        }
        self.notify.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_publish_then_receive_and_ack() {
        let queue = InMemoryQueue::new("profiles");
        queue.publish(b"one".to_vec()).await.unwrap();

        let message = queue.receive().await.unwrap().unwrap();
        assert_eq!(message.payload, b"one");
        assert!(!message.redelivered);
        assert_eq!(queue.in_flight_len(), 1);

        queue.ack(&message.receipt_handle).await.unwrap();
        assert_eq!(queue.in_flight_len(), 0);
        assert_eq!(queue.ready_len(), 0);
    }

    #[tokio::test]
    async fn test_requeue_marks_redelivered() {
        let queue = InMemoryQueue::new("profiles");
        let id = queue.publish(b"one".to_vec()).await.unwrap();

        let first = queue.receive().await.unwrap().unwrap();
        queue.nack(&first.receipt_handle, true).await.unwrap();

        let second = queue.receive().await.unwrap().unwrap();
        assert_eq!(second.id, id);
        assert!(second.redelivered);
        assert_ne!(first.receipt_handle, second.receipt_handle);
    }

    #[tokio::test]
    async fn test_nack_without_requeue_dead_letters() {
        let queue = InMemoryQueue::new("profiles");
        queue.publish(b"bad".to_vec()).await.unwrap();

        let message = queue.receive().await.unwrap().unwrap();
        queue.nack(&message.receipt_handle, false).await.unwrap();

        assert_eq!(queue.ready_len(), 0);
        assert_eq!(queue.dead_letters(), vec![b"bad".to_vec()]);
    }

    #[tokio::test]
    async fn test_unknown_receipt_is_an_error() {
        let queue = InMemoryQueue::new("profiles");
        assert!(matches!(
            queue.ack("42").await,
            Err(QueueError::UnknownReceipt(_))
        ));
    }

    #[tokio::test]
    async fn test_recover_unacked_redelivers() {
        let queue = InMemoryQueue::new("profiles");
        queue.publish(b"one".to_vec()).await.unwrap();
        let _ = queue.receive().await.unwrap().unwrap();

        assert_eq!(queue.recover_unacked(), 1);
        let again = queue.receive().await.unwrap().unwrap();
        assert!(again.redelivered);
    }

    #[tokio::test]
    async fn test_receive_waits_for_publish() {
        let queue = Arc::new(InMemoryQueue::new("profiles"));
        let receiver = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.receive().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.publish(b"late".to_vec()).await.unwrap();

        let message = receiver.await.unwrap().unwrap().unwrap();
        assert_eq!(message.payload, b"late");
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let queue = InMemoryQueue::new("profiles");
        queue.publish(b"one".to_vec()).await.unwrap();
        queue.close();

        assert!(queue.publish(b"two".to_vec()).await.is_err());
        assert!(queue.receive().await.unwrap().is_some());
        assert!(queue.receive().await.unwrap().is_none());
    }
}
