use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

pub mod logging;

pub use logging::{init_tracing, LogFormat};

// ============================================================================
// Core Message Types
// ============================================================================

/// Snapshot of a user profile published after every successful profile update.
///
/// The wire shape is camelCase JSON and is consumed by downstream services,
/// so field names must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChangeEvent {
    pub id: String,
    pub fullname: String,
    pub email: String,
    pub position: Option<String>,
    pub phone_number: Option<String>,
    pub image_url: Option<String>,
    pub role: String,
    /// Seconds since epoch
    pub created_at: i64,
    /// Seconds since epoch
    pub updated_at: i64,
    pub mq_issued_at: DateTime<Utc>,
}

impl ProfileChangeEvent {
    /// Key identifying one publication of one profile revision.
    ///
    /// A broker redelivery carries the same key, a new publish never does.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.id,
            self.updated_at,
            self.mq_issued_at.timestamp_millis()
        )
    }
}

/// A message that has been received from a queue with tracking metadata
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub id: String,
    pub payload: Vec<u8>,
    pub receipt_handle: String,
    /// Set when the broker has delivered this message before
    pub redelivered: bool,
    pub queue_identifier: String,
}

/// ACK/NACK decision returned by a message handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckNack {
    Ack,
    Nack { requeue: bool },
}
