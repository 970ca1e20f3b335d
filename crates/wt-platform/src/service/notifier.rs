//! Profile-change publication
//!
//! Publishing happens after the profile write has committed and never fails
//! the triggering request.

use std::sync::Arc;

use tracing::{debug, warn};
use wt_queue::QueuePublisher;

use crate::domain::User;
use crate::service::Clock;

pub struct ProfileChangeNotifier {
    publisher: Arc<dyn QueuePublisher>,
    clock: Arc<dyn Clock>,
}

impl ProfileChangeNotifier {
    pub fn new(publisher: Arc<dyn QueuePublisher>, clock: Arc<dyn Clock>) -> Self {
        Self { publisher, clock }
    }

    /// Publish a snapshot of `user`. Returns whether the publish was accepted.
    pub async fn publish(&self, user: &User) -> bool {
        let event = user.to_profile_event(self.clock.now());
        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Failed to serialize profile event");
                return false;
            }
        };

        match self.publisher.publish(payload).await {
            Ok(message_id) => {
                debug!(
                    user_id = %user.id,
                    topic = %self.publisher.identifier(),
                    message_id = %message_id,
                    "Published profile change"
                );
                true
            }
            Err(e) => {
                warn!(
                    user_id = %user.id,
                    topic = %self.publisher.identifier(),
                    error = %e,
                    "Failed to publish profile change"
                );
                false
            }
        }
    }
}
