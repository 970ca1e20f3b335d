//! ConsumerRunner - sequential message processing with explicit settlement
//!
//! One message is received, handled and settled before the next receive, so
//! at most one message is in flight per runner. Delivery order is preserved
//! per consumer.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use wt_common::{AckNack, QueuedMessage};

use crate::{QueueConsumer, Result};

/// Processes one message and decides how it is settled
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &QueuedMessage) -> AckNack;
}

pub struct ConsumerRunner {
    consumer: Arc<dyn QueueConsumer>,
    handler: Arc<dyn MessageHandler>,
}

impl ConsumerRunner {
    pub fn new(consumer: Arc<dyn QueueConsumer>, handler: Arc<dyn MessageHandler>) -> Self {
        Self { consumer, handler }
    }

    /// Run until shutdown is signalled or the channel closes.
    ///
    /// Returns the number of messages settled. A receive error ends the loop
    /// with that error; settlement errors are logged and processing continues.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<u64> {
        let queue = self.consumer.identifier().to_string();
        info!(queue = %queue, "Consumer started");

        let mut settled = 0u64;
        loop {
            let next = tokio::select! {
                _ = shutdown.recv() => {
                    info!(queue = %queue, "Consumer shutting down");
                    break;
                }
                next = self.consumer.receive() => next,
            };

            let message = match next {
                Ok(Some(message)) => message,
                Ok(None) => {
                    info!(queue = %queue, "Channel closed, consumer stopping");
                    break;
                }
                Err(e) => {
                    error!(queue = %queue, error = %e, "Receive failed");
                    return Err(e);
                }
            };

            debug!(
                queue = %queue,
                message_id = %message.id,
                redelivered = message.redelivered,
                "Processing message"
            );

            let outcome = self.handler.handle(&message).await;
            let result = match outcome {
                AckNack::Ack => self.consumer.ack(&message.receipt_handle).await,
                AckNack::Nack { requeue } => {
                    self.consumer.nack(&message.receipt_handle, requeue).await
                }
            };

            match result {
                Ok(()) => settled += 1,
                Err(e) => warn!(
                    queue = %queue,
                    message_id = %message.id,
                    error = %e,
                    "Failed to settle message"
                ),
            }
        }

        Ok(settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryQueue, QueuePublisher};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingHandler {
        seen: Mutex<Vec<Vec<u8>>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fail_first: AtomicUsize,
    }

    impl RecordingHandler {
        fn new(fail_first: usize) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                fail_first: AtomicUsize::new(fail_first),
            }
        }
    }

    #[async_trait]
    impl MessageHandler for RecordingHandler {
        async fn handle(&self, message: &QueuedMessage) -> AckNack {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return AckNack::Nack { requeue: true };
            }
            self.seen.lock().push(message.payload.clone());
            AckNack::Ack
        }
    }

    #[tokio::test]
    async fn test_processes_in_order_one_at_a_time() {
        let queue = Arc::new(InMemoryQueue::new("profiles"));
        for payload in [b"a", b"b", b"c"] {
            queue.publish(payload.to_vec()).await.unwrap();
        }
        queue.close();

        let handler = Arc::new(RecordingHandler::new(0));
        let (_tx, rx) = broadcast::channel(1);
        let settled = ConsumerRunner::new(queue.clone(), handler.clone())
            .run(rx)
            .await
            .unwrap();

        assert_eq!(settled, 3);
        assert_eq!(*handler.seen.lock(), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(handler.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(queue.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_nacked_message_is_redelivered() {
        let queue = Arc::new(InMemoryQueue::new("profiles"));
        queue.publish(b"retry-me".to_vec()).await.unwrap();
        queue.close();

        let handler = Arc::new(RecordingHandler::new(1));
        let (_tx, rx) = broadcast::channel(1);
        let settled = ConsumerRunner::new(queue.clone(), handler.clone())
            .run(rx)
            .await
            .unwrap();

        assert_eq!(settled, 2);
        assert_eq!(*handler.seen.lock(), vec![b"retry-me".to_vec()]);
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let queue = Arc::new(InMemoryQueue::new("profiles"));
        let handler = Arc::new(RecordingHandler::new(0));
        let (tx, rx) = broadcast::channel(1);

        let task = tokio::spawn(ConsumerRunner::new(queue, handler).run(rx));
        tx.send(()).unwrap();

        assert_eq!(task.await.unwrap().unwrap(), 0);
    }
}
