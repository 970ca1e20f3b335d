//! RabbitMQ backend
//!
//! Topology: a durable queue named after the topic, a durable exchange, and a
//! binding from the exchange to the queue with the topic as routing key.
//! Consumers use explicit acknowledgements with a prefetch of one.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use lapin::{
    acker::Acker,
    message::Delivery,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use tokio::sync::Mutex;
use tracing::{debug, info};
use wt_common::QueuedMessage;

use crate::{QueueConsumer, QueueError, QueuePublisher, Result};

impl From<lapin::Error> for QueueError {
    fn from(e: lapin::Error) -> Self {
        QueueError::Broker(e.to_string())
    }
}

/// Names and settings for one topic's broker objects
#[derive(Debug, Clone)]
pub struct RabbitMqTopology {
    pub queue: String,
    pub exchange: String,
    pub exchange_type: String,
    pub consumer_tag: String,
    pub prefetch: u16,
}

impl RabbitMqTopology {
    fn exchange_kind(&self) -> ExchangeKind {
        match self.exchange_type.to_lowercase().as_str() {
            "direct" => ExchangeKind::Direct,
            "fanout" => ExchangeKind::Fanout,
            "topic" => ExchangeKind::Topic,
            "headers" => ExchangeKind::Headers,
            other => ExchangeKind::Custom(other.to_string()),
        }
    }
}

/// An open AMQP connection with the topology declared
pub struct RabbitMqChannel {
    connection: Connection,
    channel: Channel,
    topology: RabbitMqTopology,
}

impl RabbitMqChannel {
    /// Connect and declare queue, exchange and binding.
    ///
    /// Any failure here is returned to the caller; the server treats it as fatal.
    pub async fn connect(uri: &str, topology: RabbitMqTopology) -> Result<Self> {
        let connection = Connection::connect(uri, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .queue_declare(
                &topology.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .exchange_declare(
                &topology.exchange,
                topology.exchange_kind(),
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        channel
            .queue_bind(
                &topology.queue,
                &topology.exchange,
                &topology.queue,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        channel
            .basic_qos(topology.prefetch, BasicQosOptions::default())
            .await?;

        info!(
            queue = %topology.queue,
            exchange = %topology.exchange,
            exchange_type = %topology.exchange_type,
            "Connected to RabbitMQ"
        );

        Ok(Self {
            connection,
            channel,
            topology,
        })
    }

    pub fn publisher(&self) -> RabbitMqPublisher {
        RabbitMqPublisher {
            channel: self.channel.clone(),
            exchange: self.topology.exchange.clone(),
            routing_key: self.topology.queue.clone(),
        }
    }

    pub async fn consumer(&self) -> Result<RabbitMqConsumer> {
        let consumer = self
            .channel
            .basic_consume(
                &self.topology.queue,
                &self.topology.consumer_tag,
                BasicConsumeOptions {
                    no_ack: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        Ok(RabbitMqConsumer {
            queue: self.topology.queue.clone(),
            consumer: Mutex::new(consumer),
            pending: DashMap::new(),
        })
    }

    pub async fn close(&self) -> Result<()> {
        self.channel.close(200, "shutdown").await?;
        self.connection.close(200, "shutdown").await?;
        Ok(())
    }
}

pub struct RabbitMqPublisher {
    channel: Channel,
    exchange: String,
    routing_key: String,
}

#[async_trait]
impl QueuePublisher for RabbitMqPublisher {
    fn identifier(&self) -> &str {
        &self.routing_key
    }

    async fn publish(&self, payload: Vec<u8>) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2)
            .with_message_id(id.clone().into());

        // Publisher confirm is not awaited
        let _confirm = self
            .channel
            .basic_publish(
                &self.exchange,
                &self.routing_key,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await?;

        debug!(exchange = %self.exchange, message_id = %id, "Published message");
        Ok(id)
    }
}

pub struct RabbitMqConsumer {
    queue: String,
    consumer: Mutex<lapin::Consumer>,
    /// Ackers of received, unsettled deliveries keyed by delivery tag
    pending: DashMap<String, Acker>,
}

#[async_trait]
impl QueueConsumer for RabbitMqConsumer {
    fn identifier(&self) -> &str {
        &self.queue
    }

    async fn receive(&self) -> Result<Option<QueuedMessage>> {
        let mut consumer = self.consumer.lock().await;
        let delivery = match consumer.next().await {
            Some(delivery) => delivery?,
            None => return Ok(None),
        };

        let Delivery {
            delivery_tag,
            redelivered,
            properties,
            data,
            acker,
            ..
        } = delivery;

        let receipt_handle = delivery_tag.to_string();
        let id = properties
            .message_id()
            .as_ref()
            .map(|id| id.as_str().to_string())
            .unwrap_or_else(|| receipt_handle.clone());

        self.pending.insert(receipt_handle.clone(), acker);

        Ok(Some(QueuedMessage {
            id,
            payload: data,
            receipt_handle,
            redelivered,
            queue_identifier: self.queue.clone(),
        }))
    }

    async fn ack(&self, receipt_handle: &str) -> Result<()> {
        let (_, acker) = self
            .pending
            .remove(receipt_handle)
            .ok_or_else(|| QueueError::UnknownReceipt(receipt_handle.to_string()))?;
        acker.ack(BasicAckOptions::default()).await?;
        Ok(())
    }

    async fn nack(&self, receipt_handle: &str, requeue: bool) -> Result<()> {
        let (_, acker) = self
            .pending
            .remove(receipt_handle)
            .ok_or_else(|| QueueError::UnknownReceipt(receipt_handle.to_string()))?;
        acker
            .nack(BasicNackOptions {
                requeue,
                ..Default::default()
            })
            .await?;
        Ok(())
    }
}
