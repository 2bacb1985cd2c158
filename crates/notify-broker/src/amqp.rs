//! AMQP transport. Envelopes are published as JSON to a direct queue; the
//! `delay` label is forwarded as an `x-delay` header for servers running the
//! delayed-message exchange plugin.

use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use futures::StreamExt as _;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::Mutex;

use crate::{Broker, HandlerRegistry, TaskEnvelope, DEFAULT_DISPATCH_RETRIES};

const QUEUE_NAME: &str = "currawong.tasks";
const DELAY_HEADER: &str = "x-delay";

pub struct AmqpBroker {
    url: String,
    channel: Mutex<Option<Channel>>,
}

impl AmqpBroker {
    pub fn new(url: String) -> Self {
        Self {
            url,
            channel: Mutex::new(None),
        }
    }

    async fn open_channel(&self) -> anyhow::Result<Channel> {
        let connection = Connection::connect(&self.url, ConnectionProperties::default())
            .await
            .context("connect to AMQP broker")?;
        let channel = connection.create_channel().await.context("create AMQP channel")?;

        channel
            .queue_declare(
                QUEUE_NAME,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .context("declare task queue")?;

        Ok(channel)
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn startup(&self) -> anyhow::Result<()> {
        let mut guard = self.channel.lock().await;
        if guard.is_none() {
            *guard = Some(self.open_channel().await?);
        }
        Ok(())
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        let mut guard = self.channel.lock().await;
        if let Some(channel) = guard.take() {
            channel.close(0, "shutdown").await.context("close AMQP channel")?;
        }
        Ok(())
    }

    async fn enqueue(&self, envelope: TaskEnvelope) -> anyhow::Result<()> {
        let guard = self.channel.lock().await;
        let channel = guard.as_ref().context("AMQP broker is not started")?;

        let payload = serde_json::to_vec(&envelope).context("serialize task envelope")?;

        let mut headers = FieldTable::default();
        if let Some(delay) = envelope.delay {
            headers.insert(
                ShortString::from(DELAY_HEADER),
                AMQPValue::LongInt(i32::try_from(u64::from(delay) * 1000).unwrap_or(i32::MAX)),
            );
        }

        channel
            .basic_publish(
                "",
                QUEUE_NAME,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_headers(headers),
            )
            .await
            .context("publish task envelope")?
            .await
            .context("broker publish confirmation")?;

        Ok(())
    }
}

/// Consumes the task queue forever, dispatching each envelope through the
/// registry. Intended to run under a supervised task on worker processes.
pub async fn run_consumer(url: &str, registry: Arc<HandlerRegistry>) -> anyhow::Result<()> {
    let connection = Connection::connect(url, ConnectionProperties::default())
        .await
        .context("connect to AMQP broker")?;
    let channel = connection.create_channel().await.context("create AMQP channel")?;

    channel
        .queue_declare(
            QUEUE_NAME,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .context("declare task queue")?;

    let mut consumer = channel
        .basic_consume(
            QUEUE_NAME,
            "currawong-worker",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .context("start consuming task queue")?;

    while let Some(delivery) = consumer.next().await {
        let delivery = delivery.context("broker delivery")?;

        match serde_json::from_slice::<TaskEnvelope>(&delivery.data) {
            Ok(envelope) => {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    registry.dispatch(&envelope, DEFAULT_DISPATCH_RETRIES).await;
                });
            }
            Err(error) => {
                warn!(%error, "Discarding undecodable task envelope");
            }
        }

        delivery
            .ack(BasicAckOptions::default())
            .await
            .context("ack delivery")?;
    }

    Ok(())
}
