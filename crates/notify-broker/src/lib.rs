//! Client contract against an external task broker.
//!
//! Work is identified by a task name plus JSON kwargs and may carry an
//! integer `delay` label (seconds) honoured by the transport. Two transports
//! are provided: an in-process memory broker for single-node deployments and
//! an AMQP broker for everything else.

#[macro_use]
extern crate tracing;

pub mod amqp;
pub mod memory;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// One unit of work handed to the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    /// Well-known task name (e.g. `transmit_notification`).
    pub name: String,
    /// Task kwargs, serialized by the producer and decoded by the handler.
    pub kwargs: serde_json::Value,
    /// Broker delay label in seconds. `None` means run as soon as possible.
    pub delay: Option<u32>,
}

impl TaskEnvelope {
    pub fn new<T: Serialize>(name: &str, kwargs: &T) -> anyhow::Result<Self> {
        Ok(Self {
            name: name.to_owned(),
            kwargs: serde_json::to_value(kwargs)?,
            delay: None,
        })
    }

    pub fn with_delay(mut self, delay_secs: u32) -> Self {
        self.delay = Some(delay_secs);
        self
    }

    pub fn decode_kwargs<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_value(self.kwargs.clone())?)
    }
}

/// Producer-side broker contract.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Opens transport resources. Must be called before `enqueue`.
    async fn startup(&self) -> anyhow::Result<()>;

    /// Closes transport resources. Pending deliveries may be abandoned.
    async fn shutdown(&self) -> anyhow::Result<()>;

    /// Hands an envelope to the broker, honouring its delay label.
    async fn enqueue(&self, envelope: TaskEnvelope) -> anyhow::Result<()>;
}

pub type DynBroker = Arc<dyn Broker>;

/// Consumer-side handler for one task name.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, kwargs: serde_json::Value) -> anyhow::Result<()>;
}

/// Routes envelopes to handlers by task name.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, handler: Arc<dyn TaskHandler>) -> Self {
        self.handlers.insert(handler.name(), handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers.get(name)
    }

    /// Dispatches one envelope, absorbing handler failure with a bounded
    /// retry. This is a safety net against uncaught handler errors only;
    /// application-level retries are modelled as fresh delayed envelopes.
    pub async fn dispatch(&self, envelope: &TaskEnvelope, max_retries: u8) {
        let Some(handler) = self.get(&envelope.name) else {
            warn!(task = %envelope.name, "No handler registered for task");
            return;
        };

        for attempt in 0..=max_retries {
            match handler.run(envelope.kwargs.clone()).await {
                Ok(()) => return,
                Err(error) => {
                    warn!(
                        task = %envelope.name,
                        attempt,
                        error = format!("{error:#}"),
                        "Task handler failed"
                    );
                }
            }
        }
    }
}

/// Number of broker-level dispatch retries applied on top of whatever the
/// handler does itself.
pub const DEFAULT_DISPATCH_RETRIES: u8 = 2;
