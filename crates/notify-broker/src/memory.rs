//! Single-process broker: envelopes flow over an mpsc channel and delayed
//! work sleeps on the runtime timer before dispatch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{Broker, HandlerRegistry, TaskEnvelope, DEFAULT_DISPATCH_RETRIES};

pub struct MemoryBroker {
    tx: mpsc::Sender<TaskEnvelope>,
}

pub type EnvelopeReceiver = mpsc::Receiver<TaskEnvelope>;

impl MemoryBroker {
    /// Returns the broker plus the receiving end that a worker loop drains.
    pub fn new() -> (Self, EnvelopeReceiver) {
        let (tx, rx) = mpsc::channel(512);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn startup(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn enqueue(&self, envelope: TaskEnvelope) -> anyhow::Result<()> {
        self.tx
            .send(envelope)
            .await
            .map_err(|_| anyhow::anyhow!("memory broker worker is gone"))
    }
}

/// Drains the channel, spawning one detached dispatch per envelope so a slow
/// handler never blocks the queue. Returns when all senders are dropped.
pub async fn run_worker(mut rx: EnvelopeReceiver, registry: Arc<HandlerRegistry>) {
    while let Some(envelope) = rx.recv().await {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            if let Some(delay) = envelope.delay {
                tokio::time::sleep(Duration::from_secs(u64::from(delay))).await;
            }
            registry.dispatch(&envelope, DEFAULT_DISPATCH_RETRIES).await;
        });
    }
    debug!("All memory broker senders are dead");
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::TaskHandler;

    struct Recorder {
        runs: Arc<AtomicUsize>,
        fail_first: usize,
    }

    #[async_trait]
    impl TaskHandler for Recorder {
        fn name(&self) -> &'static str {
            "record"
        }

        async fn run(&self, _kwargs: serde_json::Value) -> anyhow::Result<()> {
            let n = self.runs.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                anyhow::bail!("boom");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn enqueued_envelope_reaches_the_handler() {
        let runs = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(HandlerRegistry::new().register(Arc::new(Recorder {
            runs: Arc::clone(&runs),
            fail_first: 0,
        })));

        let (broker, rx) = MemoryBroker::new();
        let worker = tokio::spawn(run_worker(rx, registry));

        broker
            .enqueue(TaskEnvelope::new("record", &serde_json::json!({})).unwrap())
            .await
            .unwrap();
        drop(broker);
        worker.await.unwrap();

        // Dispatch is detached; give it a beat to land.
        for _ in 0..50 {
            if runs.load(Ordering::SeqCst) == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("handler never ran");
    }

    #[tokio::test]
    async fn dispatch_retries_are_bounded() {
        let runs = Arc::new(AtomicUsize::new(0));
        let registry = HandlerRegistry::new().register(Arc::new(Recorder {
            runs: Arc::clone(&runs),
            fail_first: 100,
        }));

        let envelope = TaskEnvelope::new("record", &serde_json::json!({})).unwrap();
        registry.dispatch(&envelope, DEFAULT_DISPATCH_RETRIES).await;

        assert_eq!(runs.load(Ordering::SeqCst), 3); // first try + two retries
    }
}
