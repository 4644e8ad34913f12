//! In-process publisher: records declared queues and published envelopes.
//! Backs `serve --dry-run` and the dispatcher tests.

use super::{PublishError, QueueEnvelope, QueuePublisher};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryQueues {
    declared: BTreeSet<String>,
    published: Vec<QueueEnvelope>,
}

/// Publisher that keeps everything in memory. Clones share the same queues.
#[derive(Clone, Default)]
pub struct MemoryPublisher {
    inner: Arc<RwLock<MemoryQueues>>,
    failing: Arc<AtomicBool>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every publish fails with [`PublishError::Unavailable`] and records nothing.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Queues declared so far (each name once).
    pub async fn declared_queues(&self) -> Vec<String> {
        self.inner.read().await.declared.iter().cloned().collect()
    }

    /// All envelopes published so far, in order.
    pub async fn published(&self) -> Vec<QueueEnvelope> {
        self.inner.read().await.published.clone()
    }

    /// Envelopes published to one queue.
    pub async fn published_to(&self, queue: &str) -> Vec<QueueEnvelope> {
        self.inner
            .read()
            .await
            .published
            .iter()
            .filter(|e| e.queue == queue)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl QueuePublisher for MemoryPublisher {
    fn name(&self) -> &str {
        "memory"
    }

    fn is_connected(&self) -> bool {
        !self.failing.load(Ordering::SeqCst)
    }

    async fn publish(&self, envelope: QueueEnvelope) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::Unavailable("memory publisher set to fail".to_string()));
        }
        let mut g = self.inner.write().await;
        g.declared.insert(envelope.queue.clone());
        log::debug!("memory broker: {} <- {} bytes", envelope.queue, envelope.body.len());
        g.published.push(envelope);
        Ok(())
    }
}
