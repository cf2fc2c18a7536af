//! Periodic telemetry flushing
//!
//! On each tick the scheduler snapshots the three buffers, skips the tick
//! when everything is empty, and otherwise ships a [`TelemetryBatch`] via
//! the configured [`Transport`]. Buffers are cleared only after the send
//! is confirmed; a failed send retains everything for the next tick, so
//! transport outages degrade to delayed telemetry, never lost buffers.
//! No buffer lock is ever held across the network call.

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::record::TelemetryBatch;
use crate::recorder::{ActionRecorder, ErrorRecorder, MetricRecorder};
use crate::storage::{BufferStore, StoredTelemetry};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Off-device batch delivery
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, batch: &TelemetryBatch) -> Result<()>;
}

/// JSON POST transport for production use
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, batch: &TelemetryBatch) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(batch)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "telemetry endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Outcome of one flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// All buffers were empty, no transport call was made
    Empty,
    /// Batch confirmed sent, buffers cleared
    Sent { records: usize },
    /// Transport failed, buffers retained for the next tick
    Failed,
}

/// Assembles batches from the recorders and ships them on a fixed interval
#[derive(Clone)]
pub struct FlushScheduler {
    metrics: Arc<MetricRecorder>,
    errors: Arc<ErrorRecorder>,
    actions: Arc<ActionRecorder>,
    transport: Arc<dyn Transport>,
    buffer_store: Option<Arc<dyn BufferStore>>,
    clock: Arc<Clock>,
}

impl FlushScheduler {
    pub fn new(
        metrics: Arc<MetricRecorder>,
        errors: Arc<ErrorRecorder>,
        actions: Arc<ActionRecorder>,
        transport: Arc<dyn Transport>,
        buffer_store: Option<Arc<dyn BufferStore>>,
        clock: Arc<Clock>,
    ) -> Self {
        Self {
            metrics,
            errors,
            actions,
            transport,
            buffer_store,
            clock,
        }
    }

    /// One flush attempt: snapshot, send, and clear only on confirmed
    /// success.
    pub async fn flush_once(&self) -> FlushOutcome {
        let batch = TelemetryBatch {
            metrics: self.metrics.snapshot(),
            errors: self.errors.snapshot(),
            actions: self.actions.snapshot(),
            produced_at: self.clock.now_millis(),
        };

        if batch.is_empty() {
            debug!("no telemetry to flush");
            return FlushOutcome::Empty;
        }

        let records = batch.record_count();
        match self.transport.send(&batch).await {
            Ok(()) => {
                self.metrics.clear();
                self.errors.clear();
                self.actions.clear();
                if let Some(store) = &self.buffer_store {
                    if let Err(e) = store.save(&StoredTelemetry::default()).await {
                        warn!("failed to persist cleared buffer state: {}", e);
                    }
                }
                info!(
                    metrics = batch.metrics.len(),
                    errors = batch.errors.len(),
                    actions = batch.actions.len(),
                    "telemetry batch sent"
                );
                FlushOutcome::Sent { records }
            }
            Err(e) => {
                warn!(records, "telemetry flush failed, retaining buffers: {}", e);
                FlushOutcome::Failed
            }
        }
    }

    /// Flush loop, spawned by the engine. Runs until the shutdown signal
    /// fires; an in-flight flush always completes before the loop exits.
    pub(crate) async fn run(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        // The first tick of a tokio interval fires immediately; skip it so
        // the first real flush happens one full interval after start.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush_once().await;
                }
                _ = shutdown.changed() => {
                    debug!("flush loop stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BoundedBuffer;
    use crate::record::{ErrorSeverity, MetricCategory};
    use crate::storage::MemoryBufferStore;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StubTransport {
        fail: AtomicBool,
        calls: AtomicUsize,
        last_batch: Mutex<Option<TelemetryBatch>>,
    }

    impl StubTransport {
        fn new(fail: bool) -> Self {
            Self {
                fail: AtomicBool::new(fail),
                calls: AtomicUsize::new(0),
                last_batch: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn send(&self, batch: &TelemetryBatch) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_batch.lock() = Some(batch.clone());
            if self.fail.load(Ordering::SeqCst) {
                Err(Error::Transport("stub failure".into()))
            } else {
                Ok(())
            }
        }
    }

    fn scheduler(
        transport: Arc<StubTransport>,
        buffer_store: Option<Arc<dyn BufferStore>>,
    ) -> (FlushScheduler, Arc<MetricRecorder>, Arc<ErrorRecorder>) {
        let active = Arc::new(AtomicBool::new(true));
        let clock = Arc::new(Clock::new());
        let metrics = Arc::new(MetricRecorder::new(
            Arc::new(BoundedBuffer::new(100)),
            active.clone(),
            clock.clone(),
        ));
        let errors = Arc::new(ErrorRecorder::new(
            Arc::new(BoundedBuffer::new(100)),
            active.clone(),
            clock.clone(),
        ));
        let actions = Arc::new(ActionRecorder::new(
            Arc::new(BoundedBuffer::new(100)),
            active,
            clock.clone(),
        ));
        let scheduler = FlushScheduler::new(
            metrics.clone(),
            errors.clone(),
            actions,
            transport,
            buffer_store,
            clock,
        );
        (scheduler, metrics, errors)
    }

    #[tokio::test]
    async fn test_empty_buffers_skip_transport() {
        let transport = Arc::new(StubTransport::new(false));
        let (scheduler, _, _) = scheduler(transport.clone(), None);

        assert_eq!(scheduler.flush_once().await, FlushOutcome::Empty);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_clears_buffers() {
        let transport = Arc::new(StubTransport::new(false));
        let store = Arc::new(MemoryBufferStore::new());
        let (scheduler, metrics, errors) = scheduler(transport.clone(), Some(store.clone()));

        metrics.record(MetricCategory::ApiCall, "api", Some(10), None);
        errors.record("boom", ErrorSeverity::Low, None, None);

        let outcome = scheduler.flush_once().await;
        assert_eq!(outcome, FlushOutcome::Sent { records: 2 });
        assert!(metrics.is_empty());
        assert!(errors.is_empty());

        // Cleared state persisted
        let stored = store.load().await.unwrap().unwrap();
        assert!(stored.is_empty());

        let batch = transport.last_batch.lock().clone().unwrap();
        assert_eq!(batch.metrics.len(), 1);
        assert_eq!(batch.errors.len(), 1);
        assert!(batch.produced_at > 0);
    }

    #[tokio::test]
    async fn test_failure_retains_buffers() {
        let transport = Arc::new(StubTransport::new(true));
        let (scheduler, metrics, _) = scheduler(transport.clone(), None);

        metrics.record(MetricCategory::ApiCall, "api", Some(10), None);
        for _ in 0..3 {
            assert_eq!(scheduler.flush_once().await, FlushOutcome::Failed);
            assert_eq!(metrics.len(), 1);
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);

        // Recovery ships the accumulated data
        transport.fail.store(false, Ordering::SeqCst);
        metrics.record(MetricCategory::ApiCall, "api", Some(20), None);
        assert_eq!(
            scheduler.flush_once().await,
            FlushOutcome::Sent { records: 2 }
        );
        assert!(metrics.is_empty());
    }
}
