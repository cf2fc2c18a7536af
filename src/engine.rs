//! Engine facade owning the full telemetry pipeline
//!
//! An [`Engine`] is an explicitly constructed instance injected into its
//! callers; there is no process-wide singleton. `init` loads persisted
//! configuration (falling back to defaults), seeds the buffers from the
//! last persisted snapshot when a buffer store is configured, and starts
//! the evaluator and flush loops on their own tickers. `stop` cancels both
//! loops, waits for any in-flight tick, and clears the buffers; `cleanup`
//! additionally erases all persisted state. The lifecycle is one-way:
//! Idle -> Running -> Stopped, and a stopped engine is not restartable.

use crate::buffer::BoundedBuffer;
use crate::clock::Clock;
use crate::config::{EngineConfig, OptimizationConfig, ThresholdSet};
use crate::dispatch::OptimizationDispatcher;
use crate::error::{Error, Result};
use crate::evaluator::ThresholdEvaluator;
use crate::flush::{FlushOutcome, FlushScheduler, Transport};
use crate::probe::ProbeSet;
use crate::record::{ActionRecord, ErrorRecord, ErrorSeverity, Metadata, MetricCategory, MetricRecord};
use crate::recorder::{ActionRecorder, ErrorRecorder, MetricRecorder};
use crate::stats::{Stats, StatsAggregator};
use crate::storage::{BufferStore, ConfigStore, StoredTelemetry};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Idle,
    Running,
    Stopped,
}

/// How `stop` treats data still sitting in the buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Attempt one final flush before clearing the buffers
    FlushAndStop,
    /// Clear the buffers without a final flush
    Discard,
}

/// Builder for [`Engine`]
pub struct EngineBuilder {
    config: EngineConfig,
    transport: Arc<dyn Transport>,
    probes: Option<ProbeSet>,
    config_store: Option<Arc<dyn ConfigStore>>,
    buffer_store: Option<Arc<dyn BufferStore>>,
}

impl EngineBuilder {
    /// Probes to sample; defaults to the simulated set
    pub fn probes(mut self, probes: ProbeSet) -> Self {
        self.probes = Some(probes);
        self
    }

    pub fn config_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.config_store = Some(store);
        self
    }

    pub fn buffer_store(mut self, store: Arc<dyn BufferStore>) -> Self {
        self.buffer_store = Some(store);
        self
    }

    pub fn build(self) -> Engine {
        let clock = Arc::new(Clock::new());
        let active = Arc::new(AtomicBool::new(false));

        let metric_buffer = Arc::new(BoundedBuffer::new(self.config.metric_capacity));
        let error_buffer = Arc::new(BoundedBuffer::new(self.config.error_capacity));
        let action_buffer = Arc::new(BoundedBuffer::new(self.config.action_capacity));

        let metrics = Arc::new(MetricRecorder::new(
            metric_buffer.clone(),
            active.clone(),
            clock.clone(),
        ));
        let errors = Arc::new(ErrorRecorder::new(
            error_buffer.clone(),
            active.clone(),
            clock.clone(),
        ));
        let actions = Arc::new(ActionRecorder::new(
            action_buffer.clone(),
            active.clone(),
            clock.clone(),
        ));

        let dispatcher = Arc::new(OptimizationDispatcher::new());
        let optimization = Arc::new(RwLock::new(self.config.optimization.clone()));
        let thresholds = Arc::new(RwLock::new(self.config.thresholds.clone()));

        let evaluator = ThresholdEvaluator::new(
            Arc::new(self.probes.unwrap_or_default()),
            metrics.clone(),
            dispatcher.clone(),
            thresholds.clone(),
        );
        let flusher = FlushScheduler::new(
            metrics.clone(),
            errors.clone(),
            actions.clone(),
            self.transport,
            self.buffer_store.clone(),
            clock.clone(),
        );
        let aggregator = StatsAggregator::new(
            metric_buffer.clone(),
            error_buffer.clone(),
            action_buffer.clone(),
            dispatcher.clone(),
        );

        let (shutdown_tx, _) = watch::channel(false);

        Engine {
            config: self.config,
            optimization,
            thresholds,
            active,
            state: Mutex::new(EngineState::Idle),
            clock,
            metric_buffer,
            error_buffer,
            action_buffer,
            metrics,
            errors,
            actions,
            dispatcher,
            evaluator,
            flusher,
            aggregator,
            config_store: self.config_store,
            buffer_store: self.buffer_store,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }
}

/// Telemetry and adaptive-optimization engine
pub struct Engine {
    config: EngineConfig,
    optimization: Arc<RwLock<OptimizationConfig>>,
    thresholds: Arc<RwLock<ThresholdSet>>,
    active: Arc<AtomicBool>,
    state: Mutex<EngineState>,
    clock: Arc<Clock>,

    metric_buffer: Arc<BoundedBuffer<MetricRecord>>,
    error_buffer: Arc<BoundedBuffer<ErrorRecord>>,
    action_buffer: Arc<BoundedBuffer<ActionRecord>>,
    metrics: Arc<MetricRecorder>,
    errors: Arc<ErrorRecorder>,
    actions: Arc<ActionRecorder>,

    dispatcher: Arc<OptimizationDispatcher>,
    evaluator: ThresholdEvaluator,
    flusher: FlushScheduler,
    aggregator: StatsAggregator,

    config_store: Option<Arc<dyn ConfigStore>>,
    buffer_store: Option<Arc<dyn BufferStore>>,

    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Start building an engine with the given configuration and transport
    pub fn builder(config: EngineConfig, transport: Arc<dyn Transport>) -> EngineBuilder {
        EngineBuilder {
            config,
            transport,
            probes: None,
            config_store: None,
            buffer_store: None,
        }
    }

    /// Load persisted state, apply the startup optimization pass, and start
    /// both periodic loops.
    pub async fn init(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != EngineState::Idle {
                return Err(Error::InvalidState(format!(
                    "engine cannot be initialized from state {:?}",
                    *state
                )));
            }
            // Claim the transition under the lock so a racing init fails.
            *state = EngineState::Running;
        }

        if let Some(store) = &self.config_store {
            match store.load().await {
                Ok(Some((config, thresholds))) => {
                    *self.optimization.write() = config;
                    *self.thresholds.write() = thresholds;
                    info!("loaded persisted engine configuration");
                }
                Ok(None) => {}
                Err(e) => {
                    // Unreadable config degrades to defaults, never a crash.
                    warn!("config load failed, using defaults: {}", e);
                }
            }
        }

        if let Some(store) = &self.buffer_store {
            match store.load().await {
                Ok(Some(stored)) if !stored.is_empty() => {
                    let StoredTelemetry {
                        metrics,
                        errors,
                        actions,
                    } = stored;
                    let count = metrics.len() + errors.len() + actions.len();
                    for record in metrics {
                        self.metric_buffer.append(record);
                    }
                    for record in errors {
                        self.error_buffer.append(record);
                    }
                    for record in actions {
                        self.action_buffer.append(record);
                    }
                    info!(count, "restored buffered telemetry from storage");
                }
                Ok(_) => {}
                Err(e) => warn!("buffer restore failed, starting empty: {}", e),
            }
        }

        self.dispatcher.apply_startup(&self.optimization.read());
        self.active.store(true, Ordering::Release);

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(self.evaluator.clone().run(
            self.config.evaluate_interval,
            self.shutdown_tx.subscribe(),
        )));
        tasks.push(tokio::spawn(self.flusher.clone().run(
            self.config.flush_interval,
            self.shutdown_tx.subscribe(),
        )));

        info!("telemetry engine started");
        Ok(())
    }

    /// Record a performance metric; a no-op unless the engine is running
    pub fn record_metric(
        &self,
        category: MetricCategory,
        name: &str,
        duration_ms: Option<u64>,
        metadata: Option<Metadata>,
    ) {
        self.metrics.record(category, name, duration_ms, metadata);
    }

    /// Record an error report; a no-op unless the engine is running
    pub fn record_error(
        &self,
        message: &str,
        severity: ErrorSeverity,
        stack_trace: Option<String>,
        context: Option<Metadata>,
    ) {
        self.errors.record(message, severity, stack_trace, context);
    }

    /// Record a user action; a no-op unless the engine is running
    pub fn record_action(
        &self,
        action: &str,
        screen: &str,
        actor_id: Option<String>,
        metadata: Option<Metadata>,
    ) {
        self.actions.record(action, screen, actor_id, metadata);
    }

    /// Run a future and record its elapsed time as an `api_call` metric.
    ///
    /// A failed future is recorded with an `error` metadata flag, which
    /// feeds the error-rate statistic. The result is passed through either
    /// way.
    pub async fn measure<T, E, F>(&self, name: &str, fut: F) -> std::result::Result<T, E>
    where
        E: std::fmt::Display,
        F: std::future::Future<Output = std::result::Result<T, E>>,
    {
        let started = Instant::now();
        let result = fut.await;
        let duration_ms = started.elapsed().as_millis() as u64;
        let metadata = result.as_ref().err().map(|e| {
            let mut meta = Metadata::new();
            meta.insert("error".into(), serde_json::Value::String(e.to_string()));
            meta
        });
        self.metrics
            .record(MetricCategory::ApiCall, name, Some(duration_ms), metadata);
        result
    }

    /// Guard that records a `screen_load` metric when dropped
    pub fn screen_load_timer(&self, screen: &str) -> ScreenLoadTimer {
        ScreenLoadTimer {
            recorder: self.metrics.clone(),
            screen: screen.to_string(),
            started: Instant::now(),
        }
    }

    /// Current derived statistics, computed synchronously from snapshots
    pub fn stats(&self) -> Stats {
        self.aggregator.stats(self.clock.now_millis())
    }

    /// Trigger a flush attempt outside the regular schedule
    pub async fn flush_now(&self) -> FlushOutcome {
        self.flusher.flush_once().await
    }

    pub fn optimization_config(&self) -> OptimizationConfig {
        self.optimization.read().clone()
    }

    pub fn thresholds(&self) -> ThresholdSet {
        self.thresholds.read().clone()
    }

    /// Replace the optimization toggles, persist them, and re-run the
    /// startup optimization pass.
    pub async fn update_config(&self, config: OptimizationConfig) -> Result<()> {
        *self.optimization.write() = config.clone();
        self.persist_config().await?;
        self.dispatcher.apply_startup(&config);
        info!("optimization configuration updated");
        Ok(())
    }

    /// Replace the breach thresholds and persist them. Takes effect on the
    /// next evaluator tick.
    pub async fn update_thresholds(&self, thresholds: ThresholdSet) -> Result<()> {
        *self.thresholds.write() = thresholds;
        self.persist_config().await?;
        info!("thresholds updated");
        Ok(())
    }

    async fn persist_config(&self) -> Result<()> {
        if let Some(store) = &self.config_store {
            let config = self.optimization.read().clone();
            let thresholds = self.thresholds.read().clone();
            store.save(&config, &thresholds).await?;
        }
        Ok(())
    }

    /// Stop both loops, waiting for any in-flight tick, then clear the
    /// buffers. Idempotent: stopping a stopped engine is a no-op.
    pub async fn stop(&self, mode: ShutdownMode) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != EngineState::Running {
                return Ok(());
            }
            *state = EngineState::Stopped;
        }

        // Reject new records before the final flush so the shipped batch is
        // a closed set.
        self.active.store(false, Ordering::Release);

        if mode == ShutdownMode::FlushAndStop {
            self.flusher.flush_once().await;
        }

        let _ = self.shutdown_tx.send(true);
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!("engine task ended abnormally: {}", e);
            }
        }

        self.metric_buffer.clear();
        self.error_buffer.clear();
        self.action_buffer.clear();

        info!("telemetry engine stopped");
        Ok(())
    }

    /// Stop the engine and erase all persisted config and buffer state
    pub async fn cleanup(&self) -> Result<()> {
        self.stop(ShutdownMode::Discard).await?;
        if let Some(store) = &self.config_store {
            store.clear().await?;
        }
        if let Some(store) = &self.buffer_store {
            store.clear().await?;
        }
        info!("telemetry engine state cleaned up");
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Records a `screen_load` metric for its screen when dropped
pub struct ScreenLoadTimer {
    recorder: Arc<MetricRecorder>,
    screen: String,
    started: Instant,
}

impl ScreenLoadTimer {
    /// Consume the guard, recording the metric now
    pub fn finish(self) {}
}

impl Drop for ScreenLoadTimer {
    fn drop(&mut self) {
        let duration_ms = self.started.elapsed().as_millis() as u64;
        self.recorder.record(
            MetricCategory::ScreenLoad,
            &self.screen,
            Some(duration_ms),
            None,
        );
    }
}
