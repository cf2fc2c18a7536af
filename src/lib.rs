//! clientpulse - client-side telemetry and adaptive performance optimization
//!
//! A client-resident engine that records performance metrics, errors, and
//! user actions into bounded in-memory buffers, periodically batches and
//! ships them off-device, and continuously samples device health signals,
//! reacting to threshold breaches by dispatching corrective actions.
//!
//! The engine is an in-process library: domain services call the `record_*`
//! API, an ops surface reads [`Stats`], and the host injects collaborators
//! at the trait seams ([`Transport`], [`ConfigStore`], [`BufferStore`],
//! [`Probe`]). No failure inside the engine is fatal to the host; every
//! failure degrades to telemetry being temporarily lost or delayed.
//!
//! ```no_run
//! use clientpulse::{Engine, EngineConfig, HttpTransport, MetricCategory};
//! use std::sync::Arc;
//!
//! # async fn run() -> clientpulse::Result<()> {
//! let engine = Engine::builder(
//!     EngineConfig::default(),
//!     Arc::new(HttpTransport::new("https://telemetry.example.com/v1/batch")),
//! )
//! .build();
//! engine.init().await?;
//!
//! engine.record_metric(MetricCategory::ApiCall, "get_products", Some(120), None);
//! let stats = engine.stats();
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod flush;
pub mod logging;
pub mod probe;
pub mod record;
pub mod recorder;
pub mod stats;
pub mod storage;

pub use buffer::BoundedBuffer;
pub use config::{EngineConfig, OptimizationConfig, ThresholdSet};
pub use dispatch::{OptimizationAction, OptimizationDispatcher};
pub use engine::{Engine, EngineBuilder, ScreenLoadTimer, ShutdownMode};
pub use error::{Error, Result};
pub use evaluator::ThresholdEvaluator;
pub use flush::{FlushOutcome, FlushScheduler, HttpTransport, Transport};
pub use logging::init_logging;
pub use probe::{Probe, ProbeCategory, ProbeSet, SimulatedProbe};
pub use record::{
    ActionRecord, ErrorRecord, ErrorSeverity, Metadata, MetricCategory, MetricRecord,
    TelemetryBatch,
};
pub use recorder::{ActionRecorder, ErrorRecorder, MetricRecorder};
pub use stats::{NameCount, Stats, StatsAggregator};
pub use storage::{
    BufferStore, ConfigStore, FileBufferStore, FileConfigStore, MemoryBufferStore,
    MemoryConfigStore, StoredTelemetry,
};
