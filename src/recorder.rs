//! Append-only recorders over the telemetry buffers
//!
//! Recorders are the engine's write path. Every `record` call is
//! fire-and-forget: timestamp assigned at call time, no deduplication,
//! and a silent no-op while the engine is inactive.

use crate::buffer::BoundedBuffer;
use crate::clock::Clock;
use crate::record::{ActionRecord, ErrorRecord, ErrorSeverity, Metadata, MetricCategory, MetricRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Writer over the metric buffer
pub struct MetricRecorder {
    buffer: Arc<BoundedBuffer<MetricRecord>>,
    active: Arc<AtomicBool>,
    clock: Arc<Clock>,
}

impl MetricRecorder {
    pub fn new(
        buffer: Arc<BoundedBuffer<MetricRecord>>,
        active: Arc<AtomicBool>,
        clock: Arc<Clock>,
    ) -> Self {
        Self {
            buffer,
            active,
            clock,
        }
    }

    /// Record a timed or annotated metric
    pub fn record(
        &self,
        category: MetricCategory,
        name: &str,
        duration_ms: Option<u64>,
        metadata: Option<Metadata>,
    ) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let record = MetricRecord {
            timestamp: self.clock.now_millis(),
            category,
            name: name.to_string(),
            value: None,
            duration_ms,
            metadata,
        };
        debug!(?category, name, "metric recorded");
        self.buffer.append(record);
    }

    /// Record a sampled reading, used by the threshold evaluator
    pub fn record_sample(&self, category: MetricCategory, name: &str, value: f64) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let record = MetricRecord {
            timestamp: self.clock.now_millis(),
            category,
            name: name.to_string(),
            value: Some(value),
            duration_ms: None,
            metadata: None,
        };
        debug!(?category, name, value, "sample recorded");
        self.buffer.append(record);
    }

    pub fn snapshot(&self) -> Vec<MetricRecord> {
        self.buffer.snapshot()
    }

    pub fn clear(&self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Writer over the error buffer
pub struct ErrorRecorder {
    buffer: Arc<BoundedBuffer<ErrorRecord>>,
    active: Arc<AtomicBool>,
    clock: Arc<Clock>,
}

impl ErrorRecorder {
    pub fn new(
        buffer: Arc<BoundedBuffer<ErrorRecord>>,
        active: Arc<AtomicBool>,
        clock: Arc<Clock>,
    ) -> Self {
        Self {
            buffer,
            active,
            clock,
        }
    }

    pub fn record(
        &self,
        message: &str,
        severity: ErrorSeverity,
        stack_trace: Option<String>,
        context: Option<Metadata>,
    ) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let record = ErrorRecord {
            timestamp: self.clock.now_millis(),
            message: message.to_string(),
            stack_trace,
            context,
            severity,
        };
        debug!(?severity, message, "error recorded");
        self.buffer.append(record);
    }

    pub fn snapshot(&self) -> Vec<ErrorRecord> {
        self.buffer.snapshot()
    }

    pub fn clear(&self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Writer over the user-action buffer
pub struct ActionRecorder {
    buffer: Arc<BoundedBuffer<ActionRecord>>,
    active: Arc<AtomicBool>,
    clock: Arc<Clock>,
}

impl ActionRecorder {
    pub fn new(
        buffer: Arc<BoundedBuffer<ActionRecord>>,
        active: Arc<AtomicBool>,
        clock: Arc<Clock>,
    ) -> Self {
        Self {
            buffer,
            active,
            clock,
        }
    }

    pub fn record(
        &self,
        action: &str,
        screen: &str,
        actor_id: Option<String>,
        metadata: Option<Metadata>,
    ) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let record = ActionRecord {
            timestamp: self.clock.now_millis(),
            action: action.to_string(),
            screen: screen.to_string(),
            actor_id,
            metadata,
        };
        debug!(action, screen, "user action recorded");
        self.buffer.append(record);
    }

    pub fn snapshot(&self) -> Vec<ActionRecord> {
        self.buffer.snapshot()
    }

    pub fn clear(&self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
