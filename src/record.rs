//! Telemetry record types
//!
//! Records are immutable once created: recorders assign the timestamp at
//! call time and nothing mutates a record after it enters a buffer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free-form metadata attached to a record
pub type Metadata = HashMap<String, serde_json::Value>;

/// Category of a performance metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    ScreenLoad,
    ApiCall,
    UserAction,
    Error,
    Memory,
    Cpu,
    Network,
    Battery,
    Ui,
}

/// Severity of a recorded error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// A single performance metric sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub category: MetricCategory,
    pub name: String,
    /// Sampled reading, for probe-driven metrics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Elapsed duration, for timed operations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// A single reported error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: u64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Metadata>,
    pub severity: ErrorSeverity,
}

/// A single user action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub timestamp: u64,
    pub action: String,
    pub screen: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Payload assembled at flush time from all three buffers.
///
/// Constructed only for the duration of a flush attempt, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryBatch {
    pub metrics: Vec<MetricRecord>,
    pub errors: Vec<ErrorRecord>,
    pub actions: Vec<ActionRecord>,
    /// When the batch was assembled, milliseconds since the Unix epoch
    pub produced_at: u64,
}

impl TelemetryBatch {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.errors.is_empty() && self.actions.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.metrics.len() + self.errors.len() + self.actions.len()
    }
}
