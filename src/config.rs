//! Engine configuration: feature toggles, thresholds, and buffer sizing

use crate::probe::ProbeCategory;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Named optimization feature toggles.
///
/// These and the thresholds are the only engine state that outlives a
/// buffer flush; both are persisted through the configured `ConfigStore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    pub image_compression: bool,
    pub lazy_loading: bool,
    pub caching: bool,
    pub prefetching: bool,
    pub background_sync: bool,
    pub memory_optimization: bool,
    pub battery_optimization: bool,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            image_compression: true,
            lazy_loading: true,
            caching: true,
            prefetching: true,
            background_sync: true,
            memory_optimization: true,
            battery_optimization: true,
        }
    }
}

/// Breach limits per monitored category.
///
/// Memory, CPU, and network latency breach above their limit; battery and
/// frame rate breach below it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSet {
    /// Maximum memory usage in MB
    pub max_memory_mb: f64,
    /// Maximum CPU usage percentage
    pub max_cpu_percent: f64,
    /// Minimum battery level percentage before battery optimization
    pub min_battery_percent: f64,
    /// Maximum network latency in milliseconds
    pub max_network_latency_ms: f64,
    /// Minimum frame rate in fps
    pub min_frame_rate_fps: f64,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            max_memory_mb: 200.0,
            max_cpu_percent: 30.0,
            min_battery_percent: 20.0,
            max_network_latency_ms: 500.0,
            min_frame_rate_fps: 55.0,
        }
    }
}

impl ThresholdSet {
    /// Configured limit for a category
    pub fn limit(&self, category: ProbeCategory) -> f64 {
        match category {
            ProbeCategory::Memory => self.max_memory_mb,
            ProbeCategory::Cpu => self.max_cpu_percent,
            ProbeCategory::Battery => self.min_battery_percent,
            ProbeCategory::NetworkLatency => self.max_network_latency_ms,
            ProbeCategory::FrameRate => self.min_frame_rate_fps,
        }
    }

    /// Whether a reading crosses its limit in the unsafe direction
    pub fn is_breached(&self, category: ProbeCategory, reading: f64) -> bool {
        let limit = self.limit(category);
        if category.breaches_below() {
            reading < limit
        } else {
            reading > limit
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Metric buffer capacity
    pub metric_capacity: usize,
    /// Error buffer capacity
    pub error_capacity: usize,
    /// Action buffer capacity
    pub action_capacity: usize,
    /// Interval between evaluator ticks
    pub evaluate_interval: Duration,
    /// Interval between flush ticks
    pub flush_interval: Duration,
    pub optimization: OptimizationConfig,
    pub thresholds: ThresholdSet,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            metric_capacity: 1000,
            error_capacity: 100,
            action_capacity: 500,
            evaluate_interval: Duration::from_secs(5),
            flush_interval: Duration::from_secs(5 * 60),
            optimization: OptimizationConfig::default(),
            thresholds: ThresholdSet::default(),
        }
    }
}
