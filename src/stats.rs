//! Derived statistics over the current buffer contents
//!
//! The aggregator is read-only and synchronous: it works over snapshots of
//! the three buffers taken at call time, so a concurrent writer never
//! invalidates an in-progress computation.

use crate::buffer::BoundedBuffer;
use crate::dispatch::OptimizationDispatcher;
use crate::record::{ActionRecord, ErrorRecord, MetricCategory, MetricRecord};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

const ONE_HOUR_MS: u64 = 60 * 60 * 1000;
const ONE_DAY_MS: u64 = 24 * 60 * 60 * 1000;
const TOP_N: usize = 10;

/// A named frequency-count entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameCount {
    pub name: String,
    pub count: u64,
}

/// Derived performance statistics
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_metrics: usize,
    /// Metrics recorded within the last hour
    pub recent_metrics: usize,
    /// Metrics recorded within the last 24 hours
    pub daily_metrics: usize,
    pub error_count: usize,
    pub action_count: usize,
    /// Mean duration of api_call metrics in the last hour; 0 if none
    pub average_response_time_ms: f64,
    /// Percentage of api_call metrics in the last hour carrying an error
    /// flag; 0 if there were no api_call metrics
    pub error_rate_pct: f64,
    /// Most loaded screens in the last 24 hours, ties in first-seen order
    pub top_screens: Vec<NameCount>,
    /// Most frequent actions in the last 24 hours, ties in first-seen order
    pub top_actions: Vec<NameCount>,
    /// Total optimization dispatches since the engine started
    pub optimizations_applied: u64,
}

/// Computes [`Stats`] on demand from buffer snapshots
pub struct StatsAggregator {
    metrics: Arc<BoundedBuffer<MetricRecord>>,
    errors: Arc<BoundedBuffer<ErrorRecord>>,
    actions: Arc<BoundedBuffer<ActionRecord>>,
    dispatcher: Arc<OptimizationDispatcher>,
}

impl StatsAggregator {
    pub fn new(
        metrics: Arc<BoundedBuffer<MetricRecord>>,
        errors: Arc<BoundedBuffer<ErrorRecord>>,
        actions: Arc<BoundedBuffer<ActionRecord>>,
        dispatcher: Arc<OptimizationDispatcher>,
    ) -> Self {
        Self {
            metrics,
            errors,
            actions,
            dispatcher,
        }
    }

    pub fn stats(&self, now_ms: u64) -> Stats {
        let metrics = self.metrics.snapshot();
        let errors = self.errors.snapshot();
        let actions = self.actions.snapshot();

        let hour_ago = now_ms.saturating_sub(ONE_HOUR_MS);
        let day_ago = now_ms.saturating_sub(ONE_DAY_MS);

        let recent: Vec<&MetricRecord> =
            metrics.iter().filter(|m| m.timestamp > hour_ago).collect();
        let daily: Vec<&MetricRecord> = metrics.iter().filter(|m| m.timestamp > day_ago).collect();

        Stats {
            total_metrics: metrics.len(),
            recent_metrics: recent.len(),
            daily_metrics: daily.len(),
            error_count: errors.len(),
            action_count: actions.len(),
            average_response_time_ms: average_response_time(&recent),
            error_rate_pct: error_rate(&recent),
            top_screens: top_n(
                daily
                    .iter()
                    .filter(|m| m.category == MetricCategory::ScreenLoad)
                    .map(|m| m.name.as_str()),
            ),
            top_actions: top_n(
                actions
                    .iter()
                    .filter(|a| a.timestamp > day_ago)
                    .map(|a| a.action.as_str()),
            ),
            optimizations_applied: self.dispatcher.total_applied(),
        }
    }
}

fn average_response_time(metrics: &[&MetricRecord]) -> f64 {
    let durations: Vec<u64> = metrics
        .iter()
        .filter(|m| m.category == MetricCategory::ApiCall)
        .filter_map(|m| m.duration_ms)
        .collect();
    if durations.is_empty() {
        return 0.0;
    }
    durations.iter().sum::<u64>() as f64 / durations.len() as f64
}

fn error_rate(metrics: &[&MetricRecord]) -> f64 {
    let api_calls: Vec<_> = metrics
        .iter()
        .filter(|m| m.category == MetricCategory::ApiCall)
        .collect();
    if api_calls.is_empty() {
        return 0.0;
    }
    let errored = api_calls
        .iter()
        .filter(|m| {
            m.metadata
                .as_ref()
                .map_or(false, |meta| meta.contains_key("error"))
        })
        .count();
    100.0 * errored as f64 / api_calls.len() as f64
}

/// Frequency count in descending order, ties broken by first-seen
/// (insertion) order, truncated to the top 10.
fn top_n<'a>(names: impl Iterator<Item = &'a str>) -> Vec<NameCount> {
    let mut counts: HashMap<&str, (u64, usize)> = HashMap::new();
    for (index, name) in names.enumerate() {
        let entry = counts.entry(name).or_insert((0, index));
        entry.0 += 1;
    }
    let mut ranked: Vec<(&str, u64, usize)> = counts
        .into_iter()
        .map(|(name, (count, first_seen))| (name, count, first_seen))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.truncate(TOP_N);
    ranked
        .into_iter()
        .map(|(name, count, _)| NameCount {
            name: name.to_string(),
            count,
        })
        .collect()
}
