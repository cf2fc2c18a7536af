//! Periodic threshold evaluation
//!
//! On each tick the evaluator samples every probe, records the reading as
//! a metric, and compares it against the configured threshold. A breached
//! category dispatches its corrective actions on every tick the value
//! remains breached; there is deliberately no cooldown or hysteresis, so
//! consecutive breaches re-trigger the same optimization. A failing probe
//! is isolated to its category and never aborts the tick.

use crate::config::ThresholdSet;
use crate::dispatch::OptimizationDispatcher;
use crate::probe::{ProbeCategory, ProbeSet};
use crate::recorder::MetricRecorder;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Samples probes and reacts to threshold breaches on a fixed interval
#[derive(Clone)]
pub struct ThresholdEvaluator {
    probes: Arc<ProbeSet>,
    metrics: Arc<MetricRecorder>,
    dispatcher: Arc<OptimizationDispatcher>,
    thresholds: Arc<RwLock<ThresholdSet>>,
}

impl ThresholdEvaluator {
    pub fn new(
        probes: Arc<ProbeSet>,
        metrics: Arc<MetricRecorder>,
        dispatcher: Arc<OptimizationDispatcher>,
        thresholds: Arc<RwLock<ThresholdSet>>,
    ) -> Self {
        Self {
            probes,
            metrics,
            dispatcher,
            thresholds,
        }
    }

    /// One evaluation pass over all monitored categories
    pub fn evaluate_once(&self) {
        for category in ProbeCategory::ALL {
            let reading = match self.probes.sample(category) {
                None => continue,
                Some(Err(e)) => {
                    // Skip this category's metric and threshold check for
                    // the tick; the remaining probes still run.
                    warn!(%category, "probe failed, skipping category this tick: {}", e);
                    continue;
                }
                Some(Ok(reading)) => reading,
            };

            self.metrics
                .record_sample(category.metric_category(), category.metric_name(), reading);

            let breached = self.thresholds.read().is_breached(category, reading);
            if breached {
                debug!(%category, reading, "threshold breached");
                self.dispatcher.apply(category);
            }
        }
    }

    /// Evaluation loop, spawned by the engine. Runs until the shutdown
    /// signal fires; an in-flight tick always completes before exit.
    pub(crate) async fn run(self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // skip the immediate first tick
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.evaluate_once();
                }
                _ = shutdown.changed() => {
                    debug!("evaluator loop stopping");
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
    use crate::clock::Clock;
    use crate::error::Error;
    use crate::record::MetricCategory;
    use std::sync::atomic::AtomicBool;

    fn evaluator(probes: ProbeSet, thresholds: ThresholdSet) -> (ThresholdEvaluator, Arc<MetricRecorder>, Arc<OptimizationDispatcher>) {
        let metrics = Arc::new(MetricRecorder::new(
            Arc::new(BoundedBuffer::new(100)),
            Arc::new(AtomicBool::new(true)),
            Arc::new(Clock::new()),
        ));
        let dispatcher = Arc::new(OptimizationDispatcher::new());
        let evaluator = ThresholdEvaluator::new(
            Arc::new(probes),
            metrics.clone(),
            dispatcher.clone(),
            Arc::new(RwLock::new(thresholds)),
        );
        (evaluator, metrics, dispatcher)
    }

    #[test]
    fn test_breach_records_metric_and_dispatches() {
        let probes = ProbeSet::new().with_probe(ProbeCategory::Memory, Box::new(|| Ok(250.0)));
        let (evaluator, metrics, dispatcher) = evaluator(probes, ThresholdSet::default());

        evaluator.evaluate_once();

        let snap = metrics.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].category, MetricCategory::Memory);
        assert_eq!(snap[0].name, "memory_usage");
        assert_eq!(snap[0].value, Some(250.0));
        assert_eq!(dispatcher.applied_for(ProbeCategory::Memory), 1);
    }

    #[test]
    fn test_sustained_breach_redispatches_every_tick() {
        let probes = ProbeSet::new().with_probe(ProbeCategory::Memory, Box::new(|| Ok(250.0)));
        let (evaluator, metrics, dispatcher) = evaluator(probes, ThresholdSet::default());

        for _ in 0..3 {
            evaluator.evaluate_once();
        }
        // No cooldown: three ticks, three dispatches
        assert_eq!(dispatcher.applied_for(ProbeCategory::Memory), 3);
        assert_eq!(metrics.len(), 3);
    }

    #[test]
    fn test_healthy_reading_does_not_dispatch() {
        let probes = ProbeSet::new().with_probe(ProbeCategory::Cpu, Box::new(|| Ok(12.0)));
        let (evaluator, metrics, dispatcher) = evaluator(probes, ThresholdSet::default());

        evaluator.evaluate_once();
        assert_eq!(metrics.len(), 1);
        assert_eq!(dispatcher.total_applied(), 0);
    }

    #[test]
    fn test_min_bound_breach_for_battery_and_frame_rate() {
        let probes = ProbeSet::new()
            .with_probe(ProbeCategory::Battery, Box::new(|| Ok(10.0)))
            .with_probe(ProbeCategory::FrameRate, Box::new(|| Ok(60.0)));
        let (evaluator, _, dispatcher) = evaluator(probes, ThresholdSet::default());

        evaluator.evaluate_once();
        assert_eq!(dispatcher.applied_for(ProbeCategory::Battery), 1);
        assert_eq!(dispatcher.applied_for(ProbeCategory::FrameRate), 0);
    }

    #[test]
    fn test_probe_failure_isolated_to_its_category() {
        let probes = ProbeSet::new()
            .with_probe(
                ProbeCategory::Memory,
                Box::new(|| Err(Error::Probe("sensor unavailable".into()))),
            )
            .with_probe(ProbeCategory::Cpu, Box::new(|| Ok(90.0)));
        let (evaluator, metrics, dispatcher) = evaluator(probes, ThresholdSet::default());

        evaluator.evaluate_once();

        // Memory skipped entirely, CPU sampled and dispatched
        let snap = metrics.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].category, MetricCategory::Cpu);
        assert_eq!(dispatcher.applied_for(ProbeCategory::Memory), 0);
        assert_eq!(dispatcher.applied_for(ProbeCategory::Cpu), 1);
    }

    #[test]
    fn test_samples_in_non_decreasing_timestamp_order() {
        let probes = ProbeSet::new().with_probe(ProbeCategory::Memory, Box::new(|| Ok(100.0)));
        let (evaluator, metrics, _) = evaluator(probes, ThresholdSet::default());

        for _ in 0..10 {
            evaluator.evaluate_once();
        }
        let snap = metrics.snapshot();
        for pair in snap.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }
}
