//! Pluggable device health probes
//!
//! The engine samples five device health categories on a fixed interval.
//! Each category is backed by a [`Probe`] implementation so production
//! builds can plug in real OS instrumentation while tests and unsupported
//! platforms fall back to simulated readings.

use crate::error::Result;
use crate::record::MetricCategory;
use std::collections::HashMap;
use std::fmt;

/// Monitored device health category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeCategory {
    Memory,
    Cpu,
    Battery,
    NetworkLatency,
    FrameRate,
}

impl ProbeCategory {
    pub const ALL: [ProbeCategory; 5] = [
        ProbeCategory::Memory,
        ProbeCategory::Cpu,
        ProbeCategory::Battery,
        ProbeCategory::NetworkLatency,
        ProbeCategory::FrameRate,
    ];

    /// Metric name under which samples of this category are recorded
    pub fn metric_name(&self) -> &'static str {
        match self {
            ProbeCategory::Memory => "memory_usage",
            ProbeCategory::Cpu => "cpu_usage",
            ProbeCategory::Battery => "battery_level",
            ProbeCategory::NetworkLatency => "network_latency",
            ProbeCategory::FrameRate => "frame_rate",
        }
    }

    /// Metric category tag for samples of this probe
    pub fn metric_category(&self) -> MetricCategory {
        match self {
            ProbeCategory::Memory => MetricCategory::Memory,
            ProbeCategory::Cpu => MetricCategory::Cpu,
            ProbeCategory::Battery => MetricCategory::Battery,
            ProbeCategory::NetworkLatency => MetricCategory::Network,
            ProbeCategory::FrameRate => MetricCategory::Ui,
        }
    }

    /// Battery and frame rate breach below their limit, the rest above it.
    pub fn breaches_below(&self) -> bool {
        matches!(self, ProbeCategory::Battery | ProbeCategory::FrameRate)
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            ProbeCategory::Memory => 0,
            ProbeCategory::Cpu => 1,
            ProbeCategory::Battery => 2,
            ProbeCategory::NetworkLatency => 3,
            ProbeCategory::FrameRate => 4,
        }
    }
}

impl fmt::Display for ProbeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metric_name())
    }
}

/// A single numeric reading for one monitored category.
///
/// A failing probe is isolated to its category: the evaluator skips the
/// metric and threshold check for that category and continues the tick.
pub trait Probe: Send + Sync {
    fn sample(&self) -> Result<f64>;
}

impl<F> Probe for F
where
    F: Fn() -> Result<f64> + Send + Sync,
{
    fn sample(&self) -> Result<f64> {
        self()
    }
}

/// Registry of one probe per monitored category
pub struct ProbeSet {
    probes: HashMap<ProbeCategory, Box<dyn Probe>>,
}

impl ProbeSet {
    /// Empty set; categories without a probe are skipped by the evaluator.
    pub fn new() -> Self {
        Self {
            probes: HashMap::new(),
        }
    }

    /// Simulated probes for every category, for hosts without real
    /// instrumentation. Ranges match the original client's simulation.
    pub fn simulated() -> Self {
        let mut set = Self::new();
        for category in ProbeCategory::ALL {
            set.set_probe(category, Box::new(SimulatedProbe::new(category)));
        }
        set
    }

    pub fn set_probe(&mut self, category: ProbeCategory, probe: Box<dyn Probe>) {
        self.probes.insert(category, probe);
    }

    pub fn with_probe(mut self, category: ProbeCategory, probe: Box<dyn Probe>) -> Self {
        self.set_probe(category, probe);
        self
    }

    pub fn sample(&self, category: ProbeCategory) -> Option<Result<f64>> {
        self.probes.get(&category).map(|p| p.sample())
    }

    pub fn has_probe(&self, category: ProbeCategory) -> bool {
        self.probes.contains_key(&category)
    }
}

impl Default for ProbeSet {
    fn default() -> Self {
        Self::simulated()
    }
}

/// Simulated probe producing plausible readings for its category
pub struct SimulatedProbe {
    category: ProbeCategory,
}

impl SimulatedProbe {
    pub fn new(category: ProbeCategory) -> Self {
        Self { category }
    }
}

impl Probe for SimulatedProbe {
    fn sample(&self) -> Result<f64> {
        let reading = match self.category {
            ProbeCategory::Memory => 50.0 + fastrand::f64() * 150.0, // 50-200 MB
            ProbeCategory::Cpu => 10.0 + fastrand::f64() * 40.0,     // 10-50 %
            ProbeCategory::Battery => fastrand::f64() * 100.0,       // 0-100 %
            ProbeCategory::NetworkLatency => 100.0 + fastrand::f64() * 300.0, // 100-400 ms
            ProbeCategory::FrameRate => 55.0 + fastrand::f64() * 10.0, // 55-65 fps
        };
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_set_covers_all_categories() {
        let set = ProbeSet::simulated();
        for category in ProbeCategory::ALL {
            assert!(set.has_probe(category));
        }
    }

    #[test]
    fn test_simulated_ranges() {
        let set = ProbeSet::simulated();
        for _ in 0..100 {
            let memory = set.sample(ProbeCategory::Memory).unwrap().unwrap();
            assert!((50.0..=200.0).contains(&memory));
            let cpu = set.sample(ProbeCategory::Cpu).unwrap().unwrap();
            assert!((10.0..=50.0).contains(&cpu));
            let fps = set.sample(ProbeCategory::FrameRate).unwrap().unwrap();
            assert!((55.0..=65.0).contains(&fps));
        }
    }

    #[test]
    fn test_closure_probe() {
        let set = ProbeSet::new().with_probe(ProbeCategory::Memory, Box::new(|| Ok(42.0)));
        assert_eq!(set.sample(ProbeCategory::Memory).unwrap().unwrap(), 42.0);
        assert!(set.sample(ProbeCategory::Cpu).is_none());
    }

    #[test]
    fn test_breach_direction() {
        assert!(!ProbeCategory::Memory.breaches_below());
        assert!(!ProbeCategory::Cpu.breaches_below());
        assert!(!ProbeCategory::NetworkLatency.breaches_below());
        assert!(ProbeCategory::Battery.breaches_below());
        assert!(ProbeCategory::FrameRate.breaches_below());
    }
}
