//! Corrective-action dispatch for breached categories
//!
//! The dispatcher maps each monitored category to an ordered list of
//! corrective actions. Applying a category logs and counts its actions;
//! there is no rollback and no verification that an action had effect,
//! which is an accepted limitation of this engine. A category that stays
//! breached is re-dispatched on every evaluator tick with no cooldown.

use crate::config::OptimizationConfig;
use crate::probe::ProbeCategory;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Identifier of a single corrective action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizationAction {
    // memory
    ClearCache,
    TriggerGc,
    ReleaseResources,
    DownscaleImages,
    // cpu
    ReduceAnimations,
    BatchComputations,
    CacheResults,
    DeferBackgroundTasks,
    // battery
    DimScreen,
    DisableAnimations,
    CoalesceNetworkRequests,
    EnterLowPowerMode,
    // network
    CompressPayloads,
    CacheRequests,
    CoalesceRequests,
    // ui / frame rate
    ReduceRerenders,
    SimplifyAnimations,
    VirtualizeLists,
    LazyLoadComponents,
}

impl fmt::Display for OptimizationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptimizationAction::ClearCache => "clear-cache",
            OptimizationAction::TriggerGc => "trigger-gc",
            OptimizationAction::ReleaseResources => "release-resources",
            OptimizationAction::DownscaleImages => "downscale-images",
            OptimizationAction::ReduceAnimations => "reduce-animations",
            OptimizationAction::BatchComputations => "batch-computations",
            OptimizationAction::CacheResults => "cache-results",
            OptimizationAction::DeferBackgroundTasks => "defer-background-tasks",
            OptimizationAction::DimScreen => "dim-screen",
            OptimizationAction::DisableAnimations => "disable-animations",
            OptimizationAction::CoalesceNetworkRequests => "coalesce-network-requests",
            OptimizationAction::EnterLowPowerMode => "enter-low-power-mode",
            OptimizationAction::CompressPayloads => "compress-payloads",
            OptimizationAction::CacheRequests => "cache-requests",
            OptimizationAction::CoalesceRequests => "coalesce-requests",
            OptimizationAction::ReduceRerenders => "reduce-rerenders",
            OptimizationAction::SimplifyAnimations => "simplify-animations",
            OptimizationAction::VirtualizeLists => "virtualize-lists",
            OptimizationAction::LazyLoadComponents => "lazy-load-components",
        };
        f.write_str(name)
    }
}

/// Applies corrective actions for breached categories and keeps per-category
/// dispatch counts.
pub struct OptimizationDispatcher {
    applied: [AtomicU64; 5],
}

impl OptimizationDispatcher {
    pub fn new() -> Self {
        Self {
            applied: Default::default(),
        }
    }

    /// Ordered corrective actions for a category
    pub fn actions_for(category: ProbeCategory) -> &'static [OptimizationAction] {
        use OptimizationAction::*;
        match category {
            ProbeCategory::Memory => &[ClearCache, TriggerGc, ReleaseResources, DownscaleImages],
            ProbeCategory::Cpu => &[
                ReduceAnimations,
                BatchComputations,
                CacheResults,
                DeferBackgroundTasks,
            ],
            ProbeCategory::Battery => &[
                DimScreen,
                DisableAnimations,
                CoalesceNetworkRequests,
                EnterLowPowerMode,
            ],
            ProbeCategory::NetworkLatency => &[
                CompressPayloads,
                CacheRequests,
                DownscaleImages,
                CoalesceRequests,
            ],
            ProbeCategory::FrameRate => &[
                ReduceRerenders,
                SimplifyAnimations,
                VirtualizeLists,
                LazyLoadComponents,
            ],
        }
    }

    /// Apply the ordered action list for a breached category.
    ///
    /// Always succeeds; actions are logged, not verified for effect.
    pub fn apply(&self, category: ProbeCategory) -> Vec<OptimizationAction> {
        let actions = Self::actions_for(category);
        for action in actions {
            info!(%category, %action, "applying optimization");
        }
        self.applied[category.index()].fetch_add(1, Ordering::Relaxed);
        actions.to_vec()
    }

    /// One-time pass over the enabled feature toggles, run at init and after
    /// a configuration update.
    pub fn apply_startup(&self, config: &OptimizationConfig) {
        if config.image_compression {
            info!("image compression enabled");
        }
        if config.lazy_loading {
            info!("lazy loading enabled");
        }
        if config.caching {
            info!("response caching enabled");
        }
        if config.prefetching {
            info!("prefetching enabled");
        }
        if config.background_sync {
            info!("background sync enabled");
        }
        if config.memory_optimization {
            self.apply(ProbeCategory::Memory);
        }
        if config.battery_optimization {
            self.apply(ProbeCategory::Battery);
        }
    }

    /// Dispatch count for one category
    pub fn applied_for(&self, category: ProbeCategory) -> u64 {
        self.applied[category.index()].load(Ordering::Relaxed)
    }

    /// Total dispatch count across all categories
    pub fn total_applied(&self) -> u64 {
        self.applied
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }
}

impl Default for OptimizationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
