use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::policy::{default_active_policy, default_stationary_policy, DesiredAccuracy, SamplingPolicy};
use crate::segmentation::SegmentState;

/// Sampling controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Policy while stationary
    pub stationary: SamplingPolicy,
    /// Policy while moving or uncertain
    pub active: SamplingPolicy,
    /// Minimum interval enforced while battery optimization is on
    pub battery_saver_min_interval_ms: u64,
    /// Highest accuracy tier allowed while battery optimization is on
    ///
    /// Fixes must stay within the segmentation usability threshold, so the
    /// cap trades frequency, not precision, by default.
    pub battery_saver_max_accuracy: DesiredAccuracy,
    /// Initial state of the user-facing battery optimization toggle
    pub battery_optimization: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            stationary: default_stationary_policy(),
            active: default_active_policy(),
            battery_saver_min_interval_ms: 5_000,
            battery_saver_max_accuracy: DesiredAccuracy::High,
            battery_optimization: true,
        }
    }
}

/// Power accounting for a tracking session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingStats {
    pub policy_changes: u64,
    /// Time spent under the active (moving/uncertain) policy
    pub active_ms: u64,
    /// Time spent under the stationary policy
    pub stationary_ms: u64,
    /// Time spent with the battery cap applied
    pub battery_capped_ms: u64,
    /// Fixes requested under the applied policies
    pub estimated_fixes: f64,
    /// Fixes an always-active, uncapped policy would have requested
    pub baseline_fixes: f64,
    pub savings_percent: f64,
}

/// Chooses the sampling policy from segment state and the battery toggle
///
/// Owned by the pipeline actor; every method is synchronous and returns the
/// new policy only when it differs from the one in force.
#[derive(Debug, Clone)]
pub struct SamplingController {
    config: SamplingConfig,
    state: SegmentState,
    battery_optimization: bool,
    current: SamplingPolicy,
    since_ms: Option<u64>,
    stats: SamplingStats,
}

impl SamplingController {
    pub fn new(config: SamplingConfig) -> Self {
        let battery_optimization = config.battery_optimization;
        let mut controller = Self {
            current: config.stationary,
            config,
            state: SegmentState::Stationary,
            battery_optimization,
            since_ms: None,
            stats: SamplingStats::default(),
        };
        controller.current = controller.policy_for(SegmentState::Stationary);
        controller
    }

    pub fn current(&self) -> SamplingPolicy {
        self.current
    }

    pub fn battery_optimization(&self) -> bool {
        self.battery_optimization
    }

    /// Effective policy for a segment state under the current battery setting
    pub fn policy_for(&self, state: SegmentState) -> SamplingPolicy {
        let base = match state {
            SegmentState::Stationary => self.config.stationary,
            SegmentState::Moving | SegmentState::Uncertain => self.config.active,
        };
        if self.battery_optimization {
            base.capped(
                self.config.battery_saver_min_interval_ms,
                self.config.battery_saver_max_accuracy,
            )
        } else {
            base
        }
    }

    /// Start the accounting clock if it is not running yet
    pub fn observe(&mut self, at_ms: u64) {
        if self.since_ms.is_none() {
            self.since_ms = Some(at_ms);
        }
    }

    /// Re-evaluate after a segment state transition
    pub fn on_transition(&mut self, state: SegmentState, at_ms: u64) -> Option<SamplingPolicy> {
        self.account_until(at_ms);
        self.state = state;
        self.reevaluate()
    }

    /// Apply the user-facing battery optimization toggle
    pub fn set_battery_optimization(&mut self, enabled: bool, at_ms: u64) -> Option<SamplingPolicy> {
        if self.since_ms.is_some() {
            self.account_until(at_ms);
        }
        info!("Battery optimization {}", if enabled { "enabled" } else { "disabled" });
        self.battery_optimization = enabled;
        self.reevaluate()
    }

    /// Accounting snapshot including time elapsed up to `now_ms`
    pub fn stats(&self, now_ms: u64) -> SamplingStats {
        let mut snapshot = self.clone();
        snapshot.account_until(now_ms);
        let mut stats = snapshot.stats;
        stats.savings_percent = if stats.baseline_fixes > 0.0 {
            ((1.0 - stats.estimated_fixes / stats.baseline_fixes) * 100.0).max(0.0)
        } else {
            0.0
        };
        stats
    }

    fn reevaluate(&mut self) -> Option<SamplingPolicy> {
        let next = self.policy_for(self.state);
        if next == self.current {
            return None;
        }
        debug!(
            "Sampling policy {}ms/{:?} -> {}ms/{:?}",
            self.current.interval_ms,
            self.current.desired_accuracy,
            next.interval_ms,
            next.desired_accuracy
        );
        self.current = next;
        self.stats.policy_changes += 1;
        Some(next)
    }

    fn account_until(&mut self, at_ms: u64) {
        let Some(since) = self.since_ms else {
            self.since_ms = Some(at_ms);
            return;
        };
        let elapsed = at_ms.saturating_sub(since);
        self.since_ms = Some(since.max(at_ms));
        if elapsed == 0 {
            return;
        }

        match self.state {
            SegmentState::Stationary => self.stats.stationary_ms += elapsed,
            SegmentState::Moving | SegmentState::Uncertain => self.stats.active_ms += elapsed,
        }
        if self.battery_optimization {
            self.stats.battery_capped_ms += elapsed;
        }
        self.stats.estimated_fixes += elapsed as f64 / self.current.interval_ms.max(1) as f64;
        self.stats.baseline_fixes += elapsed as f64 / self.config.active.interval_ms.max(1) as f64;
    }
}
