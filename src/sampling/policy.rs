use serde::{Deserialize, Serialize};

/// Location accuracy tier requested from the provider
///
/// Ordered from cheapest to most power hungry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesiredAccuracy {
    /// Cell/Wi-Fi positioning, ~1km
    Low,
    /// ~100m
    Balanced,
    /// GNSS, ~10m
    High,
    /// GNSS with sensor assistance
    Best,
}

impl DesiredAccuracy {
    /// Typical horizontal error of fixes delivered at this tier (meters)
    pub fn nominal_radius_m(self) -> f64 {
        match self {
            DesiredAccuracy::Low => 1000.0,
            DesiredAccuracy::Balanced => 100.0,
            DesiredAccuracy::High => 10.0,
            DesiredAccuracy::Best => 5.0,
        }
    }
}

/// The active sampling configuration of the location provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingPolicy {
    /// Requested interval between fixes
    pub interval_ms: u64,
    pub desired_accuracy: DesiredAccuracy,
    /// Whether the motion coprocessor/accelerometer is sampled alongside fixes
    pub motion_detection_enabled: bool,
}

impl SamplingPolicy {
    pub fn new(interval_ms: u64, desired_accuracy: DesiredAccuracy, motion_detection_enabled: bool) -> Self {
        Self {
            interval_ms,
            desired_accuracy,
            motion_detection_enabled,
        }
    }

    /// Fixes requested per hour under this policy
    pub fn fixes_per_hour(&self) -> f64 {
        3_600_000.0 / self.interval_ms.max(1) as f64
    }

    /// Apply a frequency/accuracy cap
    pub fn capped(self, min_interval_ms: u64, max_accuracy: DesiredAccuracy) -> Self {
        Self {
            interval_ms: self.interval_ms.max(min_interval_ms),
            desired_accuracy: self.desired_accuracy.min(max_accuracy),
            motion_detection_enabled: self.motion_detection_enabled,
        }
    }
}

/// Low-power policy used while stationary
pub fn default_stationary_policy() -> SamplingPolicy {
    SamplingPolicy::new(60_000, DesiredAccuracy::Balanced, true)
}

/// High-rate policy used while moving or uncertain
pub fn default_active_policy() -> SamplingPolicy {
    SamplingPolicy::new(1_000, DesiredAccuracy::High, true)
}
