use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::tariff::TariffTable;
use crate::classify::TransportMode;
use crate::geo_utils;
use crate::signal::Sample;

/// Highest believable speed per mode, used to reject GPS jumps (m/s)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeSpeedLimits {
    pub walk: f64,
    pub bicycle: f64,
    pub auto_rickshaw: f64,
    pub car: f64,
    pub bus: f64,
    pub ferry: f64,
    pub train: f64,
    pub unknown: f64,
}

impl Default for ModeSpeedLimits {
    fn default() -> Self {
        Self {
            walk: 4.0,
            bicycle: 15.0,
            auto_rickshaw: 22.0,
            car: 55.0,
            bus: 35.0,
            ferry: 15.0,
            train: 45.0,
            unknown: 85.0,
        }
    }
}

impl ModeSpeedLimits {
    pub fn for_mode(&self, mode: TransportMode) -> f64 {
        match mode {
            TransportMode::Walk => self.walk,
            TransportMode::Bicycle => self.bicycle,
            TransportMode::AutoRickshaw => self.auto_rickshaw,
            TransportMode::Car => self.car,
            TransportMode::Bus => self.bus,
            TransportMode::Ferry => self.ferry,
            TransportMode::Train => self.train,
            TransportMode::Unknown => self.unknown,
        }
    }
}

/// Metrics aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Samples less accurate than this are not used for distance (meters)
    pub unusable_accuracy_m: f64,
    /// Trips with fewer retained samples are dropped
    pub min_usable_samples: usize,
    pub speed_limits: ModeSpeedLimits,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            unusable_accuracy_m: 50.0,
            min_usable_samples: 2,
            speed_limits: ModeSpeedLimits::default(),
        }
    }
}

/// Why a trip candidate produced no trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DropReason {
    /// Not enough usable samples to compute metrics
    InsufficientSignal { usable_samples: usize },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::InsufficientSignal { usable_samples } => {
                write!(f, "insufficient signal ({} usable samples)", usable_samples)
            }
        }
    }
}

/// Metrics computed for one classified segment
#[derive(Debug, Clone, PartialEq)]
pub struct TripMetrics {
    pub origin: Sample,
    pub destination: Sample,
    /// Samples that contributed to the distance, in order
    pub retained: Vec<Sample>,
    pub distance_m: f64,
    pub duration_secs: f64,
    pub cost_estimate: f64,
    pub carbon_saved_kg: f64,
    /// Samples dropped as implausible jumps
    pub jumps_discarded: usize,
}

/// Path distance over plausible samples
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredPath {
    pub retained: Vec<Sample>,
    pub distance_m: f64,
    pub jumps_discarded: usize,
}

/// Sum great-circle legs, skipping samples that are unusable or that would
/// require exceeding `max_speed_mps` from the last retained sample
pub fn filtered_path(samples: &[Sample], max_speed_mps: f64, unusable_accuracy_m: f64) -> FilteredPath {
    let mut retained: Vec<Sample> = Vec::with_capacity(samples.len());
    let mut distance_m = 0.0;
    let mut jumps_discarded = 0;

    for sample in samples
        .iter()
        .filter(|s| s.horizontal_accuracy_m <= unusable_accuracy_m)
    {
        if let Some(previous) = retained.last() {
            let leg = geo_utils::haversine_distance(previous, sample);
            let plausible = match geo_utils::implied_speed_mps(previous, sample) {
                Some(speed) => speed <= max_speed_mps,
                None => false,
            };
            if !plausible {
                debug!(
                    "Discarding {:.0}m jump at {}ms",
                    leg, sample.timestamp_ms
                );
                jumps_discarded += 1;
                continue;
            }
            distance_m += leg;
        }
        retained.push(sample.clone());
    }

    FilteredPath {
        retained,
        distance_m,
        jumps_discarded,
    }
}

/// Computes distance, duration, cost and carbon for classified segments
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    config: MetricsConfig,
    tariffs: TariffTable,
}

impl MetricsAggregator {
    pub fn new(config: MetricsConfig, tariffs: TariffTable) -> Self {
        Self { config, tariffs }
    }

    pub fn tariffs(&self) -> &TariffTable {
        &self.tariffs
    }

    /// Compute trip metrics, or the reason the trip must be dropped
    pub fn aggregate(&self, samples: &[Sample], mode: TransportMode) -> Result<TripMetrics, DropReason> {
        let max_speed = self.config.speed_limits.for_mode(mode);
        let path = filtered_path(samples, max_speed, self.config.unusable_accuracy_m);

        let usable_samples = path.retained.len();
        if usable_samples < self.config.min_usable_samples.max(2) {
            return Err(DropReason::InsufficientSignal { usable_samples });
        }

        let (Some(origin), Some(destination)) = (path.retained.first(), path.retained.last()) else {
            return Err(DropReason::InsufficientSignal { usable_samples });
        };

        let duration_secs = (destination.timestamp_ms - origin.timestamp_ms) as f64 / 1000.0;
        let distance_m = path.distance_m.max(0.0);

        Ok(TripMetrics {
            origin: origin.clone(),
            destination: destination.clone(),
            distance_m,
            duration_secs,
            cost_estimate: self.tariffs.cost(mode, distance_m),
            carbon_saved_kg: self.tariffs.carbon_saved(mode, distance_m),
            jumps_discarded: path.jumps_discarded,
            retained: path.retained,
        })
    }
}
