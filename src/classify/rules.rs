//! Ordered threshold rules mapping kinematic features to a transport mode.
//!
//! Rules are evaluated top to bottom and the first match wins. A rule whose
//! feature is unavailable (no accelerometer, no geographic hint) is skipped,
//! and anything left unresolved is `Unknown`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::features::{FeatureConfig, KinematicFeatures};
use super::hints::{GeoHints, NoHints};
use super::mode::TransportMode;
use crate::signal::Sample;

/// Thresholds for mode classification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub features: FeatureConfig,

    // Evidence floor
    pub min_samples: usize,
    pub min_duration_secs: f64,
    pub min_distance_m: f64,

    // Walk / bicycle
    /// Walk/bicycle boundary on average speed (~7 km/h)
    pub walk_max_avg_mps: f64,
    pub walk_max_speed_mps: f64,
    /// Gait-like accelerometer variance keeps a brisk pace classified as walk
    pub walk_min_accel_variance: f64,
    /// Upper average speed at which gait variance still means walk (~9 km/h)
    pub walk_gait_max_avg_mps: f64,
    pub bicycle_max_avg_mps: f64,
    pub bicycle_max_speed_mps: f64,

    // Motorized
    pub motorized_min_avg_mps: f64,
    pub motorized_max_avg_mps: f64,
    /// Stop frequency separating bus from car
    pub bus_min_stops_per_km: f64,
    pub bus_max_avg_mps: f64,
    pub auto_max_speed_mps: f64,
    pub auto_min_accel_variance: f64,
    /// Car fallback needs a coherent speed profile
    pub car_max_speed_cv: f64,
    /// Car fallback needs a path that goes somewhere
    pub car_min_linearity: f64,

    // Geographic
    pub ferry_min_water_fraction: f64,
    pub ferry_min_avg_mps: f64,
    pub ferry_max_avg_mps: f64,
    pub ferry_max_speed_cv: f64,
    pub train_min_rail_fraction: f64,
    pub train_min_avg_mps: f64,
    pub train_min_linearity: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            features: FeatureConfig::default(),
            min_samples: 5,
            min_duration_secs: 60.0,
            min_distance_m: 100.0,
            walk_max_avg_mps: 1.94,
            walk_max_speed_mps: 3.5,
            walk_min_accel_variance: 1.0,
            walk_gait_max_avg_mps: 2.5,
            bicycle_max_avg_mps: 6.9,
            bicycle_max_speed_mps: 11.0,
            motorized_min_avg_mps: 2.5,
            motorized_max_avg_mps: 45.0,
            bus_min_stops_per_km: 0.4,
            bus_max_avg_mps: 16.7,
            auto_max_speed_mps: 15.3,
            auto_min_accel_variance: 2.0,
            car_max_speed_cv: 1.2,
            car_min_linearity: 0.05,
            ferry_min_water_fraction: 0.6,
            ferry_min_avg_mps: 1.0,
            ferry_max_avg_mps: 10.0,
            ferry_max_speed_cv: 0.35,
            train_min_rail_fraction: 0.6,
            train_min_avg_mps: 8.3,
            train_min_linearity: 0.7,
        }
    }
}

/// Classify a feature summary
///
/// Pure and deterministic: identical features and thresholds always yield
/// the same mode.
pub fn classify_features(f: &KinematicFeatures, config: &ClassifierConfig) -> TransportMode {
    if f.sample_count < config.min_samples
        || f.duration_secs < config.min_duration_secs
        || f.path_distance_m < config.min_distance_m
    {
        return TransportMode::Unknown;
    }

    if let Some(water) = f.water_fraction {
        if water >= config.ferry_min_water_fraction
            && (config.ferry_min_avg_mps..=config.ferry_max_avg_mps).contains(&f.avg_speed_mps)
            && f.speed_cv <= config.ferry_max_speed_cv
        {
            return TransportMode::Ferry;
        }
    }

    if let Some(rail) = f.rail_fraction {
        if rail >= config.train_min_rail_fraction
            && f.avg_speed_mps >= config.train_min_avg_mps
            && f.linearity >= config.train_min_linearity
        {
            return TransportMode::Train;
        }
    }

    if f.avg_speed_mps < config.walk_max_avg_mps && f.max_speed_mps <= config.walk_max_speed_mps {
        return TransportMode::Walk;
    }

    if let Some(accel) = f.accel_variance {
        if f.avg_speed_mps < config.walk_gait_max_avg_mps
            && f.max_speed_mps <= config.walk_max_speed_mps
            && accel >= config.walk_min_accel_variance
        {
            return TransportMode::Walk;
        }
    }

    if f.avg_speed_mps < config.bicycle_max_avg_mps && f.max_speed_mps <= config.bicycle_max_speed_mps {
        return TransportMode::Bicycle;
    }

    if f.avg_speed_mps < config.motorized_min_avg_mps || f.avg_speed_mps > config.motorized_max_avg_mps {
        return TransportMode::Unknown;
    }

    if f.stops_per_km >= config.bus_min_stops_per_km && f.avg_speed_mps <= config.bus_max_avg_mps {
        return TransportMode::Bus;
    }

    if let Some(accel) = f.accel_variance {
        if f.max_speed_mps <= config.auto_max_speed_mps && accel >= config.auto_min_accel_variance {
            return TransportMode::AutoRickshaw;
        }
    }

    if f.speed_cv > config.car_max_speed_cv || f.linearity < config.car_min_linearity {
        return TransportMode::Unknown;
    }

    TransportMode::Car
}

/// Result of classifying one segment
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub mode: TransportMode,
    pub features: KinematicFeatures,
}

/// Mode classifier with its thresholds and geographic context
#[derive(Clone)]
pub struct ModeClassifier {
    config: ClassifierConfig,
    hints: Arc<dyn GeoHints>,
}

impl ModeClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            hints: Arc::new(NoHints),
        }
    }

    pub fn with_hints(mut self, hints: Arc<dyn GeoHints>) -> Self {
        self.hints = hints;
        self
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify a closed moving segment's samples
    pub fn classify(&self, samples: &[Sample]) -> Classification {
        let features = KinematicFeatures::extract(samples, &self.config.features, self.hints.as_ref());
        let mode = classify_features(&features, &self.config);
        Classification { mode, features }
    }
}

impl Default for ModeClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}
