use serde::{Deserialize, Serialize};

use super::hints::GeoHints;
use crate::geo_utils;
use crate::signal::Sample;

/// Parameters of feature extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Samples less accurate than this are ignored (meters)
    pub unusable_accuracy_m: f64,
    /// Speed below which the vehicle counts as stopped (m/s, ~5 km/h)
    pub stop_speed_mps: f64,
    /// Longer halts are not counted as brief stops
    pub max_stop_secs: u64,
    /// Accelerometer readings required for an acceleration variance
    pub min_acceleration_samples: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            unusable_accuracy_m: 50.0,
            stop_speed_mps: 1.39,
            max_stop_secs: 120,
            min_acceleration_samples: 10,
        }
    }
}

/// Kinematic summary of one moving segment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KinematicFeatures {
    pub sample_count: usize,
    pub duration_secs: f64,
    pub path_distance_m: f64,
    pub straight_distance_m: f64,
    /// Path distance over duration
    pub avg_speed_mps: f64,
    pub max_speed_mps: f64,
    pub speed_variance: f64,
    /// Standard deviation over mean of per-sample speeds
    pub speed_cv: f64,
    /// Variance of accelerometer magnitude, when enough readings exist
    pub accel_variance: Option<f64>,
    /// Straight-line over path distance, in [0, 1]
    pub linearity: f64,
    /// Brief halts with movement on both sides
    pub stop_count: u32,
    pub stops_per_km: f64,
    pub water_fraction: Option<f64>,
    pub rail_fraction: Option<f64>,
}

impl KinematicFeatures {
    /// Extract features from a segment's samples
    pub fn extract(samples: &[Sample], config: &FeatureConfig, hints: &dyn GeoHints) -> Self {
        let usable: Vec<&Sample> = samples
            .iter()
            .filter(|s| s.horizontal_accuracy_m <= config.unusable_accuracy_m)
            .collect();

        let (Some(first), Some(last)) = (usable.first(), usable.last()) else {
            return Self::default();
        };

        let duration_secs = (last.timestamp_ms - first.timestamp_ms) as f64 / 1000.0;
        let path_distance_m = geo_utils::path_length(usable.iter().copied());
        let straight_distance_m = geo_utils::haversine_distance(first, last);

        let speeds = per_sample_speeds(&usable);
        let known: Vec<f64> = speeds.iter().flatten().copied().collect();
        let (mean_speed, speed_variance) = mean_and_variance(&known);
        let max_speed_mps = known.iter().copied().fold(0.0, f64::max);
        let speed_cv = if mean_speed > 0.0 {
            speed_variance.sqrt() / mean_speed
        } else {
            0.0
        };

        let magnitudes: Vec<f64> = usable
            .iter()
            .filter_map(|s| s.acceleration.map(|a| a.magnitude()))
            .collect();
        let accel_variance = if magnitudes.len() >= config.min_acceleration_samples {
            Some(mean_and_variance(&magnitudes).1)
        } else {
            None
        };

        let stop_count = count_brief_stops(&usable, &speeds, config);
        let path_km = path_distance_m / 1000.0;

        Self {
            sample_count: usable.len(),
            duration_secs,
            path_distance_m,
            straight_distance_m,
            avg_speed_mps: if duration_secs > 0.0 {
                path_distance_m / duration_secs
            } else {
                0.0
            },
            max_speed_mps,
            speed_variance,
            speed_cv,
            accel_variance,
            linearity: if path_distance_m > 0.0 {
                (straight_distance_m / path_distance_m).min(1.0)
            } else {
                0.0
            },
            stop_count,
            stops_per_km: if path_km > 0.0 {
                stop_count as f64 / path_km
            } else {
                0.0
            },
            water_fraction: hint_fraction(&usable, |s| hints.is_water(s.latitude, s.longitude)),
            rail_fraction: hint_fraction(&usable, |s| hints.is_rail(s.latitude, s.longitude)),
        }
    }
}

/// Reported speed, or speed derived from the previous sample
fn per_sample_speeds(samples: &[&Sample]) -> Vec<Option<f64>> {
    samples
        .iter()
        .enumerate()
        .map(|(i, sample)| {
            sample.speed_mps.or_else(|| {
                i.checked_sub(1)
                    .and_then(|prev| geo_utils::implied_speed_mps(samples[prev], sample))
            })
        })
        .collect()
}

fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance)
}

/// Count runs of near-zero speed that are preceded and followed by movement
fn count_brief_stops(samples: &[&Sample], speeds: &[Option<f64>], config: &FeatureConfig) -> u32 {
    let max_stop_ms = config.max_stop_secs * 1000;
    let mut count = 0;
    let mut seen_movement = false;
    let mut stop_started_ms: Option<u64> = None;

    for (sample, speed) in samples.iter().zip(speeds) {
        let Some(speed) = speed else { continue };
        if *speed < config.stop_speed_mps {
            if seen_movement && stop_started_ms.is_none() {
                stop_started_ms = Some(sample.timestamp_ms);
            }
        } else {
            if let Some(started) = stop_started_ms.take() {
                if sample.timestamp_ms - started <= max_stop_ms {
                    count += 1;
                }
            }
            seen_movement = true;
        }
    }

    count
}

fn hint_fraction(samples: &[&Sample], hint: impl Fn(&Sample) -> Option<bool>) -> Option<f64> {
    let answers: Vec<bool> = samples.iter().filter_map(|s| hint(*s)).collect();
    if answers.is_empty() {
        return None;
    }
    let hits = answers.iter().filter(|&&h| h).count();
    Some(hits as f64 / answers.len() as f64)
}
