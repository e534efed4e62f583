//! Great-circle helpers shared by segmentation, classification and metrics.

use geo::{Distance, Haversine, Point};

use crate::signal::Sample;

/// Great-circle distance between two samples in meters
pub fn haversine_distance(a: &Sample, b: &Sample) -> f64 {
    haversine_between(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Great-circle distance between two coordinates in meters
pub fn haversine_between(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let point1 = Point::new(lon1, lat1);
    let point2 = Point::new(lon2, lat2);
    Haversine::distance(point1, point2)
}

/// Speed implied by moving from `a` to `b`, None when no time elapsed
pub fn implied_speed_mps(a: &Sample, b: &Sample) -> Option<f64> {
    let dt_ms = b.timestamp_ms.checked_sub(a.timestamp_ms)?;
    if dt_ms == 0 {
        return None;
    }
    Some(haversine_distance(a, b) / (dt_ms as f64 / 1000.0))
}

/// Sum of consecutive great-circle distances
pub fn path_length<'a>(samples: impl IntoIterator<Item = &'a Sample>) -> f64 {
    let mut total = 0.0;
    let mut previous: Option<&Sample> = None;
    for sample in samples {
        if let Some(prev) = previous {
            total += haversine_distance(prev, sample);
        }
        previous = Some(sample);
    }
    total
}

/// Round a coordinate to a fixed number of decimal places
pub fn round_coordinate(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
