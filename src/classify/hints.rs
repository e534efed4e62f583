use serde::{Deserialize, Serialize};

/// Geographic context available to the classifier
///
/// `None` means the hint is not available for this location, which is
/// different from "not water".
pub trait GeoHints: Send + Sync {
    fn is_water(&self, _latitude: f64, _longitude: f64) -> Option<bool> {
        None
    }

    fn is_rail(&self, _latitude: f64, _longitude: f64) -> Option<bool> {
        None
    }
}

/// No geographic context
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHints;

impl GeoHints for NoHints {}

/// Axis-aligned latitude/longitude box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&latitude)
            && (self.min_lon..=self.max_lon).contains(&longitude)
    }
}

/// Geographic hint regions, loaded from configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// Backwaters, lakes and ferry corridors
    pub water: Vec<BoundingBox>,
    /// Rail corridors
    pub rail: Vec<BoundingBox>,
}

/// Hints backed by configured bounding boxes
#[derive(Debug, Clone, Default)]
pub struct RegionHints {
    config: GeoConfig,
}

impl RegionHints {
    pub fn new(config: GeoConfig) -> Self {
        Self { config }
    }
}

impl GeoHints for RegionHints {
    fn is_water(&self, latitude: f64, longitude: f64) -> Option<bool> {
        if self.config.water.is_empty() {
            return None;
        }
        Some(self.config.water.iter().any(|b| b.contains(latitude, longitude)))
    }

    fn is_rail(&self, latitude: f64, longitude: f64) -> Option<bool> {
        if self.config.rail.is_empty() {
            return None;
        }
        Some(self.config.rail.iter().any(|b| b.contains(latitude, longitude)))
    }
}
