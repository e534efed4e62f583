use serde::{Deserialize, Serialize};

/// Accelerometer reading in m/s², device frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Acceleration {
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// A normalized location/motion sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    pub latitude: f64,
    pub longitude: f64,
    /// Radius of the 68% confidence circle in meters
    pub horizontal_accuracy_m: f64,
    /// Speed reported by the provider, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_deg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceleration: Option<Acceleration>,
}

impl Sample {
    /// Create a sample with only a position fix
    pub fn fix(timestamp_ms: u64, latitude: f64, longitude: f64, horizontal_accuracy_m: f64) -> Self {
        Self {
            timestamp_ms,
            latitude,
            longitude,
            horizontal_accuracy_m,
            speed_mps: None,
            heading_deg: None,
            acceleration: None,
        }
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    pub fn with_heading(mut self, heading_deg: f64) -> Self {
        self.heading_deg = Some(heading_deg);
        self
    }

    pub fn with_acceleration(mut self, acceleration: Acceleration) -> Self {
        self.acceleration = Some(acceleration);
        self
    }

    pub fn has_valid_coordinate(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Clean up optional provider fields that are out of range
    ///
    /// Negative speed and non-finite values mean "not available" on most
    /// platforms, headings wrap into [0, 360).
    pub fn normalized(mut self) -> Self {
        self.speed_mps = self.speed_mps.filter(|s| s.is_finite() && *s >= 0.0);
        self.heading_deg = self
            .heading_deg
            .filter(|h| h.is_finite() && *h >= 0.0)
            .map(|h| h.rem_euclid(360.0));
        self.acceleration = self
            .acceleration
            .filter(|a| a.x.is_finite() && a.y.is_finite() && a.z.is_finite());
        if !self.horizontal_accuracy_m.is_finite() || self.horizontal_accuracy_m < 0.0 {
            self.horizontal_accuracy_m = f64::INFINITY;
        }
        self
    }
}
