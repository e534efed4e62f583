use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::classify::TransportMode;
use crate::geo_utils::round_coordinate;
use crate::signal::Sample;

/// Why the trip was made, confirmed by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripPurpose {
    Work,
    Education,
    Shopping,
    Leisure,
    Tourism,
    Personal,
    Other,
}

impl TripPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripPurpose::Work => "work",
            TripPurpose::Education => "education",
            TripPurpose::Shopping => "shopping",
            TripPurpose::Leisure => "leisure",
            TripPurpose::Tourism => "tourism",
            TripPurpose::Personal => "personal",
            TripPurpose::Other => "other",
        }
    }
}

impl fmt::Display for TripPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripPurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "work" => Ok(TripPurpose::Work),
            "education" | "school" => Ok(TripPurpose::Education),
            "shopping" => Ok(TripPurpose::Shopping),
            "leisure" => Ok(TripPurpose::Leisure),
            "tourism" => Ok(TripPurpose::Tourism),
            "personal" => Ok(TripPurpose::Personal),
            "other" => Ok(TripPurpose::Other),
            _ => Err(format!("unknown trip purpose: {}", s)),
        }
    }
}

/// Where and when a trip started or ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripEndpoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_ms: u64,
}

impl TripEndpoint {
    pub fn from_sample(sample: &Sample) -> Self {
        Self {
            latitude: sample.latitude,
            longitude: sample.longitude,
            timestamp_ms: sample.timestamp_ms,
        }
    }

    pub fn rounded(&self, decimals: u32) -> Self {
        Self {
            latitude: round_coordinate(self.latitude, decimals),
            longitude: round_coordinate(self.longitude, decimals),
            timestamp_ms: self.timestamp_ms,
        }
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.timestamp_ms)
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

/// One retained point of the raw track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub timestamp_ms: u64,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<&Sample> for TrackPoint {
    fn from(sample: &Sample) -> Self {
        Self {
            timestamp_ms: sample.timestamp_ms,
            latitude: sample.latitude,
            longitude: sample.longitude,
        }
    }
}

/// A finalized, classified trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    pub origin: TripEndpoint,
    pub destination: TripEndpoint,
    pub mode: TransportMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<TripPurpose>,
    pub duration_secs: f64,
    pub distance_m: f64,
    pub cost_estimate: f64,
    pub carbon_saved_kg: f64,
    pub created_at: DateTime<Utc>,
    /// Whether the user confirmed the purpose
    #[serde(default)]
    pub confirmed: bool,
    /// False when coordinates were rounded for privacy
    #[serde(default = "default_precise")]
    pub precise: bool,
    /// Raw track, empty when data sharing is off
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub track: Vec<TrackPoint>,
}

fn default_precise() -> bool {
    true
}

impl Trip {
    pub fn distance_km(&self) -> f64 {
        self.distance_m / 1000.0
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_secs / 60.0
    }

    /// Record the user's purpose; the only mutation a stored trip accepts
    pub fn confirm_purpose(&mut self, purpose: TripPurpose) -> bool {
        if self.confirmed {
            return false;
        }
        self.purpose = Some(purpose);
        self.confirmed = true;
        true
    }

    /// Ids are used as file names, so only uuid-like ids are accepted
    pub fn is_valid_id(id: &str) -> bool {
        !id.is_empty()
            && id.len() <= 64
            && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}
