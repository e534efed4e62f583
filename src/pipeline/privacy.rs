use serde::{Deserialize, Serialize};

use crate::store::Trip;

/// Location privacy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    /// Initial state of the user's data sharing toggle
    pub data_sharing: bool,
    /// Decimal places kept on endpoints when data sharing is off
    pub coordinate_decimals: u32,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            data_sharing: true,
            // ~1km at the equator
            coordinate_decimals: 2,
        }
    }
}

/// Coarsen a trip for storage when the user does not share precise data
pub fn apply(mut trip: Trip, data_sharing: bool, coordinate_decimals: u32) -> Trip {
    if data_sharing {
        return trip;
    }
    trip.origin = trip.origin.rounded(coordinate_decimals);
    trip.destination = trip.destination.rounded(coordinate_decimals);
    trip.track.clear();
    trip.precise = false;
    trip
}
