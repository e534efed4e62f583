use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::classify::TransportMode;

/// Fare and emissions figures for one mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tariff {
    /// Fare per kilometre in local currency
    pub fare_per_km: f64,
    /// Emissions avoided per kilometre versus a private car (kg CO2e)
    pub emissions_avoided_kg_per_km: f64,
}

/// Per-mode fare/emissions table, static for a session
///
/// Supplied by the agency; modes without an entry cost nothing and save
/// nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TariffTable {
    entries: HashMap<TransportMode, Tariff>,
}

impl TariffTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration keys, skipping keys that are not modes
    pub fn from_config(raw: &HashMap<String, Tariff>) -> Self {
        let mut table = Self::new();
        for (key, tariff) in raw {
            match key.parse::<TransportMode>() {
                Ok(mode) => {
                    table.entries.insert(mode, *tariff);
                }
                Err(e) => warn!("Ignoring tariff entry: {}", e),
            }
        }
        table
    }

    pub fn with(mut self, mode: TransportMode, tariff: Tariff) -> Self {
        self.entries.insert(mode, tariff);
        self
    }

    pub fn get(&self, mode: TransportMode) -> Option<&Tariff> {
        self.entries.get(&mode)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fare for a trip of `distance_m`, never negative
    pub fn cost(&self, mode: TransportMode, distance_m: f64) -> f64 {
        self.get(mode)
            .map(|t| (t.fare_per_km * distance_m / 1000.0).max(0.0))
            .unwrap_or(0.0)
    }

    /// Emissions avoided for a trip of `distance_m`, never negative
    pub fn carbon_saved(&self, mode: TransportMode, distance_m: f64) -> f64 {
        self.get(mode)
            .map(|t| (t.emissions_avoided_kg_per_km * distance_m / 1000.0).max(0.0))
            .unwrap_or(0.0)
    }
}
