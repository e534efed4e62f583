use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use crate::classify::{ClassifierConfig, GeoConfig, RegionHints};
use crate::metrics::{MetricsConfig, Tariff, TariffTable};
use crate::pipeline::{PrivacyConfig, TrackerConfig};
use crate::sampling::SamplingConfig;
use crate::segmentation::SegmentationConfig;
use crate::signal::SignalConfig;
use crate::store::RetryPolicy;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub signal: SignalConfig,
    pub segmentation: SegmentationConfig,
    pub classifier: ClassifierConfig,
    pub metrics: MetricsConfig,
    pub sampling: SamplingConfig,
    pub privacy: PrivacyConfig,
    /// Mode name -> fare/emissions figures; empty unless the agency supplies them
    pub tariffs: HashMap<String, Tariff>,
    pub geo: GeoConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "trip-sense".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3030,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON file per trip, `~` is expanded
    pub trips_path: String,
    pub retry: RetryPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            trips_path: "~/.trip-sense/trips".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Load `path` (any extension the config crate understands, optional)
    /// overlaid with `TRIP_SENSE__SECTION__KEY` environment variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("TRIP_SENSE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to load config from {}", path))?;

        let config: Self = settings
            .try_deserialize()
            .context("Invalid trip-sense configuration")?;

        if !config.battery_cap_keeps_fixes_usable() {
            warn!(
                "Battery saver accuracy {:?} (~{:.0}m) is coarser than the {:.0}m segmentation threshold, \
                 capped fixes will not drive trip detection",
                config.sampling.battery_saver_max_accuracy,
                config.sampling.battery_saver_max_accuracy.nominal_radius_m(),
                config.segmentation.unusable_accuracy_m
            );
        }

        Ok(config)
    }

    /// Whether fixes at the battery-capped tier pass both usability thresholds
    pub fn battery_cap_keeps_fixes_usable(&self) -> bool {
        let radius = self.sampling.battery_saver_max_accuracy.nominal_radius_m();
        radius <= self.segmentation.unusable_accuracy_m && radius <= self.metrics.unusable_accuracy_m
    }

    pub fn trips_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.storage.trips_path).into_owned())
    }

    pub fn tariff_table(&self) -> TariffTable {
        TariffTable::from_config(&self.tariffs)
    }

    /// Pipeline configuration derived from the loaded sections
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            signal: self.signal.clone(),
            segmentation: self.segmentation.clone(),
            classifier: self.classifier.clone(),
            metrics: self.metrics.clone(),
            sampling: self.sampling.clone(),
            privacy: self.privacy.clone(),
            retry: self.storage.retry.clone(),
            tariffs: self.tariff_table(),
            hints: Arc::new(RegionHints::new(self.geo.clone())),
            ..TrackerConfig::default()
        }
    }
}
