use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::sample::Sample;
use crate::sampling::SamplingPolicy;

/// A raw reading from the location/motion hardware
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderReading {
    /// A position fix, possibly with speed/heading/acceleration
    Fix(Sample),
    /// The provider refreshed but had no fix
    NoFix { timestamp_ms: u64 },
}

impl ProviderReading {
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            ProviderReading::Fix(sample) => sample.timestamp_ms,
            ProviderReading::NoFix { timestamp_ms } => *timestamp_ms,
        }
    }
}

/// Location/motion hardware provider trait
///
/// Platform implementations wrap the OS location service (fused location
/// provider, Core Location). `ReplayProvider` replays recorded readings.
#[async_trait::async_trait]
pub trait LocationProvider: Send + Sync {
    /// Start delivering readings under the given policy
    ///
    /// Returns a channel receiver that closes when the provider stops
    async fn start(&mut self, policy: SamplingPolicy) -> Result<mpsc::Receiver<ProviderReading>>;

    /// Request a new policy
    ///
    /// Best effort: the provider applies it at its next refresh, readings
    /// already in flight are still delivered.
    async fn update_policy(&mut self, policy: SamplingPolicy) -> Result<()>;

    /// Stop delivering readings
    async fn stop(&mut self) -> Result<()>;

    /// Check if the provider is currently delivering readings
    fn is_running(&self) -> bool;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
