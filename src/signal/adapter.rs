use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::provider::{LocationProvider, ProviderReading};
use super::sample::Sample;
use crate::error::SampleError;
use crate::sampling::SamplingPolicy;

/// Signal adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Fixes with a worse horizontal accuracy are dropped (meters)
    pub max_accuracy_m: f64,
    /// Capacity of the channel between the adapter and the pipeline
    pub channel_capacity: usize,
    /// How long shutdown waits for the next queued reading before giving up
    pub stop_grace_ms: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            max_accuracy_m: 200.0,
            channel_capacity: 256,
            stop_grace_ms: 2_000,
        }
    }
}

/// Why the adapter did not forward a fix
#[derive(Debug, Clone, PartialEq)]
pub enum DiscardReason {
    /// Accuracy worse than the configured gate
    LowAccuracy { accuracy_m: f64 },
    /// Malformed or out-of-order reading
    Invalid(SampleError),
}

/// Normalized output of the signal adapter
#[derive(Debug, Clone, PartialEq)]
pub enum SignalEvent {
    Sample(Sample),
    Discarded {
        timestamp_ms: u64,
        reason: DiscardReason,
    },
    /// The provider lost its fix
    Degraded { timestamp_ms: u64 },
    /// Provider still has no fix; carries the refresh time only
    Tick { timestamp_ms: u64 },
    /// First usable fix after a degraded period
    Recovered { timestamp_ms: u64 },
}

/// Stateful gate applied to every provider reading
///
/// Keeps the forwarded stream monotonic and tracks degraded/recovered status.
#[derive(Debug)]
pub struct SampleFilter {
    config: SignalConfig,
    last_timestamp_ms: Option<u64>,
    degraded: bool,
}

impl SampleFilter {
    pub fn new(config: SignalConfig) -> Self {
        Self {
            config,
            last_timestamp_ms: None,
            degraded: false,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Turn one provider reading into zero or more signal events
    pub fn accept(&mut self, reading: ProviderReading) -> Vec<SignalEvent> {
        match reading {
            ProviderReading::NoFix { timestamp_ms } => self.accept_no_fix(timestamp_ms),
            ProviderReading::Fix(sample) => self.accept_fix(sample.normalized()),
        }
    }

    fn accept_no_fix(&mut self, timestamp_ms: u64) -> Vec<SignalEvent> {
        if self.is_behind(timestamp_ms) {
            return Vec::new();
        }
        self.last_timestamp_ms = Some(timestamp_ms);

        if self.degraded {
            vec![SignalEvent::Tick { timestamp_ms }]
        } else {
            self.degraded = true;
            vec![SignalEvent::Degraded { timestamp_ms }]
        }
    }

    fn accept_fix(&mut self, sample: Sample) -> Vec<SignalEvent> {
        let timestamp_ms = sample.timestamp_ms;

        if !sample.has_valid_coordinate() {
            return vec![SignalEvent::Discarded {
                timestamp_ms,
                reason: DiscardReason::Invalid(SampleError::InvalidCoordinate {
                    latitude: sample.latitude,
                    longitude: sample.longitude,
                }),
            }];
        }

        if let Some(previous_ms) = self.last_timestamp_ms.filter(|_| self.is_behind(timestamp_ms)) {
            return vec![SignalEvent::Discarded {
                timestamp_ms,
                reason: DiscardReason::Invalid(SampleError::OutOfOrder {
                    previous_ms,
                    got_ms: timestamp_ms,
                }),
            }];
        }
        self.last_timestamp_ms = Some(timestamp_ms);

        if sample.horizontal_accuracy_m > self.config.max_accuracy_m {
            return vec![SignalEvent::Discarded {
                timestamp_ms,
                reason: DiscardReason::LowAccuracy {
                    accuracy_m: sample.horizontal_accuracy_m,
                },
            }];
        }

        let mut events = Vec::with_capacity(2);
        if self.degraded {
            self.degraded = false;
            events.push(SignalEvent::Recovered { timestamp_ms });
        }
        events.push(SignalEvent::Sample(sample));
        events
    }

    fn is_behind(&self, timestamp_ms: u64) -> bool {
        matches!(self.last_timestamp_ms, Some(last) if timestamp_ms < last)
    }
}

/// Wraps a location provider into a normalized signal stream
pub struct SignalAdapter {
    provider: Box<dyn LocationProvider>,
    config: SignalConfig,
    forward_task: Option<JoinHandle<()>>,
}

impl SignalAdapter {
    pub fn new(provider: Box<dyn LocationProvider>, config: SignalConfig) -> Self {
        Self {
            provider,
            config,
            forward_task: None,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Start the provider and return the normalized signal stream
    pub async fn start(&mut self, policy: SamplingPolicy) -> Result<mpsc::Receiver<SignalEvent>> {
        info!(
            "Starting signal adapter on {} ({}ms, {:?})",
            self.provider.name(),
            policy.interval_ms,
            policy.desired_accuracy
        );

        let mut raw_rx = self
            .provider
            .start(policy)
            .await
            .with_context(|| format!("Failed to start location provider {}", self.provider.name()))?;

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let mut filter = SampleFilter::new(self.config.clone());

        let task = tokio::spawn(async move {
            debug!("Signal forwarding task started");

            while let Some(reading) = raw_rx.recv().await {
                for event in filter.accept(reading) {
                    if let SignalEvent::Discarded { timestamp_ms, reason } = &event {
                        debug!("Discarded reading at {}ms: {:?}", timestamp_ms, reason);
                    }
                    if tx.send(event).await.is_err() {
                        debug!("Signal consumer dropped, stopping forwarding");
                        return;
                    }
                }
            }

            debug!("Signal forwarding task stopped");
        });

        self.forward_task = Some(task);
        Ok(rx)
    }

    /// Forward a new policy to the provider
    pub async fn update_policy(&mut self, policy: SamplingPolicy) -> Result<()> {
        debug!(
            "Requesting policy {}ms / {:?} from {}",
            policy.interval_ms,
            policy.desired_accuracy,
            self.provider.name()
        );
        self.provider.update_policy(policy).await
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.config.stop_grace_ms)
    }

    /// Stop the provider
    ///
    /// Readings the provider already queued are still forwarded; the signal
    /// stream closes once they are through. The caller must keep receiving
    /// until then, or call [`SignalAdapter::abort_forwarding`].
    pub async fn stop(&mut self) -> Result<()> {
        if !self.provider.is_running() {
            return Ok(());
        }

        info!("Stopping signal adapter on {}", self.provider.name());
        if let Err(e) = self.provider.stop().await {
            warn!("Location provider {} failed to stop cleanly: {}", self.provider.name(), e);
            return Err(e);
        }

        Ok(())
    }

    /// Drop whatever the forwarding task has not delivered yet
    pub fn abort_forwarding(&mut self) {
        if let Some(task) = self.forward_task.take() {
            warn!("Aborting signal forwarding from {}", self.provider.name());
            task.abort();
        }
    }
}
