use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::provider::{LocationProvider, ProviderReading};
use crate::sampling::SamplingPolicy;

/// Location provider that replays recorded readings
///
/// Used for tests, batch processing of recorded traces and the CLI.
/// Readings are delivered in file order; policy requests are recorded so
/// callers can inspect what the pipeline asked for.
pub struct ReplayProvider {
    readings: Vec<ProviderReading>,
    pace: Option<Duration>,
    capacity: usize,
    running: Arc<AtomicBool>,
    policies: Arc<Mutex<Vec<SamplingPolicy>>>,
    task: Option<JoinHandle<()>>,
}

impl ReplayProvider {
    pub fn new(readings: Vec<ProviderReading>) -> Self {
        Self {
            readings,
            pace: None,
            capacity: 64,
            running: Arc::new(AtomicBool::new(false)),
            policies: Arc::new(Mutex::new(Vec::new())),
            task: None,
        }
    }

    /// Load readings from a JSON-lines file, one `ProviderReading` per line
    pub fn from_json_lines(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading replay readings from {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay file: {}", path.display()))?;

        let readings = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str::<ProviderReading>(line)
                    .with_context(|| format!("Invalid reading on line {}", n + 1))
            })
            .collect::<Result<Vec<_>>>()?;

        info!("Loaded {} readings", readings.len());
        Ok(Self::new(readings))
    }

    /// Sleep between readings instead of replaying as fast as possible
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = Some(pace);
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Shared log of every policy passed to `start` and `update_policy`
    pub fn policy_log(&self) -> Arc<Mutex<Vec<SamplingPolicy>>> {
        Arc::clone(&self.policies)
    }

    fn record_policy(&self, policy: SamplingPolicy) {
        match self.policies.lock() {
            Ok(mut policies) => policies.push(policy),
            Err(e) => warn!("Replay policy log poisoned: {}", e),
        }
    }
}

#[async_trait::async_trait]
impl LocationProvider for ReplayProvider {
    async fn start(&mut self, policy: SamplingPolicy) -> Result<mpsc::Receiver<ProviderReading>> {
        if self.running.load(Ordering::SeqCst) {
            anyhow::bail!("Replay provider already running");
        }

        self.record_policy(policy);
        self.running.store(true, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(self.capacity);
        let readings = std::mem::take(&mut self.readings);
        let running = Arc::clone(&self.running);
        let pace = self.pace;

        self.task = Some(tokio::spawn(async move {
            for reading in readings {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                if tx.send(reading).await.is_err() {
                    break;
                }
                if let Some(pace) = pace {
                    tokio::time::sleep(pace).await;
                }
            }
            running.store(false, Ordering::SeqCst);
        }));

        Ok(rx)
    }

    async fn update_policy(&mut self, policy: SamplingPolicy) -> Result<()> {
        self.record_policy(policy);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
            // Aborted tasks report a cancellation error, which is expected here
            let _ = task.await;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.task.is_some()
    }

    fn name(&self) -> &str {
        "replay"
    }
}
