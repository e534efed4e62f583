use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::events::PipelineEvent;
use super::finalize::Finalizer;
use super::privacy::PrivacyConfig;
use super::state::{TrackingState, TrackingStats, TrackingStatus};
use crate::classify::{ClassifierConfig, GeoHints, ModeClassifier, NoHints};
use crate::metrics::{MetricsAggregator, MetricsConfig, TariffTable};
use crate::sampling::{SamplingConfig, SamplingController, SamplingPolicy};
use crate::segmentation::{Segment, SegmentKind, SegmentationConfig, SegmentationEngine, SegmentationEvent};
use crate::signal::{DiscardReason, LocationProvider, SignalAdapter, SignalConfig, SignalEvent};
use crate::store::{RetryPolicy, Trip, TripStore};

/// Callback fired once per finalized trip
pub type TripCallback = Arc<dyn Fn(&Trip) + Send + Sync>;

/// Everything the pipeline needs besides the provider and the store
#[derive(Clone)]
pub struct TrackerConfig {
    pub signal: SignalConfig,
    pub segmentation: SegmentationConfig,
    pub classifier: ClassifierConfig,
    pub metrics: MetricsConfig,
    pub sampling: SamplingConfig,
    pub privacy: PrivacyConfig,
    pub retry: RetryPolicy,
    pub tariffs: TariffTable,
    pub hints: Arc<dyn GeoHints>,
    /// Capacity of the pipeline event broadcast
    pub event_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            signal: SignalConfig::default(),
            segmentation: SegmentationConfig::default(),
            classifier: ClassifierConfig::default(),
            metrics: MetricsConfig::default(),
            sampling: SamplingConfig::default(),
            privacy: PrivacyConfig::default(),
            retry: RetryPolicy::default(),
            tariffs: TariffTable::default(),
            hints: Arc::new(NoHints),
            event_capacity: 1024,
        }
    }
}

enum Command {
    SetBatteryOptimization(bool),
    Stop,
}

struct PipelineOutcome {
    stats: TrackingStats,
    unsaved: VecDeque<Trip>,
}

/// Handle to the trip detection pipeline
///
/// One pipeline runs at a time. The pipeline itself is a single task that
/// owns the segmentation machine, the sampling controller and the
/// finalizer; this handle talks to it over channels.
pub struct TripTracker {
    config: TrackerConfig,
    store: Arc<dyn TripStore>,
    callbacks: Arc<Mutex<Vec<TripCallback>>>,
    events: broadcast::Sender<PipelineEvent>,
    state_tx: Arc<watch::Sender<TrackingState>>,
    battery_optimization: Arc<AtomicBool>,
    data_sharing: Arc<AtomicBool>,
    commands: Option<mpsc::Sender<Command>>,
    actor: Option<JoinHandle<PipelineOutcome>>,
    /// Trips whose write failed in a previous session
    unsaved: VecDeque<Trip>,
}

impl TripTracker {
    pub fn new(config: TrackerConfig, store: Arc<dyn TripStore>) -> Self {
        let battery_optimization = config.sampling.battery_optimization;
        let data_sharing = config.privacy.data_sharing;
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (state_tx, _) = watch::channel(TrackingState::idle(battery_optimization, data_sharing));

        Self {
            config,
            store,
            callbacks: Arc::new(Mutex::new(Vec::new())),
            events,
            state_tx: Arc::new(state_tx),
            battery_optimization: Arc::new(AtomicBool::new(battery_optimization)),
            data_sharing: Arc::new(AtomicBool::new(data_sharing)),
            commands: None,
            actor: None,
            unsaved: VecDeque::new(),
        }
    }

    pub fn store(&self) -> Arc<dyn TripStore> {
        Arc::clone(&self.store)
    }

    /// Register a callback fired exactly once per finalized trip, in order
    pub fn on_trip_finalized<F>(&self, callback: F)
    where
        F: Fn(&Trip) + Send + Sync + 'static,
    {
        match self.callbacks.lock() {
            Ok(mut callbacks) => callbacks.push(Arc::new(callback)),
            Err(e) => error!("Trip callback registry poisoned: {}", e),
        }
    }

    /// Subscribe to the pipeline event feed
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn current_tracking_state(&self) -> TrackingState {
        self.state_tx.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn watch_state(&self) -> watch::Receiver<TrackingState> {
        self.state_tx.subscribe()
    }

    pub fn is_tracking(&self) -> bool {
        self.actor.is_some()
    }

    pub fn battery_optimization(&self) -> bool {
        self.battery_optimization.load(Ordering::SeqCst)
    }

    pub fn data_sharing(&self) -> bool {
        self.data_sharing.load(Ordering::SeqCst)
    }

    /// Trips kept in memory after their write failed
    pub fn unsaved_trips(&self) -> Vec<Trip> {
        self.unsaved.iter().cloned().collect()
    }

    /// Start tracking with the given provider
    pub async fn start(&mut self, provider: Box<dyn LocationProvider>) -> Result<()> {
        if self.actor.is_some() {
            anyhow::bail!("Tracking already started");
        }

        let config = &self.config;
        let mut sampling_config = config.sampling.clone();
        sampling_config.battery_optimization = self.battery_optimization();
        let sampling = SamplingController::new(sampling_config);
        let policy = sampling.current();

        let mut adapter = SignalAdapter::new(provider, config.signal.clone());
        let provider_name = adapter.provider_name().to_string();
        info!("Starting trip tracking with provider {}", provider_name);

        let signal_rx = adapter
            .start(policy)
            .await
            .context("Failed to start signal adapter")?;

        let classifier = ModeClassifier::new(config.classifier.clone()).with_hints(Arc::clone(&config.hints));
        let aggregator = MetricsAggregator::new(config.metrics.clone(), config.tariffs.clone());
        let finalizer = Finalizer::new(classifier, aggregator, config.privacy.coordinate_decimals);

        let (command_tx, command_rx) = mpsc::channel(16);

        let pipeline = Pipeline {
            adapter,
            segmentation: SegmentationEngine::new(config.segmentation.clone()),
            sampling,
            finalizer,
            store: Arc::clone(&self.store),
            retry: config.retry.clone(),
            pending: std::mem::take(&mut self.unsaved),
            callbacks: Arc::clone(&self.callbacks),
            events: self.events.clone(),
            state_tx: Arc::clone(&self.state_tx),
            battery_optimization: Arc::clone(&self.battery_optimization),
            data_sharing: Arc::clone(&self.data_sharing),
            stats: TrackingStats::new(Utc::now()),
            last_ms: None,
            degraded: false,
        };

        let _ = self.events.send(PipelineEvent::Started {
            provider: provider_name,
            policy,
        });
        pipeline.publish_state(TrackingStatus::Tracking);

        self.actor = Some(tokio::spawn(pipeline.run(signal_rx, command_rx)));
        self.commands = Some(command_tx);
        Ok(())
    }

    /// Stop tracking, draining buffered samples and closing the open segment
    pub async fn stop(&mut self) -> Result<TrackingStats> {
        if let Some(commands) = &self.commands {
            if commands.send(Command::Stop).await.is_err() {
                debug!("Pipeline already finished");
            }
        }
        self.join().await
    }

    /// Wait for the provider stream to end on its own
    pub async fn wait(&mut self) -> Result<TrackingStats> {
        self.join().await
    }

    async fn join(&mut self) -> Result<TrackingStats> {
        let actor = self.actor.take().context("Tracking is not running")?;
        let outcome = actor.await.context("Pipeline task failed")?;
        self.commands = None;
        self.unsaved = outcome.unsaved;

        info!(
            "Tracking stopped: {} trips finalized, {} dropped, {} unsaved",
            outcome.stats.trips_finalized, outcome.stats.trips_dropped, outcome.stats.trips_unsaved
        );
        Ok(outcome.stats)
    }

    /// Toggle the battery optimization cap; applies immediately while tracking
    pub async fn set_battery_optimization(&self, enabled: bool) -> Result<()> {
        self.battery_optimization.store(enabled, Ordering::SeqCst);
        if let Some(commands) = &self.commands {
            if commands
                .send(Command::SetBatteryOptimization(enabled))
                .await
                .is_ok()
            {
                return Ok(());
            }
            debug!("Pipeline not running, battery setting applies on next start");
        }
        self.state_tx.send_modify(|state| state.battery_optimization = enabled);
        Ok(())
    }

    /// Toggle precise data sharing for trips finalized from now on
    pub fn set_data_sharing(&self, enabled: bool) {
        info!("Data sharing {}", if enabled { "enabled" } else { "disabled" });
        self.data_sharing.store(enabled, Ordering::SeqCst);
        self.state_tx.send_modify(|state| state.data_sharing = enabled);
    }
}

/// The pipeline actor
struct Pipeline {
    adapter: SignalAdapter,
    segmentation: SegmentationEngine,
    sampling: SamplingController,
    finalizer: Finalizer,
    store: Arc<dyn TripStore>,
    retry: RetryPolicy,
    pending: VecDeque<Trip>,
    callbacks: Arc<Mutex<Vec<TripCallback>>>,
    events: broadcast::Sender<PipelineEvent>,
    state_tx: Arc<watch::Sender<TrackingState>>,
    battery_optimization: Arc<AtomicBool>,
    data_sharing: Arc<AtomicBool>,
    stats: TrackingStats,
    last_ms: Option<u64>,
    degraded: bool,
}

impl Pipeline {
    async fn run(
        mut self,
        mut signal_rx: mpsc::Receiver<SignalEvent>,
        mut command_rx: mpsc::Receiver<Command>,
    ) -> PipelineOutcome {
        info!("Trip pipeline started");

        loop {
            tokio::select! {
                biased;

                command = command_rx.recv() => match command {
                    Some(Command::SetBatteryOptimization(enabled)) => {
                        let at_ms = self.last_ms.unwrap_or(0);
                        if let Some(policy) = self.sampling.set_battery_optimization(enabled, at_ms) {
                            self.apply_policy(policy).await;
                        }
                        self.publish_state(TrackingStatus::Tracking);
                    }
                    Some(Command::Stop) | None => {
                        info!("Stop requested");
                        break;
                    }
                },

                event = signal_rx.recv() => match event {
                    Some(event) => self.handle_signal(event).await,
                    None => {
                        info!("Signal stream ended");
                        break;
                    }
                },
            }
        }

        if let Err(e) = self.adapter.stop().await {
            warn!("Signal adapter did not stop cleanly: {}", e);
        }

        let grace = self.adapter.stop_grace();
        let mut drained = 0;
        loop {
            match tokio::time::timeout(grace, signal_rx.recv()).await {
                Ok(Some(event)) => {
                    self.handle_signal(event).await;
                    drained += 1;
                }
                Ok(None) => break,
                Err(_) => {
                    warn!("Signal stream still open {:?} after stop, dropping the rest", grace);
                    self.adapter.abort_forwarding();
                    break;
                }
            }
        }
        if drained > 0 {
            debug!("Drained {} buffered signal events", drained);
        }

        self.finish().await
    }

    async fn handle_signal(&mut self, event: SignalEvent) {
        match event {
            SignalEvent::Sample(sample) => {
                let timestamp_ms = sample.timestamp_ms;
                self.sampling.observe(timestamp_ms);
                match self.segmentation.ingest(sample) {
                    Ok(events) => {
                        self.stats.samples_accepted += 1;
                        self.last_ms = Some(timestamp_ms);
                        self.handle_segmentation(events).await;
                    }
                    Err(e) => {
                        warn!("Rejected sample at {}ms: {}", timestamp_ms, e);
                        self.stats.samples_rejected += 1;
                        self.emit(PipelineEvent::SampleRejected {
                            at_ms: timestamp_ms,
                            reason: e.to_string(),
                        });
                    }
                }
            }
            SignalEvent::Discarded { timestamp_ms, reason } => {
                self.stats.samples_discarded += 1;
                let timely = matches!(reason, DiscardReason::LowAccuracy { .. });
                self.emit(PipelineEvent::SampleDiscarded {
                    at_ms: timestamp_ms,
                    reason: format!("{:?}", reason),
                });
                // An inaccurate fix still proves the clock moved on
                if timely {
                    self.advance_clock(timestamp_ms).await;
                }
            }
            SignalEvent::Degraded { timestamp_ms } => {
                warn!("Location signal degraded at {}ms", timestamp_ms);
                self.degraded = true;
                self.stats.degraded_episodes += 1;
                self.emit(PipelineEvent::Degraded { at_ms: timestamp_ms });
                self.publish_state(TrackingStatus::Tracking);
                self.advance_clock(timestamp_ms).await;
            }
            SignalEvent::Tick { timestamp_ms } => self.advance_clock(timestamp_ms).await,
            SignalEvent::Recovered { timestamp_ms } => {
                info!("Location signal recovered at {}ms", timestamp_ms);
                self.degraded = false;
                self.emit(PipelineEvent::Recovered { at_ms: timestamp_ms });
                self.publish_state(TrackingStatus::Tracking);
            }
        }
    }

    async fn advance_clock(&mut self, now_ms: u64) {
        let events = self.segmentation.advance_to(now_ms);
        self.handle_segmentation(events).await;
    }

    async fn handle_segmentation(&mut self, events: Vec<SegmentationEvent>) {
        for event in events {
            match event {
                SegmentationEvent::Transition { from, to, at_ms } => {
                    info!("Segment state {:?} -> {:?} at {}ms", from, to, at_ms);
                    self.emit(PipelineEvent::Transition { from, to, at_ms });
                    if let Some(policy) = self.sampling.on_transition(to, at_ms) {
                        self.apply_policy(policy).await;
                    }
                    self.publish_state(TrackingStatus::Tracking);
                }
                SegmentationEvent::SegmentClosed(segment) => self.on_segment_closed(segment).await,
            }
        }
    }

    async fn apply_policy(&mut self, policy: SamplingPolicy) {
        if let Err(e) = self.adapter.update_policy(policy).await {
            warn!("Provider rejected sampling policy: {}", e);
        }
        self.emit(PipelineEvent::PolicyChanged { policy });
    }

    async fn on_segment_closed(&mut self, segment: Segment) {
        if segment.kind() != SegmentKind::Moving {
            debug!("Stationary segment {} closed ({} samples)", segment.id(), segment.len());
            return;
        }

        let data_sharing = self.data_sharing.load(Ordering::SeqCst);
        match self.finalizer.finalize(&segment, data_sharing) {
            Ok(trip) => {
                info!(
                    "Trip {} finalized: {} {:.0}m in {:.0}s",
                    trip.id, trip.mode, trip.distance_m, trip.duration_secs
                );
                self.stats.trips_finalized += 1;
                self.pending.push_back(trip.clone());
                self.flush_pending().await;
                self.notify(&trip);
                self.emit(PipelineEvent::TripFinalized { trip });
                self.publish_state(TrackingStatus::Tracking);
            }
            Err(reason) => {
                warn!("Segment {} dropped: {}", segment.id(), reason);
                self.stats.trips_dropped += 1;
                self.emit(PipelineEvent::TripDropped {
                    segment_id: segment.id(),
                    reason,
                });
            }
        }
    }

    /// Write pending trips in order; stops at the first transient failure
    async fn flush_pending(&mut self) {
        while let Some(trip) = self.pending.front().cloned() {
            let store = Arc::clone(&self.store);
            let result = self.retry.run("Trip write", || store.put(&trip)).await;

            match result {
                Ok(outcome) => {
                    debug!("Trip {} written to {} store: {:?}", trip.id, store.name(), outcome);
                    self.pending.pop_front();
                    self.stats.trips_stored += 1;
                }
                Err(e) => {
                    error!("Failed to store trip {}: {}", trip.id, e);
                    self.stats.storage_failures += 1;
                    self.emit(PipelineEvent::StorageFailed {
                        trip_id: trip.id.clone(),
                        error: e.to_string(),
                    });
                    if e.is_transient() {
                        break;
                    }
                    // Conflicts and invalid ids will never succeed
                    self.pending.pop_front();
                }
            }
        }
    }

    fn notify(&self, trip: &Trip) {
        let callbacks: Vec<TripCallback> = match self.callbacks.lock() {
            Ok(callbacks) => callbacks.clone(),
            Err(e) => {
                error!("Trip callback registry poisoned: {}", e);
                return;
            }
        };
        for callback in callbacks {
            callback(trip);
        }
    }

    async fn finish(mut self) -> PipelineOutcome {
        let events = self.segmentation.finish();
        self.handle_segmentation(events).await;

        if !self.pending.is_empty() {
            info!("Retrying {} unsaved trips before stopping", self.pending.len());
            self.flush_pending().await;
        }

        let now_ms = self.last_ms.unwrap_or(0);
        self.stats.sampling = self.sampling.stats(now_ms);
        self.stats.duration_secs = (Utc::now() - self.stats.started_at).num_milliseconds() as f64 / 1000.0;
        self.stats.trips_unsaved = self.pending.len();
        if !self.pending.is_empty() {
            error!("{} trips could not be stored and remain in memory", self.pending.len());
        }

        self.emit(PipelineEvent::Stopped);
        let battery_optimization = self.battery_optimization.load(Ordering::SeqCst);
        let data_sharing = self.data_sharing.load(Ordering::SeqCst);
        self.state_tx
            .send_replace(TrackingState::idle(battery_optimization, data_sharing));

        info!("Trip pipeline stopped");
        PipelineOutcome {
            stats: self.stats,
            unsaved: self.pending,
        }
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn publish_state(&self, status: TrackingStatus) {
        let state = TrackingState {
            status,
            segment_state: Some(self.segmentation.state()),
            degraded: self.degraded,
            battery_optimization: self.sampling.battery_optimization(),
            data_sharing: self.data_sharing.load(Ordering::SeqCst),
            policy: Some(self.sampling.current()),
            trips_finalized: self.stats.trips_finalized,
        };
        self.state_tx.send_replace(state);
    }
}
