//! Trip segmentation state machine.
//!
//! Partitions the sample stream into Stationary and Moving segments:
//!
//! ```text
//!   Stationary --(speed > threshold for dwell window)--> Moving
//!   Moving     --(speed <= threshold)------------------> Uncertain
//!   Uncertain  --(speed > threshold within window)-----> Moving
//!   Uncertain  --(uncertainty window elapsed)----------> Stationary  [segment closed]
//! ```
//!
//! The dwell and uncertainty windows damp GPS jitter and traffic stops so
//! they do not produce micro-trips. Samples with unusable accuracy are kept
//! in the segment buffer but never drive a transition.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::segment::{Segment, SegmentKind, SegmentState};
use crate::error::SampleError;
use crate::geo_utils;
use crate::signal::Sample;

/// Configuration for trip segmentation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Speed above which a sample counts as movement (m/s)
    pub movement_speed_mps: f64,

    /// Sustained movement required before Stationary -> Moving
    pub dwell_secs: u64,

    /// Grace period before an Uncertain segment is closed
    pub uncertainty_secs: u64,

    /// Samples less accurate than this are not evaluated (meters)
    pub unusable_accuracy_m: f64,

    /// Displacements implying a faster speed are rejected (m/s)
    pub max_plausible_speed_mps: f64,

    /// Buffer limit for an open stationary segment
    pub max_stationary_samples: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            movement_speed_mps: 1.5,
            dwell_secs: 60,
            uncertainty_secs: 180,
            unusable_accuracy_m: 50.0,
            max_plausible_speed_mps: 85.0,
            max_stationary_samples: 512,
        }
    }
}

impl SegmentationConfig {
    fn dwell_ms(&self) -> u64 {
        self.dwell_secs * 1000
    }

    fn uncertainty_ms(&self) -> u64 {
        self.uncertainty_secs * 1000
    }
}

/// Output of the segmentation machine
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentationEvent {
    /// The machine changed state
    Transition {
        from: SegmentState,
        to: SegmentState,
        at_ms: u64,
    },
    /// A segment was closed and handed downstream
    SegmentClosed(Segment),
}

/// Segmentation state machine
///
/// Sole owner of the open segment. Exactly one segment is open once the
/// first sample has been accepted.
pub struct SegmentationEngine {
    config: SegmentationConfig,
    state: SegmentState,
    open: Option<Segment>,
    next_segment_id: u64,
    last_timestamp_ms: Option<u64>,
    last_usable: Option<Sample>,
    /// First qualifying sample of the current movement run (Stationary)
    onset_ms: Option<u64>,
    /// Timestamp of the sample that moved us into Uncertain
    stop_onset_ms: Option<u64>,
}

impl SegmentationEngine {
    pub fn new(config: SegmentationConfig) -> Self {
        Self {
            config,
            state: SegmentState::Stationary,
            open: None,
            next_segment_id: 1,
            last_timestamp_ms: None,
            last_usable: None,
            onset_ms: None,
            stop_onset_ms: None,
        }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    pub fn state(&self) -> SegmentState {
        self.state
    }

    pub fn open_segment(&self) -> Option<&Segment> {
        self.open.as_ref()
    }

    /// Feed one sample through the machine
    ///
    /// Rejected samples leave the machine untouched.
    pub fn ingest(&mut self, sample: Sample) -> Result<Vec<SegmentationEvent>, SampleError> {
        let timestamp_ms = sample.timestamp_ms;

        if let Some(previous_ms) = self.last_timestamp_ms {
            if timestamp_ms == previous_ms {
                return Err(SampleError::Duplicate { timestamp_ms });
            }
            if timestamp_ms < previous_ms {
                return Err(SampleError::OutOfOrder {
                    previous_ms,
                    got_ms: timestamp_ms,
                });
            }
        }

        let usable = sample.horizontal_accuracy_m <= self.config.unusable_accuracy_m;
        let mut displacement_speed = None;

        if usable {
            if let Some(previous) = &self.last_usable {
                if let Some(speed) = geo_utils::implied_speed_mps(previous, &sample) {
                    if speed > self.config.max_plausible_speed_mps {
                        return Err(SampleError::ImplausibleJump {
                            distance_m: geo_utils::haversine_distance(previous, &sample),
                            speed_mps: speed,
                        });
                    }
                    displacement_speed = Some(speed);
                }
            }
        }

        self.last_timestamp_ms = Some(timestamp_ms);
        let mut events = Vec::new();

        if !usable {
            debug!(
                "Sample at {}ms buffered without evaluation (accuracy {:.0}m)",
                timestamp_ms, sample.horizontal_accuracy_m
            );
            self.open_segment_mut().push(sample);
            self.check_uncertainty_elapsed(timestamp_ms, &mut events);
            return Ok(events);
        }

        let speed = sample.speed_mps.or(displacement_speed).unwrap_or(0.0);
        let moving = speed > self.config.movement_speed_mps;

        self.last_usable = Some(sample.clone());
        self.open_segment_mut().push(sample);

        match self.state {
            SegmentState::Stationary => self.evaluate_stationary(moving, timestamp_ms, &mut events),
            SegmentState::Moving => {
                if !moving {
                    self.stop_onset_ms = Some(timestamp_ms);
                    self.transition(SegmentState::Uncertain, timestamp_ms, &mut events);
                }
            }
            SegmentState::Uncertain if moving => match self.expired_window_end(timestamp_ms) {
                // Movement after a silent gap longer than the window starts a new run
                Some(expired_at_ms) => {
                    self.close_moving(expired_at_ms, &mut events);
                    self.evaluate_stationary(true, timestamp_ms, &mut events);
                }
                None => {
                    self.stop_onset_ms = None;
                    self.transition(SegmentState::Moving, timestamp_ms, &mut events);
                }
            },
            SegmentState::Uncertain => self.check_uncertainty_elapsed(timestamp_ms, &mut events),
        }

        Ok(events)
    }

    /// Advance the clock without a usable sample
    ///
    /// Used while the signal is degraded so an elapsed uncertainty window
    /// still closes the segment.
    pub fn advance_to(&mut self, now_ms: u64) -> Vec<SegmentationEvent> {
        let mut events = Vec::new();
        if matches!(self.last_timestamp_ms, Some(last) if now_ms > last) {
            self.check_uncertainty_elapsed(now_ms, &mut events);
        }
        events
    }

    /// Force-close the open segment (tracking stopped)
    ///
    /// A Moving segment is closed with the samples collected so far. The
    /// machine returns to Stationary with no open segment.
    pub fn finish(&mut self) -> Vec<SegmentationEvent> {
        let mut events = Vec::new();
        let at_ms = self.last_timestamp_ms.unwrap_or(0);

        match self.state {
            SegmentState::Uncertain => self.close_moving(at_ms, &mut events),
            SegmentState::Moving => {
                if let Some(mut segment) = self.open.take() {
                    segment.close();
                    info!(
                        "Moving segment {} force-closed with {} samples",
                        segment.id(),
                        segment.len()
                    );
                    self.transition(SegmentState::Stationary, at_ms, &mut events);
                    events.push(SegmentationEvent::SegmentClosed(segment));
                }
            }
            SegmentState::Stationary => {}
        }

        if let Some(mut segment) = self.open.take() {
            if !segment.is_empty() {
                segment.close();
                events.push(SegmentationEvent::SegmentClosed(segment));
            }
        }

        self.state = SegmentState::Stationary;
        self.onset_ms = None;
        self.stop_onset_ms = None;
        events
    }

    fn open_segment_mut(&mut self) -> &mut Segment {
        let kind = self.state.segment_kind();
        let next_id = &mut self.next_segment_id;
        self.open.get_or_insert_with(|| {
            let id = *next_id;
            *next_id += 1;
            Segment::open(id, kind)
        })
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_segment_id;
        self.next_segment_id += 1;
        id
    }

    fn transition(&mut self, to: SegmentState, at_ms: u64, events: &mut Vec<SegmentationEvent>) {
        let from = self.state;
        if from == to {
            return;
        }
        debug!("Segmentation {:?} -> {:?} at {}ms", from, to, at_ms);
        self.state = to;
        events.push(SegmentationEvent::Transition { from, to, at_ms });
    }

    /// Confirm movement: samples from the onset on form the new Moving segment
    fn begin_moving(&mut self, onset_ms: u64, at_ms: u64, events: &mut Vec<SegmentationEvent>) {
        let moving_samples = match self.open.as_mut() {
            Some(stationary) => {
                let index = stationary.index_at(onset_ms);
                stationary.split_off(index)
            }
            None => Vec::new(),
        };

        if let Some(mut stationary) = self.open.take() {
            if !stationary.is_empty() {
                stationary.close();
                events.push(SegmentationEvent::SegmentClosed(stationary));
            }
        }

        let id = self.allocate_id();
        info!(
            "Movement confirmed at {}ms, segment {} starts at {}ms",
            at_ms, id, onset_ms
        );
        self.open = Some(Segment::with_samples(id, SegmentKind::Moving, moving_samples));
        self.onset_ms = None;
        self.transition(SegmentState::Moving, at_ms, events);
    }

    fn evaluate_stationary(&mut self, moving: bool, timestamp_ms: u64, events: &mut Vec<SegmentationEvent>) {
        if moving {
            let onset_ms = *self.onset_ms.get_or_insert(timestamp_ms);
            if timestamp_ms - onset_ms >= self.config.dwell_ms() {
                self.begin_moving(onset_ms, timestamp_ms, events);
            }
        } else {
            self.onset_ms = None;
            let limit = self.config.max_stationary_samples;
            self.open_segment_mut().trim_to(limit);
        }
    }

    /// End of the uncertainty window if `now_ms` lies strictly beyond it
    ///
    /// A resumption exactly at the window boundary still continues the trip.
    fn expired_window_end(&self, now_ms: u64) -> Option<u64> {
        let window_end_ms = self.stop_onset_ms? + self.config.uncertainty_ms();
        (now_ms > window_end_ms).then_some(window_end_ms)
    }

    fn check_uncertainty_elapsed(&mut self, now_ms: u64, events: &mut Vec<SegmentationEvent>) {
        if self.state != SegmentState::Uncertain {
            return;
        }
        if let Some(stop_onset_ms) = self.stop_onset_ms {
            if now_ms.saturating_sub(stop_onset_ms) >= self.config.uncertainty_ms() {
                self.close_moving(now_ms, events);
            }
        }
    }

    /// Close the Moving segment at the stop-onset sample
    ///
    /// Samples after the stop onset open the next Stationary segment.
    fn close_moving(&mut self, at_ms: u64, events: &mut Vec<SegmentationEvent>) {
        let stop_onset_ms = self.stop_onset_ms.take();
        let Some(mut moving) = self.open.take() else {
            self.transition(SegmentState::Stationary, at_ms, events);
            return;
        };

        let tail = match stop_onset_ms {
            Some(onset) => {
                let index = moving.index_at(onset);
                moving.split_off(index + 1)
            }
            None => Vec::new(),
        };
        moving.close();

        info!(
            "Moving segment {} closed: {} samples over {:.0}s",
            moving.id(),
            moving.len(),
            moving.duration_ms() as f64 / 1000.0
        );

        let id = self.allocate_id();
        self.open = Some(Segment::with_samples(id, SegmentKind::Stationary, tail));
        self.transition(SegmentState::Stationary, at_ms, events);
        events.push(SegmentationEvent::SegmentClosed(moving));
    }
}
