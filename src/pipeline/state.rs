use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sampling::{SamplingPolicy, SamplingStats};
use crate::segmentation::SegmentState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Idle,
    Tracking,
}

/// Snapshot of the tracker, published on every change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingState {
    pub status: TrackingStatus,
    /// Segmentation state, None while idle
    pub segment_state: Option<SegmentState>,
    /// Provider currently without a fix
    pub degraded: bool,
    pub battery_optimization: bool,
    pub data_sharing: bool,
    /// Policy in force, None while idle
    pub policy: Option<SamplingPolicy>,
    pub trips_finalized: u64,
}

impl TrackingState {
    pub fn idle(battery_optimization: bool, data_sharing: bool) -> Self {
        Self {
            status: TrackingStatus::Idle,
            segment_state: None,
            degraded: false,
            battery_optimization,
            data_sharing,
            policy: None,
            trips_finalized: 0,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.status == TrackingStatus::Tracking
    }
}

/// Statistics for one tracking session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingStats {
    /// When tracking started
    pub started_at: DateTime<Utc>,

    /// Wall-clock duration in seconds
    pub duration_secs: f64,

    pub samples_accepted: u64,
    pub samples_rejected: u64,
    pub samples_discarded: u64,
    pub degraded_episodes: u64,

    pub trips_finalized: u64,
    pub trips_dropped: u64,
    pub trips_stored: u64,

    /// Trips whose write failed after the retry budget
    pub storage_failures: u64,

    /// Trips still held in memory awaiting storage
    pub trips_unsaved: usize,

    /// Power accounting from the sampling controller
    pub sampling: SamplingStats,
}

impl TrackingStats {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            duration_secs: 0.0,
            samples_accepted: 0,
            samples_rejected: 0,
            samples_discarded: 0,
            degraded_episodes: 0,
            trips_finalized: 0,
            trips_dropped: 0,
            trips_stored: 0,
            storage_failures: 0,
            trips_unsaved: 0,
            sampling: SamplingStats::default(),
        }
    }
}
