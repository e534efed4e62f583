use serde::Serialize;

use crate::metrics::DropReason;
use crate::sampling::SamplingPolicy;
use crate::segmentation::SegmentState;
use crate::store::Trip;

/// Everything observable the pipeline does, broadcast to subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Started {
        provider: String,
        policy: SamplingPolicy,
    },
    Transition {
        from: SegmentState,
        to: SegmentState,
        at_ms: u64,
    },
    PolicyChanged {
        policy: SamplingPolicy,
    },
    Degraded {
        at_ms: u64,
    },
    Recovered {
        at_ms: u64,
    },
    /// Dropped by the signal adapter (accuracy gate, malformed reading)
    SampleDiscarded {
        at_ms: u64,
        reason: String,
    },
    /// Refused by the segmentation machine
    SampleRejected {
        at_ms: u64,
        reason: String,
    },
    TripFinalized {
        trip: Trip,
    },
    TripDropped {
        segment_id: u64,
        reason: DropReason,
    },
    /// Retry budget exhausted for a trip write
    StorageFailed {
        trip_id: String,
        error: String,
    },
    Stopped,
}
