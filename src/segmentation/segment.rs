use serde::{Deserialize, Serialize};

use crate::signal::Sample;

/// Kind of interval a segment covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Stationary,
    Moving,
}

/// State of the segmentation machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentState {
    Stationary,
    Moving,
    /// Moving segment still open, speed below threshold
    Uncertain,
}

impl SegmentState {
    /// Kind of the segment that is open while in this state
    pub fn segment_kind(&self) -> SegmentKind {
        match self {
            SegmentState::Stationary => SegmentKind::Stationary,
            SegmentState::Moving | SegmentState::Uncertain => SegmentKind::Moving,
        }
    }
}

/// A contiguous interval of samples of one kind
///
/// Samples are strictly increasing in timestamp. The end sample is only
/// defined once the segment is closed.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    id: u64,
    kind: SegmentKind,
    samples: Vec<Sample>,
    /// Samples trimmed from a long stationary buffer
    trimmed: usize,
    closed: bool,
}

impl Segment {
    pub(crate) fn open(id: u64, kind: SegmentKind) -> Self {
        Self {
            id,
            kind,
            samples: Vec::new(),
            trimmed: 0,
            closed: false,
        }
    }

    pub(crate) fn with_samples(id: u64, kind: SegmentKind, samples: Vec<Sample>) -> Self {
        Self {
            id,
            kind,
            samples,
            trimmed: 0,
            closed: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Total samples seen, including ones trimmed from the buffer
    pub fn samples_seen(&self) -> usize {
        self.samples.len() + self.trimmed
    }

    pub fn start_sample(&self) -> Option<&Sample> {
        self.samples.first()
    }

    /// Last sample of a closed segment, None while open
    pub fn end_sample(&self) -> Option<&Sample> {
        if self.closed {
            self.samples.last()
        } else {
            None
        }
    }

    pub fn duration_ms(&self) -> u64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.timestamp_ms - first.timestamp_ms,
            _ => 0,
        }
    }

    pub(crate) fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Remove and return all samples from `index` on
    pub(crate) fn split_off(&mut self, index: usize) -> Vec<Sample> {
        self.samples.split_off(index.min(self.samples.len()))
    }

    /// Index of the first sample at or after `timestamp_ms`
    pub(crate) fn index_at(&self, timestamp_ms: u64) -> usize {
        self.samples.partition_point(|s| s.timestamp_ms < timestamp_ms)
    }

    /// Drop the oldest samples after the start sample, keeping at most `limit`
    pub(crate) fn trim_to(&mut self, limit: usize) {
        let limit = limit.max(2);
        if self.samples.len() <= limit {
            return;
        }
        let excess = self.samples.len() - limit;
        self.samples.drain(1..1 + excess);
        self.trimmed += excess;
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }
}
