//! Trip segmentation
//!
//! Splits the normalized sample stream into Stationary and Moving segments.
//! Closed Moving segments become trip candidates.

mod machine;
mod segment;

pub use machine::{SegmentationConfig, SegmentationEngine, SegmentationEvent};
pub use segment::{Segment, SegmentKind, SegmentState};
