//! The trip detection pipeline
//!
//! ```text
//!   LocationProvider -> SignalAdapter -> [bounded channel] -> Pipeline task
//!                                                             |- SegmentationEngine
//!                                                             |- SamplingController -> provider policy
//!                                                             |- Finalizer (classify, measure, privacy)
//!                                                             '- TripStore (with retry)
//! ```

mod events;
mod finalize;
mod privacy;
mod state;
mod tracker;

pub use events::PipelineEvent;
pub use finalize::Finalizer;
pub use privacy::PrivacyConfig;
pub use state::{TrackingState, TrackingStats, TrackingStatus};
pub use tracker::{TrackerConfig, TripCallback, TripTracker};
