pub mod classify;
pub mod config;
pub mod error;
pub mod geo_utils;
pub mod http;
pub mod metrics;
pub mod pipeline;
pub mod sampling;
pub mod segmentation;
pub mod signal;
pub mod store;

pub use classify::{ModeClassifier, TransportMode};
pub use config::Config;
pub use error::{SampleError, StoreError};
pub use http::{create_router, AppState};
pub use metrics::{MetricsAggregator, TariffTable, TripMetrics};
pub use pipeline::{PipelineEvent, TrackerConfig, TrackingState, TrackingStats, TripTracker};
pub use sampling::{SamplingController, SamplingPolicy};
pub use segmentation::{Segment, SegmentState, SegmentationEngine};
pub use signal::{LocationProvider, ProviderReading, ReplayProvider, Sample};
pub use store::{FileTripStore, MemoryTripStore, Trip, TripPurpose, TripStore};
