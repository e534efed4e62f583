//! Trip metrics: distance, duration, fare and emissions avoided.

mod aggregator;
mod tariff;

pub use aggregator::{
    filtered_path, DropReason, FilteredPath, MetricsAggregator, MetricsConfig, ModeSpeedLimits,
    TripMetrics,
};
pub use tariff::{Tariff, TariffTable};
