//! Signal source adapter
//!
//! Wraps a location/motion provider into a normalized, monotonic sample
//! stream delivered over a bounded channel.

pub mod adapter;
pub mod provider;
pub mod replay;
pub mod sample;

pub use adapter::{DiscardReason, SampleFilter, SignalAdapter, SignalConfig, SignalEvent};
pub use provider::{LocationProvider, ProviderReading};
pub use replay::ReplayProvider;
pub use sample::{Acceleration, Sample};
