//! Battery-adaptive sampling
//!
//! The controller maps segment state to a location sampling policy and
//! applies the user's battery optimization cap on top.

mod controller;
mod policy;

pub use controller::{SamplingConfig, SamplingController, SamplingStats};
pub use policy::{default_active_policy, default_stationary_policy, DesiredAccuracy, SamplingPolicy};
