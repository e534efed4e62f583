//! Transport mode classification
//!
//! Kinematic features are extracted from a closed moving segment and mapped
//! to a mode by ordered threshold rules.

pub mod features;
pub mod hints;
pub mod mode;
pub mod rules;

pub use features::{FeatureConfig, KinematicFeatures};
pub use hints::{BoundingBox, GeoConfig, GeoHints, NoHints, RegionHints};
pub use mode::TransportMode;
pub use rules::{classify_features, Classification, ClassifierConfig, ModeClassifier};
