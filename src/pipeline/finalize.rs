use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::privacy;
use crate::classify::ModeClassifier;
use crate::metrics::{DropReason, MetricsAggregator};
use crate::segmentation::Segment;
use crate::store::{TrackPoint, Trip, TripEndpoint};

/// Turns closed moving segments into trip records
#[derive(Clone)]
pub struct Finalizer {
    classifier: ModeClassifier,
    aggregator: MetricsAggregator,
    coordinate_decimals: u32,
}

impl Finalizer {
    pub fn new(classifier: ModeClassifier, aggregator: MetricsAggregator, coordinate_decimals: u32) -> Self {
        Self {
            classifier,
            aggregator,
            coordinate_decimals,
        }
    }

    /// Classify, measure and build the trip for one closed moving segment
    pub fn finalize(&self, segment: &Segment, data_sharing: bool) -> Result<Trip, DropReason> {
        let classification = self.classifier.classify(segment.samples());
        let metrics = self.aggregator.aggregate(segment.samples(), classification.mode)?;

        info!(
            "Segment {} classified as {} ({:.0}m in {:.0}s, {} jumps discarded)",
            segment.id(),
            classification.mode,
            metrics.distance_m,
            metrics.duration_secs,
            metrics.jumps_discarded
        );

        let trip = Trip {
            id: Uuid::new_v4().to_string(),
            origin: TripEndpoint::from_sample(&metrics.origin),
            destination: TripEndpoint::from_sample(&metrics.destination),
            mode: classification.mode,
            purpose: None,
            duration_secs: metrics.duration_secs,
            distance_m: metrics.distance_m,
            cost_estimate: metrics.cost_estimate,
            carbon_saved_kg: metrics.carbon_saved_kg,
            created_at: Utc::now(),
            confirmed: false,
            precise: true,
            track: metrics.retained.iter().map(TrackPoint::from).collect(),
        };

        Ok(privacy::apply(trip, data_sharing, self.coordinate_decimals))
    }
}
