// Simulated commute: feed a synthetic bus ride through the tracker
//
// Builds a morning commute (wait at the stop, a ride with four brief stops,
// arrival) and replays it through the full pipeline against an in-memory
// store, printing the pipeline events and the finalized trip.
//
// Usage:
//   cargo run --example simulated_commute
//   cargo run --example simulated_commute -- commute.jsonl   # also write the readings
//
// The written file can be replayed with `trip-sense replay --input commute.jsonl`.

use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tracing::info;
use trip_sense::signal::{ProviderReading, Sample};
use trip_sense::{MemoryTripStore, PipelineEvent, ReplayProvider, TrackerConfig, TripStore, TripTracker};

const START_MS: u64 = 1_700_000_000_000;
const METERS_PER_DEG_LAT: f64 = 111_195.08;

fn commute() -> Vec<ProviderReading> {
    let mut readings = Vec::new();
    let mut t = 0u64;
    let mut north_m = 0.0;

    let mut push = |secs: u64, speed: f64, t: &mut u64, north_m: &mut f64| {
        for _ in 0..secs {
            let sample = Sample::fix(START_MS + *t * 1000, 8.5 + *north_m / METERS_PER_DEG_LAT, 76.95, 5.0)
                .with_speed(speed);
            readings.push(ProviderReading::Fix(sample));
            *north_m += speed;
            *t += 1;
        }
    };

    push(120, 0.0, &mut t, &mut north_m);
    for (ride, stop) in [(150, 20), (160, 30), (160, 40), (160, 30)] {
        push(ride, 10.0, &mut t, &mut north_m);
        push(stop, 0.0, &mut t, &mut north_m);
    }
    push(150, 10.0, &mut t, &mut north_m);
    push(240, 0.0, &mut t, &mut north_m);

    readings
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let readings = commute();
    info!("🚌 Simulated commute with {} readings", readings.len());

    if let Some(path) = std::env::args().nth(1) {
        let mut file = std::fs::File::create(&path)?;
        for reading in &readings {
            writeln!(file, "{}", serde_json::to_string(reading)?)?;
        }
        info!("📝 Readings written to {}", path);
    }

    let store = Arc::new(MemoryTripStore::new());
    let mut tracker = TripTracker::new(TrackerConfig::default(), store.clone());

    let mut events = tracker.subscribe();
    let listener = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match &event {
                PipelineEvent::Transition { from, to, at_ms } => {
                    info!("🔀 {:?} -> {:?} at +{}s", from, to, (at_ms - START_MS) / 1000)
                }
                PipelineEvent::PolicyChanged { policy } => {
                    info!("🔋 Sampling every {}ms ({:?})", policy.interval_ms, policy.desired_accuracy)
                }
                PipelineEvent::Stopped => break,
                _ => {}
            }
        }
    });

    tracker.start(Box::new(ReplayProvider::new(readings))).await?;
    let stats = tracker.wait().await?;
    listener.await?;

    for trip in store.list().await? {
        info!(
            "✅ Trip {}: {} {:.2}km in {:.1}min",
            trip.id,
            trip.mode,
            trip.distance_km(),
            trip.duration_minutes()
        );
    }
    info!(
        "📊 {} samples, {} trips, {:.0}% fewer fixes than always-on",
        stats.samples_accepted, stats.trips_finalized, stats.sampling.savings_percent
    );

    Ok(())
}
