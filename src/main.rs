use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use trip_sense::store::{SummaryPeriod, TripSummary};
use trip_sense::{create_router, AppState, Config, FileTripStore, ReplayProvider, TripStore, TripTracker};

#[derive(Parser)]
#[command(name = "trip-sense")]
#[command(about = "Passive trip detection and transport mode classification")]
struct Cli {
    /// Config file path without extension
    #[arg(short, long, default_value = "config/trip-sense")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay recorded provider readings (JSON lines) through the pipeline
    Replay {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Run the HTTP API, optionally replaying a recording in the background
    Serve {
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Delay between replayed readings in milliseconds
        #[arg(long, default_value = "0")]
        pace_ms: u64,
    },
    /// List stored trips
    Trips,
    /// Travel summary for a period
    Summary {
        /// week, month, year or all
        #[arg(short, long, default_value = "week")]
        period: SummaryPeriod,
    },
    /// Export every stored trip as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Permanently delete a trip
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("Trip Sense v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let store: Arc<dyn TripStore> = Arc::new(
        FileTripStore::open(cfg.trips_path())
            .await
            .context("Failed to open trip store")?,
    );

    match cli.command {
        Command::Replay { input } => replay(&cfg, store, input).await,
        Command::Serve { input, pace_ms } => serve(&cfg, store, input, pace_ms).await,
        Command::Trips => {
            let trips = store.list().await?;
            println!("{}", serde_json::to_string_pretty(&trips)?);
            Ok(())
        }
        Command::Summary { period } => {
            let trips = store.list().await?;
            let summary = TripSummary::compute(&trips, period, Utc::now());
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Export { output } => {
            let trips = store.export_all().await?;
            let json = serde_json::to_string_pretty(&trips)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write export to {}", path.display()))?;
                    info!("Exported {} trips to {}", trips.len(), path.display());
                }
                None => println!("{}", json),
            }
            Ok(())
        }
        Command::Delete { id } => {
            cfg.storage
                .retry
                .run("Trip delete", || store.delete(&id))
                .await
                .with_context(|| format!("Failed to delete trip {}", id))?;
            info!("Trip {} deleted", id);
            Ok(())
        }
    }
}

async fn replay(cfg: &Config, store: Arc<dyn TripStore>, input: PathBuf) -> Result<()> {
    let provider = ReplayProvider::from_json_lines(&input)?;

    let mut tracker = TripTracker::new(cfg.tracker_config(), store);
    tracker.on_trip_finalized(|trip| {
        info!(
            "  - {} {} {:.2}km {:.1}min cost {:.2} carbon {:.2}kg",
            trip.id,
            trip.mode,
            trip.distance_km(),
            trip.duration_minutes(),
            trip.cost_estimate,
            trip.carbon_saved_kg
        );
    });

    tracker.start(Box::new(provider)).await?;
    let stats = tracker.wait().await?;

    info!("Replay complete!");
    info!(
        "Samples: {} accepted, {} rejected, {} discarded",
        stats.samples_accepted, stats.samples_rejected, stats.samples_discarded
    );
    info!(
        "Trips: {} finalized, {} dropped, {} stored",
        stats.trips_finalized, stats.trips_dropped, stats.trips_stored
    );
    info!(
        "Sampling: {} policy changes, {:.0}% fewer fixes than always-on",
        stats.sampling.policy_changes, stats.sampling.savings_percent
    );
    if stats.trips_unsaved > 0 {
        warn!("{} trips could not be stored", stats.trips_unsaved);
    }

    Ok(())
}

async fn serve(cfg: &Config, store: Arc<dyn TripStore>, input: Option<PathBuf>, pace_ms: u64) -> Result<()> {
    let mut tracker = TripTracker::new(cfg.tracker_config(), store);

    if let Some(input) = input {
        let mut provider = ReplayProvider::from_json_lines(&input)?;
        if pace_ms > 0 {
            provider = provider.with_pace(Duration::from_millis(pace_ms));
        }
        tracker.start(Box::new(provider)).await?;
    }

    let state = AppState::new(tracker).with_retry(cfg.storage.retry.clone());
    let app = create_router(state.clone());

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("HTTP server failed")?;

    let mut tracker = state.tracker.write().await;
    if tracker.is_tracking() {
        let stats = tracker.stop().await?;
        info!("Final tracking stats: {} trips finalized", stats.trips_finalized);
    }

    Ok(())
}
