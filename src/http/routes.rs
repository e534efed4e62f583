use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Tracking state and user toggles
        .route("/tracking/status", get(handlers::get_tracking_status))
        .route(
            "/tracking/battery-optimization",
            put(handlers::set_battery_optimization),
        )
        .route("/tracking/data-sharing", put(handlers::set_data_sharing))
        // Trip records
        .route("/trips", get(handlers::list_trips))
        .route("/trips/summary", get(handlers::get_trip_summary))
        .route("/trips/export", get(handlers::export_trips))
        .route("/trips/:trip_id/purpose", post(handlers::confirm_trip_purpose))
        .route("/trips/:trip_id", delete(handlers::delete_trip))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
