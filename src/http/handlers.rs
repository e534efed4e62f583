use super::state::AppState;
use crate::error::StoreError;
use crate::pipeline::TrackingState;
use crate::store::{SummaryPeriod, Trip, TripPurpose, TripSummary};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct PurposeRequest {
    pub purpose: String,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// week, month, year or all (default: week)
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub exported_at: DateTime<Utc>,
    pub count: usize,
    pub trips: Vec<Trip>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorResponse { error: message })).into_response()
}

fn store_error_response(e: StoreError) -> Response {
    let status = match &e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::AlreadyConfirmed(_) | StoreError::Conflict(_) => StatusCode::CONFLICT,
        StoreError::InvalidId(_) => StatusCode::BAD_REQUEST,
        StoreError::Io(_) | StoreError::Serialization(_) => {
            error!("Trip store failure: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, e.to_string())
}

// ============================================================================
// Tracking
// ============================================================================

/// GET /tracking/status
/// Current tracking state
pub async fn get_tracking_status(State(state): State<AppState>) -> Json<TrackingState> {
    Json(state.tracker.read().await.current_tracking_state())
}

/// PUT /tracking/battery-optimization
/// Toggle the battery optimization cap
pub async fn set_battery_optimization(
    State(state): State<AppState>,
    Json(req): Json<ToggleRequest>,
) -> impl IntoResponse {
    let tracker = state.tracker.read().await;
    if let Err(e) = tracker.set_battery_optimization(req.enabled).await {
        error!("Failed to set battery optimization: {}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to set battery optimization: {}", e),
        );
    }

    (StatusCode::OK, Json(tracker.current_tracking_state())).into_response()
}

/// PUT /tracking/data-sharing
/// Toggle precise data sharing
pub async fn set_data_sharing(
    State(state): State<AppState>,
    Json(req): Json<ToggleRequest>,
) -> impl IntoResponse {
    let tracker = state.tracker.read().await;
    tracker.set_data_sharing(req.enabled);
    (StatusCode::OK, Json(tracker.current_tracking_state()))
}

// ============================================================================
// Trips
// ============================================================================

/// GET /trips
/// All stored trips, oldest first
pub async fn list_trips(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list().await {
        Ok(trips) => (StatusCode::OK, Json(trips)).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// GET /trips/summary?period=
/// Totals for the requested period
pub async fn get_trip_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> impl IntoResponse {
    let period = match query.period.as_deref().map(str::parse::<SummaryPeriod>) {
        None => SummaryPeriod::default(),
        Some(Ok(period)) => period,
        Some(Err(e)) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    match state.store.list().await {
        Ok(trips) => {
            let summary = TripSummary::compute(&trips, period, Utc::now());
            (StatusCode::OK, Json(summary)).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

/// GET /trips/export
/// Every stored trip with an export timestamp
pub async fn export_trips(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.export_all().await {
        Ok(trips) => {
            info!("Exporting {} trips", trips.len());
            (
                StatusCode::OK,
                Json(ExportResponse {
                    exported_at: Utc::now(),
                    count: trips.len(),
                    trips,
                }),
            )
                .into_response()
        }
        Err(e) => store_error_response(e),
    }
}

/// POST /trips/:trip_id/purpose
/// Confirm why a trip was made (once)
pub async fn confirm_trip_purpose(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    Json(req): Json<PurposeRequest>,
) -> impl IntoResponse {
    let purpose = match req.purpose.parse::<TripPurpose>() {
        Ok(purpose) => purpose,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    let store = &state.store;
    let confirmed = state
        .retry
        .run("Purpose confirmation", || store.confirm_purpose(&trip_id, purpose))
        .await;

    match confirmed {
        Ok(trip) => (StatusCode::OK, Json(trip)).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// DELETE /trips/:trip_id
/// Permanently delete a trip
pub async fn delete_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> impl IntoResponse {
    let store = &state.store;
    match state.retry.run("Trip delete", || store.delete(&trip_id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error_response(e),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
