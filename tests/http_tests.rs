// Integration tests for the HTTP API
//
// Requests are driven through the router in-process with tower's oneshot,
// no listener is bound.

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use trip_sense::classify::TransportMode;
use trip_sense::store::{PutOutcome, RetryPolicy, TripEndpoint};
use trip_sense::{
    create_router, AppState, MemoryTripStore, StoreError, TrackerConfig, Trip, TripPurpose, TripStore,
    TripTracker,
};

fn trip(id: &str, start_ms: u64) -> Trip {
    Trip {
        id: id.to_string(),
        origin: TripEndpoint {
            latitude: 8.5,
            longitude: 76.95,
            timestamp_ms: start_ms,
        },
        destination: TripEndpoint {
            latitude: 8.57,
            longitude: 76.95,
            timestamp_ms: start_ms + 900_000,
        },
        mode: TransportMode::Bus,
        purpose: None,
        duration_secs: 900.0,
        distance_m: 8000.0,
        cost_estimate: 10.0,
        carbon_saved_kg: 0.6,
        created_at: chrono::Utc::now(),
        confirmed: false,
        precise: true,
        track: Vec::new(),
    }
}

async fn app_with_trips(ids: &[&str]) -> Result<Router> {
    let store = Arc::new(MemoryTripStore::new());
    let now_ms = chrono::Utc::now().timestamp_millis() as u64;
    for (i, id) in ids.iter().enumerate() {
        store.put(&trip(id, now_ms - 3_600_000 * (i as u64 + 1))).await?;
    }

    let tracker = TripTracker::new(TrackerConfig::default(), store);
    Ok(create_router(AppState::new(tracker)))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&value)?)
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(request.body(body)?).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    Ok((status, value))
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let app = app_with_trips(&[]).await?;

    let (status, body) = send(&app, "GET", "/health", None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_status_is_idle_before_tracking() -> Result<()> {
    let app = app_with_trips(&[]).await?;

    let (status, body) = send(&app, "GET", "/tracking/status", None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "idle");
    assert_eq!(body["battery_optimization"], true);
    assert_eq!(body["data_sharing"], true);
    assert!(body["policy"].is_null());
    Ok(())
}

#[tokio::test]
async fn test_toggles_are_reflected_in_status() -> Result<()> {
    let app = app_with_trips(&[]).await?;

    let (status, body) = send(
        &app,
        "PUT",
        "/tracking/data-sharing",
        Some(json!({ "enabled": false })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data_sharing"], false);

    let (status, body) = send(
        &app,
        "PUT",
        "/tracking/battery-optimization",
        Some(json!({ "enabled": false })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["battery_optimization"], false);

    let (_, body) = send(&app, "GET", "/tracking/status", None).await?;
    assert_eq!(body["data_sharing"], false);
    assert_eq!(body["battery_optimization"], false);
    Ok(())
}

#[tokio::test]
async fn test_list_trips_oldest_first() -> Result<()> {
    // "b" is older: the helper spaces trips an hour apart going back
    let app = app_with_trips(&["a", "b"]).await?;

    let (status, body) = send(&app, "GET", "/trips", None).await?;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .map(|trips| trips.iter().filter_map(|t| t["id"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(ids, vec!["b", "a"]);
    Ok(())
}

#[tokio::test]
async fn test_summary_defaults_to_week_and_rejects_unknown_period() -> Result<()> {
    let app = app_with_trips(&["a", "b"]).await?;

    let (status, body) = send(&app, "GET", "/trips/summary", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["period"], "week");
    assert_eq!(body["trip_count"], 2);
    assert!((body["total_distance_km"].as_f64().unwrap_or_default() - 16.0).abs() < 1e-9);

    let (status, body) = send(&app, "GET", "/trips/summary?period=decade", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap_or_default().contains("decade"));
    Ok(())
}

#[tokio::test]
async fn test_export_includes_every_trip() -> Result<()> {
    let app = app_with_trips(&["a", "b", "c"]).await?;

    let (status, body) = send(&app, "GET", "/trips/export", None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["trips"].as_array().map(Vec::len), Some(3));
    assert!(body["exported_at"].is_string());
    Ok(())
}

#[tokio::test]
async fn test_purpose_confirmed_once() -> Result<()> {
    let app = app_with_trips(&["a"]).await?;

    let (status, body) = send(&app, "POST", "/trips/a/purpose", Some(json!({ "purpose": "work" }))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["purpose"], "work");
    assert_eq!(body["confirmed"], true);

    let (status, _) = send(&app, "POST", "/trips/a/purpose", Some(json!({ "purpose": "leisure" }))).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "POST", "/trips/a/purpose", Some(json!({ "purpose": "sightseeing" }))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/trips/zzz/purpose", Some(json!({ "purpose": "work" }))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_delete_trip() -> Result<()> {
    let app = app_with_trips(&["a", "b"]).await?;

    let (status, _) = send(&app, "DELETE", "/trips/a", None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "DELETE", "/trips/a", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "GET", "/trips", None).await?;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    Ok(())
}

/// Memory store whose deletes and confirmations fail with an I/O error
/// while `failures` > 0
struct FlakyStore {
    inner: MemoryTripStore,
    failures: AtomicU32,
}

impl FlakyStore {
    fn fail_once_more(&self) -> Result<(), StoreError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Io(std::io::Error::other("disk busy")));
        }
        Ok(())
    }
}

#[async_trait]
impl TripStore for FlakyStore {
    async fn put(&self, trip: &Trip) -> Result<PutOutcome, StoreError> {
        self.inner.put(trip).await
    }

    async fn get(&self, id: &str) -> Result<Option<Trip>, StoreError> {
        self.inner.get(id).await
    }

    async fn list(&self) -> Result<Vec<Trip>, StoreError> {
        self.inner.list().await
    }

    async fn confirm_purpose(&self, id: &str, purpose: TripPurpose) -> Result<Trip, StoreError> {
        self.fail_once_more()?;
        self.inner.confirm_purpose(id, purpose).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.fail_once_more()?;
        self.inner.delete(id).await
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

async fn flaky_app(failures: u32, max_attempts: u32) -> Result<Router> {
    let store = Arc::new(FlakyStore {
        inner: MemoryTripStore::new(),
        failures: AtomicU32::new(failures),
    });
    store.put(&trip("a", chrono::Utc::now().timestamp_millis() as u64 - 3_600_000)).await?;

    let tracker = TripTracker::new(TrackerConfig::default(), store);
    let retry = RetryPolicy {
        max_attempts,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
    };
    Ok(create_router(AppState::new(tracker).with_retry(retry)))
}

#[tokio::test]
async fn test_transient_store_failures_are_retried_for_user_writes() -> Result<()> {
    let app = flaky_app(2, 4).await?;
    let (status, body) = send(&app, "POST", "/trips/a/purpose", Some(json!({ "purpose": "work" }))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["purpose"], "work");

    let app = flaky_app(2, 4).await?;
    let (status, _) = send(&app, "DELETE", "/trips/a", None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = send(&app, "GET", "/trips", None).await?;
    assert_eq!(body.as_array().map(Vec::len), Some(0));
    Ok(())
}

#[tokio::test]
async fn test_exhausted_retries_surface_as_server_error() -> Result<()> {
    let app = flaky_app(10, 2).await?;

    let (status, _) = send(&app, "DELETE", "/trips/a", None).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (_, body) = send(&app, "GET", "/trips", None).await?;
    assert_eq!(body.as_array().map(Vec::len), Some(1), "Trip kept after failed delete");
    Ok(())
}
