use crate::pipeline::TripTracker;
use crate::store::{RetryPolicy, TripStore};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The device's single tracking pipeline
    pub tracker: Arc<RwLock<TripTracker>>,

    /// Trip store the pipeline writes to
    pub store: Arc<dyn TripStore>,

    /// Backoff budget for user-initiated store writes
    pub retry: RetryPolicy,
}

impl AppState {
    pub fn new(tracker: TripTracker) -> Self {
        let store = tracker.store();
        Self {
            tracker: Arc::new(RwLock::new(tracker)),
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
