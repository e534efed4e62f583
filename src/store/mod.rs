//! Offline-first trip persistence
//!
//! Stores are append-only: a trip is written once, may have its purpose
//! confirmed once, and is removed only by an explicit delete.

mod file;
mod memory;
mod retry;
mod summary;
mod trip;

pub use file::FileTripStore;
pub use memory::MemoryTripStore;
pub use retry::RetryPolicy;
pub use summary::{ModeTotals, SummaryPeriod, TripSummary};
pub use trip::{TrackPoint, Trip, TripEndpoint, TripPurpose};

use async_trait::async_trait;

use crate::error::StoreError;

/// Result of writing a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    /// Same id and identical content already stored
    Unchanged,
}

/// Durable trip record storage
#[async_trait]
pub trait TripStore: Send + Sync {
    /// Write a trip; idempotent for identical content, `Conflict` otherwise
    async fn put(&self, trip: &Trip) -> Result<PutOutcome, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Trip>, StoreError>;

    /// All trips ordered by start time
    async fn list(&self) -> Result<Vec<Trip>, StoreError>;

    /// Set the purpose of a stored trip, at most once
    async fn confirm_purpose(&self, id: &str, purpose: TripPurpose) -> Result<Trip, StoreError>;

    /// Permanently remove a trip
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Every stored trip, for export
    async fn export_all(&self) -> Result<Vec<Trip>, StoreError> {
        self.list().await
    }

    fn name(&self) -> &str;
}

fn sort_trips(trips: &mut [Trip]) {
    trips.sort_by(|a, b| {
        a.origin
            .timestamp_ms
            .cmp(&b.origin.timestamp_ms)
            .then_with(|| a.id.cmp(&b.id))
    });
}
