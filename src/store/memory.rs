use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{sort_trips, PutOutcome, Trip, TripPurpose, TripStore};
use crate::error::StoreError;

/// Volatile store, used by tests and when no storage path is configured
#[derive(Debug, Default)]
pub struct MemoryTripStore {
    trips: RwLock<HashMap<String, Trip>>,
}

impl MemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.trips.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.trips.read().await.is_empty()
    }
}

#[async_trait]
impl TripStore for MemoryTripStore {
    async fn put(&self, trip: &Trip) -> Result<PutOutcome, StoreError> {
        if !Trip::is_valid_id(&trip.id) {
            return Err(StoreError::InvalidId(trip.id.clone()));
        }
        let mut trips = self.trips.write().await;
        if let Some(existing) = trips.get(&trip.id) {
            return if serde_json::to_string(existing)? == serde_json::to_string(trip)? {
                Ok(PutOutcome::Unchanged)
            } else {
                Err(StoreError::Conflict(trip.id.clone()))
            };
        }
        trips.insert(trip.id.clone(), trip.clone());
        Ok(PutOutcome::Inserted)
    }

    async fn get(&self, id: &str) -> Result<Option<Trip>, StoreError> {
        Ok(self.trips.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Trip>, StoreError> {
        let mut trips: Vec<Trip> = self.trips.read().await.values().cloned().collect();
        sort_trips(&mut trips);
        Ok(trips)
    }

    async fn confirm_purpose(&self, id: &str, purpose: TripPurpose) -> Result<Trip, StoreError> {
        let mut trips = self.trips.write().await;
        let trip = trips
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if !trip.confirm_purpose(purpose) {
            return Err(StoreError::AlreadyConfirmed(id.to_string()));
        }
        Ok(trip.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.trips
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
