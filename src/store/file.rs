use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{sort_trips, PutOutcome, Trip, TripPurpose, TripStore};
use crate::error::StoreError;

/// One pretty-printed JSON file per trip under a directory
///
/// Files are written to a temporary name and renamed into place, so a crash
/// never leaves a half-written record behind.
#[derive(Debug)]
pub struct FileTripStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTripStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        info!("Trip store opened at {}", dir.display());
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        if !Trip::is_valid_id(id) {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    async fn read_raw(&self, path: &Path) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_atomic(&self, path: &Path, contents: &str) -> Result<(), StoreError> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl TripStore for FileTripStore {
    async fn put(&self, trip: &Trip) -> Result<PutOutcome, StoreError> {
        let path = self.path_for(&trip.id)?;
        let serialized = serde_json::to_string_pretty(trip)?;

        let _guard = self.write_lock.lock().await;
        if let Some(existing) = self.read_raw(&path).await? {
            // Compared as text so float formatting cannot cause false conflicts
            return if existing == serialized {
                debug!("Trip {} already stored", trip.id);
                Ok(PutOutcome::Unchanged)
            } else {
                Err(StoreError::Conflict(trip.id.clone()))
            };
        }

        self.write_atomic(&path, &serialized).await?;
        debug!("Stored trip {} at {}", trip.id, path.display());
        Ok(PutOutcome::Inserted)
    }

    async fn get(&self, id: &str) -> Result<Option<Trip>, StoreError> {
        let path = self.path_for(id)?;
        match self.read_raw(&path).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Trip>, StoreError> {
        let mut trips = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = fs::read_to_string(&path).await?;
            match serde_json::from_str::<Trip>(&raw) {
                Ok(trip) => trips.push(trip),
                Err(e) => warn!("Skipping unreadable trip file {}: {}", path.display(), e),
            }
        }
        sort_trips(&mut trips);
        Ok(trips)
    }

    async fn confirm_purpose(&self, id: &str, purpose: TripPurpose) -> Result<Trip, StoreError> {
        let path = self.path_for(id)?;
        let _guard = self.write_lock.lock().await;

        let raw = self
            .read_raw(&path)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let mut trip: Trip = serde_json::from_str(&raw)?;
        if !trip.confirm_purpose(purpose) {
            return Err(StoreError::AlreadyConfirmed(id.to_string()));
        }

        self.write_atomic(&path, &serde_json::to_string_pretty(&trip)?)
            .await?;
        info!("Trip {} purpose confirmed as {}", id, purpose);
        Ok(trip)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.path_for(id)?;
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted trip {}", id);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}
