use thiserror::Error;

/// Why a sample was refused by the segmentation machine or the signal filter
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    #[error("sample at {got_ms}ms arrived after {previous_ms}ms")]
    OutOfOrder { previous_ms: u64, got_ms: u64 },

    #[error("duplicate sample timestamp {timestamp_ms}ms")]
    Duplicate { timestamp_ms: u64 },

    #[error("invalid coordinate ({latitude}, {longitude})")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("implausible jump of {distance_m:.0}m ({speed_mps:.1} m/s)")]
    ImplausibleJump { distance_m: f64, speed_mps: f64 },
}

/// Errors raised by a trip store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("trip serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("trip {0} already stored with different content")]
    Conflict(String),

    #[error("trip {0} not found")]
    NotFound(String),

    #[error("trip {0} purpose already confirmed")]
    AlreadyConfirmed(String),

    #[error("invalid trip id: {0:?}")]
    InvalidId(String),
}

impl StoreError {
    /// Whether retrying the same operation could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_))
    }
}
