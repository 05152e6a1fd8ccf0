//! Error types shared by the map engine.

use thiserror::Error;

/// Failure reported by a [`crate::data::MapDataSource`] request.
///
/// Always non-fatal: the prefetch path retries or degrades, and the failure
/// reaches the host as a notification rather than a panic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("no data for {0}")]
    NotFound(String),
    #[error("request cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("invalid coordinate format: {0:?}")]
    InvalidCoordinateFormat(String),
    #[error("coordinate out of range: {0}")]
    InvalidCoordinate(String),
    #[error("map engine has been destroyed")]
    EngineDestroyed,
    #[error("entity {0:?} already exists")]
    DuplicateEntity(String),
    #[error("fetch failed: {0}")]
    FetchFailed(#[from] FetchError),
}
