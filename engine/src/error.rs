use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::DroneId;

/// Anything the storage layer can fail with.
///
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("can't open {0:?}: {1}")]
    Open(PathBuf, #[source] std::io::Error),
    #[error("can't read data directory {0:?}: {1}")]
    ReadDir(PathBuf, #[source] std::io::Error),
    #[error("can't parse {0:?}: {1}")]
    Parse(PathBuf, #[source] csv::Error),
    #[error("can't parse move time {0:?}: {1}")]
    BadTimestamp(String, #[source] chrono::ParseError),
    #[error("unknown drone {0}")]
    UnknownDrone(DroneId),
    #[error("can't load stations: {0}")]
    Stations(#[source] Arc<StorageError>),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Why a drone stopped before the end of its moves.
///
#[derive(Debug, Error)]
pub enum DroneError {
    #[error("drone {0}: can't find nearby stations: {1}")]
    StationLookup(DroneId, #[source] StorageError),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("can't get drone IDs: {0}")]
    DroneIds(#[source] StorageError),
}

#[derive(Debug, Error)]
pub enum CutoverError {
    #[error("bad cutover time {0:?}, expected HH:MM")]
    BadTime(String),
}
