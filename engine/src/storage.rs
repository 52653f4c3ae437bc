//! Storage contract.
//!
//! The dispatcher needs drone IDs and their moves, drones only need to know which stations are
//! around them.  Both are traits so that the simulation does not care where the data lives.
//!

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

pub use csvstore::*;

use crate::distance::is_nearby;
use crate::{DroneId, DroneMove, Position, Station, StorageError};

mod csvstore;

/// What the dispatcher reads from.
///
#[async_trait]
pub trait Storage: Debug + Send + Sync {
    /// All drones we have moves for.
    async fn drone_ids(&self) -> Result<Vec<DroneId>, StorageError>;
    /// Full ordered history of one drone, error if the drone is unknown.
    async fn drone_moves(&self, id: DroneId) -> Result<Vec<DroneMove>, StorageError>;
    /// All stations, loaded only once.
    async fn stations(&self) -> Result<Arc<Vec<Station>>, StorageError>;
}

/// What a drone asks about its surroundings.
///
#[async_trait]
pub trait NearbyStations: Debug + Send + Sync {
    /// Every station within `NEARBY_DISTANCE` of `pos`, empty if none.
    async fn find_nearby_stations(&self, pos: Position) -> Result<Vec<Station>, StorageError>;
}

/// Filter `stations` keeping the ones close to `pos`.
///
pub fn nearby_stations(stations: &[Station], pos: Position) -> Vec<Station> {
    stations
        .iter()
        .filter(|s| is_nearby(s.position, pos))
        .cloned()
        .collect()
}
