use std::path::Path;

use eyre::Result;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::{trace, warn};

use simdrone_engine::{CsvStorage, DroneId, Storage};

/// Table of all known stations.
///
#[tracing::instrument]
pub async fn list_stations(datadir: &Path) -> Result<String> {
    let store = CsvStorage::new(datadir);
    let stations = store.stations().await?;

    let mut builder = Builder::default();
    builder.push_record(["Station", "Lat/Lon"]);

    stations.iter().for_each(|st| {
        let point = format!("{:.6}, {:.6}", st.position.lat, st.position.lon);
        builder.push_record([st.title.clone(), point]);
    });

    let allf = builder.build().with(Style::modern()).to_string();
    Ok(format!("List all stations ({}):\n{allf}", stations.len()))
}

/// Table of drones with how many moves each has and over which period.
///
/// A drone without readable moves is listed anyway.
///
#[tracing::instrument]
pub async fn list_drones(datadir: &Path, drones: &[DroneId]) -> Result<String> {
    let mut store = CsvStorage::new(datadir);
    if !drones.is_empty() {
        store = store.with_drones(drones);
    }
    let ids = store.drone_ids().await?;
    trace!("{} drones", ids.len());

    let mut builder = Builder::default();
    builder.push_record(["Drone", "Moves", "First", "Last"]);

    for id in &ids {
        let row = match store.drone_moves(*id).await {
            Ok(moves) => {
                let first = moves.first().map(|m| m.timestamp.to_string());
                let last = moves.last().map(|m| m.timestamp.to_string());
                [
                    id.to_string(),
                    moves.len().to_string(),
                    first.unwrap_or_default(),
                    last.unwrap_or_default(),
                ]
            }
            Err(e) => {
                warn!("drone {id}: {e}");
                [id.to_string(), "-".to_string(), e.to_string(), String::new()]
            }
        };
        builder.push_record(row);
    }

    let allf = builder.build().with(Style::modern()).to_string();
    Ok(format!("List all drones ({}):\n{allf}", ids.len()))
}
