//! File-based storage.
//!
//! Everything lives in one directory:
//!
//! - `tube.csv` holds the stations as `title,lat,lon`
//! - `<id>.csv` holds the moves of drone `id` as `id,lat,lon,"YYYY-MM-DD HH:MM:SS"` (UTC)
//!
//! No header line in either.  Stations are read on first use and kept (or the error is) until
//! the storage is dropped.
//!

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use crate::storage::nearby_stations;
use crate::{DroneId, DroneMove, NearbyStations, Position, Station, Storage, StorageError};

/// Stations file name
pub const STATIONS_FILE: &str = "tube.csv";

/// How moves are timestamped
const DATE_FMT: &str = "%Y-%m-%d %H:%M:%S";

type Stations = Result<Arc<Vec<Station>>, Arc<StorageError>>;

#[derive(Debug, Deserialize)]
struct StationRecord {
    title: String,
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct MoveRecord {
    drone: DroneId,
    lat: f64,
    lon: f64,
    time: String,
}

#[derive(Debug)]
pub struct CsvStorage {
    /// Where the files are
    datadir: PathBuf,
    /// Fixed list of drones, otherwise look into `datadir`
    drones: Option<Vec<DroneId>>,
    /// Loaded once
    stations: OnceCell<Stations>,
}

impl CsvStorage {
    #[tracing::instrument]
    pub fn new(datadir: &Path) -> Self {
        Self {
            datadir: datadir.to_path_buf(),
            drones: None,
            stations: OnceCell::new(),
        }
    }

    /// Restrict ourselves to these drones instead of everything in the directory.
    ///
    pub fn with_drones(mut self, drones: &[DroneId]) -> Self {
        self.drones = Some(drones.to_vec());
        self
    }

    pub fn datadir(&self) -> &Path {
        &self.datadir
    }

    /// Read one whole file.
    ///
    async fn read(path: &Path) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(path)
            .await
            .map_err(|e| StorageError::Open(path.to_path_buf(), e))
    }

    #[tracing::instrument(skip(self))]
    async fn load_stations(&self) -> Result<Vec<Station>, StorageError> {
        let path = self.datadir.join(STATIONS_FILE);
        trace!("Loading stations from {path:?}");

        let data = Self::read(&path).await?;
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .trim(Trim::All)
            .from_reader(data.as_slice());

        let stations = rdr
            .deserialize::<StationRecord>()
            .map(|rec| {
                rec.map(|rec| Station {
                    title: rec.title,
                    position: Position::new(rec.lat, rec.lon),
                })
                .map_err(|e| StorageError::Parse(path.clone(), e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!("{} stations loaded", stations.len());
        Ok(stations)
    }

    /// Every `<number>.csv` in the data directory.
    ///
    #[tracing::instrument(skip(self))]
    async fn scan_drones(&self) -> Result<Vec<DroneId>, StorageError> {
        let mut dir = tokio::fs::read_dir(&self.datadir)
            .await
            .map_err(|e| StorageError::ReadDir(self.datadir.clone(), e))?;

        let mut ids = vec![];
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StorageError::ReadDir(self.datadir.clone(), e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(id) = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.parse::<DroneId>().ok())
                {
                    ids.push(id);
                }
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

#[async_trait]
impl Storage for CsvStorage {
    #[tracing::instrument(skip(self))]
    async fn drone_ids(&self) -> Result<Vec<DroneId>, StorageError> {
        match &self.drones {
            Some(ids) => Ok(ids.clone()),
            None => self.scan_drones().await,
        }
    }

    #[tracing::instrument(skip(self))]
    async fn drone_moves(&self, id: DroneId) -> Result<Vec<DroneMove>, StorageError> {
        let path = self.datadir.join(format!("{id}.csv"));
        trace!("Loading moves from {path:?}");

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::UnknownDrone(id)),
            Err(e) => return Err(StorageError::Open(path, e)),
        };

        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .trim(Trim::All)
            .from_reader(data.as_slice());

        let mut moves = vec![];
        for rec in rdr.deserialize::<MoveRecord>() {
            let rec = rec.map_err(|e| StorageError::Parse(path.clone(), e))?;
            let timestamp = NaiveDateTime::parse_from_str(&rec.time, DATE_FMT)
                .map_err(|e| StorageError::BadTimestamp(rec.time.clone(), e))?
                .and_utc();

            moves.push(DroneMove {
                drone: rec.drone,
                position: Position::new(rec.lat, rec.lon),
                timestamp,
            });
        }
        debug!("drone {id}: {} moves", moves.len());
        Ok(moves)
    }

    #[tracing::instrument(skip(self))]
    async fn stations(&self) -> Result<Arc<Vec<Station>>, StorageError> {
        self.stations
            .get_or_init(|| async { self.load_stations().await.map(Arc::new).map_err(Arc::new) })
            .await
            .clone()
            .map_err(StorageError::Stations)
    }
}

#[async_trait]
impl NearbyStations for CsvStorage {
    #[tracing::instrument(skip(self))]
    async fn find_nearby_stations(&self, pos: Position) -> Result<Vec<Station>, StorageError> {
        let stations = self.stations().await?;
        Ok(nearby_stations(&stations, pos))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::{TimeZone, Utc};
    use eyre::Result;
    use rstest::*;
    use tempfile::{tempdir, TempDir};

    use super::*;

    const TUBE: &str = r##"Acton Town,51.503071,-0.280303
Aldgate,51.514342,-0.075627
Aldgate East,51.51503,-0.073162
"##;

    const MOVES: &str = r##"6043,51.474579,-0.171834,"2011-03-22 07:47:55"
6043,51.474564,-0.171834,"2011-03-22 07:48:01"
6043,51.474606,-0.171708,"2011-03-22 07:48:07"
"##;

    #[fixture]
    fn datadir() -> TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(STATIONS_FILE), TUBE).unwrap();
        fs::write(dir.path().join("6043.csv"), MOVES).unwrap();
        fs::write(dir.path().join("5937.csv"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "nope").unwrap();
        dir
    }

    #[rstest]
    #[tokio::test]
    async fn test_stations(datadir: TempDir) -> Result<()> {
        let store = CsvStorage::new(datadir.path());

        let stations = store.stations().await?;
        assert_eq!(3, stations.len());

        let expected = Station {
            title: "Acton Town".to_string(),
            position: Position::new(51.503071, -0.280303),
        };
        assert_eq!(expected, stations[0]);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_stations_loaded_once(datadir: TempDir) -> Result<()> {
        let store = CsvStorage::new(datadir.path());

        let first = store.stations().await?;
        fs::remove_file(datadir.path().join(STATIONS_FILE))?;
        let second = store.stations().await?;
        assert!(Arc::ptr_eq(&first, &second));
        Ok(())
    }

    #[tokio::test]
    async fn test_stations_error_is_cached() -> Result<()> {
        let dir = tempdir()?;
        let store = CsvStorage::new(dir.path());

        assert!(store.stations().await.is_err());

        // Even once the file is there, the first failure stays.
        fs::write(dir.path().join(STATIONS_FILE), TUBE)?;
        let err = store.stations().await.unwrap_err();
        assert!(matches!(err, StorageError::Stations(_)));
        assert!(store.find_nearby_stations(Position::new(51.503071, -0.280303)).await.is_err());
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_stations_concurrent_first_use(datadir: TempDir) -> Result<()> {
        let store = Arc::new(CsvStorage::new(datadir.path()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.stations().await })
            })
            .collect();

        let mut all = vec![];
        for h in handles {
            all.push(h.await??);
        }
        assert!(all.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_drone_moves_known(datadir: TempDir) -> Result<()> {
        let store = CsvStorage::new(datadir.path());

        let moves = store.drone_moves(6043).await?;
        assert_eq!(3, moves.len());

        let expected = DroneMove {
            drone: 6043,
            position: Position::new(51.474579, -0.171834),
            timestamp: Utc.with_ymd_and_hms(2011, 3, 22, 7, 47, 55).unwrap(),
        };
        assert_eq!(expected, moves[0]);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_drone_moves_unknown(datadir: TempDir) {
        let store = CsvStorage::new(datadir.path());

        let res = store.drone_moves(128).await;
        assert!(matches!(res, Err(StorageError::UnknownDrone(128))));
    }

    #[tokio::test]
    async fn test_drone_moves_bad_time() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("1.csv"), "1,51.0,-0.1,\"22/03/2011 07:47\"\n")?;
        let store = CsvStorage::new(dir.path());

        let res = store.drone_moves(1).await;
        assert!(matches!(res, Err(StorageError::BadTimestamp(..))));
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_drone_ids_scan(datadir: TempDir) -> Result<()> {
        let store = CsvStorage::new(datadir.path());

        assert_eq!(vec![5937, 6043], store.drone_ids().await?);
        Ok(())
    }

    #[rstest]
    #[tokio::test]
    async fn test_drone_ids_fixed(datadir: TempDir) -> Result<()> {
        let store = CsvStorage::new(datadir.path()).with_drones(&[6043, 42]);

        assert_eq!(vec![6043, 42], store.drone_ids().await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_drone_ids_no_dir() {
        let store = CsvStorage::new(Path::new("/nonexistent/simdrone"));

        assert!(matches!(store.drone_ids().await, Err(StorageError::ReadDir(..))));
    }

    #[rstest]
    #[case((51.503071, -0.280303), vec!["Acton Town"])]
    #[case((51.5147, -0.0745), vec!["Aldgate", "Aldgate East"])]
    #[case((51.474579, -0.171834), vec![])]
    #[tokio::test]
    async fn test_find_nearby_stations(
        datadir: TempDir,
        #[case] pos: (f64, f64),
        #[case] expected: Vec<&str>,
    ) -> Result<()> {
        let store = CsvStorage::new(datadir.path());

        let found = store.find_nearby_stations(Position::new(pos.0, pos.1)).await?;
        let names: Vec<_> = found.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(expected, names);
        Ok(())
    }
}
