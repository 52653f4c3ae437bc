//! Replay engine for recorded drone moves.
//!
//! The `Dispatcher` gets drone IDs and moves from a `Storage`, runs one `Drone` per ID and
//! collects `Telemetry` whenever a drone flies close to a station.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use simdrone_engine::{CsvStorage, Dispatcher};
//! use tokio::sync::mpsc;
//!
//! # async fn replay() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(CsvStorage::new(Path::new("data")));
//! let (tx, mut rx) = mpsc::channel(100);
//!
//! let disp = Dispatcher::new(store.clone(), store, tx);
//! disp.start().await?;
//!
//! tokio::spawn(async move {
//!     while let Some(t) = rx.recv().await {
//!         println!("{t}");
//!     }
//! });
//! disp.wait().await;
//! disp.close().await?;
//! # Ok(())
//! # }
//! ```
//!

mod cutover;
mod dispatcher;
mod drone;
mod error;
mod storage;
mod telemetry;
mod types;

pub mod distance;

pub use cutover::*;
pub use dispatcher::*;
pub use drone::*;
pub use error::*;
pub use storage::*;
pub use telemetry::*;
pub use types::*;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version() -> String {
    format!("{}/{}", NAME, VERSION)
}
