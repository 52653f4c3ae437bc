use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Status {
    #[error("Data directory {0:?} does not exist")]
    MissingDataDir(PathBuf),
    #[error("Bad cutover in configuration: {0}")]
    BadCutover(String),
    #[error("Can not install signal handler: {0}")]
    SignalHandler(String),
    #[error("Shutdown timed out after {0}s")]
    ShutdownTimeout(u64),
}
