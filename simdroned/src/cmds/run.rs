//! The `run` command, replay every drone until we get a signal.
//!
//! With `--exit-when-done` we also stop once every drone is finished.
//!

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use eyre::Result;
use tokio::io::{self, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use simdrone_engine::{CsvStorage, Dispatcher, Telemetry};

use crate::config::Settings;
use crate::diag;
use crate::error::Status;

/// Reports waiting to be printed
const OUTPUT_QUEUE: usize = 64;

/// Replay everything found in `datadir`.
///
/// Only a failure to start is returned as an error, a shutdown running over its deadline is
/// logged and the remaining tasks are left behind.
///
#[tracing::instrument(skip(settings))]
pub async fn replay(datadir: &Path, settings: Settings) -> Result<()> {
    trace!("settings = {settings:?}");

    let mut store = CsvStorage::new(datadir);
    if !settings.drones.is_empty() {
        store = store.with_drones(&settings.drones);
    }
    let store = Arc::new(store);

    let (tx, rx) = mpsc::channel(OUTPUT_QUEUE);
    let printer = tokio::spawn(print_telemetry(rx));

    let mut disp = Dispatcher::new(store.clone(), store, tx)
        .with_capacity(settings.capacity)
        .with_pacing(settings.pacing);
    if let Some(seed) = settings.seed {
        disp = disp.with_seed(seed);
    }
    if let Some(cutover) = settings.cutover {
        info!("cutover at {cutover}");
        disp = disp.with_cutover(cutover);
    }
    let disp = Arc::new(disp);

    // Ctrl-C and SIGTERM both end up here.
    //
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("signal received");
        token.cancel();
    })
    .map_err(|e| Status::SignalHandler(e.to_string()))?;

    let diag = settings
        .diag
        .map(|addr| tokio::spawn(diag::serve(addr, disp.clone(), shutdown.clone())));

    if let Err(e) = disp.start().await {
        error!("can not start: {e}");
        shutdown.cancel();
        stop_diag(diag).await;
        printer.abort();
        return Err(e.into());
    }

    tokio::select! {
        _ = shutdown.cancelled() => info!("shutdown requested"),
        _ = disp.wait(), if settings.exit_when_done => info!("every drone is done"),
    }
    shutdown.cancel();

    match close_app(&disp, settings.timeout).await {
        Ok(()) => {
            stop_diag(diag).await;

            // Drones are gone, this was the last sender.
            drop(disp);
            match printer.await {
                Ok(count) => info!("{count} reports"),
                Err(e) => warn!("printer: {e}"),
            }
        }
        Err(e) => {
            error!("{e}");
            printer.abort();
            stop_diag(diag).await;
        }
    }
    Ok(())
}

/// Close the dispatcher, giving up after `deadline`.
///
#[tracing::instrument(skip(disp))]
pub async fn close_app(disp: &Dispatcher, deadline: Duration) -> Result<(), Status> {
    match timeout(deadline, disp.close()).await {
        Ok(res) => {
            if let Err(e) = res {
                warn!("close: {e}");
            }
            info!("clean shutdown");
            Ok(())
        }
        Err(_) => Err(Status::ShutdownTimeout(deadline.as_secs())),
    }
}

async fn stop_diag(diag: Option<JoinHandle<()>>) {
    if let Some(diag) = diag {
        if let Err(e) = diag.await {
            warn!("diagnostics: {e}");
        }
    }
}

/// Write every report on stdout, one per line.
///
/// Stops at the first write error (closed pipe mostly).
///
async fn print_telemetry(mut rx: mpsc::Receiver<Telemetry>) -> usize {
    let mut out = io::stdout();
    let mut count = 0;
    while let Some(t) = rx.recv().await {
        let line = format!("{t}\n");
        let res = match out.write_all(line.as_bytes()).await {
            Ok(()) => out.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = res {
            error!("stdout: {e}");
            break;
        }
        count += 1;
    }
    debug!("printer done");
    count
}

#[cfg(test)]
mod tests {
    use std::fs;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use simdrone_engine::{NearbyStations, Position, Station, StorageError};

    use super::*;

    /// Lookups never come back.
    #[derive(Debug)]
    struct Stuck;

    #[async_trait]
    impl NearbyStations for Stuck {
        async fn find_nearby_stations(
            &self,
            _pos: Position,
        ) -> Result<Vec<Station>, StorageError> {
            std::future::pending().await
        }
    }

    fn dispatcher(dir: &Path) -> (Dispatcher, mpsc::Receiver<Telemetry>) {
        let store = Arc::new(CsvStorage::new(dir));
        let (tx, rx) = mpsc::channel(10);
        (Dispatcher::new(store, Arc::new(Stuck), tx), rx)
    }

    #[tokio::test]
    async fn test_close_app_times_out() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("1.csv"),
            "1,51.485743,-0.124204,\"2011-03-22 07:55:26\"\n1,51.485800,-0.124100,\"2011-03-22 07:55:27\"\n",
        )
        .unwrap();
        let (disp, _rx) = dispatcher(dir.path());

        disp.start().await.unwrap();

        // Second move, the drone is now waiting on its lookup.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let res = close_app(&disp, Duration::from_millis(200)).await;
        assert!(matches!(res, Err(Status::ShutdownTimeout(0))));
        assert!(disp.is_cancelled());
        assert!(disp.live_tasks() > 0);
    }

    #[tokio::test]
    async fn test_close_app_clean() {
        let dir = TempDir::new().unwrap();
        let (disp, _rx) = dispatcher(dir.path());

        disp.start().await.unwrap();
        assert!(close_app(&disp, Duration::from_secs(1)).await.is_ok());
        assert_eq!(0, disp.live_tasks());
    }
}
