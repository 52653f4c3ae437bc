//! Small HTTP endpoint to look at a running replay.
//!
//! `GET /status` returns a JSON object with our name, version, pid and how many feeders and
//! drones are still running.
//!

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use simdrone_engine::Dispatcher;

use crate::{NAME, VERSION};

pub fn router(disp: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .with_state(disp)
}

async fn status_handler(State(disp): State<Arc<Dispatcher>>) -> Json<Value> {
    Json(json!({
        "name": NAME,
        "version": VERSION,
        "pid": std::process::id(),
        "live_tasks": disp.live_tasks(),
        "cancelled": disp.is_cancelled(),
    }))
}

/// Serve until `shutdown` is cancelled.
///
/// Not being able to listen only costs us the endpoint, the replay goes on.
///
#[tracing::instrument(skip(disp, shutdown))]
pub async fn serve(addr: SocketAddr, disp: Arc<Dispatcher>, shutdown: CancellationToken) {
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!("no diagnostics, can not listen on {addr}: {e}");
            return;
        }
    };
    info!("diagnostics on http://{addr}/status");

    let res = axum::serve(listener, router(disp))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;
    if let Err(e) = res {
        warn!("diagnostics: {e}");
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use simdrone_engine::CsvStorage;

    use super::*;

    #[tokio::test]
    async fn test_status_handler() {
        let store = Arc::new(CsvStorage::new(std::path::Path::new("/nonexistent")));
        let (tx, _rx) = mpsc::channel(1);
        let disp = Arc::new(Dispatcher::new(store.clone(), store, tx));

        let Json(v) = status_handler(State(disp.clone())).await;
        assert_eq!(NAME, v["name"]);
        assert_eq!(std::process::id(), v["pid"].as_u64().unwrap() as u32);
        assert_eq!(0, v["live_tasks"]);
        assert_eq!(false, v["cancelled"]);

        disp.close().await.unwrap();
        let Json(v) = status_handler(State(disp)).await;
        assert_eq!(true, v["cancelled"]);
    }
}
