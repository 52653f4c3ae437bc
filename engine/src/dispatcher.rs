//! The `Dispatcher` starts one `Drone` per known drone and feeds it its moves.
//!
//! For every drone there are two tasks:
//!
//! - a feeder pushing the recorded moves, in order, into a small bounded queue
//! - the drone itself, consuming that queue
//!
//! A slow drone only ever slows down its own feeder.  Everything shares one cancellation token
//! and one task tracker, `close()` cancels the former and waits on the latter.  Failures of a
//! single drone (no moves, failed station lookup) are logged and do not concern the others.
//!

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace};

use crate::{
    Cutover, DispatchError, Drone, DroneId, DroneMove, NearbyStations, Storage, Telemetry,
    PACING,
};

/// Default size of the queue between a feeder and its drone.
pub const QUEUE_CAPACITY: usize = 10;

#[derive(Debug)]
pub struct Dispatcher {
    storage: Arc<dyn Storage>,
    nearby: Arc<dyn NearbyStations>,
    /// Where drones send their reports
    out: mpsc::Sender<Telemetry>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    capacity: usize,
    pacing: u32,
    seed: Option<u64>,
    cutover: Option<Cutover>,
}

impl Dispatcher {
    pub fn new(
        storage: Arc<dyn Storage>,
        nearby: Arc<dyn NearbyStations>,
        out: mpsc::Sender<Telemetry>,
    ) -> Self {
        Self {
            storage,
            nearby,
            out,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            capacity: QUEUE_CAPACITY,
            pacing: PACING as u32,
            seed: None,
            cutover: None,
        }
    }

    /// Size of every drone queue, at least 1.
    ///
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Make traffic conditions reproducible, each drone derives its own seed from this one.
    ///
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_pacing(mut self, pacing: u32) -> Self {
        self.pacing = pacing;
        self
    }

    /// Stop everything once any drone reaches this time of day.
    ///
    pub fn with_cutover(mut self, cutover: Cutover) -> Self {
        self.cutover = Some(cutover);
        self
    }

    /// Number of feeders and drones still running.
    ///
    pub fn live_tasks(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Get the list of drones and launch each of them.
    ///
    /// Only failing to get the drone list is an error, it returns as soon as every drone has
    /// been handed out.
    ///
    #[tracing::instrument(skip(self))]
    pub async fn start(&self) -> Result<(), DispatchError> {
        let ids = self
            .storage
            .drone_ids()
            .await
            .map_err(DispatchError::DroneIds)?;
        info!("dispatching {} drones", ids.len());

        let watcher = self
            .cutover
            .map(|c| c.watch(&self.tracker, self.cancel.clone()));

        for id in ids {
            let launch = Launch {
                id,
                storage: self.storage.clone(),
                nearby: self.nearby.clone(),
                out: self.out.clone(),
                cancel: self.cancel.clone(),
                tracker: self.tracker.clone(),
                capacity: self.capacity,
                pacing: self.pacing,
                seed: self.seed.map(|s| s.wrapping_add(id as u64)),
                watcher: watcher.clone(),
            };
            self.tracker.spawn(launch.run());
        }

        // No new drones from now on, `wait()` can finish once they are all done.
        self.tracker.close();
        Ok(())
    }

    /// Wait for all drones to finish on their own.
    ///
    #[tracing::instrument(skip(self))]
    pub async fn wait(&self) {
        self.tracker.wait().await;
        debug!("all drones finished");
    }

    /// Stop every feeder and drone and wait for them.
    ///
    /// There is no timeout here, callers wanting one should wrap this.
    ///
    #[tracing::instrument(skip(self))]
    pub async fn close(&self) -> Result<(), DispatchError> {
        info!("closing, {} tasks left", self.tracker.len());
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("closed");
        Ok(())
    }
}

/// Everything needed to start one drone.
///
#[derive(Debug)]
struct Launch {
    id: DroneId,
    storage: Arc<dyn Storage>,
    nearby: Arc<dyn NearbyStations>,
    out: mpsc::Sender<Telemetry>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    capacity: usize,
    pacing: u32,
    seed: Option<u64>,
    watcher: Option<mpsc::Sender<DateTime<Utc>>>,
}

impl Launch {
    #[tracing::instrument(skip(self), fields(drone = self.id))]
    async fn run(self) {
        let res = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            res = self.storage.drone_moves(self.id) => res,
        };
        let moves = match res {
            Ok(moves) => moves,
            Err(e) => {
                error!("can't start drone {}: {e}", self.id);
                return;
            }
        };

        let (tx, rx) = mpsc::channel(self.capacity);
        self.tracker
            .spawn(feed(self.id, moves, tx, self.cancel.clone(), self.watcher));

        info!("start drone {}", self.id);
        let mut drone = Drone::new(self.id, self.nearby, self.out).with_pacing(self.pacing);
        if let Some(seed) = self.seed {
            drone = drone.with_seed(seed);
        }
        match drone.run(rx, self.cancel).await {
            Ok(()) => debug!("drone {} done", self.id),
            Err(e) => error!("drone {} failed: {e}", self.id),
        }
    }
}

/// Push `moves` into the drone queue, in order.
///
/// Dropping `tx` on the way out is what closes the queue.  When the queue is full we wait for
/// either room or cancellation, moves not yet pushed at that point are dropped.
///
#[tracing::instrument(skip(moves, tx, cancel, watcher))]
async fn feed(
    id: DroneId,
    moves: Vec<DroneMove>,
    tx: mpsc::Sender<DroneMove>,
    cancel: CancellationToken,
    watcher: Option<mpsc::Sender<DateTime<Utc>>>,
) {
    let total = moves.len();
    let mut sent = 0;

    for next in moves {
        if cancel.is_cancelled() {
            break;
        }
        if let Some(watcher) = &watcher {
            let _ = watcher.try_send(next.timestamp);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            res = tx.send(next) => {
                if res.is_err() {
                    // Drone is gone
                    break;
                }
            }
        }
        sent += 1;
    }
    trace!("feeder {id}: {sent}/{total} moves sent");
}
