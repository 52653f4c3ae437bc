//! One simulated drone.
//!
//! A `Drone` consumes the moves of one drone in order, computes its speed between two moves
//! and reports it whenever it is close to a station.  Reports are delayed by a tenth of the
//! recorded flight time so that a replay looks like the real thing, only faster.
//!
//! The last move and the last speed are the only state and are owned by the drone, nothing is
//! shared with other drones.
//!

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{distance, DroneError, DroneId, DroneMove, NearbyStations, Telemetry, TrafficCondition};

/// Replay is this many times faster than the recording.
pub const PACING: i32 = 10;

/// Result of a move close to a station.
///
#[derive(Clone, Debug, PartialEq)]
pub struct MoveOutcome {
    /// Meters per second
    pub speed: f64,
    /// Time since the previous move
    pub flight: TimeDelta,
    pub timestamp: DateTime<Utc>,
    pub condition: TrafficCondition,
}

#[derive(Debug)]
pub struct Drone {
    id: DroneId,
    nearby: Arc<dyn NearbyStations>,
    last_move: Option<DroneMove>,
    speed: f64,
    rng: StdRng,
    out: Sender<Telemetry>,
    pacing: i32,
}

impl Drone {
    pub fn new(id: DroneId, nearby: Arc<dyn NearbyStations>, out: Sender<Telemetry>) -> Self {
        Self {
            id,
            nearby,
            last_move: None,
            speed: 0.0,
            rng: StdRng::from_os_rng(),
            out,
            pacing: PACING,
        }
    }

    /// Use a predictable random source for traffic conditions.
    ///
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Change the replay speed-up, 1 is real time.
    ///
    pub fn with_pacing(mut self, pacing: u32) -> Self {
        self.pacing = i32::try_from(pacing.max(1)).unwrap_or(i32::MAX);
        self
    }

    pub fn id(&self) -> DroneId {
        self.id
    }

    /// Last computed speed.
    ///
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Consume moves until there are none left or we are told to stop.
    ///
    /// Both are normal ends, only a failed station lookup is an error.
    ///
    #[tracing::instrument(skip(self, moves, cancel), fields(drone = self.id))]
    pub async fn run(
        &mut self,
        mut moves: Receiver<DroneMove>,
        cancel: CancellationToken,
    ) -> Result<(), DroneError> {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("cancelled");
                    return Ok(());
                }
                next = moves.recv() => next,
            };
            let Some(next) = next else {
                debug!("no more moves");
                return Ok(());
            };

            if let Some(outcome) = self.step(next).await? {
                if !self.emit(outcome, &cancel).await {
                    return Ok(());
                }
            }
        }
    }

    /// Process one move, `None` means nothing to report.
    ///
    #[tracing::instrument(skip(self), fields(drone = self.id))]
    pub async fn step(&mut self, next: DroneMove) -> Result<Option<MoveOutcome>, DroneError> {
        let Some(last) = self.last_move.replace(next.clone()) else {
            trace!("first move");
            return Ok(None);
        };

        let dist = distance::between(last.position, next.position);
        let flight = next.timestamp - last.timestamp;
        let secs = flight.num_seconds() as f64 + f64::from(flight.subsec_nanos()) * 1e-9;

        // Same timestamp, keep the previous speed.
        let speed = if secs == 0.0 { self.speed } else { dist / secs };
        self.speed = speed;

        let stations = self
            .nearby
            .find_nearby_stations(next.position)
            .await
            .map_err(|e| DroneError::StationLookup(self.id, e))?;
        if stations.is_empty() {
            trace!("in transit");
            return Ok(None);
        }
        trace!("near {}", stations[0].title);

        Ok(Some(MoveOutcome {
            speed,
            flight,
            timestamp: next.timestamp,
            condition: self.rng.random(),
        }))
    }

    /// Wait for the scaled flight time then report.  `false` means we should stop.
    ///
    async fn emit(&mut self, outcome: MoveOutcome, cancel: &CancellationToken) -> bool {
        // Negative flight time (unordered moves) is not paced.
        if let Ok(pause) = (outcome.flight / self.pacing).to_std() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("cancelled while pacing");
                    return false;
                }
                _ = sleep(pause) => (),
            }
        }

        let report = Telemetry {
            drone: self.id,
            timestamp: outcome.timestamp,
            speed: outcome.speed,
            condition: outcome.condition,
        };
        trace!("report {report}");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            res = self.out.send(report) => {
                if res.is_err() {
                    debug!("output closed");
                }
                res.is_ok()
            }
        }
    }
}
