//! Synchronized cutover, off unless asked for.
//!
//! All feeders offer the timestamp of every move they push to a single watcher.  The first
//! time one of them reaches the cutover time of day (hour and minute), the watcher cancels the
//! whole dispatcher, stopping every drone at about the same simulated time.
//!
//! Feeders never wait for the watcher: if its queue is full, the timestamp is skipped.
//!

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::CutoverError;

/// Room for timestamps not yet looked at.
const WATCHER_QUEUE: usize = 64;

/// Time of day at which everything stops.
///
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cutover {
    at: NaiveTime,
}

impl Cutover {
    pub fn new(hour: u32, minute: u32) -> Result<Self, CutoverError> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(|at| Self { at })
            .ok_or_else(|| CutoverError::BadTime(format!("{hour:02}:{minute:02}")))
    }

    /// Same hour and minute, seconds are ignored.
    ///
    pub fn reached(&self, ts: &DateTime<Utc>) -> bool {
        ts.hour() == self.at.hour() && ts.minute() == self.at.minute()
    }

    /// Start the watcher, feeders get a clone of the returned sender.
    ///
    /// The watcher stops on cancellation, on cutover or once every sender is gone.
    ///
    pub(crate) fn watch(
        self,
        tracker: &TaskTracker,
        cancel: CancellationToken,
    ) -> mpsc::Sender<DateTime<Utc>> {
        let (tx, mut rx) = mpsc::channel::<DateTime<Utc>>(WATCHER_QUEUE);

        tracker.spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    ts = rx.recv() => match ts {
                        Some(ts) if self.reached(&ts) => {
                            info!("cutover reached at {ts}, stopping all drones");
                            cancel.cancel();
                            break;
                        }
                        Some(_) => (),
                        None => break,
                    },
                }
            }
            debug!("watcher done");
        });
        tx
    }
}

impl FromStr for Cutover {
    type Err = CutoverError;

    /// `HH:MM`
    ///
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(|at| Self { at })
            .map_err(|_| CutoverError::BadTime(s.to_string()))
    }
}

impl Display for Cutover {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.at.format("%H:%M"))
    }
}
