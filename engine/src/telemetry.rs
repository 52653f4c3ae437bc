//! What a drone reports when it passes close to a station.
//!

use std::fmt::{Display, Formatter};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{DroneId, TrafficCondition};

/// One line of output.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Telemetry {
    pub drone: DroneId,
    pub timestamp: DateTime<Utc>,
    /// Meters per second
    pub speed: f64,
    pub condition: TrafficCondition,
}

impl Display for Telemetry {
    /// `<drone> <RFC3339 timestamp> <speed> <traffic condition>`
    ///
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {:.3} {}",
            self.drone,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.speed,
            self.condition
        )
    }
}
