//! Basic types shared by the storage, the drones and the dispatcher.
//!

use chrono::{DateTime, Utc};
use rand::distr::{Distribution, StandardUniform};
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, VariantNames};

/// Drones are known by their number.
///
pub type DroneId = i64;

/// A point on the globe, in degrees.
///
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Same position, in radians.
    ///
    #[inline]
    pub fn to_radians(self) -> Self {
        Self {
            lat: self.lat.to_radians(),
            lon: self.lon.to_radians(),
        }
    }
}

/// A tube station, our points of interest.
///
#[derive(Clone, Debug, PartialEq)]
pub struct Station {
    pub title: String,
    pub position: Position,
}

/// One recorded move of a drone.
///
#[derive(Clone, Debug, PartialEq)]
pub struct DroneMove {
    pub drone: DroneId,
    pub position: Position,
    pub timestamp: DateTime<Utc>,
}

/// Purely cosmetic, picked at random for every report.
///
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    strum::Display,
    EnumIter,
    EnumString,
    VariantNames,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TrafficCondition {
    Light,
    Moderate,
    Heavy,
}

impl Distribution<TrafficCondition> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> TrafficCondition {
        match rng.random_range(0..3) {
            0 => TrafficCondition::Light,
            1 => TrafficCondition::Moderate,
            _ => TrafficCondition::Heavy,
        }
    }
}
