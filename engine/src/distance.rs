//! Great-circle distance between two positions.
//!
//! Used both for the speed of a drone and to know whether it is close to a station, so both
//! agree on what a meter is.
//!

use crate::Position;

/// Earth radius in meters
const R: f64 = 6_371_000.0;

/// Anything closer than this (in meters) is considered near a station.
pub const NEARBY_DISTANCE: f64 = 350.0;

/// Haversine distance in meters between `p1` and `p2` (both in degrees).
///
pub fn between(p1: Position, p2: Position) -> f64 {
    let p1 = p1.to_radians();
    let p2 = p2.to_radians();

    let d_lat = p2.lat - p1.lat;
    let d_lon = p2.lon - p1.lon;

    let a = (d_lat / 2.0).sin().powi(2) + p1.lat.cos() * p2.lat.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    R * c
}

/// Is `p` within `NEARBY_DISTANCE` of `station`?
///
#[inline]
pub fn is_nearby(station: Position, p: Position) -> bool {
    between(station, p) < NEARBY_DISTANCE
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[inline]
    fn shorten(v: f64) -> String {
        format!("{:.3}", v)
    }

    #[test_pretty_log::test]
    fn test_between_known() {
        let p1 = Position::new(51.476105, -0.100224);
        let p2 = Position::new(51.475967, -0.100368);

        assert_eq!("18.301", shorten(between(p1, p2)));
    }

    #[rstest]
    #[case((51.476105, -0.100224), (51.475967, -0.100368))]
    #[case((51.503071, -0.280303), (51.474579, -0.171834))]
    #[case((48.573174, 2.319671), (48.566757, 2.303015))]
    #[case((-33.8688, 151.2093), (40.7128, -74.0060))]
    fn test_between_symmetric(#[case] a: (f64, f64), #[case] b: (f64, f64)) {
        let a = Position::new(a.0, a.1);
        let b = Position::new(b.0, b.1);

        assert_eq!(between(a, b), between(b, a));
        assert_eq!(0.0, between(a, a));
        assert_eq!(0.0, between(b, b));
    }

    #[test_pretty_log::test]
    fn test_between_one_degree_lat() {
        // One degree of latitude is R * PI / 180
        let d = between(Position::new(0., 0.), Position::new(1., 0.));
        assert_eq!(shorten(R * std::f64::consts::PI / 180.), shorten(d));
    }

    #[rstest]
    #[case((51.503071, -0.280303), true)]
    #[case((51.504, -0.280303), true)]
    #[case((51.51, -0.280303), false)]
    fn test_is_nearby(#[case] p: (f64, f64), #[case] nearby: bool) {
        let acton = Position::new(51.503071, -0.280303);
        assert_eq!(nearby, is_nearby(acton, Position::new(p.0, p.1)));
    }
}
