//! Great-circle math on a spherical Earth.
//!
//! Inputs are assumed to satisfy the [`Coordinate`] range invariant; nothing here
//! can fail.

use crate::models::Coordinate;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two coordinates, in meters.
///
/// Identical inputs give exactly `0.0`, and swapping the arguments gives the same
/// result.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let sin_lat = (d_lat / 2.0).sin();
    let sin_lon = (d_lon / 2.0).sin();
    let h = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lon * sin_lon;

    // Rounding can push h a hair past 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Forward azimuth from `from` toward `to`, in degrees clockwise from true north,
/// normalized to `[0, 360)`.
///
/// Returns `0.0` for identical points.
pub fn initial_bearing_degrees(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();
    if x == 0.0 && y == 0.0 {
        return 0.0;
    }

    let bearing = y.atan2(x).to_degrees();
    (bearing + 360.0) % 360.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate {
            latitude,
            longitude,
        }
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let points = [
            coord(0.0, 0.0),
            coord(90.0, 180.0),
            coord(-90.0, -180.0),
            coord(48.858_37, 2.294_481),
            coord(-33.856_78, 151.215_29),
        ];
        for p in points {
            assert_eq!(distance_meters(p, p), 0.0);
        }
    }

    #[test]
    fn test_distance_is_symmetric() {
        let pairs = [
            (coord(52.52, 13.405), coord(48.8566, 2.3522)),
            (coord(-10.0, 170.0), coord(12.0, -175.0)),
            (coord(0.0, 0.0), coord(0.0009, 0.0)),
        ];
        for (a, b) in pairs {
            let ab = distance_meters(a, b);
            let ba = distance_meters(b, a);
            assert!((ab - ba).abs() < 1e-6, "{ab} vs {ba}");
            assert!(ab >= 0.0);
        }
    }

    #[test]
    fn test_hundred_meter_latitude_offset() {
        let a = coord(40.0, -74.0);
        let b = coord(40.0009, -74.0);
        let d = distance_meters(a, b);
        assert!(d > 95.0 && d < 115.0, "got {d}");
    }

    #[test]
    fn test_distance_grows_with_separation() {
        let origin = coord(10.0, 10.0);
        let mut previous = 0.0;
        for step in 1..50 {
            let d = distance_meters(origin, coord(10.0 + step as f64 * 0.0001, 10.0));
            assert!(d > previous);
            previous = d;
        }
    }

    #[test]
    fn test_known_city_distance() {
        // London to Paris, roughly 343.5 km on the mean sphere.
        let d = distance_meters(coord(51.5074, -0.1278), coord(48.8566, 2.3522));
        assert!((d - 343_500.0).abs() < 2_000.0, "got {d}");
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = coord(0.0, 0.0);
        assert!((initial_bearing_degrees(origin, coord(1.0, 0.0)) - 0.0).abs() < 1e-9);
        assert!((initial_bearing_degrees(origin, coord(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((initial_bearing_degrees(origin, coord(-1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((initial_bearing_degrees(origin, coord(0.0, -1.0)) - 270.0).abs() < 1e-9);
        assert_eq!(initial_bearing_degrees(origin, origin), 0.0);
    }
}
