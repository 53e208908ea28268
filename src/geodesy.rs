//! Great-circle distance on a spherical Earth

use crate::models::TrackPoint;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters between two coordinates in decimal degrees
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    if lat1 == lat2 && lon1 == lon2 {
        return 0.0;
    }

    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1.0 for antipodal points
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Distance in meters between two track points
pub fn distance(p1: &TrackPoint, p2: &TrackPoint) -> f64 {
    haversine_m(p1.lat, p1.lon, p2.lat, p2.lon)
}

/// Cumulative distance (meters) at every point, starting at 0
pub fn cumulative_distances(points: &[TrackPoint]) -> Vec<f64> {
    let mut total = 0.0;
    let mut out = Vec::with_capacity(points.len());

    for (i, point) in points.iter().enumerate() {
        if i > 0 {
            total += distance(&points[i - 1], point);
        }
        out.push(total);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_identical_points_are_zero() {
        let p = TrackPoint::new(46.5, 6.6);
        assert_eq!(distance(&p, &p), 0.0);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        // 1 degree along a meridian is R * pi / 180
        let d = haversine_m(0.0, 0.0, 1.0, 0.0);
        let expected = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        assert!((d - expected).abs() < 1e-6);
    }

    #[test]
    fn test_antipodal_points() {
        let d = haversine_m(0.0, 0.0, 0.0, 180.0);
        assert!((d - EARTH_RADIUS_M * std::f64::consts::PI).abs() < 1e-3);
    }

    #[test]
    fn test_cumulative_distances() {
        let points = vec![
            TrackPoint::new(0.0, 0.0),
            TrackPoint::new(0.0, 0.001),
            TrackPoint::new(0.0, 0.002),
        ];
        let cumulative = cumulative_distances(&points);
        assert_eq!(cumulative.len(), 3);
        assert_eq!(cumulative[0], 0.0);
        assert!((cumulative[2] - 2.0 * cumulative[1]).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn test_distance_is_symmetric_and_non_negative(
            lat1 in -89.0f64..89.0, lon1 in -179.0f64..179.0,
            lat2 in -89.0f64..89.0, lon2 in -179.0f64..179.0,
        ) {
            let forward = haversine_m(lat1, lon1, lat2, lon2);
            let backward = haversine_m(lat2, lon2, lat1, lon1);
            prop_assert!(forward >= 0.0);
            prop_assert!((forward - backward).abs() < 1e-6);
            prop_assert!(forward <= EARTH_RADIUS_M * std::f64::consts::PI + 1e-6);
        }
    }
}
