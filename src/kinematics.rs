//! Distance, time and speed over an ordered point sequence
//!
//! Internal units are meters and seconds. Conversion to km and km/h happens
//! only when a [`Summary`] is assembled.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::KinematicsConfig;
use crate::geodesy;
use crate::models::{ElevationStats, Segment, SegmentType, Summary, TrackPoint};

/// Raw kinematic figures in SI units
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Kinematics {
    pub distance_m: f64,
    pub total_time_s: f64,
    pub moving_time_s: f64,
    pub avg_speed_ms: f64,
    pub max_speed_ms: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Seconds between two optional instants, if both are present
pub fn seconds_between(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Option<f64> {
    match (from, to) {
        (Some(a), Some(b)) => Some((b - a).num_milliseconds() as f64 / 1000.0),
        _ => None,
    }
}

/// Round meters to the micrometer and express them in kilometers
pub fn meters_to_km(meters: f64) -> f64 {
    (meters * 1_000_000.0).round() / 1_000_000_000.0
}

pub fn ms_to_kmh(speed_ms: f64) -> f64 {
    speed_ms * 3.6
}

pub struct KinematicsCalculator<'a> {
    config: &'a KinematicsConfig,
}

impl<'a> KinematicsCalculator<'a> {
    pub fn new(config: &'a KinematicsConfig) -> Self {
        Self { config }
    }

    /// Speed for the step ending at `curr`, in m/s.
    ///
    /// A sensor speed in `[0, max_sensor_speed_ms)` wins over the GPS-derived
    /// value. Returns None when neither is available.
    pub fn step_speed(&self, prev: &TrackPoint, curr: &TrackPoint, step_m: f64) -> Option<f64> {
        if let Some(sensor) = curr.speed_hint {
            if sensor >= 0.0 && sensor < self.config.max_sensor_speed_ms {
                return Some(sensor);
            }
        }

        match seconds_between(prev.timestamp, curr.timestamp) {
            Some(dt) if dt > 0.0 => Some(step_m / dt),
            _ => None,
        }
    }

    pub fn calculate(&self, points: &[TrackPoint]) -> Kinematics {
        let (first, last) = match (points.first(), points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Kinematics::default(),
        };

        let total_time_s = seconds_between(first.timestamp, last.timestamp)
            .unwrap_or(0.0)
            .max(0.0);

        let mut distance_m = 0.0;
        let mut moving_time_s = 0.0;
        let mut max_speed_ms: f64 = 0.0;
        // Accumulators for steps fast enough to count as riding
        let mut riding_distance_m = 0.0;
        let mut riding_time_s = 0.0;

        for pair in points.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            let step_m = geodesy::distance(prev, curr);
            distance_m += step_m;

            let dt = seconds_between(prev.timestamp, curr.timestamp).filter(|dt| *dt > 0.0);

            if let Some(dt) = dt {
                if step_m > self.config.pause_distance_m {
                    moving_time_s += dt;
                }
            }

            if let Some(speed) = self.step_speed(prev, curr, step_m) {
                max_speed_ms = max_speed_ms.max(speed);

                if let Some(dt) = dt {
                    if speed >= self.config.min_moving_speed_ms {
                        riding_distance_m += step_m;
                        riding_time_s += dt;
                    }
                }
            }
        }

        // Out-of-order timestamps could otherwise push moving time past elapsed time
        let moving_time_s = moving_time_s.min(total_time_s);

        let avg_speed_ms = if riding_time_s > 0.0 {
            riding_distance_m / riding_time_s
        } else if moving_time_s > 0.0 {
            distance_m / moving_time_s
        } else if total_time_s > 0.0 {
            distance_m / total_time_s
        } else {
            0.0
        };

        debug!(
            points = points.len(),
            distance_m,
            total_time_s,
            moving_time_s,
            avg_speed_ms,
            max_speed_ms,
            "Kinematics computed"
        );

        Kinematics {
            distance_m,
            total_time_s,
            moving_time_s,
            avg_speed_ms,
            max_speed_ms,
            start_time: first.timestamp,
            end_time: last.timestamp,
        }
    }
}

/// Assemble the ride summary from the pipeline outputs.
///
/// `elevation` must come from the summary smoothing path, not the
/// noise-filtered one. Climb/descent distances are segment based and do not
/// cover flats.
pub fn build_summary(kinematics: &Kinematics, elevation: &ElevationStats, segments: &[Segment]) -> Summary {
    let distance_of = |kind: SegmentType| -> f64 {
        segments
            .iter()
            .filter(|s| s.segment_type == kind)
            .map(|s| s.distance)
            .sum()
    };

    Summary {
        distance_km: meters_to_km(kinematics.distance_m),
        total_time_s: kinematics.total_time_s,
        moving_time_s: kinematics.moving_time_s,
        avg_speed_kmh: ms_to_kmh(kinematics.avg_speed_ms),
        max_speed_kmh: ms_to_kmh(kinematics.max_speed_ms),
        elevation_gain_m: elevation.gain_m,
        elevation_loss_m: elevation.loss_m,
        distance_climb_m: distance_of(SegmentType::Climb),
        distance_descent_m: distance_of(SegmentType::Descent),
        max_elevation_m: elevation.max_m,
        min_elevation_m: elevation.min_m,
        start_time: kinematics.start_time,
        end_time: kinematics.end_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::EARTH_RADIUS_M;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    /// Degrees of latitude spanning `meters` along a meridian
    fn lat_for(meters: f64) -> f64 {
        meters / (EARTH_RADIUS_M * std::f64::consts::PI / 180.0)
    }

    fn point_at(meters: f64, seconds: i64) -> TrackPoint {
        TrackPoint::new(lat_for(meters), 0.0).with_timestamp(start() + Duration::seconds(seconds))
    }

    #[test]
    fn test_empty_route() {
        let config = KinematicsConfig::default();
        let k = KinematicsCalculator::new(&config).calculate(&[]);
        assert_eq!(k, Kinematics::default());
    }

    #[test]
    fn test_single_point() {
        let config = KinematicsConfig::default();
        let k = KinematicsCalculator::new(&config).calculate(&[point_at(0.0, 0)]);
        assert_eq!(k.distance_m, 0.0);
        assert_eq!(k.total_time_s, 0.0);
        assert_eq!(k.start_time, Some(start()));
    }

    #[test]
    fn test_one_km_in_one_hour() {
        let config = KinematicsConfig::default();
        let points = vec![point_at(0.0, 0), point_at(1000.0, 3600)];
        let k = KinematicsCalculator::new(&config).calculate(&points);

        assert!((ms_to_kmh(k.avg_speed_ms) - 1.0).abs() < 1e-9);
        assert_eq!(k.total_time_s, 3600.0);
        assert_eq!(k.moving_time_s, 3600.0);
    }

    #[test]
    fn test_ten_km_in_half_an_hour() {
        let config = KinematicsConfig::default();
        let points = vec![point_at(0.0, 0), point_at(10_000.0, 1800)];
        let k = KinematicsCalculator::new(&config).calculate(&points);

        assert!((ms_to_kmh(k.avg_speed_ms) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_stationary_jitter_is_not_moving_time() {
        let config = KinematicsConfig::default();
        let points = vec![
            point_at(0.0, 0),
            point_at(100.0, 20),
            point_at(100.2, 80), // 0.2 m of GPS jitter while stopped
            point_at(200.0, 100),
        ];
        let k = KinematicsCalculator::new(&config).calculate(&points);

        assert_eq!(k.total_time_s, 100.0);
        assert_eq!(k.moving_time_s, 40.0);
    }

    #[test]
    fn test_sensor_speed_preferred() {
        let config = KinematicsConfig::default();
        let mut second = point_at(50.0, 10);
        second.speed_hint = Some(12.0);
        let calculator = KinematicsCalculator::new(&config);

        let speed = calculator.step_speed(&point_at(0.0, 0), &second, 50.0);
        assert_eq!(speed, Some(12.0));

        // Implausible sensor readings fall back to GPS
        second.speed_hint = Some(250.0);
        let speed = calculator.step_speed(&point_at(0.0, 0), &second, 50.0).unwrap();
        assert!((speed - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_is_distance_weighted() {
        let config = KinematicsConfig::default();
        // 1 km at 10 m/s then 10 x 10 m at 1 m/s
        let mut points = vec![point_at(0.0, 0), point_at(1000.0, 100)];
        for i in 1..=10 {
            points.push(point_at(1000.0 + 10.0 * i as f64, 100 + 10 * i));
        }
        let k = KinematicsCalculator::new(&config).calculate(&points);

        // 1100 m / 200 s, not the mean of the per-step speeds
        assert!((k.avg_speed_ms - 5.5).abs() < 1e-6);
        assert!((k.max_speed_ms - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_timestamps_degrade_to_zero() {
        let config = KinematicsConfig::default();
        let points = vec![TrackPoint::new(0.0, 0.0), TrackPoint::new(0.01, 0.0)];
        let k = KinematicsCalculator::new(&config).calculate(&points);

        assert!(k.distance_m > 1000.0);
        assert_eq!(k.total_time_s, 0.0);
        assert_eq!(k.moving_time_s, 0.0);
        assert_eq!(k.avg_speed_ms, 0.0);
    }

    #[test]
    fn test_summary_units() {
        let kinematics = Kinematics {
            distance_m: 12_345.678_912_3,
            avg_speed_ms: 5.0,
            max_speed_ms: 10.0,
            ..Kinematics::default()
        };
        let summary = build_summary(&kinematics, &ElevationStats::default(), &[]);

        assert_eq!(summary.distance_km, 12.345_678_912);
        assert_eq!(summary.avg_speed_kmh, 18.0);
        assert_eq!(summary.max_speed_kmh, 36.0);
        assert_eq!(summary.distance_climb_m, 0.0);
    }

    proptest! {
        #[test]
        fn test_moving_time_never_exceeds_total(
            steps in proptest::collection::vec((0.0f64..500.0, 0i64..120), 1..60)
        ) {
            let config = KinematicsConfig::default();
            let mut meters = 0.0;
            let mut seconds = 0;
            let mut points = vec![point_at(0.0, 0)];
            for (dm, ds) in steps {
                meters += dm;
                seconds += ds;
                points.push(point_at(meters, seconds));
            }
            let k = KinematicsCalculator::new(&config).calculate(&points);

            prop_assert!(k.moving_time_s <= k.total_time_s);
            prop_assert!(k.distance_m >= 0.0);
            prop_assert!(k.avg_speed_ms >= 0.0);
        }
    }
}
