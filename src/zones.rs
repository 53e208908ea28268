//! Speed, heart-rate and power distributions

use tracing::debug;

use crate::calories::positive_mean;
use crate::config::{KinematicsConfig, ZoneConfig};
use crate::geodesy;
use crate::kinematics::{seconds_between, KinematicsCalculator};
use crate::models::{PowerStats, TrackPoint, ZoneBucket};

/// Zone number (1-based) for `value` given ascending lower bounds
pub fn zone_for(value: f64, lower_bounds: &[f64]) -> usize {
    lower_bounds
        .iter()
        .rposition(|&bound| value >= bound)
        .map_or(1, |i| i + 1)
}

/// Turn raw values into a percentage distribution over the zones
fn distribute(values: &[f64], lower_bounds: &[f64], label: impl Fn(usize) -> String) -> Vec<ZoneBucket> {
    let mut counts = vec![0usize; lower_bounds.len()];
    for &value in values {
        counts[zone_for(value, lower_bounds) - 1] += 1;
    }

    let total = values.len();
    lower_bounds
        .iter()
        .enumerate()
        .map(|(i, &min)| ZoneBucket {
            zone: (i + 1) as u8,
            label: label(i),
            min,
            max: lower_bounds.get(i + 1).copied(),
            count: counts[i],
            percentage: if total > 0 {
                counts[i] as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect()
}

/// Normalized power: fourth root of the mean fourth power of the rolling
/// `window`-sample average. None with fewer than `window` samples.
pub fn normalized_power(samples: &[f64], window: usize) -> Option<f64> {
    if window == 0 || samples.len() < window {
        return None;
    }

    let rolling: Vec<f64> = samples
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect();

    let mean_fourth = rolling.iter().map(|p| p.powi(4)).sum::<f64>() / rolling.len() as f64;
    Some(mean_fourth.sqrt().sqrt())
}

/// Zone distribution utilities
pub struct ZoneAnalyzer<'a> {
    config: &'a ZoneConfig,
    kinematics: KinematicsCalculator<'a>,
}

impl<'a> ZoneAnalyzer<'a> {
    pub fn new(config: &'a ZoneConfig, kinematics: &'a KinematicsConfig) -> Self {
        Self {
            config,
            kinematics: KinematicsCalculator::new(kinematics),
        }
    }

    /// Per-step speeds (km/h) that look like real riding: no stalls,
    /// no teleports, no implausible speeds.
    ///
    /// Step speed is the one the ride summary uses, so a usable sensor speed
    /// wins over the GPS-derived value.
    pub fn realistic_step_speeds(&self, points: &[TrackPoint]) -> Vec<f64> {
        let c = self.config;

        points
            .windows(2)
            .filter_map(|pair| {
                let dt = seconds_between(pair[0].timestamp, pair[1].timestamp)?;
                if dt < c.min_step_seconds || dt > c.max_step_seconds {
                    return None;
                }

                let step_m = geodesy::distance(&pair[0], &pair[1]);
                if step_m < c.min_step_distance_m {
                    return None;
                }

                let kmh = self.kinematics.step_speed(&pair[0], &pair[1], step_m)? * 3.6;
                (kmh >= c.min_speed_kmh && kmh <= c.max_speed_kmh).then_some(kmh)
            })
            .collect()
    }

    /// Share of qualifying steps in each speed band
    pub fn speed_zones(&self, points: &[TrackPoint]) -> Vec<ZoneBucket> {
        let speeds = self.realistic_step_speeds(points);
        let bounds = &self.config.speed_zone_bounds_kmh;

        debug!(qualifying_steps = speeds.len(), "Speed zones");

        distribute(&speeds, bounds, |i| match bounds.get(i + 1) {
            Some(upper) => format!("{}-{} km/h", bounds[i], upper),
            None => format!("{}+ km/h", bounds[i]),
        })
    }

    /// Share of heart-rate samples in each band of the fixed max heart rate
    pub fn heart_rate_zones(&self, points: &[TrackPoint]) -> Vec<ZoneBucket> {
        let max_hr = self.config.max_heart_rate;
        let fractions: Vec<f64> = points
            .iter()
            .filter_map(|p| p.heart_rate)
            .filter(|hr| *hr > 0.0)
            .map(|hr| hr / max_hr)
            .collect();
        let bounds = &self.config.heart_rate_zone_bounds;

        distribute(&fractions, bounds, |i| {
            let lower = (bounds[i] * 100.0).round();
            match bounds.get(i + 1) {
                Some(upper) => format!("Z{} {}-{}% max HR", i + 1, lower, (upper * 100.0).round()),
                None => format!("Z{} {}%+ max HR", i + 1, lower),
            }
        })
    }

    pub fn average_heart_rate(points: &[TrackPoint]) -> Option<f64> {
        positive_mean(points.iter().filter_map(|p| p.heart_rate))
    }

    /// Average and maximum over positive readings. Normalized power rolls
    /// over every reading, coasting zeros included, and needs at least a
    /// window's worth of positive ones.
    pub fn power_stats(&self, points: &[TrackPoint]) -> Option<PowerStats> {
        let readings: Vec<f64> = points
            .iter()
            .filter_map(|p| p.power)
            .filter(|w| *w >= 0.0)
            .collect();
        let positive: Vec<f64> = readings.iter().copied().filter(|w| *w > 0.0).collect();

        if positive.is_empty() {
            return None;
        }

        let window = self.config.normalized_power_window;
        let normalized_power = if positive.len() >= window {
            normalized_power(&readings, window)
        } else {
            None
        };

        Some(PowerStats {
            avg_power: positive.iter().sum::<f64>() / positive.len() as f64,
            max_power: positive.iter().copied().fold(0.0, f64::max),
            normalized_power,
            samples: positive.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::EARTH_RADIUS_M;
    use chrono::{Duration, TimeZone, Utc};

    fn lat_for(meters: f64) -> f64 {
        meters / (EARTH_RADIUS_M * std::f64::consts::PI / 180.0)
    }

    /// One point per `dt` seconds, each step covering `step_m` meters
    fn steady_ride(steps: usize, step_m: f64, dt: i64) -> Vec<TrackPoint> {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 4, 9, 0, 0).unwrap();
        (0..=steps)
            .map(|i| {
                TrackPoint::new(lat_for(i as f64 * step_m), 0.0)
                    .with_timestamp(t0 + Duration::seconds(i as i64 * dt))
            })
            .collect()
    }

    #[test]
    fn test_zone_for() {
        let bounds = [0.0, 15.0, 25.0, 35.0, 45.0];
        assert_eq!(zone_for(3.0, &bounds), 1);
        assert_eq!(zone_for(15.0, &bounds), 2);
        assert_eq!(zone_for(34.9, &bounds), 3);
        assert_eq!(zone_for(80.0, &bounds), 5);
    }

    #[test]
    fn test_speed_zones_single_band() {
        let config = ZoneConfig::default();
        let kinematics = KinematicsConfig::default();
        // 50 m every 6 s is 30 km/h
        let zones = ZoneAnalyzer::new(&config, &kinematics).speed_zones(&steady_ride(20, 50.0, 6));

        assert_eq!(zones.len(), 5);
        assert_eq!(zones[2].count, 20);
        assert!((zones[2].percentage - 100.0).abs() < 1e-9);
        assert_eq!(zones[4].max, None);
        assert_eq!(zones[0].label, "0-15 km/h");
    }

    #[test]
    fn test_speed_filter_drops_stalls_and_jumps() {
        let config = ZoneConfig::default();
        let kinematics = KinematicsConfig::default();
        let analyzer = ZoneAnalyzer::new(&config, &kinematics);

        // 1 s sampling is below the 2 s minimum
        assert!(analyzer.realistic_step_speeds(&steady_ride(10, 8.0, 1)).is_empty());
        // 500 m in 5 s is 360 km/h
        assert!(analyzer.realistic_step_speeds(&steady_ride(10, 500.0, 5)).is_empty());
        // 1 m steps are GPS stalls
        assert!(analyzer.realistic_step_speeds(&steady_ride(10, 1.0, 3)).is_empty());
    }

    #[test]
    fn test_heart_rate_zones() {
        let config = ZoneConfig::default();
        let kinematics = KinematicsConfig::default();
        let mut points = steady_ride(3, 50.0, 5);
        points[0].heart_rate = Some(95.0); // 50%
        points[1].heart_rate = Some(152.0); // 80%
        points[2].heart_rate = Some(180.5); // 95%

        let zones = ZoneAnalyzer::new(&config, &kinematics).heart_rate_zones(&points);

        assert_eq!(zones[0].count, 1);
        assert_eq!(zones[3].count, 1);
        assert_eq!(zones[4].count, 1);
        let total: f64 = zones.iter().map(|z| z.percentage).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_heart_rate_gives_zero_distribution() {
        let config = ZoneConfig::default();
        let kinematics = KinematicsConfig::default();
        let zones =
            ZoneAnalyzer::new(&config, &kinematics).heart_rate_zones(&steady_ride(3, 50.0, 5));
        assert!(zones.iter().all(|z| z.count == 0 && z.percentage == 0.0));
    }

    #[test]
    fn test_normalized_power_constant_effort() {
        let np = normalized_power(&[200.0; 60], 30).unwrap();
        assert!((np - 200.0).abs() < 1e-9);
        assert!(normalized_power(&[200.0; 29], 30).is_none());
    }

    #[test]
    fn test_normalized_power_rewards_surges() {
        let mut samples = vec![100.0; 60];
        samples.extend(vec![400.0; 60]);
        let np = normalized_power(&samples, 30).unwrap();
        assert!(np > 250.0);
    }

    #[test]
    fn test_power_stats() {
        let config = ZoneConfig::default();
        let kinematics = KinematicsConfig::default();
        let mut points = steady_ride(40, 50.0, 5);
        for (i, point) in points.iter_mut().enumerate() {
            point.power = Some(if i % 2 == 0 { 200.0 } else { 0.0 });
        }

        let stats = ZoneAnalyzer::new(&config, &kinematics).power_stats(&points).unwrap();
        assert_eq!(stats.samples, 21);
        assert_eq!(stats.avg_power, 200.0);
        assert!(stats.normalized_power.is_none());
        assert!(ZoneAnalyzer::new(&config, &kinematics)
            .power_stats(&steady_ride(3, 5.0, 5))
            .is_none());
    }

    #[test]
    fn test_normalized_power_keeps_coasting_zeros() {
        let config = ZoneConfig::default();
        let kinematics = KinematicsConfig::default();
        let mut points = steady_ride(59, 50.0, 5);
        for (i, point) in points.iter_mut().enumerate() {
            point.power = Some(if i % 2 == 0 { 200.0 } else { 0.0 });
        }

        let stats = ZoneAnalyzer::new(&config, &kinematics).power_stats(&points).unwrap();

        assert_eq!(stats.samples, 30);
        assert_eq!(stats.avg_power, 200.0);
        assert_eq!(stats.max_power, 200.0);
        // Every 30-sample window holds 15 efforts and 15 zeros
        let np = stats.normalized_power.unwrap();
        assert!((np - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_speed_zones_prefer_sensor_speed() {
        let config = ZoneConfig::default();
        let kinematics = KinematicsConfig::default();
        // GPS says 30 km/h, the sensor says 5 m/s (18 km/h)
        let mut points = steady_ride(20, 50.0, 6);
        for point in points.iter_mut().skip(1) {
            point.speed_hint = Some(5.0);
        }

        let zones = ZoneAnalyzer::new(&config, &kinematics).speed_zones(&points);
        assert_eq!(zones[1].count, 20);
        assert_eq!(zones[2].count, 0);

        // An implausible sensor reading falls back to the GPS speed
        for point in points.iter_mut() {
            point.speed_hint = Some(250.0);
        }
        let zones = ZoneAnalyzer::new(&config, &kinematics).speed_zones(&points);
        assert_eq!(zones[2].count, 20);
    }
}
