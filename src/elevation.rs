//! Elevation smoothing and gain/loss accumulation
//!
//! Two call sites use this module and they intentionally disagree:
//!
//! - [`ElevationProcessor::summary_stats`] feeds `Summary::elevation_gain_m`
//!   and `elevation_loss_m`. Light exponential smoothing
//!   (`summary_smoothing_factor`, default 0.4) with a 1 m threshold.
//! - [`ElevationProcessor::noise_filtered_stats`] is the three-stage filter
//!   (centered moving average, outlier clamp, 3 m threshold) reported as
//!   `RideReport::filtered_elevation`.
//!
//! The segment detector does its own exponential smoothing with
//! `SegmentConfig::smoothing_factor` (default 0.3), tuned for boundaries
//! rather than totals. Compare like with like when reconciling numbers.

use tracing::debug;

use crate::config::ElevationConfig;
use crate::models::{ElevationStats, TrackPoint};

/// Elevation samples of the points that carry one, in route order
pub fn elevations(points: &[TrackPoint]) -> Vec<f64> {
    points.iter().filter_map(|p| p.elevation).collect()
}

/// Centered moving average; the window shrinks at both ends
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 || values.len() < 2 {
        return values.to_vec();
    }

    let half = window / 2;
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(values.len());
            let slice = &values[lo..hi];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Clamp jumps larger than `max_change` to the midpoint between the previous
/// accepted value and the candidate. Output has the same length as input.
pub fn reject_outliers(values: &[f64], max_change: f64) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::with_capacity(values.len());

    for &candidate in values {
        let accepted = match out.last() {
            Some(&prev) if (candidate - prev).abs() > max_change => (prev + candidate) / 2.0,
            _ => candidate,
        };
        out.push(accepted);
    }

    out
}

/// First-order exponential smoothing seeded with the first sample
pub fn exponential_smoothing(values: &[f64], factor: f64) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::with_capacity(values.len());

    for &value in values {
        let next = match out.last() {
            Some(&prev) => factor * value + (1.0 - factor) * prev,
            None => value,
        };
        out.push(next);
    }

    out
}

/// Accumulate gain and loss (both non-negative) from consecutive deltas.
///
/// Deltas smaller than `threshold` in magnitude are dropped, including the
/// steps of a climb that rises slower than the threshold per sample.
pub fn accumulate_gain_loss(values: &[f64], threshold: f64) -> (f64, f64) {
    let mut gain = 0.0;
    let mut loss = 0.0;

    for pair in values.windows(2) {
        let delta = pair[1] - pair[0];
        if delta.abs() < threshold {
            continue;
        }
        if delta > 0.0 {
            gain += delta;
        } else {
            loss -= delta;
        }
    }

    (gain, loss)
}

fn min_max(values: &[f64]) -> (Option<f64>, Option<f64>) {
    values.iter().fold((None, None), |(min, max), &v| {
        (
            Some(min.map_or(v, |m: f64| m.min(v))),
            Some(max.map_or(v, |m: f64| m.max(v))),
        )
    })
}

pub struct ElevationProcessor<'a> {
    config: &'a ElevationConfig,
}

impl<'a> ElevationProcessor<'a> {
    pub fn new(config: &'a ElevationConfig) -> Self {
        Self { config }
    }

    /// Smoothed then outlier-clamped series, index aligned with the input
    pub fn filter(&self, raw: &[f64]) -> Vec<f64> {
        let smoothed = moving_average(raw, self.config.smoothing_window);
        reject_outliers(&smoothed, self.config.max_change_per_step_m)
    }

    /// Three-stage noise filter: moving average, outlier clamp, 3 m threshold
    pub fn noise_filtered_stats(&self, points: &[TrackPoint]) -> ElevationStats {
        let raw = elevations(points);
        let (min_m, max_m) = min_max(&raw);

        if raw.len() < 2 {
            return ElevationStats { gain_m: 0.0, loss_m: 0.0, max_m, min_m };
        }

        let filtered = self.filter(&raw);
        let (gain_m, loss_m) = accumulate_gain_loss(&filtered, self.config.min_threshold_m);

        debug!(samples = raw.len(), gain_m, loss_m, "Noise-filtered elevation");

        ElevationStats { gain_m, loss_m, max_m, min_m }
    }

    /// Light exponential smoothing used for the ride summary
    pub fn summary_stats(&self, points: &[TrackPoint]) -> ElevationStats {
        let raw = elevations(points);
        let (min_m, max_m) = min_max(&raw);

        if raw.len() < 2 {
            return ElevationStats { gain_m: 0.0, loss_m: 0.0, max_m, min_m };
        }

        let smoothed = exponential_smoothing(&raw, self.config.summary_smoothing_factor);
        let (gain_m, loss_m) = accumulate_gain_loss(&smoothed, self.config.summary_threshold_m);

        debug!(samples = raw.len(), gain_m, loss_m, "Summary elevation");

        ElevationStats { gain_m, loss_m, max_m, min_m }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn points_with(elevations: &[f64]) -> Vec<TrackPoint> {
        elevations
            .iter()
            .enumerate()
            .map(|(i, &e)| TrackPoint::new(0.0, i as f64 * 0.001).with_elevation(e))
            .collect()
    }

    #[test]
    fn test_moving_average_centered() {
        let smoothed = moving_average(&[0.0, 3.0, 6.0, 9.0], 3);
        assert_eq!(smoothed, vec![1.5, 3.0, 6.0, 7.5]);
    }

    #[test]
    fn test_outlier_clamped_to_midpoint() {
        let filtered = reject_outliers(&[100.0, 101.0, 300.0, 102.0], 50.0);
        assert_eq!(filtered.len(), 4);
        assert_eq!(filtered[2], 200.5);
        // 102 is more than 50 m below the accepted 200.5 as well
        assert_eq!(filtered[3], 151.25);
    }

    #[test]
    fn test_exponential_smoothing() {
        let smoothed = exponential_smoothing(&[10.0, 20.0], 0.4);
        assert_eq!(smoothed, vec![10.0, 14.0]);
    }

    #[test]
    fn test_threshold_ignores_jitter() {
        let (gain, loss) = accumulate_gain_loss(&[100.0, 101.0, 100.0, 101.0, 100.0], 3.0);
        assert_eq!(gain, 0.0);
        assert_eq!(loss, 0.0);
    }

    #[test]
    fn test_sub_threshold_steps_are_dropped() {
        let series: Vec<f64> = (0..=100).map(|i| 100.0 + i as f64 * 0.5).collect();
        assert_eq!(accumulate_gain_loss(&series, 3.0), (0.0, 0.0));

        // 2 m steps under a 3 m threshold add nothing either
        let series: Vec<f64> = (0..=10).map(|i| 100.0 + i as f64 * 2.0).collect();
        assert_eq!(accumulate_gain_loss(&series, 3.0), (0.0, 0.0));
    }

    #[test]
    fn test_consecutive_deltas_at_threshold_count() {
        let (gain, loss) = accumulate_gain_loss(&[100.0, 103.0, 104.0, 110.0, 105.0], 3.0);
        assert_eq!(gain, 9.0);
        assert_eq!(loss, 5.0);
    }

    #[test]
    fn test_fewer_than_two_samples() {
        let config = ElevationConfig::default();
        let processor = ElevationProcessor::new(&config);

        let stats = processor.summary_stats(&points_with(&[250.0]));
        assert_eq!(stats.gain_m, 0.0);
        assert_eq!(stats.max_m, Some(250.0));

        let stats = processor.noise_filtered_stats(&[TrackPoint::new(1.0, 1.0)]);
        assert_eq!(stats, ElevationStats::default());
    }

    #[test]
    fn test_climb_and_descend() {
        let config = ElevationConfig::default();
        let processor = ElevationProcessor::new(&config);
        let mut profile: Vec<f64> = (0..50).map(|i| 100.0 + i as f64 * 4.0).collect();
        profile.extend((0..50).map(|i| 296.0 - i as f64 * 4.0));
        let points = points_with(&profile);

        let summary = processor.summary_stats(&points);
        let filtered = processor.noise_filtered_stats(&points);

        assert!(summary.gain_m > 160.0 && summary.gain_m <= 196.0);
        assert!(summary.loss_m > 160.0);
        assert!(filtered.gain_m > 160.0 && filtered.gain_m <= 196.0);
        assert_eq!(filtered.max_m, Some(296.0));
        assert_eq!(filtered.min_m, Some(100.0));
    }

    proptest! {
        #[test]
        fn test_gain_loss_non_negative_and_idempotent(
            profile in proptest::collection::vec(-50.0f64..3000.0, 0..200)
        ) {
            let config = ElevationConfig::default();
            let processor = ElevationProcessor::new(&config);
            let points = points_with(&profile);

            let first = processor.noise_filtered_stats(&points);
            let second = processor.noise_filtered_stats(&points);
            prop_assert!(first.gain_m >= 0.0 && first.loss_m >= 0.0);
            prop_assert_eq!(first, second);

            let summary = processor.summary_stats(&points);
            prop_assert!(summary.gain_m >= 0.0 && summary.loss_m >= 0.0);
        }
    }
}
