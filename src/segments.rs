//! Climb and descent segmentation over the gradient series
//!
//! Candidates are runs of steps whose windowed gradient stays above the
//! threshold (climb) or below its negation (descent). Flat runs are gaps
//! between candidates, not segments; a `Flat` segment only appears when a
//! candidate's own net gradient fails the stricter re-classification.

use tracing::debug;

use crate::config::SegmentConfig;
use crate::elevation::{exponential_smoothing, moving_average};
use crate::geodesy;
use crate::kinematics::seconds_between;
use crate::models::{Segment, SegmentType, TrackPoint};

/// Classify a gradient (percent) against a symmetric threshold
pub fn classify_gradient(gradient: f64, threshold: f64) -> SegmentType {
    if gradient > threshold {
        SegmentType::Climb
    } else if gradient < -threshold {
        SegmentType::Descent
    } else {
        SegmentType::Flat
    }
}

/// Elevation-bearing samples of a route, smoothed for boundary detection
struct GradientProfile<'p> {
    points: Vec<(usize, &'p TrackPoint)>,
    smoothed: Vec<f64>,
    /// `step_m[k]` is the distance from sample k to sample k + 1
    step_m: Vec<f64>,
    /// Percent grade of each step
    gradients: Vec<f64>,
}

impl<'p> GradientProfile<'p> {
    fn build(points: &'p [TrackPoint], smoothing_factor: f64) -> Self {
        let samples: Vec<(usize, &TrackPoint)> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.elevation.is_some())
            .collect();

        let raw: Vec<f64> = samples.iter().filter_map(|(_, p)| p.elevation).collect();
        let smoothed = exponential_smoothing(&raw, smoothing_factor);

        let step_m: Vec<f64> = samples
            .windows(2)
            .map(|w| geodesy::distance(w[0].1, w[1].1))
            .collect();

        let gradients = step_m
            .iter()
            .enumerate()
            .map(|(k, &d)| {
                if d > 0.0 {
                    (smoothed[k + 1] - smoothed[k]) / d * 100.0
                } else {
                    0.0
                }
            })
            .collect();

        Self {
            points: samples,
            smoothed,
            step_m,
            gradients,
        }
    }

    /// Build a segment covering steps `first_step..=last_step`
    fn segment(&self, first_step: usize, last_step: usize, threshold: f64) -> Segment {
        let start = first_step;
        let end = last_step + 1;

        let distance: f64 = self.step_m[first_step..=last_step].iter().sum();
        let elevation_change = self.smoothed[end] - self.smoothed[start];
        let avg_gradient = if distance > 0.0 {
            elevation_change / distance * 100.0
        } else {
            0.0
        };
        let max_gradient = self.gradients[first_step..=last_step]
            .iter()
            .fold(0.0_f64, |acc, g| acc.max(g.abs()));

        let (start_index, start_point) = self.points[start];
        let (end_index, end_point) = self.points[end];

        Segment {
            segment_type: classify_gradient(avg_gradient, threshold),
            distance,
            elevation_change,
            avg_gradient,
            max_gradient,
            start_index,
            end_index,
            duration: seconds_between(start_point.timestamp, end_point.timestamp),
        }
    }
}

/// Merge `next` into `into`. Gradient is the distance-weighted mean.
pub fn merge_segments(into: &mut Segment, next: &Segment) {
    let distance = into.distance + next.distance;

    into.avg_gradient = if distance > 0.0 {
        (into.avg_gradient * into.distance + next.avg_gradient * next.distance) / distance
    } else {
        0.0
    };
    into.max_gradient = into.max_gradient.max(next.max_gradient);
    into.elevation_change += next.elevation_change;
    into.distance = distance;
    into.end_index = next.end_index;
    into.duration = match (into.duration, next.duration) {
        (Some(a), Some(b)) => Some(a + b),
        _ => None,
    };
}

pub struct SegmentDetector<'a> {
    config: &'a SegmentConfig,
}

impl<'a> SegmentDetector<'a> {
    pub fn new(config: &'a SegmentConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, points: &[TrackPoint]) -> Vec<Segment> {
        let profile = GradientProfile::build(points, self.config.smoothing_factor);

        if profile.points.len() < self.config.min_points.max(2) {
            debug!(
                samples = profile.points.len(),
                "Too few elevation samples for segmentation"
            );
            return Vec::new();
        }

        let windowed = moving_average(&profile.gradients, self.config.window_size);
        let classes: Vec<SegmentType> = windowed
            .iter()
            .map(|&g| classify_gradient(g, self.config.gradient_threshold))
            .collect();

        let mut candidates = Vec::new();
        let mut run_start = 0;
        for step in 1..=classes.len() {
            let boundary = step == classes.len() || classes[step] != classes[run_start];
            if !boundary {
                continue;
            }

            if classes[run_start] != SegmentType::Flat {
                let segment =
                    profile.segment(run_start, step - 1, self.config.classification_threshold);
                if segment.distance >= self.config.min_segment_distance_m {
                    candidates.push(segment);
                }
            }
            run_start = step;
        }

        let segments = self.merge_short(candidates);

        debug!(
            samples = profile.points.len(),
            segments = segments.len(),
            "Segments detected"
        );

        segments
    }

    /// Merge same-type neighbours when the earlier one is short
    fn merge_short(&self, candidates: Vec<Segment>) -> Vec<Segment> {
        let mut merged: Vec<Segment> = Vec::with_capacity(candidates.len());

        for segment in candidates {
            match merged.last_mut() {
                Some(last)
                    if last.segment_type == segment.segment_type
                        && last.distance < self.config.merge_distance_m =>
                {
                    merge_segments(last, &segment);
                }
                _ => merged.push(segment),
            }
        }

        merged
    }
}
