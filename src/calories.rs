//! Calorie estimation using the best available data stream
//!
//! Priority: power > heart rate > distance/elevation. The heart-rate method
//! is a flat per-minute rate and the power factor is a fixed multiplier; both
//! are configurable approximations, not physiological models.

use tracing::debug;

use crate::config::CalorieConfig;
use crate::models::{CalorieBreakdown, CalorieEstimate, CalorieMethod, Summary, TrackPoint};

/// Mean of the strictly positive values, None if there are none
pub fn positive_mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .filter(|v| *v > 0.0)
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    (count > 0).then(|| sum / count as f64)
}

pub struct CalorieEstimator<'a> {
    config: &'a CalorieConfig,
}

impl<'a> CalorieEstimator<'a> {
    pub fn new(config: &'a CalorieConfig) -> Self {
        Self { config }
    }

    /// Estimate energy expenditure for a ride.
    ///
    /// `rider_weight_kg` is accepted for interface stability but does not yet
    /// enter any formula.
    pub fn estimate(
        &self,
        summary: &Summary,
        points: &[TrackPoint],
        rider_weight_kg: Option<f64>,
    ) -> CalorieEstimate {
        if points.is_empty() || summary.distance_km <= 0.0 || summary.moving_time_s <= 0.0 {
            return CalorieEstimate::none();
        }

        if let Some(weight) = rider_weight_kg {
            debug!(weight_kg = weight, "Rider weight supplied but not used by calorie model");
        }

        let estimate = if let Some(avg_power) = positive_mean(points.iter().filter_map(|p| p.power)) {
            self.from_power(avg_power, summary.moving_time_s)
        } else if points.iter().any(|p| p.heart_rate.map_or(false, |hr| hr > 0.0)) {
            self.from_heart_rate(summary.moving_time_s)
        } else {
            self.from_distance(summary)
        };

        debug!(
            method = %estimate.method,
            kcal = estimate.estimated,
            "Calories estimated"
        );

        estimate
    }

    fn from_power(&self, avg_power_w: f64, moving_time_s: f64) -> CalorieEstimate {
        let kilojoules = avg_power_w * moving_time_s / 1000.0;

        CalorieEstimate {
            estimated: kilojoules * self.config.power_kcal_per_kj,
            method: CalorieMethod::Power,
            breakdown: CalorieBreakdown {
                kilojoules: Some(kilojoules),
                ..CalorieBreakdown::default()
            },
        }
    }

    fn from_heart_rate(&self, moving_time_s: f64) -> CalorieEstimate {
        let minutes = moving_time_s / 60.0;

        CalorieEstimate {
            estimated: minutes * self.config.heart_rate_kcal_per_min,
            method: CalorieMethod::HeartRate,
            breakdown: CalorieBreakdown {
                moving_minutes: Some(minutes),
                ..CalorieBreakdown::default()
            },
        }
    }

    fn from_distance(&self, summary: &Summary) -> CalorieEstimate {
        let net_climbing_km = (summary.distance_km - summary.distance_descent_m / 1000.0).max(0.0);
        let distance_kcal = net_climbing_km * self.config.kcal_per_km;
        let elevation_kcal = summary.elevation_gain_m * self.config.kcal_per_m_gain;

        CalorieEstimate {
            estimated: distance_kcal + elevation_kcal,
            method: CalorieMethod::DistanceElevation,
            breakdown: CalorieBreakdown {
                distance_kcal: Some(distance_kcal),
                elevation_kcal: Some(elevation_kcal),
                ..CalorieBreakdown::default()
            },
        }
    }
}
