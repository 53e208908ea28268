//! Engine facade tying the pipelines together

use rayon::prelude::*;
use tracing::{debug, error, info, warn, Level};

use crate::calories::CalorieEstimator;
use crate::config::EngineConfig;
use crate::elevation::ElevationProcessor;
use crate::error::{CalculationError, Result, RideLensError};
use crate::kinematics::{build_summary, KinematicsCalculator};
use crate::models::{Analysis, RideReport, Summary, TerrainAnalysis, Track, TrackPoint};
use crate::segments::SegmentDetector;
use crate::terrain::{LandUseService, TerrainClassifier};
use crate::zones::ZoneAnalyzer;

/// Relative disagreement above which device-reported figures are called out
const REPORTED_TOLERANCE: f64 = 0.05;

fn invalid(index: usize, reason: impl Into<String>) -> RideLensError {
    RideLensError::InvalidPoint {
        index,
        reason: reason.into(),
    }
}

/// Reject points no pipeline can make sense of.
///
/// Missing values are fine; present values must be finite and coordinates
/// must lie on the globe.
pub fn validate_points(points: &[TrackPoint]) -> Result<()> {
    for (index, p) in points.iter().enumerate() {
        if !p.lat.is_finite() || !(-90.0..=90.0).contains(&p.lat) {
            return Err(invalid(index, format!("latitude {} out of range", p.lat)));
        }
        if !p.lon.is_finite() || !(-180.0..=180.0).contains(&p.lon) {
            return Err(invalid(index, format!("longitude {} out of range", p.lon)));
        }

        let optional = [
            ("elevation", p.elevation),
            ("heart_rate", p.heart_rate),
            ("cadence", p.cadence),
            ("power", p.power),
            ("speed", p.speed_hint),
            ("temperature", p.temperature),
        ];
        if let Some((name, value)) = optional
            .iter()
            .find_map(|(name, v)| v.filter(|v| !v.is_finite()).map(|v| (name, v)))
        {
            return Err(invalid(index, format!("{} is {}", name, value)));
        }
    }

    Ok(())
}

fn log_failure(track: &Track, err: &RideLensError) {
    let route = track.name.as_deref().unwrap_or("unnamed");
    match err.severity().to_tracing_level() {
        Level::ERROR => error!(route, error = %err, "Route analysis failed"),
        Level::WARN => warn!(route, error = %err, "Route analysis failed"),
        _ => info!(route, error = %err, "Route analysis failed"),
    }
}

/// Runs the ride pipelines with one immutable configuration
#[derive(Debug, Clone, Default)]
pub struct RouteAnalyzer {
    config: EngineConfig,
}

impl RouteAnalyzer {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Summary, calorie and zone analysis, and gradient segments for a route
    pub fn analyze(&self, track: &Track, rider_weight_kg: Option<f64>) -> Result<RideReport> {
        let points = &track.points;
        validate_points(points)?;

        if let Some(weight) = rider_weight_kg {
            if !weight.is_finite() || weight <= 0.0 {
                return Err(CalculationError::InvalidParameter {
                    calculation: "calories".to_string(),
                    parameter: "rider_weight_kg".to_string(),
                    value: weight.to_string(),
                }
                .into());
            }
        }

        let kinematics = KinematicsCalculator::new(&self.config.kinematics).calculate(points);

        let elevation = ElevationProcessor::new(&self.config.elevation);
        let summary_elevation = elevation.summary_stats(points);
        let filtered_elevation = elevation.noise_filtered_stats(points);

        let segments = SegmentDetector::new(&self.config.segments).detect(points);
        let summary = build_summary(&kinematics, &summary_elevation, &segments);

        let calories =
            CalorieEstimator::new(&self.config.calories).estimate(&summary, points, rider_weight_kg);

        let zones = ZoneAnalyzer::new(&self.config.zones, &self.config.kinematics);
        let power = zones.power_stats(points);
        let analysis = Analysis {
            calories,
            avg_heart_rate: ZoneAnalyzer::average_heart_rate(points),
            avg_power: power.as_ref().map(|p| p.avg_power),
            speed_zones: zones.speed_zones(points),
            heart_rate_zones: zones.heart_rate_zones(points),
            power,
        };

        self.log_reported_stats(track, &summary);

        info!(
            route = track.name.as_deref().unwrap_or("unnamed"),
            points = points.len(),
            distance_km = summary.distance_km,
            segments = segments.len(),
            "Route analyzed"
        );

        Ok(RideReport {
            summary,
            analysis,
            segments,
            filtered_elevation,
        })
    }

    /// Analyze independent routes in parallel
    pub fn analyze_many(&self, tracks: &[Track]) -> Vec<Result<RideReport>> {
        tracks
            .par_iter()
            .map(|track| {
                let result = self.analyze(track, None);
                if let Err(e) = &result {
                    log_failure(track, e);
                }
                result
            })
            .collect()
    }

    /// Land-use classification through the configured Overpass endpoints
    pub async fn analyze_terrain(&self, points: &[TrackPoint]) -> TerrainAnalysis {
        TerrainClassifier::with_overpass(&self.config.terrain)
            .classify(points)
            .await
    }

    /// Land-use classification through a caller-supplied service
    pub async fn analyze_terrain_with<S: LandUseService>(
        &self,
        points: &[TrackPoint],
        service: S,
    ) -> TerrainAnalysis {
        TerrainClassifier::new(&self.config.terrain, service)
            .classify(points)
            .await
    }

    fn log_reported_stats(&self, track: &Track, summary: &Summary) {
        let Some(reported) = &track.reported else {
            return;
        };

        let computed = [
            ("distance_m", reported.distance_m, summary.distance_km * 1000.0),
            ("time_s", reported.time_s, summary.total_time_s),
            ("avg_speed_kmh", reported.avg_speed_kmh, summary.avg_speed_kmh),
        ];

        for (field, reported, computed) in computed {
            let Some(reported) = reported else { continue };
            let scale = computed.abs().max(reported.abs());
            if scale > 0.0 && (reported - computed).abs() / scale > REPORTED_TOLERANCE {
                info!(field, reported, computed, "Device-reported value disagrees with computed");
            } else {
                debug!(field, reported, computed, "Device-reported value matches");
            }
        }
    }
}
