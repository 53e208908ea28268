use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::RideLensError;
use crate::logging::LogConfig;

/// On-disk application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Analysis engine thresholds and terrain service settings
    pub engine: EngineConfig,

    /// Logging preferences
    pub logging: LogConfig,
}

/// Immutable engine configuration, built once and passed to every stage.
///
/// Each section is `#[serde(default)]` so a partial TOML file only overrides
/// the keys it names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub kinematics: KinematicsConfig,
    pub elevation: ElevationConfig,
    pub segments: SegmentConfig,
    pub calories: CalorieConfig,
    pub zones: ZoneConfig,
    pub terrain: TerrainConfig,
}

/// Distance, time and speed thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicsConfig {
    /// Steps shorter than this (meters) count as paused
    pub pause_distance_m: f64,

    /// Steps slower than this (m/s) are excluded from average speed
    pub min_moving_speed_ms: f64,

    /// Sensor speeds at or above this (m/s) are ignored
    pub max_sensor_speed_ms: f64,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            pause_distance_m: 0.5,
            min_moving_speed_ms: 0.5,
            max_sensor_speed_ms: 200.0,
        }
    }
}

/// Elevation filter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevationConfig {
    /// Centered moving-average window (noise-filtered variant)
    pub smoothing_window: usize,

    /// Largest believable change between accepted samples (meters)
    pub max_change_per_step_m: f64,

    /// Minimum change counted toward gain/loss (noise-filtered variant)
    pub min_threshold_m: f64,

    /// Exponential smoothing factor for the summary gain/loss
    pub summary_smoothing_factor: f64,

    /// Minimum change counted toward the summary gain/loss
    pub summary_threshold_m: f64,
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            smoothing_window: 3,
            max_change_per_step_m: 50.0,
            min_threshold_m: 3.0,
            summary_smoothing_factor: 0.4,
            summary_threshold_m: 1.0,
        }
    }
}

/// Climb/descent segmentation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Exponential smoothing factor for segment boundary detection
    pub smoothing_factor: f64,

    /// Windowed gradient (percent) above which a step is a climb
    pub gradient_threshold: f64,

    /// Number of steps in the rolling gradient window
    pub window_size: usize,

    /// Candidate segments shorter than this (meters) are dropped
    pub min_segment_distance_m: f64,

    /// Net gradient (percent) used to re-derive each candidate's type
    pub classification_threshold: f64,

    /// An earlier segment shorter than this (meters) merges into a same-type neighbour
    pub merge_distance_m: f64,

    /// Fewer elevation samples than this yields no segments
    pub min_points: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            smoothing_factor: 0.3,
            gradient_threshold: 2.0,
            window_size: 5,
            min_segment_distance_m: 100.0,
            classification_threshold: 2.0,
            merge_distance_m: 200.0,
            min_points: 10,
        }
    }
}

/// Calorie estimation constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalorieConfig {
    /// Kcal per kilojoule of mechanical work
    pub power_kcal_per_kj: f64,

    /// Flat heart-rate estimate, kcal per moving minute
    pub heart_rate_kcal_per_min: f64,

    /// Kcal per km of net climbing distance
    pub kcal_per_km: f64,

    /// Kcal per meter of elevation gain
    pub kcal_per_m_gain: f64,
}

impl Default for CalorieConfig {
    fn default() -> Self {
        Self {
            power_kcal_per_kj: 3.6,
            heart_rate_kcal_per_min: 8.0,
            kcal_per_km: 20.0,
            kcal_per_m_gain: 0.1,
        }
    }
}

/// Zone distribution parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Lower bounds (km/h) of the speed zones
    pub speed_zone_bounds_kmh: Vec<f64>,

    /// Lower bounds (fraction of max HR) of the heart-rate zones
    pub heart_rate_zone_bounds: Vec<f64>,

    /// Fixed maximum heart rate used for heart-rate zones
    pub max_heart_rate: f64,

    pub min_step_seconds: f64,
    pub max_step_seconds: f64,
    pub min_step_distance_m: f64,
    pub min_speed_kmh: f64,
    pub max_speed_kmh: f64,

    /// Rolling window (samples) for normalized power
    pub normalized_power_window: usize,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            speed_zone_bounds_kmh: vec![0.0, 15.0, 25.0, 35.0, 45.0],
            heart_rate_zone_bounds: vec![0.0, 0.6, 0.7, 0.8, 0.9],
            max_heart_rate: 190.0,
            min_step_seconds: 2.0,
            max_step_seconds: 300.0,
            min_step_distance_m: 2.0,
            min_speed_kmh: 1.0,
            max_speed_kmh: 70.0,
            normalized_power_window: 30,
        }
    }
}

/// Terrain classification and land-use service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// When false, only the elevation heuristic runs
    pub enable_api_calls: bool,

    /// Query endpoints, alternated across batches
    pub endpoints: Vec<String>,

    /// Classify every Nth point (the last point is always included)
    pub sample_stride: usize,

    /// Sampled points per query
    pub batch_size: usize,

    /// Search radius around each sampled point (meters)
    pub query_radius_m: f64,

    pub request_timeout_secs: u64,

    /// Total attempts per batch
    pub max_retries: u32,

    /// Retry non-timeout failures too (timeouts are always retried)
    pub retry_request_errors: bool,

    /// Backoff before retry n is `backoff_base_ms * 2^(n+1)`
    pub backoff_base_ms: u64,

    pub inter_batch_delay_ms: u64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            enable_api_calls: true,
            endpoints: vec![
                "https://overpass-api.de/api/interpreter".to_string(),
                "https://overpass.kumi.systems/api/interpreter".to_string(),
            ],
            sample_stride: 10,
            batch_size: 5,
            query_radius_m: 100.0,
            request_timeout_secs: 15,
            max_retries: 3,
            retry_request_errors: true,
            backoff_base_ms: 1000,
            inter_batch_delay_ms: 1500,
        }
    }
}

impl TerrainConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    /// Elevation heuristic only, no service calls
    pub fn offline() -> Self {
        Self {
            enable_api_calls: false,
            ..Self::default()
        }
    }
}

impl EngineConfig {
    /// Reject values the pipelines cannot work with
    pub fn validate(&self) -> crate::error::Result<()> {
        let invalid = |msg: &str| Err(RideLensError::Configuration(msg.to_string()));

        if self.elevation.smoothing_window == 0 {
            return invalid("elevation.smoothing_window must be at least 1");
        }
        for (name, factor) in [
            ("elevation.summary_smoothing_factor", self.elevation.summary_smoothing_factor),
            ("segments.smoothing_factor", self.segments.smoothing_factor),
        ] {
            if !(factor > 0.0 && factor <= 1.0) {
                return Err(RideLensError::Configuration(format!(
                    "{} must be in (0, 1], got {}",
                    name, factor
                )));
            }
        }
        if self.elevation.min_threshold_m < 0.0 || self.elevation.summary_threshold_m < 0.0 {
            return invalid("elevation thresholds must not be negative");
        }
        if self.segments.window_size == 0 {
            return invalid("segments.window_size must be at least 1");
        }
        if self.zones.speed_zone_bounds_kmh.is_empty() || self.zones.heart_rate_zone_bounds.is_empty() {
            return invalid("zone bounds must not be empty");
        }
        if self.zones.max_heart_rate <= 0.0 {
            return invalid("zones.max_heart_rate must be positive");
        }
        if self.zones.normalized_power_window == 0 {
            return invalid("zones.normalized_power_window must be at least 1");
        }
        if self.terrain.sample_stride == 0 || self.terrain.batch_size == 0 {
            return invalid("terrain.sample_stride and terrain.batch_size must be at least 1");
        }
        if self.terrain.enable_api_calls && self.terrain.endpoints.is_empty() {
            return invalid("terrain.endpoints must not be empty when API calls are enabled");
        }
        if self.terrain.max_retries == 0 {
            return invalid("terrain.max_retries must be at least 1");
        }
        Ok(())
    }
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config.engine.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ridelens")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(
                    path = %config_path.display(),
                    error = %e,
                    "Config file not loaded, using defaults"
                );
                Self::default()
            }
        }
    }
}
