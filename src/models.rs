use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single recorded GPS fix with optional sensor extensions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Latitude in decimal degrees
    pub lat: f64,

    /// Longitude in decimal degrees
    pub lon: f64,

    /// Elevation in meters above sea level
    pub elevation: Option<f64>,

    /// Recording instant
    pub timestamp: Option<DateTime<Utc>>,

    /// Heart rate in beats per minute
    pub heart_rate: Option<f64>,

    /// Cadence in revolutions per minute
    pub cadence: Option<f64>,

    /// Power output in watts
    pub power: Option<f64>,

    /// Sensor-reported speed in meters per second
    pub speed_hint: Option<f64>,

    /// Temperature in degrees Celsius
    pub temperature: Option<f64>,
}

impl TrackPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            ..Self::default()
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Aggregate stats reported by the recording device. Logged, never trusted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportedStats {
    pub distance_m: Option<f64>,
    pub time_s: Option<f64>,
    pub avg_speed_kmh: Option<f64>,
}

/// An ordered route as delivered by the upstream parser
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Track {
    pub name: Option<String>,
    pub points: Vec<TrackPoint>,
    pub reported: Option<ReportedStats>,
}

impl Track {
    pub fn new(points: Vec<TrackPoint>) -> Self {
        Self {
            name: None,
            points,
            reported: None,
        }
    }
}

/// Gradient classification of a stretch of road
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    Climb,
    Descent,
    Flat,
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentType::Climb => write!(f, "climb"),
            SegmentType::Descent => write!(f, "descent"),
            SegmentType::Flat => write!(f, "flat"),
        }
    }
}

/// A contiguous climb, descent or flat stretch of the route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub segment_type: SegmentType,

    /// Horizontal distance in meters
    pub distance: f64,

    /// Net elevation change in meters (signed)
    pub elevation_change: f64,

    /// Average gradient in percent (signed)
    pub avg_gradient: f64,

    /// Steepest single-step gradient magnitude in percent
    pub max_gradient: f64,

    /// Index of the first route point in the segment
    pub start_index: usize,

    /// Index of the last route point in the segment
    pub end_index: usize,

    /// Elapsed seconds, when both ends carry timestamps
    pub duration: Option<f64>,
}

/// Aggregate ride metrics
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub distance_km: f64,
    pub total_time_s: f64,
    pub moving_time_s: f64,
    pub avg_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    pub distance_climb_m: f64,
    pub distance_descent_m: f64,
    pub max_elevation_m: Option<f64>,
    pub min_elevation_m: Option<f64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Gain/loss figures produced by one of the elevation filters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ElevationStats {
    pub gain_m: f64,
    pub loss_m: f64,
    pub max_m: Option<f64>,
    pub min_m: Option<f64>,
}

/// Method used for the calorie estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalorieMethod {
    Power,
    HeartRate,
    DistanceElevation,
    None,
}

impl fmt::Display for CalorieMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalorieMethod::Power => write!(f, "power"),
            CalorieMethod::HeartRate => write!(f, "heart_rate"),
            CalorieMethod::DistanceElevation => write!(f, "distance_elevation"),
            CalorieMethod::None => write!(f, "none"),
        }
    }
}

/// Component contributions to the calorie estimate
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalorieBreakdown {
    /// Mechanical work in kilojoules (power method)
    pub kilojoules: Option<f64>,
    /// Moving minutes used by the heart-rate method
    pub moving_minutes: Option<f64>,
    /// Kcal from net climbing distance
    pub distance_kcal: Option<f64>,
    /// Kcal from elevation gain
    pub elevation_kcal: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalorieEstimate {
    pub estimated: f64,
    pub method: CalorieMethod,
    pub breakdown: CalorieBreakdown,
}

impl CalorieEstimate {
    pub fn none() -> Self {
        Self {
            estimated: 0.0,
            method: CalorieMethod::None,
            breakdown: CalorieBreakdown::default(),
        }
    }
}

/// One bucket of a zone distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneBucket {
    pub zone: u8,
    pub label: String,
    /// Lower bound (inclusive)
    pub min: f64,
    /// Upper bound (exclusive), None for the open top bucket
    pub max: Option<f64>,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PowerStats {
    pub avg_power: f64,
    pub max_power: f64,
    /// Only present with at least one full rolling window of samples
    pub normalized_power: Option<f64>,
    pub samples: usize,
}

/// Calorie estimate and zone distributions for one ride
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub calories: CalorieEstimate,
    pub avg_heart_rate: Option<f64>,
    pub avg_power: Option<f64>,
    pub speed_zones: Vec<ZoneBucket>,
    pub heart_rate_zones: Vec<ZoneBucket>,
    pub power: Option<PowerStats>,
}

/// Everything the synchronous pipelines derive from one route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideReport {
    pub summary: Summary,
    pub analysis: Analysis,
    pub segments: Vec<Segment>,
    /// Gain/loss from the three-stage noise filter
    pub filtered_elevation: ElevationStats,
}

/// Land-use classification of a stretch of the route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerrainType {
    Urban,
    Suburban,
    Rural,
    Agricultural,
    Forest,
    Park,
    Mountain,
    Coastal,
    Water,
    Desert,
    Unknown,
}

impl TerrainType {
    pub const ALL: [TerrainType; 11] = [
        TerrainType::Urban,
        TerrainType::Suburban,
        TerrainType::Rural,
        TerrainType::Agricultural,
        TerrainType::Forest,
        TerrainType::Park,
        TerrainType::Mountain,
        TerrainType::Coastal,
        TerrainType::Water,
        TerrainType::Desert,
        TerrainType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TerrainType::Urban => "urban",
            TerrainType::Suburban => "suburban",
            TerrainType::Rural => "rural",
            TerrainType::Agricultural => "agricultural",
            TerrainType::Forest => "forest",
            TerrainType::Park => "park",
            TerrainType::Mountain => "mountain",
            TerrainType::Coastal => "coastal",
            TerrainType::Water => "water",
            TerrainType::Desert => "desert",
            TerrainType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TerrainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TerrainType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        TerrainType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == lowered)
            .ok_or_else(|| format!("Invalid terrain type: {}", s))
    }
}

/// A contiguous stretch of the route sharing one land-use label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainSegment {
    pub start_index: usize,
    pub end_index: usize,
    pub distance_m: f64,
    pub terrain_type: TerrainType,
    pub elevation_m: f64,
    /// 0.0 to 1.0, reflects the source of the label
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainShare {
    pub terrain_type: TerrainType,
    pub distance_m: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ElevationProfile {
    pub min: f64,
    pub max: f64,
    pub range: f64,
    /// Mean absolute gradient in percent
    pub avg_slope: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainAnalysis {
    pub segments: Vec<TerrainSegment>,
    pub dominant_terrain: TerrainType,
    pub distribution: Vec<TerrainShare>,
    pub elevation_profile: ElevationProfile,
    /// True when the elevation heuristic produced the labels
    pub used_fallback: bool,
}

impl TerrainAnalysis {
    pub fn empty() -> Self {
        Self {
            segments: Vec::new(),
            dominant_terrain: TerrainType::Unknown,
            distribution: Vec::new(),
            elevation_profile: ElevationProfile::default(),
            used_fallback: false,
        }
    }
}
