//! Elevation-banded terrain heuristic used when the land-use service is off
//! or returned something that cannot be mapped back to the route.

use super::SampleLabel;
use crate::models::{TerrainType, TrackPoint};

/// Terrain guess and confidence from altitude alone
pub fn classify_by_elevation(elevation: Option<f64>) -> (TerrainType, f64) {
    match elevation {
        Some(e) if e > 2000.0 => (TerrainType::Mountain, 0.7),
        Some(e) if e > 1000.0 => (TerrainType::Mountain, 0.6),
        Some(e) if e > 500.0 => (TerrainType::Rural, 0.5),
        Some(e) if e < 50.0 => (TerrainType::Coastal, 0.4),
        Some(_) => (TerrainType::Rural, 0.4),
        None => (TerrainType::Unknown, 0.2),
    }
}

/// Label every sampled point by its own elevation
pub fn label_samples(points: &[TrackPoint], samples: &[usize]) -> Vec<SampleLabel> {
    samples
        .iter()
        .map(|&index| {
            let (terrain_type, confidence) = classify_by_elevation(points[index].elevation);
            SampleLabel {
                index,
                terrain_type,
                confidence,
            }
        })
        .collect()
}
