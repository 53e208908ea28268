use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

use crate::error::ImportError;
use crate::import::{file_stem_name, has_extension, TrackImporter};
use crate::models::{Track, TrackPoint};

/// gpx::Time wraps time::OffsetDateTime; go through RFC 3339 text
fn gpx_time_to_chrono(time: &gpx::Time) -> Option<DateTime<Utc>> {
    let formatted = time.format().ok()?;
    DateTime::parse_from_rfc3339(&formatted)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn to_track_point(waypoint: &gpx::Waypoint) -> TrackPoint {
    let position = waypoint.point();
    TrackPoint {
        lat: position.y(),
        lon: position.x(),
        elevation: waypoint.elevation,
        timestamp: waypoint.time.as_ref().and_then(gpx_time_to_chrono),
        speed_hint: waypoint.speed,
        ..TrackPoint::default()
    }
}

/// GPX importer: track points, or route points when there are no tracks
pub struct GpxImporter;

impl GpxImporter {
    pub fn new() -> Self {
        Self
    }

    /// Parse GPX content already in memory
    pub fn parse(&self, reader: impl std::io::Read) -> Result<Track> {
        let data: gpx::Gpx = gpx::read(reader).map_err(|e| ImportError::ParseError {
            format: "GPX".to_string(),
            reason: e.to_string(),
        })?;

        let mut points: Vec<TrackPoint> = data
            .tracks
            .iter()
            .flat_map(|track| track.segments.iter())
            .flat_map(|segment| segment.points.iter())
            .map(to_track_point)
            .collect();

        if points.is_empty() {
            points = data
                .routes
                .iter()
                .flat_map(|route| route.points.iter())
                .map(to_track_point)
                .collect();
        }

        let name = data
            .tracks
            .iter()
            .find_map(|track| track.name.clone())
            .or_else(|| data.routes.iter().find_map(|route| route.name.clone()))
            .or_else(|| data.metadata.as_ref().and_then(|m| m.name.clone()));

        debug!(points = points.len(), "GPX parsed");

        Ok(Track {
            name,
            points,
            reported: None,
        })
    }
}

impl Default for GpxImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackImporter for GpxImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, "gpx")
    }

    fn import_file(&self, file_path: &Path) -> Result<Track> {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open GPX file: {}", file_path.display()))?;

        let mut track = self
            .parse(BufReader::new(file))
            .with_context(|| format!("Failed to read GPX file: {}", file_path.display()))?;
        if track.name.is_none() {
            track.name = file_stem_name(file_path);
        }

        Ok(track)
    }

    fn format_name(&self) -> &'static str {
        "GPX"
    }
}
