use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::ImportError;
use crate::import::{file_stem_name, has_extension, TrackImporter};
use crate::models::{Track, TrackPoint};

/// Columns the importer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Lat,
    Lon,
    Elevation,
    Time,
    HeartRate,
    Cadence,
    Power,
    Speed,
    Temperature,
}

/// CSV importer with flexible column naming
pub struct CsvImporter {
    column_mapping: HashMap<String, Column>,
}

impl CsvImporter {
    pub fn new() -> Self {
        let mut column_mapping = HashMap::new();

        Self::add_mapping(&mut column_mapping, Column::Lat, &["lat", "latitude", "position_lat"]);
        Self::add_mapping(
            &mut column_mapping,
            Column::Lon,
            &["lon", "lng", "longitude", "position_long"],
        );
        Self::add_mapping(
            &mut column_mapping,
            Column::Elevation,
            &["elevation", "altitude", "alt", "ele", "elev"],
        );
        Self::add_mapping(&mut column_mapping, Column::Time, &["time", "timestamp", "datetime"]);
        Self::add_mapping(
            &mut column_mapping,
            Column::HeartRate,
            &["heart_rate", "hr", "heartrate", "bpm"],
        );
        Self::add_mapping(&mut column_mapping, Column::Cadence, &["cadence", "rpm"]);
        Self::add_mapping(&mut column_mapping, Column::Power, &["power", "watts"]);
        Self::add_mapping(&mut column_mapping, Column::Speed, &["speed", "speed_ms", "velocity"]);
        Self::add_mapping(
            &mut column_mapping,
            Column::Temperature,
            &["temperature", "temp", "atemp"],
        );

        Self { column_mapping }
    }

    fn add_mapping(mapping: &mut HashMap<String, Column>, column: Column, variations: &[&str]) {
        for variation in variations {
            mapping.insert(variation.to_string(), column);
        }
    }

    fn column_for(&self, header: &str) -> Option<Column> {
        let normalized = header.trim().to_lowercase().replace([' ', '-'], "_");
        self.column_mapping.get(&normalized).copied()
    }

    fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.with_timezone(&Utc));
        }

        let formats = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S%.f",
        ];
        for format in &formats {
            if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
                return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
            }
        }

        // Seconds since the epoch
        value
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Parse CSV content from any reader
    pub fn parse(&self, reader: impl std::io::Read) -> Result<Track> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<Option<Column>> = reader
            .headers()?
            .iter()
            .map(|header| self.column_for(header))
            .collect();

        if !columns.contains(&Some(Column::Lat)) || !columns.contains(&Some(Column::Lon)) {
            return Err(ImportError::ParseError {
                format: "CSV".to_string(),
                reason: "lat and lon columns are required".to_string(),
            }
            .into());
        }

        let mut points = Vec::new();
        let mut skipped = 0usize;

        for (row, result) in reader.records().enumerate() {
            let record = result.with_context(|| format!("Bad CSV record at row {}", row + 1))?;

            let mut lat = None;
            let mut lon = None;
            let mut point = TrackPoint::default();

            for (value, column) in record.iter().zip(&columns) {
                let Some(column) = column else { continue };
                if value.is_empty() {
                    continue;
                }

                let number = || value.parse::<f64>().ok();
                match column {
                    Column::Lat => lat = number(),
                    Column::Lon => lon = number(),
                    Column::Elevation => point.elevation = number(),
                    Column::Time => point.timestamp = Self::parse_datetime(value),
                    Column::HeartRate => point.heart_rate = number(),
                    Column::Cadence => point.cadence = number(),
                    Column::Power => point.power = number(),
                    Column::Speed => point.speed_hint = number(),
                    Column::Temperature => point.temperature = number(),
                }
            }

            match (lat, lon) {
                (Some(lat), Some(lon)) => {
                    point.lat = lat;
                    point.lon = lon;
                    points.push(point);
                }
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(skipped, "CSV rows without a usable position were skipped");
        }
        debug!(points = points.len(), "CSV parsed");

        Ok(Track::new(points))
    }
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackImporter for CsvImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, "csv")
    }

    fn import_file(&self, file_path: &Path) -> Result<Track> {
        let file = std::fs::File::open(file_path)
            .with_context(|| format!("Failed to open CSV file: {}", file_path.display()))?;

        let mut track = self
            .parse(file)
            .with_context(|| format!("Failed to read CSV file: {}", file_path.display()))?;
        track.name = file_stem_name(file_path);

        Ok(track)
    }

    fn format_name(&self) -> &'static str {
        "CSV"
    }
}
