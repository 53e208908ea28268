use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::ImportError;
use crate::models::Track;

pub mod csv;
pub mod gpx;

/// Trait for reading routes from different file formats
pub trait TrackImporter: Send + Sync {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Read the route stored in the file
    fn import_file(&self, file_path: &Path) -> Result<Track>;

    /// Get the format name for this importer
    fn format_name(&self) -> &'static str;
}

/// Case-insensitive extension check shared by the importers
pub(crate) fn has_extension(file_path: &Path, wanted: &str) -> bool {
    file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

/// File stem as a fallback route name
pub(crate) fn file_stem_name(file_path: &Path) -> Option<String> {
    file_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}

/// Manager for coordinating different import formats
pub struct ImportManager {
    importers: Vec<Box<dyn TrackImporter>>,
}

impl ImportManager {
    /// Create a new import manager with all available importers
    pub fn new() -> Self {
        let importers: Vec<Box<dyn TrackImporter>> = vec![
            Box::new(gpx::GpxImporter::new()),
            Box::new(csv::CsvImporter::new()),
        ];

        Self { importers }
    }

    /// Import a single file, picking the importer by extension
    pub fn import_file(&self, file_path: &Path) -> Result<Track> {
        let importer = self
            .importers
            .iter()
            .find(|importer| importer.can_import(file_path))
            .ok_or_else(|| ImportError::UnsupportedFormat {
                format: file_path
                    .extension()
                    .map(|ext| ext.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "(none)".to_string()),
            })?;

        info!(
            path = %file_path.display(),
            format = importer.format_name(),
            "Importing route"
        );

        let track = importer.import_file(file_path)?;
        if track.points.is_empty() {
            return Err(ImportError::Empty {
                path: file_path.to_path_buf(),
            }
            .into());
        }

        Ok(track)
    }

    /// Import every supported file in a directory. Files that fail are logged
    /// and skipped.
    pub fn import_directory(&self, dir_path: &Path) -> Result<Vec<(PathBuf, Track)>> {
        let files = self.collect_importable_files(dir_path)?;

        if files.is_empty() {
            warn!(dir = %dir_path.display(), "No importable files found");
            return Ok(Vec::new());
        }

        let mut tracks = Vec::with_capacity(files.len());
        for file_path in files {
            match self.import_file(&file_path) {
                Ok(track) => tracks.push((file_path, track)),
                Err(e) => warn!(path = %file_path.display(), error = %e, "Import failed"),
            }
        }

        info!(imported = tracks.len(), "Directory import complete");
        Ok(tracks)
    }

    /// Supported files in a directory, sorted by path
    fn collect_importable_files(&self, dir_path: &Path) -> Result<Vec<PathBuf>> {
        if !dir_path.is_dir() {
            anyhow::bail!("Path is not a directory: {}", dir_path.display());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir_path)? {
            let path = entry?.path();
            if path.is_file() && self.can_import_file(&path) {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    pub fn can_import_file(&self, file_path: &Path) -> bool {
        self.importers.iter().any(|importer| importer.can_import(file_path))
    }
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}
