use std::fs;
use std::path::Path;
use tempfile::tempdir;

use ridelens::error::ImportError;
use ridelens::import::ImportManager;
use ridelens::RouteAnalyzer;

const GPX_RIDE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="ridelens-tests" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>Morning loop</name>
    <trkseg>
      <trkpt lat="45.0000" lon="7.0000"><ele>250</ele><time>2024-09-01T07:00:00Z</time></trkpt>
      <trkpt lat="45.0009" lon="7.0000"><ele>252</ele><time>2024-09-01T07:00:20Z</time></trkpt>
      <trkpt lat="45.0018" lon="7.0000"><ele>255</ele><time>2024-09-01T07:00:40Z</time></trkpt>
      <trkpt lat="45.0027" lon="7.0000"><ele>256</ele><time>2024-09-01T07:01:00Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

const CSV_RIDE: &str = "\
lat,lon,elevation,time,heart_rate,power
45.0000,7.0000,250,2024-09-01T07:00:00Z,118,190
45.0009,7.0000,252,2024-09-01T07:00:20Z,124,205
45.0018,7.0000,255,2024-09-01T07:00:40Z,131,220
";

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

#[test]
fn test_import_gpx_file_and_analyze() {
    let dir = tempdir().unwrap();
    write(dir.path(), "loop.gpx", GPX_RIDE);

    let track = ImportManager::new()
        .import_file(&dir.path().join("loop.gpx"))
        .unwrap();
    assert_eq!(track.name.as_deref(), Some("Morning loop"));
    assert_eq!(track.points.len(), 4);

    let report = RouteAnalyzer::default().analyze(&track, None).unwrap();
    // Three steps of 0.0009 degrees latitude, about 100 m each
    assert!((report.summary.distance_km - 0.3).abs() < 0.001);
    assert_eq!(report.summary.total_time_s, 60.0);
}

#[test]
fn test_import_csv_takes_file_stem_as_name() {
    let dir = tempdir().unwrap();
    write(dir.path(), "Tuesday Ride.CSV", CSV_RIDE);

    let track = ImportManager::new()
        .import_file(&dir.path().join("Tuesday Ride.CSV"))
        .unwrap();

    assert_eq!(track.name.as_deref(), Some("Tuesday Ride"));
    assert_eq!(track.points.len(), 3);
    assert_eq!(track.points[2].power, Some(220.0));
}

#[test]
fn test_unsupported_extension() {
    let dir = tempdir().unwrap();
    write(dir.path(), "ride.fit", "binary");

    let err = ImportManager::new()
        .import_file(&dir.path().join("ride.fit"))
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ImportError>(),
        Some(ImportError::UnsupportedFormat { format }) if format == "fit"
    ));
}

#[test]
fn test_header_only_csv_is_empty() {
    let dir = tempdir().unwrap();
    write(dir.path(), "empty.csv", "lat,lon,elevation\n");

    let err = ImportManager::new()
        .import_file(&dir.path().join("empty.csv"))
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ImportError>(),
        Some(ImportError::Empty { .. })
    ));
}

#[test]
fn test_import_directory_skips_bad_files() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.gpx", GPX_RIDE);
    write(dir.path(), "b.csv", CSV_RIDE);
    write(dir.path(), "c.gpx", "<gpx>broken");
    write(dir.path(), "notes.txt", "not a ride");

    let tracks = ImportManager::new().import_directory(dir.path()).unwrap();

    let names: Vec<_> = tracks
        .iter()
        .map(|(path, _)| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.gpx", "b.csv"]);

    let reports = RouteAnalyzer::default()
        .analyze_many(&tracks.into_iter().map(|(_, t)| t).collect::<Vec<_>>());
    assert!(reports.iter().all(|r| r.is_ok()));
}

#[test]
fn test_import_directory_requires_directory() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.gpx", GPX_RIDE);

    assert!(ImportManager::new()
        .import_directory(&dir.path().join("a.gpx"))
        .is_err());
}
