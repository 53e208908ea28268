use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

use ridelens::config::AppConfig;
use ridelens::error::ErrorSeverity;
use ridelens::import::ImportManager;
use ridelens::logging::{init_logging, LogLevel};
use ridelens::models::{RideReport, TerrainAnalysis, ZoneBucket};
use ridelens::RouteAnalyzer;

/// RideLens - Route Analytics CLI
///
/// Computes distance, speed, elevation, climbs, calories and zones for
/// recorded rides, with optional land-use classification along the route.
#[derive(Parser)]
#[command(name = "ridelens")]
#[command(version)]
#[command(about = "Route analytics for recorded rides", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single route file (GPX or CSV)
    Analyze {
        /// Input file path
        #[arg(short, long)]
        file: PathBuf,

        /// Rider weight in kilograms
        #[arg(short, long)]
        weight: Option<f64>,

        /// Also classify terrain along the route
        #[arg(short, long)]
        terrain: bool,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Analyze every supported file in a directory
    Batch {
        /// Directory to scan
        #[arg(short, long)]
        dir: PathBuf,

        /// Print the reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or initialize the configuration file
    Config {
        /// Print the effective configuration as TOML
        #[arg(short, long)]
        show: bool,

        /// Write the default configuration to the default path
        #[arg(short, long)]
        init: bool,
    },
}

#[derive(Tabled)]
struct SegmentRow {
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Points")]
    points: String,
    #[tabled(rename = "Distance (m)")]
    distance: String,
    #[tabled(rename = "Elevation (m)")]
    elevation: String,
    #[tabled(rename = "Avg %")]
    avg_gradient: String,
    #[tabled(rename = "Max %")]
    max_gradient: String,
}

#[derive(Tabled)]
struct ZoneRow {
    #[tabled(rename = "Zone")]
    label: String,
    #[tabled(rename = "Share")]
    share: String,
}

#[derive(Tabled)]
struct TerrainRow {
    #[tabled(rename = "Terrain")]
    terrain: String,
    #[tabled(rename = "Points")]
    points: String,
    #[tabled(rename = "Distance (m)")]
    distance: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
}

#[derive(Tabled)]
struct BatchRow {
    #[tabled(rename = "Route")]
    route: String,
    #[tabled(rename = "Distance (km)")]
    distance: String,
    #[tabled(rename = "Moving")]
    moving: String,
    #[tabled(rename = "Avg km/h")]
    speed: String,
    #[tabled(rename = "Gain (m)")]
    gain: String,
    #[tabled(rename = "kcal")]
    kcal: String,
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from_file(path),
        None => Ok(AppConfig::load_or_default()),
    }
}

fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

fn zone_table(zones: &[ZoneBucket]) -> String {
    let rows = zones.iter().map(|z| ZoneRow {
        label: z.label.clone(),
        share: format!("{:.1}%", z.percentage),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

fn print_report(name: &str, report: &RideReport) {
    let s = &report.summary;
    println!("{}", format!("Route: {}", name).green().bold());
    println!("  Distance:       {:.2} km", s.distance_km);
    println!("  Total time:     {}", format_duration(s.total_time_s));
    println!("  Moving time:    {}", format_duration(s.moving_time_s));
    println!("  Avg speed:      {:.1} km/h", s.avg_speed_kmh);
    println!("  Max speed:      {:.1} km/h", s.max_speed_kmh);
    println!(
        "  Elevation:      +{:.0} m / -{:.0} m (filtered +{:.0} m / -{:.0} m)",
        s.elevation_gain_m,
        s.elevation_loss_m,
        report.filtered_elevation.gain_m,
        report.filtered_elevation.loss_m
    );
    if let (Some(min), Some(max)) = (s.min_elevation_m, s.max_elevation_m) {
        println!("  Altitude:       {:.0} m to {:.0} m", min, max);
    }

    let a = &report.analysis;
    println!(
        "  Calories:       {:.0} kcal ({})",
        a.calories.estimated, a.calories.method
    );
    if let Some(hr) = a.avg_heart_rate {
        println!("  Avg heart rate: {:.0} bpm", hr);
    }
    if let Some(power) = &a.power {
        match power.normalized_power {
            Some(np) => println!(
                "  Power:          {:.0} W avg, {:.0} W max, {:.0} W NP",
                power.avg_power, power.max_power, np
            ),
            None => println!(
                "  Power:          {:.0} W avg, {:.0} W max",
                power.avg_power, power.max_power
            ),
        }
    }

    println!("\n{}", "Speed zones".cyan().bold());
    println!("{}", zone_table(&a.speed_zones));
    if a.avg_heart_rate.is_some() {
        println!("\n{}", "Heart-rate zones".cyan().bold());
        println!("{}", zone_table(&a.heart_rate_zones));
    }

    println!("\n{}", "Segments".cyan().bold());
    if report.segments.is_empty() {
        println!("{}", "  No climbs or descents detected".dimmed());
    } else {
        let rows = report.segments.iter().map(|seg| SegmentRow {
            kind: seg.segment_type.to_string(),
            points: format!("{}-{}", seg.start_index, seg.end_index),
            distance: format!("{:.0}", seg.distance),
            elevation: format!("{:+.0}", seg.elevation_change),
            avg_gradient: format!("{:.1}", seg.avg_gradient),
            max_gradient: format!("{:.1}", seg.max_gradient),
        });
        println!("{}", Table::new(rows).with(Style::rounded()));
    }
}

fn print_terrain(terrain: &TerrainAnalysis) {
    let source = if terrain.used_fallback {
        "elevation heuristic".yellow()
    } else {
        "land-use data".green()
    };
    println!(
        "\n{} dominant: {} ({})",
        "Terrain".cyan().bold(),
        terrain.dominant_terrain,
        source
    );

    let rows = terrain.segments.iter().map(|seg| TerrainRow {
        terrain: seg.terrain_type.to_string(),
        points: format!("{}-{}", seg.start_index, seg.end_index),
        distance: format!("{:.0}", seg.distance_m),
        confidence: format!("{:.2}", seg.confidence),
    });
    println!("{}", Table::new(rows).with(Style::rounded()));

    for share in &terrain.distribution {
        println!("  {:<13} {:>5.1}%", share.terrain_type.to_string(), share.percentage);
    }
}

async fn run_analyze(
    analyzer: &RouteAnalyzer,
    file: &Path,
    weight: Option<f64>,
    terrain: bool,
    json: bool,
) -> Result<()> {
    let track = ImportManager::new().import_file(file)?;
    let report = analyzer.analyze(&track, weight)?;

    let terrain = if terrain {
        Some(analyzer.analyze_terrain(&track.points).await)
    } else {
        None
    };

    if json {
        let output = serde_json::json!({
            "name": track.name,
            "report": report,
            "terrain": terrain,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_report(track.name.as_deref().unwrap_or("unnamed"), &report);
    if let Some(terrain) = &terrain {
        print_terrain(terrain);
    }
    Ok(())
}

fn run_batch(analyzer: &RouteAnalyzer, dir: &Path, json: bool) -> Result<()> {
    let imported = ImportManager::new().import_directory(dir)?;
    let tracks: Vec<_> = imported.iter().map(|(_, track)| track.clone()).collect();
    let results = analyzer.analyze_many(&tracks);

    if json {
        let output: Vec<_> = imported
            .iter()
            .zip(&results)
            .map(|((path, _), result)| match result {
                Ok(report) => serde_json::json!({ "file": path, "report": report }),
                Err(e) => serde_json::json!({ "file": path, "error": e.to_string() }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let mut rows = Vec::new();
    for ((path, track), result) in imported.iter().zip(results) {
        let route = track
            .name
            .clone()
            .unwrap_or_else(|| path.display().to_string());
        match result {
            Ok(report) => rows.push(BatchRow {
                route,
                distance: format!("{:.2}", report.summary.distance_km),
                moving: format_duration(report.summary.moving_time_s),
                speed: format!("{:.1}", report.summary.avg_speed_kmh),
                gain: format!("{:.0}", report.summary.elevation_gain_m),
                kcal: format!("{:.0}", report.analysis.calories.estimated),
            }),
            Err(e) => {
                let mark = match e.severity() {
                    ErrorSeverity::Warning | ErrorSeverity::Info => "!".yellow(),
                    _ => "✗".red(),
                };
                eprintln!("{} {}: {}", mark, route, e.user_message());
            }
        }
    }

    println!(
        "{}",
        format!("Analyzed {} routes", rows.len()).green().bold()
    );
    println!("{}", Table::new(rows).with(Style::rounded()));
    Ok(())
}

fn run_config(config: &AppConfig, show: bool, init: bool) -> Result<()> {
    if init {
        let path = AppConfig::default_config_path();
        if path.exists() {
            anyhow::bail!("Config file already exists: {}", path.display());
        }
        AppConfig::default().save_to_file(&path)?;
        println!(
            "{}",
            format!("✓ Wrote default configuration to {}", path.display()).green()
        );
    }

    if show || !init {
        let text = toml::to_string_pretty(config).context("Failed to render configuration")?;
        println!("{}", text);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    config.logging.level = LogLevel::from_verbosity(config.logging.level, cli.verbose);
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Analyze {
            file,
            weight,
            terrain,
            json,
        } => {
            let analyzer = RouteAnalyzer::new(config.engine)?;
            run_analyze(&analyzer, &file, weight, terrain, json).await
        }

        Commands::Batch { dir, json } => {
            let analyzer = RouteAnalyzer::new(config.engine)?;
            run_batch(&analyzer, &dir, json)
        }

        Commands::Config { show, init } => run_config(&config, show, init),
    }
}
