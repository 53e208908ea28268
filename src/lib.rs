// Library interface for RideLens
// The CLI and the integration tests both go through these modules

pub mod analyzer;
pub mod calories;
pub mod config;
pub mod elevation;
pub mod error;
pub mod geodesy;
pub mod import;
pub mod kinematics;
pub mod logging;
pub mod models;
pub mod segments;
pub mod terrain;
pub mod zones;

// Re-export commonly used types for convenience
pub use analyzer::{validate_points, RouteAnalyzer};
pub use config::{AppConfig, EngineConfig};
pub use error::{Result, RideLensError, ServiceError};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use models::*;
pub use terrain::{LandUseService, TerrainClassifier};
