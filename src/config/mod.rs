use std::env;
use std::path::PathBuf;

use crate::agency::AgencyWeights;
use crate::error::{AppError, ScoringError};
use crate::geometry::{BenefitWeights, GeometryWeights};
use crate::weights::parse_weight_list;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Audit log configuration.
    pub audit: AuditConfig,
    /// Scoring weights.
    pub scoring: ScoringConfig,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is not set.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable output.
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Audit log configuration
#[derive(Debug, Clone, Default)]
pub struct AuditConfig {
    /// JSON Lines file that governance decisions are appended to.
    pub log_path: Option<PathBuf>,
}

/// Weight sets used by the score computers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringConfig {
    /// Autonomy dimension weights for the agency score.
    pub agency_weights: AgencyWeights,
    /// Geometry dimension weights for the composite.
    pub geometry_weights: GeometryWeights,
    /// Benefit axis weights.
    pub benefit_weights: BenefitWeights,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let audit = AuditConfig {
            log_path: env::var("AUDIT_LOG_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        };

        let scoring = ScoringConfig {
            agency_weights: weights_from_env("AGENCY_WEIGHTS", AgencyWeights::from_map)?
                .unwrap_or_default(),
            geometry_weights: weights_from_env("GEOMETRY_WEIGHTS", GeometryWeights::from_map)?
                .unwrap_or_default(),
            benefit_weights: weights_from_env("BENEFIT_WEIGHTS", BenefitWeights::from_map)?
                .unwrap_or_default(),
        };

        Ok(Config {
            logging,
            audit,
            scoring,
        })
    }
}

/// Read an optional `key=value,key=value` weight list and validate it.
fn weights_from_env<T>(
    var: &str,
    build: impl FnOnce(&std::collections::HashMap<String, f64>) -> Result<T, ScoringError>,
) -> Result<Option<T>, AppError> {
    let raw = match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw,
        _ => return Ok(None),
    };

    parse_weight_list(&raw)
        .and_then(|map| build(&map))
        .map(Some)
        .map_err(|e| AppError::Config {
            message: format!("{}: {}", var, e),
        })
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
