//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides. Config::from_env() also loads a .env file
//! via dotenvy when one is present, so these tests focus on override behavior.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use relational_agency::agency::AgencyWeights;
use relational_agency::config::{Config, LogFormat};
use relational_agency::geometry::GeometryWeights;
use relational_agency::AppError;
use serial_test::serial;
use std::env;
use std::path::PathBuf;

fn clear_scoring_vars() {
    env::remove_var("AGENCY_WEIGHTS");
    env::remove_var("GEOMETRY_WEIGHTS");
    env::remove_var("BENEFIT_WEIGHTS");
}

#[test]
#[serial]
fn test_config_from_env_defaults() {
    clear_scoring_vars();
    env::remove_var("AUDIT_LOG_PATH");

    let config = Config::from_env().unwrap();
    assert_eq!(config.scoring.agency_weights, AgencyWeights::default());
    assert_eq!(config.scoring.geometry_weights, GeometryWeights::default());
    assert!(config.audit.log_path.is_none());
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    env::set_var("LOG_FORMAT", "json");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);

    // Restore default
    env::set_var("LOG_FORMAT", "pretty");
}

#[test]
#[serial]
fn test_config_from_env_log_format_is_case_insensitive() {
    env::set_var("LOG_FORMAT", "JSON");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);

    env::set_var("LOG_FORMAT", "pretty");
}

#[test]
#[serial]
fn test_config_from_env_custom_log_level() {
    env::set_var("LOG_LEVEL", "debug");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.level, "debug");

    env::set_var("LOG_LEVEL", "info");
}

#[test]
#[serial]
fn test_config_from_env_audit_log_path() {
    env::set_var("AUDIT_LOG_PATH", "/tmp/audit/decisions.jsonl");

    let config = Config::from_env().unwrap();
    assert_eq!(
        config.audit.log_path,
        Some(PathBuf::from("/tmp/audit/decisions.jsonl"))
    );

    env::remove_var("AUDIT_LOG_PATH");
}

#[test]
#[serial]
fn test_config_from_env_blank_audit_log_path_is_unset() {
    env::set_var("AUDIT_LOG_PATH", "   ");

    let config = Config::from_env().unwrap();
    assert!(config.audit.log_path.is_none());

    env::remove_var("AUDIT_LOG_PATH");
}

#[test]
#[serial]
fn test_config_from_env_agency_weights() {
    clear_scoring_vars();
    env::set_var(
        "AGENCY_WEIGHTS",
        "A_cognitive=0.4, A_actuation=0.3, A_reflective=0.2, A_relational=0.1",
    );

    let config = Config::from_env().unwrap();
    let weights = config.scoring.agency_weights;
    assert_eq!(weights.cognitive, 0.4);
    assert_eq!(weights.actuation, 0.3);
    assert_eq!(weights.reflective, 0.2);
    assert_eq!(weights.relational, 0.1);

    clear_scoring_vars();
}

#[test]
#[serial]
fn test_config_from_env_rejects_bad_weight_sum() {
    clear_scoring_vars();
    env::set_var(
        "AGENCY_WEIGHTS",
        "A_cognitive=0.5,A_actuation=0.5,A_reflective=0.5,A_relational=0.5",
    );

    let err = Config::from_env().unwrap_err();
    match err {
        AppError::Config { message } => assert!(message.starts_with("AGENCY_WEIGHTS:")),
        other => panic!("expected config error, got {:?}", other),
    }

    clear_scoring_vars();
}

#[test]
#[serial]
fn test_config_from_env_rejects_missing_geometry_key() {
    clear_scoring_vars();
    env::set_var("GEOMETRY_WEIGHTS", "truth=0.5,coherence=0.5");

    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, AppError::Config { ref message } if message.contains("GEOMETRY_WEIGHTS")));

    clear_scoring_vars();
}

#[test]
#[serial]
fn test_config_from_env_rejects_unparseable_benefit_weights() {
    clear_scoring_vars();
    env::set_var("BENEFIT_WEIGHTS", "agency=lots");

    assert!(matches!(Config::from_env(), Err(AppError::Config { .. })));

    clear_scoring_vars();
}
