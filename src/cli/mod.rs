//! Command-line interface.
//!
//! Three subcommands cover the offline workflow: scoring a trial record,
//! tracing one node of an exported lineage graph and verifying an audit
//! trail file.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};

use crate::audit::AuditTrail;
use crate::canonical::Metadata;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::lineage::{GraphRecord, LineageGraph, LineageReport};
use crate::trial::{ScoredTrial, TrialRecord, TrialScorer};

/// Relational agency scoring toolkit.
#[derive(Parser, Debug)]
#[command(name = "relational-agency", version, about)]
pub struct Cli {
    /// Command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Score a trial record
    Score {
        /// Trial record JSON file
        input: PathBuf,

        /// Write the scored record here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Append the governance decision to this JSONL audit log
        #[arg(long)]
        audit_log: Option<PathBuf>,
    },

    /// Print the verified lineage of one node in an exported graph
    Lineage {
        /// Graph record JSON file
        graph: PathBuf,

        /// Node to trace
        node_id: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Reload an audit trail and print its summary
    VerifyTrail {
        /// JSONL audit log
        log: PathBuf,
    },
}

/// Result of CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Execute a CLI command.
pub async fn execute_command(command: Commands, config: &Config) -> CliResult {
    let result = match command {
        Commands::Score {
            input,
            output,
            pretty,
            audit_log,
        } => {
            let audit_log = audit_log.or_else(|| config.audit.log_path.clone());
            execute_score(config, &input, output.as_deref(), pretty, audit_log.as_deref()).await
        }
        Commands::Lineage {
            graph,
            node_id,
            pretty,
        } => execute_lineage(&graph, &node_id, pretty).await,
        Commands::VerifyTrail { log } => execute_verify_trail(&log).await,
    };

    match result {
        Ok(message) => CliResult::success(message),
        Err(e) => {
            error!(error = %e, "Command failed");
            CliResult::error(format!("Error: {}", e))
        }
    }
}

/// Score a trial file, optionally recording the governance decision.
async fn execute_score(
    config: &Config,
    input: &Path,
    output: Option<&Path>,
    pretty: bool,
    audit_log: Option<&Path>,
) -> AppResult<String> {
    let raw = tokio::fs::read_to_string(input).await?;
    let record: TrialRecord = serde_json::from_str(&raw)?;

    let scorer = TrialScorer::from_config(&config.scoring)?;
    let scored = scorer.score(record)?;

    if let Some(path) = audit_log {
        record_governance(path, &scored).await?;
    }

    let json = to_json(&scored, pretty)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, json).await?;
            info!(path = %path.display(), "Wrote scored trial");
            Ok(format!("Scores written to: {}", path.display()))
        }
        None => Ok(json),
    }
}

async fn record_governance(path: &Path, scored: &ScoredTrial) -> AppResult<()> {
    let mut trail = AuditTrail::open(path).await?;

    let score = &scored.agency_score;
    let rationale = format!(
        "Agency score {:.4} with confidence {:.2} maps to {}",
        score.score, score.confidence, score.governance_level
    );

    let mut metadata = Metadata::new();
    metadata.insert("trial_id".to_string(), scored.trial_id.clone().into());
    if let Some(hash) = &scored.lineage_hash {
        metadata.insert("lineage_hash".to_string(), hash.clone().into());
    }

    trail
        .log_governance_decision(score, rationale, Some(metadata))
        .await?;
    Ok(())
}

/// Re-hydrate a graph record and report the lineage of one node.
async fn execute_lineage(graph: &Path, node_id: &str, pretty: bool) -> AppResult<String> {
    let raw = tokio::fs::read_to_string(graph).await?;
    let record: GraphRecord = serde_json::from_str(&raw)?;
    let graph = LineageGraph::from_record(record)?;

    let report = LineageReport::from_graph(&graph, node_id)?;
    if !report.verify()? {
        return Err(AppError::Internal {
            message: format!("lineage of {} failed verification", node_id),
        });
    }
    to_json(&report, pretty)
}

/// Reload an audit trail and summarize it.
async fn execute_verify_trail(log: &Path) -> AppResult<String> {
    let trail = AuditTrail::load_from_jsonl(log).await?;
    match trail.export_summary()? {
        Some(summary) => to_json(&summary, true),
        None => Ok(format!(
            "Audit trail is empty (trail hash: {})",
            trail.compute_trail_hash()?
        )),
    }
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> AppResult<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_score_command() {
        let cli = Cli::try_parse_from([
            "relational-agency",
            "score",
            "trial.json",
            "-o",
            "out.json",
            "--pretty",
            "--audit-log",
            "audit.jsonl",
        ])
        .unwrap();

        match cli.command {
            Commands::Score {
                input,
                output,
                pretty,
                audit_log,
            } => {
                assert_eq!(input, PathBuf::from("trial.json"));
                assert_eq!(output, Some(PathBuf::from("out.json")));
                assert!(pretty);
                assert_eq!(audit_log, Some(PathBuf::from("audit.jsonl")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_verify_trail_command() {
        let cli = Cli::try_parse_from(["relational-agency", "verify-trail", "log.jsonl"]).unwrap();
        assert!(matches!(cli.command, Commands::VerifyTrail { .. }));
    }

    #[test]
    fn test_cli_result_codes() {
        assert_eq!(CliResult::success("ok").exit_code, 0);
        assert_eq!(CliResult::error("bad").exit_code, 1);
    }

    #[tokio::test]
    async fn test_missing_input_is_an_error() {
        let result = execute_command(
            Commands::Score {
                input: PathBuf::from("/nonexistent/trial.json"),
                output: None,
                pretty: false,
                audit_log: None,
            },
            &Config::default(),
        )
        .await;

        assert_eq!(result.exit_code, 1);
        assert!(result.message.starts_with("Error:"));
    }
}
