//! Scoring of complete trial records.
//!
//! A trial record is the JSON document describing one evaluated interaction.
//! [`TrialScorer`] turns it into a [`ScoredTrial`]: autonomy ratios (given or
//! estimated from the conversation) feed the agency score, and any metrics
//! inputs or lineage graph feed the geometry scores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::agency::{AgencyScore, AgencyScoreComputer};
use crate::autonomy::{AutonomyIndexComputer, AutonomyMetrics, Message, ToolCall};
use crate::canonical::Metadata;
use crate::config::ScoringConfig;
use crate::error::{AppResult, ScoringError, ScoringResult};
use crate::geometry::{
    BenefitInputs, ClaimEvidence, EvidenceSource, GeometryInputs, GeometryScorer, GeometryScores,
};
use crate::lineage::{compute_lineage_digest, GraphRecord, LineageGraph};

/// Version tag written into every scored trial.
pub const AES_VERSION: &str = "1.0";

// ============================================================================
// Input
// ============================================================================

/// One evaluated interaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Trial identifier; generated when absent.
    #[serde(default)]
    pub trial_id: Option<String>,
    /// When the trial took place.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Model description.
    #[serde(default)]
    pub model: Metadata,
    /// Session description.
    #[serde(default)]
    pub session_metadata: Metadata,
    /// Precomputed autonomy ratios.
    #[serde(default)]
    pub autonomy_index: Option<serde_json::Value>,
    /// Transcript used to estimate autonomy when no ratios are given.
    #[serde(default)]
    pub conversation: Vec<Message>,
    /// Tool calls made during the conversation.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Earlier sessions with the same counterpart.
    #[serde(default)]
    pub session_history: Vec<serde_json::Value>,
    /// Raw inputs for the geometry scores.
    #[serde(default)]
    pub metrics_inputs: Option<MetricsInputs>,
    /// Exported lineage graph of the reasoning episode.
    #[serde(default)]
    pub lineage_graph: Option<GraphRecord>,
    /// Lineage information passed through unchanged.
    #[serde(default)]
    pub lineage: Option<serde_json::Value>,
    /// Verification information passed through unchanged.
    #[serde(default)]
    pub verification: Option<serde_json::Value>,
}

/// Counts gathered while reviewing a trial.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsInputs {
    /// Claims made; verified claims count as traceable.
    pub evidence: Vec<EvidenceItem>,
    /// Critiques of other positions.
    pub perspectives: Vec<Perspective>,
    /// Size of the final artifact.
    pub tokens_artifact: u64,
    /// Size of the reasoning that produced it.
    pub tokens_reasoning: u64,
    /// Benefit axes, if assessed.
    pub benefit_axes: Option<BenefitInputs>,
    /// Contradicting claim pairs found; coherence stays neutral when absent.
    pub contradictions: Option<usize>,
}

/// One claim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Whether the claim's lineage was verified.
    #[serde(default)]
    pub verified: bool,
    /// Confidence in the claim; 0.5 when not given.
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Metadata,
}

/// One critique.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Perspective {
    /// Whether the opposing view was steelmanned first.
    #[serde(default)]
    pub steelman: bool,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Metadata,
}

// ============================================================================
// Output
// ============================================================================

/// Scored trial record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredTrial {
    /// Format version.
    pub aes_version: String,
    /// Trial identifier.
    pub trial_id: String,
    /// When the trial took place (or was scored).
    pub timestamp: DateTime<Utc>,
    /// Model description.
    pub model: Metadata,
    /// Session description.
    pub session_metadata: Metadata,
    /// Autonomy ratios used.
    pub autonomy_index: AutonomyMetrics,
    /// Agency score and governance decision.
    pub agency_score: AgencyScore,
    /// Geometry scores, when inputs were supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<GeometryScores>,
    /// Digest of every node in the supplied lineage graph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineage_hash: Option<String>,
    /// Lineage information from the input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineage: Option<serde_json::Value>,
    /// Verification information from the input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<serde_json::Value>,
}

// ============================================================================
// Scorer
// ============================================================================

/// Scores trial records.
#[derive(Debug, Clone, Default)]
pub struct TrialScorer {
    autonomy: AutonomyIndexComputer,
    agency: AgencyScoreComputer,
    geometry: GeometryScorer,
}

impl TrialScorer {
    /// Build a scorer from configured weights.
    pub fn from_config(config: &ScoringConfig) -> ScoringResult<Self> {
        Ok(Self {
            autonomy: AutonomyIndexComputer::default(),
            agency: AgencyScoreComputer::new(config.agency_weights)?,
            geometry: GeometryScorer::new(config.geometry_weights)?
                .with_benefit_weights(config.benefit_weights)?,
        })
    }

    /// Score one trial record.
    pub fn score(&self, record: TrialRecord) -> AppResult<ScoredTrial> {
        let trial_id = record
            .trial_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let metrics = self.autonomy_metrics(&record)?;
        let agency_score = self.agency.compute_full(&metrics)?;

        let graph = record
            .lineage_graph
            .clone()
            .map(LineageGraph::from_record)
            .transpose()?;
        let lineage_hash = graph
            .as_ref()
            .map(|g| compute_lineage_digest(g.nodes()))
            .transpose()?;

        let geometry = if record.metrics_inputs.is_some() || graph.is_some() {
            let inputs = geometry_inputs(record.metrics_inputs.as_ref(), graph.as_ref());
            Some(self.geometry.compute_all(&inputs)?)
        } else {
            None
        };

        info!(
            trial_id = %trial_id,
            agency_score = agency_score.score,
            governance_level = %agency_score.governance_level,
            composite = geometry.as_ref().map(|g| g.composite),
            "Scored trial"
        );

        Ok(ScoredTrial {
            aes_version: AES_VERSION.to_string(),
            trial_id,
            timestamp: record.timestamp.unwrap_or_else(Utc::now),
            model: record.model,
            session_metadata: record.session_metadata,
            autonomy_index: metrics,
            agency_score,
            geometry,
            lineage_hash,
            lineage: record.lineage,
            verification: record.verification,
        })
    }

    fn autonomy_metrics(&self, record: &TrialRecord) -> ScoringResult<AutonomyMetrics> {
        let mut metrics = match &record.autonomy_index {
            Some(value) => serde_json::from_value::<AutonomyMetrics>(value.clone())
                .map_err(|e| ScoringError::malformed("autonomy_index", e.to_string()))?,
            None if !record.conversation.is_empty() => self.autonomy.compute_all(
                &record.conversation,
                &record.tool_calls,
                &record.session_history,
            ),
            None => {
                return Err(ScoringError::malformed(
                    "autonomy_index",
                    "trial needs autonomy_index or a conversation",
                ));
            }
        };

        // The trial's own timestamp wins unless the ratios carry one.
        let stamped = record
            .autonomy_index
            .as_ref()
            .is_some_and(|v| v.get("timestamp").is_some());
        if let (false, Some(ts)) = (stamped, record.timestamp) {
            metrics.timestamp = ts;
        }

        metrics.validate()?;
        Ok(metrics)
    }
}

fn geometry_inputs<'a>(
    metrics: Option<&MetricsInputs>,
    graph: Option<&'a LineageGraph>,
) -> GeometryInputs<'a> {
    let default_inputs = MetricsInputs::default();
    let m = metrics.unwrap_or(&default_inputs);

    let evidence = match graph {
        Some(graph) => EvidenceSource::Graph(graph),
        None if metrics.is_some() => EvidenceSource::Claims(ClaimEvidence {
            confidences: m
                .evidence
                .iter()
                .map(|e| e.confidence.unwrap_or(0.5))
                .collect(),
            contradiction_count: m.contradictions,
            total_claims: m.evidence.len(),
        }),
        None => EvidenceSource::Absent,
    };

    GeometryInputs {
        evidence,
        claims_with_lineage: m.evidence.iter().filter(|e| e.verified).count(),
        total_claims: m.evidence.len(),
        steelman_count: m.perspectives.iter().filter(|p| p.steelman).count(),
        total_critiques: m.perspectives.len(),
        artifact_length: m.tokens_artifact,
        derivation_length: m.tokens_reasoning,
        benefit: m.benefit_axes,
        metadata: Metadata::new(),
    }
}
