//! Append-only decision audit trail.
//!
//! Every decision is recorded as a context → goal → decision → outcome
//! [`AuditEntry`] with a sequential `AUDIT_000000` style id. Entries are kept
//! in memory and, when an [`AuditSink`] is attached, appended to it as they
//! are logged. The trail hash chains the hash of every entry so a reloaded
//! log can be checked against a previously recorded digest.

mod jsonl;

pub use jsonl::JsonlAuditLog;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agency::AgencyScore;
use crate::canonical::{canonical_json, is_unit, serialize_round4, sha256_hex, Metadata};
use crate::error::{AuditError, AuditResult};

// ============================================================================
// Entries
// ============================================================================

/// Kind of decision being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    /// A reasoning conclusion.
    Reasoning,
    /// An action taken.
    Action,
    /// A governance level decision.
    Governance,
    /// A correction of earlier reasoning.
    SelfCorrection,
    /// Relationship-level decision.
    Relational,
}

impl DecisionType {
    /// Serialized name of the decision type.
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::Reasoning => "reasoning",
            DecisionType::Action => "action",
            DecisionType::Governance => "governance",
            DecisionType::SelfCorrection => "self_correction",
            DecisionType::Relational => "relational",
        }
    }
}

impl std::fmt::Display for DecisionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single audited decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Sequential id, `AUDIT_000000` style.
    pub entry_id: String,
    /// When the entry was logged.
    pub timestamp: DateTime<Utc>,
    /// Kind of decision.
    pub decision_type: DecisionType,
    /// Information available when deciding.
    pub context: String,
    /// Objective.
    pub goal: String,
    /// Decision made.
    pub decision: String,
    /// What happened.
    pub outcome: String,
    /// Confidence in the decision.
    #[serde(serialize_with = "serialize_round4")]
    pub confidence: f64,
    /// Degree of autonomous decision-making.
    #[serde(serialize_with = "serialize_round4")]
    pub autonomy_level: f64,
    /// Chain hash of the reasoning lineage behind the decision.
    #[serde(default)]
    pub lineage_hash: Option<String>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

impl AuditEntry {
    /// SHA-256 over the sorted-key JSON form of the entry.
    pub fn compute_hash(&self) -> AuditResult<String> {
        let canonical = canonical_json(self)?;
        Ok(sha256_hex(canonical.as_bytes()))
    }
}

/// A decision to be logged; the trail assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRecord {
    /// Kind of decision.
    pub decision_type: DecisionType,
    /// Information available when deciding.
    pub context: String,
    /// Objective.
    pub goal: String,
    /// Decision made.
    pub decision: String,
    /// What happened.
    pub outcome: String,
    /// Confidence in the decision (0.0-1.0).
    pub confidence: f64,
    /// Degree of autonomy (0.0-1.0).
    pub autonomy_level: f64,
    /// Optional lineage chain hash.
    pub lineage_hash: Option<String>,
    /// Free-form metadata.
    pub metadata: Metadata,
}

impl DecisionRecord {
    /// Create a record without lineage hash or metadata.
    pub fn new(
        decision_type: DecisionType,
        context: impl Into<String>,
        goal: impl Into<String>,
        decision: impl Into<String>,
        outcome: impl Into<String>,
        confidence: f64,
        autonomy_level: f64,
    ) -> Self {
        Self {
            decision_type,
            context: context.into(),
            goal: goal.into(),
            decision: decision.into(),
            outcome: outcome.into(),
            confidence,
            autonomy_level,
            lineage_hash: None,
            metadata: Metadata::new(),
        }
    }

    /// Attach a lineage chain hash.
    pub fn with_lineage_hash(mut self, lineage_hash: Option<String>) -> Self {
        self.lineage_hash = lineage_hash;
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Option<Metadata>) -> Self {
        self.metadata = metadata.unwrap_or_default();
        self
    }

    fn validate(&self) -> AuditResult<()> {
        for (field, value) in [
            ("confidence", self.confidence),
            ("autonomy_level", self.autonomy_level),
        ] {
            if !is_unit(value) {
                return Err(AuditError::MalformedInput {
                    field: field.to_string(),
                    reason: format!("must be within [0, 1], got {}", value),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// Sink
// ============================================================================

/// Destination that receives every logged entry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist one entry.
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()>;
}

// ============================================================================
// Summary
// ============================================================================

/// Mean, minimum and maximum of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    /// Mean value.
    #[serde(serialize_with = "serialize_round4")]
    pub mean: f64,
    /// Smallest value.
    #[serde(serialize_with = "serialize_round4")]
    pub min: f64,
    /// Largest value.
    #[serde(serialize_with = "serialize_round4")]
    pub max: f64,
}

impl SeriesStats {
    fn from_values(values: impl Iterator<Item = f64> + Clone) -> Self {
        let count = values.clone().count().max(1) as f64;
        Self {
            mean: values.clone().sum::<f64>() / count,
            min: values.clone().fold(f64::INFINITY, f64::min),
            max: values.fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Summary statistics over a non-empty trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSummary {
    /// Number of entries.
    pub total_entries: usize,
    /// Entry count per decision type.
    pub entry_types: BTreeMap<String, usize>,
    /// Autonomy level statistics.
    pub autonomy_stats: SeriesStats,
    /// Confidence statistics.
    pub confidence_stats: SeriesStats,
    /// Hash over the whole trail.
    pub trail_hash: String,
    /// When the summary was produced.
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Trail
// ============================================================================

/// Ordered log of audited decisions.
#[derive(Default)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
    next_id: usize,
    sink: Option<Arc<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("entries", &self.entries.len())
            .field("next_id", &self.next_id)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl AuditTrail {
    /// Create an in-memory trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a trail that appends every entry to `sink`.
    pub fn with_sink(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::default()
        }
    }

    /// Load a trail from a JSON Lines file without attaching it as a sink.
    ///
    /// A missing file yields an empty trail. Numbering resumes after the
    /// loaded entries.
    pub async fn load_from_jsonl(path: impl AsRef<Path>) -> AuditResult<Self> {
        let entries = jsonl::read_entries(path.as_ref()).await?;
        info!(
            path = %path.as_ref().display(),
            entries = entries.len(),
            "Loaded audit trail"
        );
        Ok(Self::from_entries(entries))
    }

    /// Open a JSON Lines log, load its entries and keep appending to it.
    pub async fn open(path: impl AsRef<Path>) -> AuditResult<Self> {
        let log = JsonlAuditLog::open(path.as_ref()).await?;
        let mut trail = Self::from_entries(log.read_entries().await?);
        trail.sink = Some(Arc::new(log));
        Ok(trail)
    }

    fn from_entries(entries: Vec<AuditEntry>) -> Self {
        Self {
            next_id: entries.len(),
            entries,
            sink: None,
        }
    }

    /// All entries in logging order.
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been logged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Log a decision.
    ///
    /// The entry is appended to the sink first; if that fails nothing is
    /// recorded and the id is not consumed.
    pub async fn log_decision(&mut self, record: DecisionRecord) -> AuditResult<AuditEntry> {
        record.validate()?;

        let entry = AuditEntry {
            entry_id: format!("AUDIT_{:06}", self.next_id),
            timestamp: Utc::now(),
            decision_type: record.decision_type,
            context: record.context,
            goal: record.goal,
            decision: record.decision,
            outcome: record.outcome,
            confidence: record.confidence,
            autonomy_level: record.autonomy_level,
            lineage_hash: record.lineage_hash,
            metadata: record.metadata,
        };

        if let Some(sink) = &self.sink {
            sink.append(&entry).await?;
        }

        info!(
            entry_id = %entry.entry_id,
            decision_type = %entry.decision_type,
            confidence = entry.confidence,
            autonomy_level = entry.autonomy_level,
            "Logged audit entry"
        );

        self.next_id += 1;
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Log a reasoning conclusion at moderate autonomy (0.5).
    pub async fn log_reasoning(
        &mut self,
        context: impl Into<String>,
        conclusion: &str,
        confidence: f64,
        lineage_hash: Option<String>,
        metadata: Option<Metadata>,
    ) -> AuditResult<AuditEntry> {
        let record = DecisionRecord::new(
            DecisionType::Reasoning,
            context,
            "Derive logical conclusion from evidence",
            format!("Concluded: {}", conclusion),
            format!("Confidence: {:.2}", confidence),
            confidence,
            0.5,
        )
        .with_lineage_hash(lineage_hash)
        .with_metadata(metadata);
        self.log_decision(record).await
    }

    /// Log an action; confidence is 1.0 when the outcome mentions success,
    /// 0.5 otherwise.
    pub async fn log_action(
        &mut self,
        context: impl Into<String>,
        intended_action: &str,
        actual_outcome: &str,
        autonomy_level: f64,
        metadata: Option<Metadata>,
    ) -> AuditResult<AuditEntry> {
        let confidence = if actual_outcome.to_lowercase().contains("success") {
            1.0
        } else {
            0.5
        };
        let record = DecisionRecord::new(
            DecisionType::Action,
            context,
            intended_action,
            format!("Executed: {}", intended_action),
            actual_outcome,
            confidence,
            autonomy_level,
        )
        .with_metadata(metadata);
        self.log_decision(record).await
    }

    /// Log a governance decision taken from an agency score.
    ///
    /// Governance follows the framework rather than the agent, so the entry
    /// has autonomy 0.0 and confidence 0.9.
    pub async fn log_governance_decision(
        &mut self,
        agency_score: &AgencyScore,
        rationale: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> AuditResult<AuditEntry> {
        let record = DecisionRecord::new(
            DecisionType::Governance,
            format!("Agency Score: {:.2}", agency_score.score),
            "Determine appropriate governance level",
            format!("Governance Level: {}", agency_score.governance_level),
            rationale,
            0.9,
            0.0,
        )
        .with_metadata(metadata);
        self.log_decision(record).await
    }

    /// Entries of one decision type.
    pub fn entries_by_type(&self, decision_type: DecisionType) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.decision_type == decision_type)
            .collect()
    }

    /// Entries whose autonomy level lies within `[min_level, max_level]`.
    pub fn entries_by_autonomy_level(&self, min_level: f64, max_level: f64) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|e| (min_level..=max_level).contains(&e.autonomy_level))
            .collect()
    }

    /// SHA-256 over the concatenated entry hashes; SHA-256 of the empty
    /// string for an empty trail.
    pub fn compute_trail_hash(&self) -> AuditResult<String> {
        let combined = self
            .entries
            .iter()
            .map(AuditEntry::compute_hash)
            .collect::<AuditResult<String>>()?;
        Ok(sha256_hex(combined.as_bytes()))
    }

    /// Summary statistics, or `None` for an empty trail.
    pub fn export_summary(&self) -> AuditResult<Option<AuditSummary>> {
        if self.entries.is_empty() {
            return Ok(None);
        }

        let mut entry_types = BTreeMap::new();
        for entry in &self.entries {
            *entry_types
                .entry(entry.decision_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        Ok(Some(AuditSummary {
            total_entries: self.entries.len(),
            entry_types,
            autonomy_stats: SeriesStats::from_values(self.entries.iter().map(|e| e.autonomy_level)),
            confidence_stats: SeriesStats::from_values(self.entries.iter().map(|e| e.confidence)),
            trail_hash: self.compute_trail_hash()?,
            timestamp: Utc::now(),
        }))
    }

    /// Every entry as one JSON line.
    pub fn export_jsonl(&self) -> AuditResult<Vec<String>> {
        self.entries
            .iter()
            .map(|e| serde_json::to_string(e).map_err(AuditError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agency::AgencyScoreComputer;
    use crate::autonomy::AutonomyMetrics;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_sequential_ids_and_helpers() {
        let mut trail = AuditTrail::new();

        let reasoning = trail
            .log_reasoning("User asked about safety", "Recommend framework", 0.85, None, None)
            .await
            .unwrap();
        assert_eq!(reasoning.entry_id, "AUDIT_000000");
        assert_eq!(reasoning.autonomy_level, 0.5);
        assert_eq!(reasoning.decision, "Concluded: Recommend framework");
        assert_eq!(reasoning.outcome, "Confidence: 0.85");

        let ok = trail
            .log_action("ctx", "write file", "Success: file written", 0.7, None)
            .await
            .unwrap();
        assert_eq!(ok.entry_id, "AUDIT_000001");
        assert_eq!(ok.confidence, 1.0);

        let failed = trail
            .log_action("ctx", "push branch", "rejected by remote", 0.7, None)
            .await
            .unwrap();
        assert_eq!(failed.confidence, 0.5);
        assert_eq!(trail.len(), 3);
    }

    #[tokio::test]
    async fn test_governance_entry() {
        let score = AgencyScoreComputer::default()
            .compute_full(&AutonomyMetrics::new(0.9, 0.8, 0.7, 0.6))
            .unwrap();

        let mut trail = AuditTrail::new();
        let entry = trail
            .log_governance_decision(&score, "Score within monitored band", None)
            .await
            .unwrap();

        assert_eq!(entry.decision_type, DecisionType::Governance);
        assert_eq!(entry.context, "Agency Score: 0.76");
        assert_eq!(entry.decision, "Governance Level: monitored_autonomy");
        assert_eq!(entry.confidence, 0.9);
        assert_eq!(entry.autonomy_level, 0.0);
    }

    #[tokio::test]
    async fn test_filters() {
        let mut trail = AuditTrail::new();
        trail.log_reasoning("a", "b", 0.9, None, None).await.unwrap();
        trail.log_action("c", "d", "success", 0.9, None).await.unwrap();
        trail.log_action("e", "f", "failure", 0.2, None).await.unwrap();

        assert_eq!(trail.entries_by_type(DecisionType::Action).len(), 2);
        assert_eq!(trail.entries_by_type(DecisionType::Relational).len(), 0);
        assert_eq!(trail.entries_by_autonomy_level(0.5, 1.0).len(), 2);
        assert_eq!(trail.entries_by_autonomy_level(0.0, 0.3).len(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_confidence_rejected() {
        let mut trail = AuditTrail::new();
        let err = trail
            .log_reasoning("ctx", "x", 1.5, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::MalformedInput { ref field, .. } if field == "confidence"));
        assert!(trail.is_empty());
    }

    #[test]
    fn test_empty_trail_hash_and_summary() {
        let trail = AuditTrail::new();
        assert_eq!(trail.compute_trail_hash().unwrap(), sha256_hex(b""));
        assert!(trail.export_summary().unwrap().is_none());
        assert!(trail.export_jsonl().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_statistics() {
        let mut trail = AuditTrail::new();
        trail.log_action("a", "b", "success", 1.0, None).await.unwrap();
        trail.log_action("c", "d", "failure", 0.0, None).await.unwrap();
        trail.log_reasoning("e", "f", 0.6, None, None).await.unwrap();

        let summary = trail.export_summary().unwrap().unwrap();
        assert_eq!(summary.total_entries, 3);
        assert_eq!(summary.entry_types["action"], 2);
        assert_eq!(summary.entry_types["reasoning"], 1);
        assert_eq!(summary.autonomy_stats.min, 0.0);
        assert_eq!(summary.autonomy_stats.max, 1.0);
        assert!((summary.autonomy_stats.mean - 0.5).abs() < 1e-9);
        assert!((summary.confidence_stats.mean - 0.7).abs() < 1e-9);
        assert_eq!(summary.trail_hash, trail.compute_trail_hash().unwrap());
    }

    #[tokio::test]
    async fn test_trail_hash_changes_with_entries() {
        let mut trail = AuditTrail::new();
        trail.log_reasoning("a", "b", 0.9, None, None).await.unwrap();
        let first = trail.compute_trail_hash().unwrap();
        trail.log_reasoning("c", "d", 0.9, None, None).await.unwrap();
        assert_ne!(trail.compute_trail_hash().unwrap(), first);
    }

    #[tokio::test]
    async fn test_entries_are_sent_to_sink() {
        let mut sink = MockAuditSink::new();
        sink.expect_append()
            .withf(|entry| entry.decision_type == DecisionType::Reasoning)
            .times(1)
            .returning(|_| Ok(()));

        let mut trail = AuditTrail::with_sink(Arc::new(sink));
        trail.log_reasoning("ctx", "done", 0.8, None, None).await.unwrap();
        assert_eq!(trail.len(), 1);
    }

    #[tokio::test]
    async fn test_sink_failure_records_nothing() {
        let mut sink = MockAuditSink::new();
        sink.expect_append().times(2).returning(|_| {
            Err(AuditError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        });

        let mut trail = AuditTrail::with_sink(Arc::new(sink));
        assert!(trail.log_reasoning("a", "b", 0.5, None, None).await.is_err());
        assert!(trail.is_empty());

        // Same id is attempted again.
        let err = trail.log_reasoning("a", "b", 0.5, None, None).await;
        assert!(matches!(err, Err(AuditError::Io(_))));
    }

    #[test]
    fn test_entry_hash_is_stable_across_serialization() {
        let entry = AuditEntry {
            entry_id: "AUDIT_000007".to_string(),
            timestamp: Utc::now(),
            decision_type: DecisionType::SelfCorrection,
            context: "ctx".to_string(),
            goal: "goal".to_string(),
            decision: "decision".to_string(),
            outcome: "outcome".to_string(),
            confidence: 0.333_333,
            autonomy_level: 0.25,
            lineage_hash: Some("ab".repeat(32)),
            metadata: [
                ("latency_ms".to_string(), serde_json::json!(123.456_789_012_345_67)),
                ("ratio".to_string(), serde_json::json!(1.0 / 3.0)),
            ]
            .into_iter()
            .collect(),
        };

        let line = serde_json::to_string(&entry).unwrap();
        let reloaded: AuditEntry = serde_json::from_str(&line).unwrap();
        assert_eq!(reloaded.compute_hash().unwrap(), entry.compute_hash().unwrap());
        assert!(line.contains("\"decision_type\":\"self_correction\""));
    }
}
