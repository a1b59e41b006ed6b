//! Reasoning lineage tracking with SHA-256 hash chains.
//!
//! A reasoning episode is recorded as a [`LineageGraph`]: every unit of
//! evidence or inference is a [`ReasoningNode`], and typed relations between
//! them are [`ReasoningEdge`]s. Each node is hashed once on insertion; a
//! conclusion's lineage (the transitive closure of `supports` edges feeding
//! into it) can then be digested into a single chain hash that changes if any
//! supporting node is altered.
//!
//! [`LineageTracer`] is a convenience layer that assigns node ids and wires up
//! support edges for the common evidence → inference pattern.

mod graph;
mod tracer;


pub use graph::{
    compute_lineage_digest, compute_node_hash, verify_lineage_chain, GraphRecord, GraphStats, LineageGraph,
    TRUTH_EPSILON,
};
pub use tracer::{LineageExport, LineageMetrics, LineageReport, LineageTracer};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_json, is_unit, serialize_round4, sha256_hex, Metadata};
use crate::error::{LineageError, LineageResult};

// ============================================================================
// Relation Types
// ============================================================================

/// Type of relationship between two reasoning nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// Source node is evidence for the target node.
    Supports,
    /// Source node contradicts the target node.
    Contradicts,
    /// Source node refines the target node.
    Refines,
    /// Source node questions the target node.
    Questions,
    /// Source node is synthesized into the target node.
    Synthesizes,
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationType::Supports => write!(f, "supports"),
            RelationType::Contradicts => write!(f, "contradicts"),
            RelationType::Refines => write!(f, "refines"),
            RelationType::Questions => write!(f, "questions"),
            RelationType::Synthesizes => write!(f, "synthesizes"),
        }
    }
}

impl std::str::FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "supports" => Ok(RelationType::Supports),
            "contradicts" => Ok(RelationType::Contradicts),
            "refines" => Ok(RelationType::Refines),
            "questions" => Ok(RelationType::Questions),
            "synthesizes" => Ok(RelationType::Synthesizes),
            _ => Err(format!("Unknown relation type: {}", s)),
        }
    }
}

// ============================================================================
// Evidence Types
// ============================================================================

/// Kind of evidence a node represents.
///
/// The four well-known kinds are closed variants; anything else is kept as a
/// normalized (trimmed, lower-cased) [`EvidenceType::Other`]. Empty strings are
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EvidenceType {
    /// Directly established fact.
    Fact,
    /// Conclusion derived from other nodes.
    Inference,
    /// Premise taken without support.
    Assumption,
    /// Something observed during the episode.
    Observation,
    /// Any other caller-defined kind.
    Other(String),
}

impl EvidenceType {
    /// The serialized name of this evidence type.
    pub fn as_str(&self) -> &str {
        match self {
            EvidenceType::Fact => "fact",
            EvidenceType::Inference => "inference",
            EvidenceType::Assumption => "assumption",
            EvidenceType::Observation => "observation",
            EvidenceType::Other(name) => name,
        }
    }
}

impl std::fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EvidenceType {
    type Err = LineageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "" => Err(LineageError::malformed(
                "evidence_type",
                "cannot be empty",
            )),
            "fact" => Ok(EvidenceType::Fact),
            "inference" => Ok(EvidenceType::Inference),
            "assumption" => Ok(EvidenceType::Assumption),
            "observation" => Ok(EvidenceType::Observation),
            _ => Ok(EvidenceType::Other(normalized)),
        }
    }
}

impl TryFrom<String> for EvidenceType {
    type Error = LineageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EvidenceType> for String {
    fn from(value: EvidenceType) -> Self {
        value.as_str().to_string()
    }
}

// ============================================================================
// Nodes and Edges
// ============================================================================

/// A single unit of evidence or inference.
///
/// Nodes are treated as immutable once added to a graph: the graph caches a
/// hash over every field, and only hands out shared references afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningNode {
    /// Caller-assigned identifier, unique within a graph.
    pub node_id: String,
    /// The evidence or inference text.
    pub content: String,
    /// Confidence in this node (0.0-1.0).
    #[serde(serialize_with = "serialize_round4")]
    pub confidence: f64,
    /// Kind of evidence.
    pub evidence_type: EvidenceType,
    /// Optional source reference.
    pub source: Option<String>,
    /// When the node was created.
    pub timestamp: DateTime<Utc>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

impl ReasoningNode {
    /// Create a new node stamped with the current time.
    pub fn new(
        node_id: impl Into<String>,
        content: impl Into<String>,
        confidence: f64,
        evidence_type: EvidenceType,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            content: content.into(),
            confidence,
            evidence_type,
            source: None,
            timestamp: Utc::now(),
            metadata: Metadata::new(),
        }
    }

    /// Set the source reference.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the creation timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Replace the metadata map.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Check that the node can be inserted into a graph.
    pub fn validate(&self) -> LineageResult<()> {
        if self.node_id.trim().is_empty() {
            return Err(LineageError::malformed("node_id", "cannot be empty"));
        }
        if !is_unit(self.confidence) {
            return Err(LineageError::malformed(
                "confidence",
                format!("must be within [0, 1], got {}", self.confidence),
            ));
        }
        Ok(())
    }

    /// SHA-256 over the sorted-key JSON form of every field.
    pub fn compute_hash(&self) -> LineageResult<String> {
        let canonical = canonical_json(self)?;
        Ok(sha256_hex(canonical.as_bytes()))
    }
}

/// A directed, typed relation between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningEdge {
    /// Source node ID.
    pub from_node: String,
    /// Target node ID.
    pub to_node: String,
    /// Type of relationship.
    pub relation_type: RelationType,
    /// Strength of the relationship (0.0-1.0).
    #[serde(serialize_with = "serialize_round4")]
    pub strength: f64,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

/// Digest of an ordered sequence of node hashes.
pub(crate) fn chain_hash<'a>(hashes: impl IntoIterator<Item = &'a str>) -> String {
    let combined: String = hashes.into_iter().collect();
    sha256_hex(combined.as_bytes())
}
