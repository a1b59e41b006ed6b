use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::graph::{verify_lineage_chain, GraphRecord, LineageGraph};
use super::{EvidenceType, ReasoningNode, RelationType};
use crate::canonical::{serialize_round4, Metadata};
use crate::error::{LineageError, LineageResult};

/// High-level interface for recording a reasoning episode.
///
/// Assigns sequential ids from a single counter: `E0000` style ids for
/// evidence, `I0001` style ids for inferences.
#[derive(Debug, Clone, Default)]
pub struct LineageTracer {
    graph: LineageGraph,
    counter: usize,
}

/// Complete lineage of one node with its hashes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageReport {
    /// The traced node.
    pub target_node: String,
    /// Supporting nodes in dependency order, target last.
    pub lineage_chain: Vec<ReasoningNode>,
    /// Cached hash of each node in `lineage_chain`.
    pub node_hashes: Vec<String>,
    /// Chain hash over `node_hashes`.
    pub lineage_hash: String,
    /// Number of nodes in the chain.
    pub chain_length: usize,
}

impl LineageReport {
    /// Trace `node_id` in `graph` and collect its hashes.
    pub fn from_graph(graph: &LineageGraph, node_id: &str) -> LineageResult<Self> {
        let chain = graph.get_node_lineage(node_id)?;
        let lineage_hash = graph.compute_lineage_hash(node_id)?;

        let node_hashes = chain
            .iter()
            .filter_map(|n| graph.node_hash(&n.node_id))
            .map(str::to_string)
            .collect();

        Ok(Self {
            target_node: node_id.to_string(),
            chain_length: chain.len(),
            lineage_chain: chain.into_iter().cloned().collect(),
            node_hashes,
            lineage_hash,
        })
    }

    /// Recompute every hash in the report from the stored nodes.
    pub fn verify(&self) -> LineageResult<bool> {
        if self.lineage_chain.len() != self.node_hashes.len() {
            return Ok(false);
        }
        for (node, stored) in self.lineage_chain.iter().zip(&self.node_hashes) {
            if &node.compute_hash()? != stored {
                return Ok(false);
            }
        }
        verify_lineage_chain(&self.lineage_chain, &self.lineage_hash)
    }
}

/// Graph-level metrics included in an exported audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageMetrics {
    /// Truth score of the graph.
    #[serde(serialize_with = "serialize_round4")]
    pub truth_score: f64,
    /// Coherence score of the graph.
    #[serde(serialize_with = "serialize_round4")]
    pub coherence_score: f64,
    /// Number of nodes.
    pub total_nodes: usize,
    /// Number of edges.
    pub total_edges: usize,
    /// Contradicting node pairs.
    pub contradictions: Vec<(String, String)>,
}

/// Full export of a reasoning episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageExport {
    /// The graph record.
    pub graph: GraphRecord,
    /// Derived metrics.
    pub metrics: LineageMetrics,
    /// When the export was produced.
    pub timestamp: DateTime<Utc>,
}

impl LineageTracer {
    /// Create a tracer over an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying graph.
    pub fn graph(&self) -> &LineageGraph {
        &self.graph
    }

    /// Consume the tracer, keeping the graph.
    pub fn into_graph(self) -> LineageGraph {
        self.graph
    }

    /// Add an evidence node and return its id.
    pub fn add_evidence(
        &mut self,
        content: impl Into<String>,
        confidence: f64,
        evidence_type: EvidenceType,
    ) -> LineageResult<String> {
        self.add_evidence_with(content, confidence, evidence_type, None, Metadata::new())
    }

    /// Add an evidence node with a source reference and metadata.
    pub fn add_evidence_with(
        &mut self,
        content: impl Into<String>,
        confidence: f64,
        evidence_type: EvidenceType,
        source: Option<String>,
        metadata: Metadata,
    ) -> LineageResult<String> {
        let node_id = format!("E{:04}", self.counter);
        let mut node = ReasoningNode::new(&node_id, content, confidence, evidence_type)
            .with_metadata(metadata);
        node.source = source;

        self.graph.add_node(node)?;
        self.counter += 1;
        Ok(node_id)
    }

    /// Add an inference supported by existing nodes and return its id.
    pub fn add_inference(
        &mut self,
        content: impl Into<String>,
        confidence: f64,
        supporting_nodes: &[&str],
    ) -> LineageResult<String> {
        self.add_inference_with(content, confidence, supporting_nodes, Metadata::new())
    }

    /// Add an inference with metadata.
    ///
    /// Every supporter must already exist; nothing is added otherwise.
    pub fn add_inference_with(
        &mut self,
        content: impl Into<String>,
        confidence: f64,
        supporting_nodes: &[&str],
        metadata: Metadata,
    ) -> LineageResult<String> {
        if let Some(missing) = supporting_nodes.iter().find(|id| !self.graph.contains(id)) {
            return Err(LineageError::unknown(*missing));
        }

        let node_id = format!("I{:04}", self.counter);
        let node = ReasoningNode::new(&node_id, content, confidence, EvidenceType::Inference)
            .with_metadata(metadata);
        self.graph.add_node(node)?;
        self.counter += 1;

        for support_id in supporting_nodes {
            self.graph
                .add_edge(support_id, &node_id, RelationType::Supports, 1.0, None)?;
        }

        Ok(node_id)
    }

    /// Mark two nodes as contradictory.
    pub fn add_contradiction(
        &mut self,
        node_a: &str,
        node_b: &str,
        strength: f64,
    ) -> LineageResult<()> {
        self.graph
            .add_edge(node_a, node_b, RelationType::Contradicts, strength, None)
    }

    /// Lineage chain of a node with per-node and chain hashes.
    pub fn get_full_lineage(&self, node_id: &str) -> LineageResult<LineageReport> {
        LineageReport::from_graph(&self.graph, node_id)
    }

    /// Export the graph together with its metrics.
    pub fn export_audit_trail(&self) -> LineageExport {
        let metrics = LineageMetrics {
            truth_score: self.graph.compute_truth_score(),
            coherence_score: self.graph.compute_coherence_score(),
            total_nodes: self.graph.node_count(),
            total_edges: self.graph.edge_count(),
            contradictions: self.graph.detect_contradictions(),
        };

        info!(
            nodes = metrics.total_nodes,
            edges = metrics.total_edges,
            truth = metrics.truth_score,
            coherence = metrics.coherence_score,
            "Exported lineage trail"
        );

        LineageExport {
            graph: self.graph.to_record(),
            metrics,
            timestamp: Utc::now(),
        }
    }
}
