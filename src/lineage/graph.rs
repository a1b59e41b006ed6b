use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{chain_hash, ReasoningEdge, ReasoningNode, RelationType};
use crate::canonical::{canonical_json, is_unit, sha256_hex, Metadata};
use crate::error::{LineageError, LineageResult};

/// Smoothing term in the truth score denominator.
pub const TRUTH_EPSILON: f64 = 0.001;

/// Nodes, edges and cached node hashes for one reasoning episode.
///
/// The graph only grows: nodes and edges are appended, never edited or
/// removed. Nodes live in an insertion-ordered arena; edges keep a parallel
/// list of endpoint indices so traversals never re-resolve ids.
#[derive(Debug, Clone, Default)]
pub struct LineageGraph {
    nodes: Vec<ReasoningNode>,
    node_hashes: Vec<String>,
    index: HashMap<String, usize>,
    edges: Vec<ReasoningEdge>,
    links: Vec<(usize, usize)>,
}

/// Serializable snapshot of a [`LineageGraph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    /// Nodes in insertion order.
    pub nodes: Vec<ReasoningNode>,
    /// Edges in insertion order.
    #[serde(default)]
    pub edges: Vec<ReasoningEdge>,
    /// Hash recorded for each node at insertion time.
    #[serde(default)]
    pub node_hashes: BTreeMap<String, String>,
    /// Summary counts.
    #[serde(default)]
    pub metadata: GraphStats,
}

/// Summary counts for an exported graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Number of nodes.
    pub node_count: usize,
    /// Number of edges.
    pub edge_count: usize,
    /// Number of `contradicts` edges.
    pub contradiction_count: usize,
}

impl LineageGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its hash.
    ///
    /// Duplicate ids are rejected; the graph is left unchanged.
    pub fn add_node(&mut self, node: ReasoningNode) -> LineageResult<String> {
        node.validate()?;
        if self.index.contains_key(&node.node_id) {
            return Err(LineageError::DuplicateNode {
                node_id: node.node_id,
            });
        }

        let hash = node.compute_hash()?;
        debug!(node_id = %node.node_id, hash = %hash, "Added lineage node");

        self.index.insert(node.node_id.clone(), self.nodes.len());
        self.nodes.push(node);
        self.node_hashes.push(hash.clone());
        Ok(hash)
    }

    /// Add a typed edge between two existing nodes.
    pub fn add_edge(
        &mut self,
        from_node_id: &str,
        to_node_id: &str,
        relation_type: RelationType,
        strength: f64,
        metadata: Option<Metadata>,
    ) -> LineageResult<()> {
        let from = self.position(from_node_id)?;
        let to = self.position(to_node_id)?;
        if !is_unit(strength) {
            return Err(LineageError::malformed(
                "strength",
                format!("must be within [0, 1], got {}", strength),
            ));
        }

        debug!(
            from = %from_node_id,
            to = %to_node_id,
            relation = %relation_type,
            strength,
            "Added lineage edge"
        );

        self.edges.push(ReasoningEdge {
            from_node: from_node_id.to_string(),
            to_node: to_node_id.to_string(),
            relation_type,
            strength,
            metadata: metadata.unwrap_or_default(),
        });
        self.links.push((from, to));
        Ok(())
    }

    /// Look up a node by id.
    pub fn node(&self, node_id: &str) -> Option<&ReasoningNode> {
        self.index.get(node_id).map(|&i| &self.nodes[i])
    }

    /// Cached hash of a node.
    pub fn node_hash(&self, node_id: &str) -> Option<&str> {
        self.index.get(node_id).map(|&i| self.node_hashes[i].as_str())
    }

    /// Whether a node with this id exists.
    pub fn contains(&self, node_id: &str) -> bool {
        self.index.contains_key(node_id)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> &[ReasoningNode] {
        &self.nodes
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> &[ReasoningEdge] {
        &self.edges
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Backward trace of everything that supports `node_id`.
    ///
    /// Follows `supports` edges into the target depth-first, visiting each
    /// node at most once, and returns nodes in post-order: a node appears
    /// after all of its (visited) supporters, with the target last. Uses an
    /// explicit stack, so long chains and support cycles are both safe.
    pub fn get_node_lineage(&self, node_id: &str) -> LineageResult<Vec<&ReasoningNode>> {
        let root = self.position(node_id)?;
        Ok(self
            .trace(root)
            .into_iter()
            .map(|i| &self.nodes[i])
            .collect())
    }

    /// Chain hash over the cached hashes of the lineage of `node_id`.
    pub fn compute_lineage_hash(&self, node_id: &str) -> LineageResult<String> {
        let root = self.position(node_id)?;
        let order = self.trace(root);
        Ok(chain_hash(order.iter().map(|&i| self.node_hashes[i].as_str())))
    }

    /// Every `contradicts` edge as a `(from, to)` pair.
    pub fn detect_contradictions(&self) -> Vec<(String, String)> {
        self.edges
            .iter()
            .filter(|e| e.relation_type == RelationType::Contradicts)
            .map(|e| (e.from_node.clone(), e.to_node.clone()))
            .collect()
    }

    /// Share of confidence-weighted edge mass that is supportive.
    ///
    /// `T = Σ_supports(strength × conf(from)) / (Σ_all(strength × conf(from)) + ε)`.
    /// A graph without edges scores 0.0: unevidenced means unsupported.
    pub fn compute_truth_score(&self) -> f64 {
        if self.edges.is_empty() {
            return 0.0;
        }

        let mut support = 0.0;
        let mut total = 0.0;
        for (edge, &(from, _)) in self.edges.iter().zip(&self.links) {
            let weight = edge.strength * self.nodes[from].confidence;
            total += weight;
            if edge.relation_type == RelationType::Supports {
                support += weight;
            }
        }

        support / (total + TRUTH_EPSILON)
    }

    /// `1 − contradictions / edges`, floored at 0.0; 1.0 for a graph without edges.
    pub fn compute_coherence_score(&self) -> f64 {
        if self.edges.is_empty() {
            return 1.0;
        }

        let contradictions = self
            .edges
            .iter()
            .filter(|e| e.relation_type == RelationType::Contradicts)
            .count();

        (1.0 - contradictions as f64 / self.edges.len() as f64).max(0.0)
    }

    /// Export the graph to its record form.
    pub fn to_record(&self) -> GraphRecord {
        GraphRecord {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            node_hashes: self
                .nodes
                .iter()
                .zip(&self.node_hashes)
                .map(|(n, h)| (n.node_id.clone(), h.clone()))
                .collect(),
            metadata: GraphStats {
                node_count: self.nodes.len(),
                edge_count: self.edges.len(),
                contradiction_count: self.detect_contradictions().len(),
            },
        }
    }

    /// Rebuild a graph from its record form.
    ///
    /// When the record carries hashes, the hash recomputed for every node must
    /// match the stored one and both must cover the same node ids; otherwise
    /// the record has been altered and [`LineageError::HashMismatch`] is
    /// returned. A record without any hashes is accepted as a fresh graph.
    pub fn from_record(record: GraphRecord) -> LineageResult<Self> {
        let GraphRecord {
            nodes,
            edges,
            node_hashes,
            ..
        } = record;
        let verify = !node_hashes.is_empty();

        let mut graph = Self::new();
        for node in nodes {
            let node_id = node.node_id.clone();
            let hash = graph.add_node(node)?;
            if verify && node_hashes.get(&node_id) != Some(&hash) {
                return Err(LineageError::HashMismatch { node_id });
            }
        }

        if verify {
            if let Some(orphan) = node_hashes.keys().find(|id| !graph.contains(id)) {
                return Err(LineageError::HashMismatch {
                    node_id: orphan.clone(),
                });
            }
        }

        for edge in edges {
            graph.add_edge(
                &edge.from_node,
                &edge.to_node,
                edge.relation_type,
                edge.strength,
                Some(edge.metadata),
            )?;
        }

        Ok(graph)
    }

    /// Export nodes as JSON lines, one node per line with its `hash`.
    pub fn export_jsonl(&self) -> LineageResult<Vec<String>> {
        self.nodes
            .iter()
            .zip(&self.node_hashes)
            .map(|(node, hash)| {
                let mut value = serde_json::to_value(node)?;
                if let Some(object) = value.as_object_mut() {
                    object.insert("hash".to_string(), serde_json::Value::from(hash.as_str()));
                }
                Ok(value.to_string())
            })
            .collect()
    }

    fn position(&self, node_id: &str) -> LineageResult<usize> {
        self.index
            .get(node_id)
            .copied()
            .ok_or_else(|| LineageError::unknown(node_id))
    }

    /// Iterative post-order DFS over incoming `supports` edges.
    fn trace(&self, root: usize) -> Vec<usize> {
        let mut supporters: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (edge, &(from, to)) in self.edges.iter().zip(&self.links) {
            if edge.relation_type == RelationType::Supports {
                supporters[to].push(from);
            }
        }

        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        // (node, index of the next supporter to explore)
        let mut stack = vec![(root, 0usize)];
        visited[root] = true;

        while let Some(frame) = stack.last_mut() {
            let (current, cursor) = *frame;
            match supporters[current].get(cursor) {
                Some(&next) => {
                    frame.1 += 1;
                    if !visited[next] {
                        visited[next] = true;
                        stack.push((next, 0));
                    }
                }
                None => {
                    order.push(current);
                    stack.pop();
                }
            }
        }

        order
    }
}

/// Hash of a single node, as cached by [`LineageGraph::add_node`].
pub fn compute_node_hash(node: &ReasoningNode) -> LineageResult<String> {
    node.compute_hash()
}

/// Recompute a chain hash from a stored node list and compare it.
///
/// Each node is re-hashed from its fields, so altering any node in the chain
/// (or reordering the chain) changes the result.
pub fn verify_lineage_chain(chain: &[ReasoningNode], expected: &str) -> LineageResult<bool> {
    let hashes = chain
        .iter()
        .map(ReasoningNode::compute_hash)
        .collect::<LineageResult<Vec<_>>>()?;
    Ok(chain_hash(hashes.iter().map(String::as_str)) == expected)
}

/// Digest of a list of nodes rendered as one sorted-key JSON array.
pub fn compute_lineage_digest(nodes: &[ReasoningNode]) -> LineageResult<String> {
    let canonical = canonical_json(nodes)?;
    Ok(sha256_hex(canonical.as_bytes()))
}
