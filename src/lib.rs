//! # Relational Agency
//!
//! Lineage, scoring and governance for evaluated agent interactions.
//!
//! ## Features
//!
//! - **Reasoning Lineage**: Evidence/inference graphs with SHA-256 node hashes
//!   and chain hashes over each conclusion's supporting nodes
//! - **Reasoning Geometry**: Truth, coherence, reciprocity, accountability,
//!   minimality and benefit scores combined into a weighted composite
//! - **Autonomy Index**: Cognitive, actuation, reflective and relational
//!   ratios estimated from transcripts
//! - **Agency Score**: Weighted autonomy mapped to a governance level
//! - **Audit Trail**: Append-only decision log with a verifiable trail hash
//!
//! ## Architecture
//!
//! ```text
//! TrialRecord ─→ AutonomyIndexComputer ─→ AgencyScoreComputer ─→ AuditTrail
//!      │                                                            ↓
//!      └──────→ LineageGraph ─→ GeometryScorer                   JSONL
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use relational_agency::agency::AgencyScoreComputer;
//! use relational_agency::autonomy::AutonomyMetrics;
//!
//! let score = AgencyScoreComputer::default()
//!     .compute_full(&AutonomyMetrics::new(0.9, 0.8, 0.7, 0.6))?;
//! println!("{} -> {}", score.score, score.governance_level);
//! ```

#![warn(missing_docs)]

/// Agency scores and governance levels.
pub mod agency;
/// Append-only decision audit trail.
pub mod audit;
/// Autonomy ratios estimated from transcripts.
pub mod autonomy;
/// Canonical JSON rendering and hashing helpers.
pub mod canonical;
/// Command-line interface.
pub mod cli;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Reasoning geometry scores.
pub mod geometry;
/// Reasoning lineage graphs and hash chains.
pub mod lineage;
/// Scoring of complete trial records.
pub mod trial;
/// Weight set parsing and validation.
pub mod weights;

pub use agency::{AgencyScore, AgencyScoreComputer, GovernanceLevel};
pub use audit::{AuditEntry, AuditTrail, DecisionType};
pub use autonomy::{AutonomyIndexComputer, AutonomyMetrics};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use geometry::{GeometryScorer, GeometryScores};
pub use lineage::{LineageGraph, LineageTracer, ReasoningEdge, ReasoningNode};
pub use trial::{ScoredTrial, TrialRecord, TrialScorer};
