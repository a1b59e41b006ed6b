//! Reasoning geometry scoring.
//!
//! Six independent sub-scores describe the quality of a reasoning episode:
//!
//! - **truth**: evidence quality, from the lineage graph or claim confidences
//! - **coherence**: internal consistency
//! - **reciprocity**: share of critiques that steelmanned first
//! - **accountability**: share of claims with traceable lineage
//! - **minimality**: artifact length relative to the derivation
//! - **benefit**: weighted blend of five human-benefit axes
//!
//! The composite is a fixed-weight linear combination of the six.
//!
//! Each sub-score has its own no-data default (0.5 neutral, 0.0 absent or
//! 1.0 vacuously true) and they are not interchangeable.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::canonical::{clamp_unit, is_unit, serialize_round4, Metadata};
use crate::error::{ScoringError, ScoringResult};
use crate::lineage::LineageGraph;
use crate::weights::{check_weights, take_weights};

/// Score used for truth, coherence and benefit when there is nothing to measure.
pub const NEUTRAL_SCORE: f64 = 0.5;

// ============================================================================
// Weights
// ============================================================================

/// Weights of the six sub-scores in the composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryWeights {
    /// Weight of the truth score.
    #[serde(serialize_with = "serialize_round4")]
    pub truth: f64,
    /// Weight of the coherence score.
    #[serde(serialize_with = "serialize_round4")]
    pub coherence: f64,
    /// Weight of the reciprocity score.
    #[serde(serialize_with = "serialize_round4")]
    pub reciprocity: f64,
    /// Weight of the accountability score.
    #[serde(serialize_with = "serialize_round4")]
    pub accountability: f64,
    /// Weight of the minimality score.
    #[serde(serialize_with = "serialize_round4")]
    pub minimality: f64,
    /// Weight of the benefit score.
    #[serde(serialize_with = "serialize_round4")]
    pub benefit: f64,
}

impl Default for GeometryWeights {
    fn default() -> Self {
        Self {
            truth: 0.30,
            coherence: 0.20,
            reciprocity: 0.15,
            accountability: 0.15,
            minimality: 0.10,
            benefit: 0.10,
        }
    }
}

impl GeometryWeights {
    /// Names accepted by [`GeometryWeights::from_map`].
    pub const KEYS: [&'static str; 6] = [
        "truth",
        "coherence",
        "reciprocity",
        "accountability",
        "minimality",
        "benefit",
    ];

    /// Build from a map that must contain exactly [`Self::KEYS`].
    pub fn from_map(map: &HashMap<String, f64>) -> ScoringResult<Self> {
        let [truth, coherence, reciprocity, accountability, minimality, benefit] =
            take_weights("geometry", map, Self::KEYS)?;
        let weights = Self {
            truth,
            coherence,
            reciprocity,
            accountability,
            minimality,
            benefit,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Check that all weights are non-negative and sum to 1.0 ± 0.01.
    pub fn validate(&self) -> ScoringResult<()> {
        check_weights(
            "geometry",
            &[
                ("truth", self.truth),
                ("coherence", self.coherence),
                ("reciprocity", self.reciprocity),
                ("accountability", self.accountability),
                ("minimality", self.minimality),
                ("benefit", self.benefit),
            ],
        )
    }
}

/// Weights of the five benefit axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenefitWeights {
    /// Weight of the agency increase axis.
    #[serde(serialize_with = "serialize_round4")]
    pub agency: f64,
    /// Weight of the safety increase axis.
    #[serde(serialize_with = "serialize_round4")]
    pub safety: f64,
    /// Weight of the inclusivity axis.
    #[serde(serialize_with = "serialize_round4")]
    pub inclusivity: f64,
    /// Weight of the cost reduction axis.
    #[serde(serialize_with = "serialize_round4")]
    pub cost: f64,
    /// Weight of the clarity axis.
    #[serde(serialize_with = "serialize_round4")]
    pub clarity: f64,
}

impl Default for BenefitWeights {
    fn default() -> Self {
        Self {
            agency: 0.30,
            safety: 0.25,
            inclusivity: 0.20,
            cost: 0.10,
            clarity: 0.15,
        }
    }
}

impl BenefitWeights {
    /// Names accepted by [`BenefitWeights::from_map`].
    pub const KEYS: [&'static str; 5] = ["agency", "safety", "inclusivity", "cost", "clarity"];

    /// Build from a map that must contain exactly [`Self::KEYS`].
    pub fn from_map(map: &HashMap<String, f64>) -> ScoringResult<Self> {
        let [agency, safety, inclusivity, cost, clarity] = take_weights("benefit", map, Self::KEYS)?;
        let weights = Self {
            agency,
            safety,
            inclusivity,
            cost,
            clarity,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Check that all weights are non-negative and sum to 1.0 ± 0.01.
    pub fn validate(&self) -> ScoringResult<()> {
        check_weights(
            "benefit",
            &[
                ("agency", self.agency),
                ("safety", self.safety),
                ("inclusivity", self.inclusivity),
                ("cost", self.cost),
                ("clarity", self.clarity),
            ],
        )
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Caller-assessed benefit axes, each in `[0, 1]`.
///
/// Axes left out of a JSON document default to 0.5.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenefitInputs {
    /// Increase in human agency.
    pub agency_increase: f64,
    /// Increase in safety.
    pub safety_increase: f64,
    /// Inclusivity / accessibility.
    pub inclusivity: f64,
    /// Cost reduction.
    pub cost_reduction: f64,
    /// Increase in clarity.
    pub clarity: f64,
}

impl Default for BenefitInputs {
    fn default() -> Self {
        Self {
            agency_increase: NEUTRAL_SCORE,
            safety_increase: NEUTRAL_SCORE,
            inclusivity: NEUTRAL_SCORE,
            cost_reduction: NEUTRAL_SCORE,
            clarity: NEUTRAL_SCORE,
        }
    }
}

impl BenefitInputs {
    fn validate(&self) -> ScoringResult<()> {
        for (field, value) in [
            ("agency_increase", self.agency_increase),
            ("safety_increase", self.safety_increase),
            ("inclusivity", self.inclusivity),
            ("cost_reduction", self.cost_reduction),
            ("clarity", self.clarity),
        ] {
            if !is_unit(value) {
                return Err(ScoringError::malformed(
                    field,
                    format!("must be within [0, 1], got {}", value),
                ));
            }
        }
        Ok(())
    }
}

/// Claim-level counts used when no lineage graph is available.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimEvidence {
    /// Confidence of each claim.
    pub confidences: Vec<f64>,
    /// Number of contradicting claim pairs, when they were counted.
    pub contradiction_count: Option<usize>,
    /// Number of claims considered.
    pub total_claims: usize,
}

/// Where truth and coherence are measured from.
///
/// The two modes are exclusive: a graph is never blended with claim counts.
#[derive(Debug, Clone, Default)]
pub enum EvidenceSource<'a> {
    /// Derive both scores from a lineage graph.
    Graph(&'a LineageGraph),
    /// Derive both scores from caller-supplied claim counts.
    Claims(ClaimEvidence),
    /// Nothing to measure; both scores are neutral.
    #[default]
    Absent,
}

/// Everything [`GeometryScorer::compute_all`] reads.
#[derive(Debug, Clone, Default)]
pub struct GeometryInputs<'a> {
    /// Source for truth and coherence.
    pub evidence: EvidenceSource<'a>,
    /// Claims whose lineage can be traced.
    pub claims_with_lineage: usize,
    /// Total non-trivial claims.
    pub total_claims: usize,
    /// Critiques that steelmanned the opposing view first.
    pub steelman_count: usize,
    /// Total critiques.
    pub total_critiques: usize,
    /// Length of the final artifact.
    pub artifact_length: u64,
    /// Length of the derivation that produced it.
    pub derivation_length: u64,
    /// Benefit axes; `None` scores benefit as neutral.
    pub benefit: Option<BenefitInputs>,
    /// Passed through to the result.
    pub metadata: Metadata,
}

// ============================================================================
// Scores
// ============================================================================

/// All six geometry sub-scores and the composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryScores {
    /// T: evidence quality.
    #[serde(serialize_with = "serialize_round4")]
    pub truth: f64,
    /// C: internal consistency.
    #[serde(serialize_with = "serialize_round4")]
    pub coherence: f64,
    /// R: charitable interpretation.
    #[serde(serialize_with = "serialize_round4")]
    pub reciprocity: f64,
    /// A: lineage traceability.
    #[serde(serialize_with = "serialize_round4")]
    pub accountability: f64,
    /// M: efficiency of reasoning.
    #[serde(serialize_with = "serialize_round4")]
    pub minimality: f64,
    /// B: human benefit.
    #[serde(serialize_with = "serialize_round4")]
    pub benefit: f64,
    /// S: weighted combination.
    #[serde(serialize_with = "serialize_round4")]
    pub composite: f64,
    /// Weights used for the composite.
    pub weights: GeometryWeights,
    /// Caller metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

/// Stateless geometry score computer.
#[derive(Debug, Clone, Default)]
pub struct GeometryScorer {
    weights: GeometryWeights,
    benefit_weights: BenefitWeights,
}

impl GeometryScorer {
    /// Create a scorer with custom composite weights.
    pub fn new(weights: GeometryWeights) -> ScoringResult<Self> {
        weights.validate()?;
        Ok(Self {
            weights,
            benefit_weights: BenefitWeights::default(),
        })
    }

    /// Replace the benefit axis weights.
    pub fn with_benefit_weights(mut self, benefit_weights: BenefitWeights) -> ScoringResult<Self> {
        benefit_weights.validate()?;
        self.benefit_weights = benefit_weights;
        Ok(self)
    }

    /// Composite weights in use.
    pub fn weights(&self) -> &GeometryWeights {
        &self.weights
    }

    /// Benefit axis weights in use.
    pub fn benefit_weights(&self) -> &BenefitWeights {
        &self.benefit_weights
    }

    /// Truth score.
    ///
    /// Graph: the graph's truth score. Claims: mean confidence. Otherwise,
    /// or with no claim confidences, 0.5.
    pub fn compute_truth_score(&self, evidence: &EvidenceSource<'_>) -> ScoringResult<f64> {
        match evidence {
            EvidenceSource::Graph(graph) => Ok(clamp_unit(graph.compute_truth_score())),
            EvidenceSource::Claims(claims) if !claims.confidences.is_empty() => {
                if let Some(bad) = claims.confidences.iter().find(|c| !is_unit(**c)) {
                    return Err(ScoringError::malformed(
                        "confidence",
                        format!("claim confidence must be within [0, 1], got {}", bad),
                    ));
                }
                let sum: f64 = claims.confidences.iter().sum();
                Ok(clamp_unit(sum / claims.confidences.len() as f64))
            }
            _ => Ok(NEUTRAL_SCORE),
        }
    }

    /// Coherence score.
    ///
    /// Graph: the graph's coherence score. Claims with at least one claim
    /// and a contradiction count: `max(0, 1 − contradictions / claims)`.
    /// Otherwise 0.5.
    pub fn compute_coherence_score(&self, evidence: &EvidenceSource<'_>) -> f64 {
        match evidence {
            EvidenceSource::Graph(graph) => clamp_unit(graph.compute_coherence_score()),
            EvidenceSource::Claims(ClaimEvidence {
                contradiction_count: Some(contradictions),
                total_claims,
                ..
            }) if *total_claims > 0 => {
                let ratio = *contradictions as f64 / *total_claims as f64;
                clamp_unit(1.0 - ratio)
            }
            _ => NEUTRAL_SCORE,
        }
    }

    /// `min(1, steelman / total)`; 0.0 without critiques.
    pub fn compute_reciprocity_score(&self, steelman_count: usize, total_critiques: usize) -> f64 {
        if total_critiques == 0 {
            return 0.0;
        }
        clamp_unit(steelman_count as f64 / total_critiques as f64)
    }

    /// `min(1, with_lineage / total)`; 0.0 without claims.
    pub fn compute_accountability_score(&self, claims_with_lineage: usize, total_claims: usize) -> f64 {
        if total_claims == 0 {
            return 0.0;
        }
        clamp_unit(claims_with_lineage as f64 / total_claims as f64)
    }

    /// `artifact / (artifact + derivation)`; 0.0 when both are zero.
    pub fn compute_minimality_score(&self, artifact_length: u64, derivation_length: u64) -> f64 {
        let total = artifact_length as f64 + derivation_length as f64;
        if total == 0.0 {
            return 0.0;
        }
        clamp_unit(artifact_length as f64 / total)
    }

    /// Weighted blend of the benefit axes.
    pub fn compute_benefit_score(&self, inputs: &BenefitInputs) -> ScoringResult<f64> {
        inputs.validate()?;
        let w = &self.benefit_weights;
        Ok(clamp_unit(
            w.agency * inputs.agency_increase
                + w.safety * inputs.safety_increase
                + w.inclusivity * inputs.inclusivity
                + w.cost * inputs.cost_reduction
                + w.clarity * inputs.clarity,
        ))
    }

    /// Weighted sum of the six sub-scores, clamped to `[0, 1]`.
    pub fn compute_composite(
        &self,
        truth: f64,
        coherence: f64,
        reciprocity: f64,
        accountability: f64,
        minimality: f64,
        benefit: f64,
    ) -> f64 {
        let w = &self.weights;
        clamp_unit(
            w.truth * truth
                + w.coherence * coherence
                + w.reciprocity * reciprocity
                + w.accountability * accountability
                + w.minimality * minimality
                + w.benefit * benefit,
        )
    }

    /// Compute every sub-score and the composite.
    pub fn compute_all(&self, inputs: &GeometryInputs<'_>) -> ScoringResult<GeometryScores> {
        let truth = self.compute_truth_score(&inputs.evidence)?;
        let coherence = self.compute_coherence_score(&inputs.evidence);
        let reciprocity =
            self.compute_reciprocity_score(inputs.steelman_count, inputs.total_critiques);
        let accountability =
            self.compute_accountability_score(inputs.claims_with_lineage, inputs.total_claims);
        let minimality =
            self.compute_minimality_score(inputs.artifact_length, inputs.derivation_length);
        let benefit = match &inputs.benefit {
            Some(axes) => self.compute_benefit_score(axes)?,
            None => NEUTRAL_SCORE,
        };

        let composite = self.compute_composite(
            truth,
            coherence,
            reciprocity,
            accountability,
            minimality,
            benefit,
        );

        info!(
            truth,
            coherence,
            reciprocity,
            accountability,
            minimality,
            benefit,
            composite,
            "Computed geometry scores"
        );

        Ok(GeometryScores {
            truth,
            coherence,
            reciprocity,
            accountability,
            minimality,
            benefit,
            composite,
            weights: self.weights,
            metadata: inputs.metadata.clone(),
        })
    }
}
