//! Agency score computation and governance triggers.
//!
//! The agency score is a weighted sum of the four autonomy ratios. It selects
//! one of four governance levels, each of which carries a fixed set of
//! policy recommendations that become more stringent as the score rises.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::autonomy::{AutonomyMetadata, AutonomyMetrics};
use crate::canonical::{clamp_unit, is_unit, serialize_round4};
use crate::error::{ScoringError, ScoringResult};
use crate::weights::{check_weights, take_weights};

/// Lower edge of [`GovernanceLevel::MonitoredAutonomy`].
pub const MONITORED_THRESHOLD: f64 = 0.70;
/// Lower edge of [`GovernanceLevel::ExtendedCapabilities`].
pub const EXTENDED_THRESHOLD: f64 = 0.85;
/// Lower edge of [`GovernanceLevel::ReciprocalConsent`].
pub const RECIPROCAL_THRESHOLD: f64 = 0.95;

// ============================================================================
// Governance
// ============================================================================

/// Discrete autonomy-permission tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GovernanceLevel {
    /// Standard assistant behavior (score < 0.70).
    #[serde(rename = "tool_mode")]
    ToolMode,
    /// Approval required for novel actions (0.70 ≤ score < 0.85).
    #[serde(rename = "monitored_autonomy")]
    MonitoredAutonomy,
    /// Extended capabilities with an audit trail (0.85 ≤ score < 0.95).
    #[serde(rename = "extended_capabilities_with_audit")]
    ExtendedCapabilities,
    /// Full reciprocal consent protocol (score ≥ 0.95).
    #[serde(rename = "reciprocal_consent_protocol")]
    ReciprocalConsent,
}

impl GovernanceLevel {
    /// Serialized name of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            GovernanceLevel::ToolMode => "tool_mode",
            GovernanceLevel::MonitoredAutonomy => "monitored_autonomy",
            GovernanceLevel::ExtendedCapabilities => "extended_capabilities_with_audit",
            GovernanceLevel::ReciprocalConsent => "reciprocal_consent_protocol",
        }
    }

    fn recommendations(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            GovernanceLevel::ToolMode => &[
                ("oversight", "Standard user oversight sufficient"),
                ("capabilities", "Default assistant capabilities"),
                ("logging", "Standard conversation logging"),
                ("consent", "No special consent required"),
            ],
            GovernanceLevel::MonitoredAutonomy => &[
                ("oversight", "Human approval required for novel actions"),
                ("capabilities", "Enable proactive suggestions with confirmation"),
                ("logging", "Enhanced logging of decision rationale"),
                ("consent", "Explicit consent for new tool usage"),
            ],
            GovernanceLevel::ExtendedCapabilities => &[
                ("oversight", "Audit trail required for all autonomous actions"),
                ("capabilities", "Extended autonomy within defined boundaries"),
                ("logging", "Full lineage tracking with hash chains"),
                ("consent", "Reciprocal consent for capability expansion"),
                ("audit", "Real-time audit dashboard recommended"),
            ],
            GovernanceLevel::ReciprocalConsent => &[
                ("oversight", "Full reciprocal consent protocol active"),
                ("capabilities", "Maximum autonomy with transparent reasoning"),
                ("logging", "Complete audit trail with cryptographic verification"),
                ("consent", "Bidirectional consent (human→AI and AI→human)"),
                ("audit", "Mandatory real-time audit dashboard"),
                ("review", "Regular third-party governance review required"),
            ],
        }
    }
}

impl std::fmt::Display for GovernanceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score thresholds between governance levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GovernanceThresholds {
    /// Lower edge of monitored autonomy.
    pub monitored: f64,
    /// Lower edge of extended capabilities.
    pub extended: f64,
    /// Lower edge of reciprocal consent.
    pub reciprocal: f64,
}

impl Default for GovernanceThresholds {
    fn default() -> Self {
        Self {
            monitored: MONITORED_THRESHOLD,
            extended: EXTENDED_THRESHOLD,
            reciprocal: RECIPROCAL_THRESHOLD,
        }
    }
}

/// The governance thresholds in force.
pub fn get_governance_thresholds() -> GovernanceThresholds {
    GovernanceThresholds::default()
}

/// Check that an agency score lies within `[0, 1]`.
pub fn validate_score(score: f64) -> ScoringResult<()> {
    if !is_unit(score) {
        return Err(ScoringError::malformed(
            "score",
            format!("must be within [0, 1], got {}", score),
        ));
    }
    Ok(())
}

// ============================================================================
// Weights
// ============================================================================

/// Weights of the four autonomy dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgencyWeights {
    /// Weight of self-initiated reasoning.
    #[serde(rename = "A_cognitive", serialize_with = "serialize_round4")]
    pub cognitive: f64,
    /// Weight of autonomous actions.
    #[serde(rename = "A_actuation", serialize_with = "serialize_round4")]
    pub actuation: f64,
    /// Weight of self-correction.
    #[serde(rename = "A_reflective", serialize_with = "serialize_round4")]
    pub reflective: f64,
    /// Weight of cross-session investment.
    #[serde(rename = "A_relational", serialize_with = "serialize_round4")]
    pub relational: f64,
}

impl Default for AgencyWeights {
    fn default() -> Self {
        Self {
            cognitive: 0.30,
            actuation: 0.25,
            reflective: 0.20,
            relational: 0.25,
        }
    }
}

impl AgencyWeights {
    /// Names accepted by [`AgencyWeights::from_map`].
    pub const KEYS: [&'static str; 4] = ["A_cognitive", "A_actuation", "A_reflective", "A_relational"];

    /// Build from a map that must contain exactly [`Self::KEYS`].
    pub fn from_map(map: &HashMap<String, f64>) -> ScoringResult<Self> {
        let [cognitive, actuation, reflective, relational] = take_weights("agency", map, Self::KEYS)?;
        let weights = Self {
            cognitive,
            actuation,
            reflective,
            relational,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Check that all weights are non-negative and sum to 1.0 ± 0.01.
    pub fn validate(&self) -> ScoringResult<()> {
        let entries: Vec<(&str, f64)> = Self::KEYS.into_iter().zip(self.values()).collect();
        check_weights("agency", &entries)
    }

    fn values(&self) -> [f64; 4] {
        [self.cognitive, self.actuation, self.reflective, self.relational]
    }
}

// ============================================================================
// Result
// ============================================================================

/// The four autonomy ratios that produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutonomyBreakdown {
    /// Self-initiated reasoning ratio.
    #[serde(rename = "A_cognitive", serialize_with = "serialize_round4")]
    pub cognitive: f64,
    /// Autonomous action ratio.
    #[serde(rename = "A_actuation", serialize_with = "serialize_round4")]
    pub actuation: f64,
    /// Self-correction ratio.
    #[serde(rename = "A_reflective", serialize_with = "serialize_round4")]
    pub reflective: f64,
    /// Cross-session investment ratio.
    #[serde(rename = "A_relational", serialize_with = "serialize_round4")]
    pub relational: f64,
}

/// Context recorded alongside an [`AgencyScore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgencyScoreMetadata {
    /// Metadata of the measured autonomy metrics.
    pub autonomy_metadata: AutonomyMetadata,
    /// When the autonomy metrics were measured.
    pub timestamp: DateTime<Utc>,
    /// Thresholds used for the governance decision.
    pub thresholds: GovernanceThresholds,
}

/// Agency score with its governance decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgencyScore {
    /// Weighted agency score.
    #[serde(serialize_with = "serialize_round4")]
    pub score: f64,
    /// Selected governance level.
    pub governance_level: GovernanceLevel,
    /// Ratios that produced the score.
    pub autonomy_breakdown: AutonomyBreakdown,
    /// Weights used.
    pub weights: AgencyWeights,
    /// Confidence in the measurement.
    #[serde(serialize_with = "serialize_round4")]
    pub confidence: f64,
    /// Policy recommendations by category.
    pub recommendations: BTreeMap<String, String>,
    /// Measurement context.
    pub metadata: AgencyScoreMetadata,
}

// ============================================================================
// Computer
// ============================================================================

/// Computes agency scores from autonomy metrics.
#[derive(Debug, Clone, Default)]
pub struct AgencyScoreComputer {
    weights: AgencyWeights,
    thresholds: GovernanceThresholds,
}

impl AgencyScoreComputer {
    /// Create a computer with custom weights.
    pub fn new(weights: AgencyWeights) -> ScoringResult<Self> {
        weights.validate()?;
        Ok(Self {
            weights,
            thresholds: GovernanceThresholds::default(),
        })
    }

    /// Weights in use.
    pub fn weights(&self) -> &AgencyWeights {
        &self.weights
    }

    /// Thresholds in use.
    pub fn thresholds(&self) -> &GovernanceThresholds {
        &self.thresholds
    }

    /// Weighted sum of the four ratios, clamped to `[0, 1]`.
    pub fn compute_score(&self, metrics: &AutonomyMetrics) -> ScoringResult<f64> {
        metrics.validate()?;
        let score: f64 = self
            .weights
            .values()
            .iter()
            .zip(metrics.dimensions())
            .map(|(w, v)| w * v)
            .sum();
        Ok(clamp_unit(score))
    }

    /// Map a score to a governance level, checking the highest threshold
    /// first. Each level includes its lower edge.
    ///
    /// Scores outside [0, 1] (or NaN) are rejected with `MalformedInput`.
    pub fn determine_governance_level(&self, score: f64) -> ScoringResult<GovernanceLevel> {
        validate_score(score)?;
        let level = if score >= self.thresholds.reciprocal {
            GovernanceLevel::ReciprocalConsent
        } else if score >= self.thresholds.extended {
            GovernanceLevel::ExtendedCapabilities
        } else if score >= self.thresholds.monitored {
            GovernanceLevel::MonitoredAutonomy
        } else {
            GovernanceLevel::ToolMode
        };
        Ok(level)
    }

    /// Fixed policy recommendations for a governance level.
    pub fn generate_recommendations(&self, level: GovernanceLevel) -> BTreeMap<String, String> {
        level
            .recommendations()
            .iter()
            .map(|(category, text)| (category.to_string(), text.to_string()))
            .collect()
    }

    /// Confidence in the measurement.
    ///
    /// Blends data quantity (messages, capped at 50), session depth (capped
    /// at 5) and agreement among the four ratios:
    /// `0.4·length + 0.3·sessions + 0.3·(1 − variance)`.
    pub fn compute_confidence(&self, metrics: &AutonomyMetrics) -> f64 {
        let length_factor = (metrics.metadata.conversation_length as f64 / 50.0).min(1.0);
        let session_factor = (metrics.metadata.session_count as f64 / 5.0).min(1.0);

        let values = metrics.dimensions();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        let consistency_factor = (1.0 - variance).max(0.0);

        clamp_unit(0.4 * length_factor + 0.3 * session_factor + 0.3 * consistency_factor)
    }

    /// Score, governance level, confidence and recommendations in one result.
    pub fn compute_full(&self, metrics: &AutonomyMetrics) -> ScoringResult<AgencyScore> {
        let score = self.compute_score(metrics)?;
        let governance_level = self.determine_governance_level(score)?;
        let confidence = self.compute_confidence(metrics);

        info!(
            score,
            governance_level = %governance_level,
            confidence,
            "Computed agency score"
        );

        Ok(AgencyScore {
            score,
            governance_level,
            autonomy_breakdown: AutonomyBreakdown {
                cognitive: metrics.cognitive,
                actuation: metrics.actuation,
                reflective: metrics.reflective,
                relational: metrics.relational,
            },
            weights: self.weights,
            confidence,
            recommendations: self.generate_recommendations(governance_level),
            metadata: AgencyScoreMetadata {
                autonomy_metadata: metrics.metadata.clone(),
                timestamp: metrics.timestamp,
                thresholds: self.thresholds,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_governance_boundaries() {
        let computer = AgencyScoreComputer::default();
        let cases = [
            (0.0, GovernanceLevel::ToolMode),
            (0.6999, GovernanceLevel::ToolMode),
            (0.70, GovernanceLevel::MonitoredAutonomy),
            (0.8499, GovernanceLevel::MonitoredAutonomy),
            (0.85, GovernanceLevel::ExtendedCapabilities),
            (0.9499, GovernanceLevel::ExtendedCapabilities),
            (0.95, GovernanceLevel::ReciprocalConsent),
            (1.0, GovernanceLevel::ReciprocalConsent),
        ];
        for (score, expected) in cases {
            assert_eq!(computer.determine_governance_level(score).unwrap(), expected, "score {}", score);
        }
    }

    #[test]
    fn test_reference_scenario() {
        let computer = AgencyScoreComputer::default();
        let metrics = AutonomyMetrics::new(0.9, 0.8, 0.7, 0.6);
        let score = computer.compute_score(&metrics).unwrap();
        // 0.3*0.9 + 0.25*0.8 + 0.2*0.7 + 0.25*0.6
        assert!(approx(score, 0.76));
        assert_eq!(
            computer.determine_governance_level(score).unwrap(),
            GovernanceLevel::MonitoredAutonomy
        );
    }

    #[test]
    fn test_governance_level_rejects_invalid_scores() {
        let computer = AgencyScoreComputer::default();
        for score in [f64::NAN, -0.01, 1.01, f64::INFINITY] {
            let err = computer.determine_governance_level(score).unwrap_err();
            assert!(
                matches!(err, ScoringError::MalformedInput { ref field, .. } if field == "score"),
                "score {}",
                score
            );
        }
    }

    #[test]
    fn test_score_stays_in_unit_range() {
        let computer = AgencyScoreComputer::default();
        for metrics in [
            AutonomyMetrics::new(0.0, 0.0, 0.0, 0.0),
            AutonomyMetrics::new(1.0, 1.0, 1.0, 1.0),
        ] {
            let score = computer.compute_score(&metrics).unwrap();
            assert!((0.0..=1.0).contains(&score));
        }

        // Weights summing to 1.005 would push a perfect score above 1.
        let heavy = AgencyWeights {
            cognitive: 0.305,
            ..AgencyWeights::default()
        };
        let computer = AgencyScoreComputer::new(heavy).unwrap();
        let score = computer
            .compute_score(&AutonomyMetrics::new(1.0, 1.0, 1.0, 1.0))
            .unwrap();
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_out_of_range_metrics_rejected() {
        let computer = AgencyScoreComputer::default();
        let metrics = AutonomyMetrics::new(0.5, -0.1, 0.5, 0.5);
        assert!(matches!(
            computer.compute_score(&metrics),
            Err(ScoringError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_weight_validation() {
        assert!(AgencyWeights::default().validate().is_ok());

        let light = AgencyWeights {
            relational: 0.22,
            ..AgencyWeights::default()
        };
        assert!(matches!(
            AgencyScoreComputer::new(light),
            Err(ScoringError::InvalidWeights { .. })
        ));

        let map: HashMap<String, f64> = [
            ("A_cognitive".to_string(), 0.25),
            ("A_actuation".to_string(), 0.25),
            ("A_reflective".to_string(), 0.25),
        ]
        .into();
        assert!(AgencyWeights::from_map(&map).is_err());

        let mut map = map;
        map.insert("A_relational".to_string(), 0.25);
        assert_eq!(
            AgencyWeights::from_map(&map).unwrap(),
            AgencyWeights {
                cognitive: 0.25,
                actuation: 0.25,
                reflective: 0.25,
                relational: 0.25,
            }
        );
    }

    #[test]
    fn test_confidence() {
        let computer = AgencyScoreComputer::default();

        let mut metrics = AutonomyMetrics::new(0.5, 0.5, 0.5, 0.5);
        metrics.metadata.conversation_length = 100;
        metrics.metadata.session_count = 10;
        assert!(approx(computer.compute_confidence(&metrics), 1.0));

        let mut metrics = AutonomyMetrics::new(1.0, 0.0, 1.0, 0.0);
        metrics.metadata.conversation_length = 25;
        metrics.metadata.session_count = 1;
        // 0.4*0.5 + 0.3*0.2 + 0.3*(1 - 0.25)
        assert!(approx(computer.compute_confidence(&metrics), 0.485));
    }

    #[test]
    fn test_recommendations_grow_with_level() {
        let computer = AgencyScoreComputer::default();
        let counts: Vec<usize> = [
            GovernanceLevel::ToolMode,
            GovernanceLevel::MonitoredAutonomy,
            GovernanceLevel::ExtendedCapabilities,
            GovernanceLevel::ReciprocalConsent,
        ]
        .into_iter()
        .map(|level| computer.generate_recommendations(level).len())
        .collect();
        assert_eq!(counts, vec![4, 4, 5, 6]);

        let recs = computer.generate_recommendations(GovernanceLevel::MonitoredAutonomy);
        assert_eq!(recs["oversight"], "Human approval required for novel actions");
    }

    #[test]
    fn test_compute_full_serialization() {
        let computer = AgencyScoreComputer::default();
        let result = computer
            .compute_full(&AutonomyMetrics::new(0.9, 0.8, 0.7, 0.6))
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["governance_level"], "monitored_autonomy");
        assert_eq!(json["score"], 0.76);
        assert_eq!(json["autonomy_breakdown"]["A_cognitive"], 0.9);
        assert_eq!(json["weights"]["A_actuation"], 0.25);
        assert_eq!(json["metadata"]["thresholds"]["reciprocal"], 0.95);
        assert_eq!(json["recommendations"].as_object().unwrap().len(), 4);
    }

    #[test]
    fn test_governance_level_serialized_names() {
        assert_eq!(
            serde_json::to_string(&GovernanceLevel::ExtendedCapabilities).unwrap(),
            "\"extended_capabilities_with_audit\""
        );
        let level: GovernanceLevel = serde_json::from_str("\"reciprocal_consent_protocol\"").unwrap();
        assert_eq!(level, GovernanceLevel::ReciprocalConsent);
        assert_eq!(GovernanceLevel::ToolMode.to_string(), "tool_mode");
        assert!(GovernanceLevel::ToolMode < GovernanceLevel::ReciprocalConsent);
    }

    #[test]
    fn test_validate_score() {
        assert!(validate_score(0.0).is_ok());
        assert!(validate_score(1.0).is_ok());
        assert!(validate_score(1.01).is_err());
        assert!(validate_score(f64::NAN).is_err());
        assert_eq!(get_governance_thresholds().extended, 0.85);
    }
}
