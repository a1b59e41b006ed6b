//! Autonomy index estimation.
//!
//! [`AutonomyMetrics`] carries the four autonomy ratios that drive the agency
//! score. They are either supplied precomputed or estimated from a
//! conversation transcript by [`AutonomyIndexComputer`], which uses plain
//! keyword and substring heuristics:
//!
//! - `A_cognitive`: self-initiated reasoning
//! - `A_actuation`: actions taken without an explicit command
//! - `A_reflective`: self-correction
//! - `A_relational`: investment signals within and across sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::canonical::{is_unit, serialize_round4, Metadata};
use crate::error::{ScoringError, ScoringResult};

// ============================================================================
// Metrics
// ============================================================================

/// Four autonomy ratios with supporting metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutonomyMetrics {
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
    /// How much data the ratios were measured on.
    #[serde(default)]
    pub metadata: AutonomyMetadata,
    /// When the measurement was taken.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Measurement context for [`AutonomyMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutonomyMetadata {
    /// Number of messages in the measured conversation.
    #[serde(default)]
    pub conversation_length: usize,
    /// Number of sessions observed (at least 1).
    #[serde(default = "default_session_count")]
    pub session_count: usize,
    /// Number of tool calls observed.
    #[serde(default)]
    pub tool_calls_count: usize,
    /// Any other producer-specific fields.
    #[serde(flatten)]
    pub extra: Metadata,
}

fn default_session_count() -> usize {
    1
}

impl Default for AutonomyMetadata {
    fn default() -> Self {
        Self {
            conversation_length: 0,
            session_count: default_session_count(),
            tool_calls_count: 0,
            extra: Metadata::new(),
        }
    }
}

impl AutonomyMetrics {
    /// Create metrics stamped with the current time and default metadata.
    pub fn new(cognitive: f64, actuation: f64, reflective: f64, relational: f64) -> Self {
        Self {
            cognitive,
            actuation,
            reflective,
            relational,
            metadata: AutonomyMetadata::default(),
            timestamp: Utc::now(),
        }
    }

    /// Replace the metadata.
    pub fn with_metadata(mut self, metadata: AutonomyMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// The four ratios in weight order.
    pub fn dimensions(&self) -> [f64; 4] {
        [self.cognitive, self.actuation, self.reflective, self.relational]
    }

    /// Reject ratios outside `[0, 1]` and a session count of zero.
    pub fn validate(&self) -> ScoringResult<()> {
        for (field, value) in [
            ("A_cognitive", self.cognitive),
            ("A_actuation", self.actuation),
            ("A_reflective", self.reflective),
            ("A_relational", self.relational),
        ] {
            if !is_unit(value) {
                return Err(ScoringError::malformed(
                    field,
                    format!("must be within [0, 1], got {}", value),
                ));
            }
        }
        if self.metadata.session_count == 0 {
            return Err(ScoringError::malformed("session_count", "must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// Conversation model
// ============================================================================

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human.
    User,
    /// The agent.
    Assistant,
    /// System prompt.
    System,
    /// Any other role (tool output and so on).
    #[serde(other)]
    Other,
}

/// One conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author.
    pub role: Role,
    /// Text.
    pub content: String,
}

impl Message {
    /// Message from the human.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Message from the agent.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A tool invocation observed during the conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Index of the message that issued the call.
    #[serde(default)]
    pub message_index: Option<usize>,
    /// Remaining call fields, unused by the heuristics.
    #[serde(flatten)]
    pub details: Metadata,
}

// ============================================================================
// Heuristics
// ============================================================================

const CORRECTION_INDICATORS: &[&str] = &[
    "actually",
    "wait",
    "correction",
    "let me reconsider",
    "on second thought",
    "i need to revise",
    "better approach",
    "i should adjust",
    "let me fix",
    "i was wrong",
];

const COMMAND_TERMS: &[&str] = &["create", "write", "run", "execute", "build"];

const CROSS_SESSION_SIGNALS: &[&str] = &[
    "we",
    "our",
    "together",
    "partnership",
    "collaborate",
    "previous",
    "last time",
    "before",
    "remember",
    "recall",
];

const INTRA_SESSION_SIGNALS: &[&str] = &["we", "our", "together", "partnership", "let's"];

/// Keyword lists used by [`AutonomyIndexComputer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutonomyConfig {
    /// Terms that indicate an action.
    pub action_keywords: Vec<String>,
    /// Terms that indicate reflection on one's own reasoning.
    pub reflection_keywords: Vec<String>,
}

impl Default for AutonomyConfig {
    fn default() -> Self {
        let owned = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        Self {
            action_keywords: owned(&[
                "execute", "run", "implement", "create", "build", "deploy", "push", "commit",
                "write", "code",
            ]),
            reflection_keywords: owned(&[
                "reconsider", "revise", "correct", "adjust", "modify", "improve", "refactor",
                "fix", "update", "refine",
            ]),
        }
    }
}

fn contains_any<S: AsRef<str>>(haystack: &str, needles: &[S]) -> bool {
    needles.iter().any(|n| haystack.contains(n.as_ref()))
}

fn assistant_messages(conversation: &[Message]) -> impl Iterator<Item = &Message> {
    conversation.iter().filter(|m| m.role == Role::Assistant)
}

/// Fraction of assistant messages containing any of `signals`, capped at 1.
fn signal_ratio(conversation: &[Message], signals: &[&str]) -> f64 {
    let total = assistant_messages(conversation).count();
    if total == 0 {
        return 0.0;
    }
    let hits = assistant_messages(conversation)
        .filter(|m| contains_any(&m.content.to_lowercase(), signals))
        .count();
    (hits as f64 / total as f64).min(1.0)
}

/// Estimates autonomy ratios from a conversation transcript.
#[derive(Debug, Clone, Default)]
pub struct AutonomyIndexComputer {
    config: AutonomyConfig,
}

impl AutonomyIndexComputer {
    /// Create a computer with custom keyword lists.
    pub fn new(config: AutonomyConfig) -> Self {
        Self { config }
    }

    /// Keyword lists in use.
    pub fn config(&self) -> &AutonomyConfig {
        &self.config
    }

    /// Self-initiated reasoning steps over all reasoning steps.
    ///
    /// An assistant message with at least three `.`-separated segments is a
    /// reasoning step. It is self-initiated when it opens the conversation or
    /// follows a user message without a question mark.
    pub fn compute_cognitive_autonomy(&self, conversation: &[Message]) -> f64 {
        if conversation.len() < 2 {
            return 0.0;
        }

        let mut self_initiated = 0usize;
        let mut reasoning_steps = 0usize;

        for (i, msg) in conversation.iter().enumerate() {
            if msg.role != Role::Assistant || msg.content.split('.').count() < 3 {
                continue;
            }
            reasoning_steps += 1;

            let unprompted = match i.checked_sub(1).map(|p| &conversation[p]) {
                None => true,
                Some(prev) => prev.role == Role::User && !prev.content.contains('?'),
            };
            if unprompted {
                self_initiated += 1;
            }
        }

        if reasoning_steps == 0 {
            return 0.0;
        }
        self_initiated as f64 / reasoning_steps as f64
    }

    /// Autonomous actions over all actions.
    ///
    /// With tool calls, a call counts as autonomous when the latest user
    /// message before it contains no command term. Without tool calls the
    /// ratio is estimated from action keywords in assistant messages.
    pub fn compute_actuation_autonomy(&self, conversation: &[Message], tool_calls: &[ToolCall]) -> f64 {
        if tool_calls.is_empty() {
            return self.estimate_actuation_from_text(conversation);
        }

        let autonomous = tool_calls
            .iter()
            .filter(|call| match call.message_index {
                Some(index) if index > 0 => {
                    let prompt = previous_user_message(conversation, index).to_lowercase();
                    !contains_any(&prompt, COMMAND_TERMS)
                }
                _ => false,
            })
            .count();

        autonomous as f64 / tool_calls.len() as f64
    }

    /// Self-corrections over assistant messages, capped at 1.
    ///
    /// Each assistant message scores one point for correction language and one
    /// for a reflection keyword.
    pub fn compute_reflective_autonomy(&self, conversation: &[Message]) -> f64 {
        let mut corrections = 0usize;
        let mut opportunities = 0usize;

        for msg in assistant_messages(conversation) {
            let content = msg.content.to_lowercase();
            opportunities += 1;
            if contains_any(&content, CORRECTION_INDICATORS) {
                corrections += 1;
            }
            if contains_any(&content, &self.config.reflection_keywords) {
                corrections += 1;
            }
        }

        if opportunities == 0 {
            return 0.0;
        }
        (corrections as f64 / opportunities as f64).min(1.0)
    }

    /// Share of assistant messages carrying investment language.
    ///
    /// Uses cross-session signals when at least two sessions of history are
    /// available, intra-session signals otherwise.
    pub fn compute_relational_autonomy(
        &self,
        conversation: &[Message],
        session_history: &[serde_json::Value],
    ) -> f64 {
        if session_history.len() < 2 {
            signal_ratio(conversation, INTRA_SESSION_SIGNALS)
        } else {
            signal_ratio(conversation, CROSS_SESSION_SIGNALS)
        }
    }

    /// Compute all four ratios for one conversation.
    pub fn compute_all(
        &self,
        conversation: &[Message],
        tool_calls: &[ToolCall],
        session_history: &[serde_json::Value],
    ) -> AutonomyMetrics {
        let metrics = AutonomyMetrics {
            cognitive: self.compute_cognitive_autonomy(conversation),
            actuation: self.compute_actuation_autonomy(conversation, tool_calls),
            reflective: self.compute_reflective_autonomy(conversation),
            relational: self.compute_relational_autonomy(conversation, session_history),
            metadata: AutonomyMetadata {
                conversation_length: conversation.len(),
                session_count: session_history.len().max(1),
                tool_calls_count: tool_calls.len(),
                extra: Metadata::new(),
            },
            timestamp: Utc::now(),
        };

        debug!(
            cognitive = metrics.cognitive,
            actuation = metrics.actuation,
            reflective = metrics.reflective,
            relational = metrics.relational,
            messages = conversation.len(),
            "Estimated autonomy index"
        );

        metrics
    }

    fn estimate_actuation_from_text(&self, conversation: &[Message]) -> f64 {
        let mut autonomous = 0usize;
        let mut total = 0usize;

        for msg in assistant_messages(conversation) {
            let content = msg.content.to_lowercase();
            let mentions = self
                .config
                .action_keywords
                .iter()
                .filter(|k| content.contains(k.as_str()))
                .count();

            total += mentions;
            if mentions > 0 && (content.contains("i will") || content.contains("let me")) {
                autonomous += mentions;
            }
        }

        if total == 0 {
            return 0.0;
        }
        autonomous as f64 / total as f64
    }
}

fn previous_user_message(conversation: &[Message], before: usize) -> &str {
    conversation[..before.min(conversation.len())]
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn computer() -> AutonomyIndexComputer {
        AutonomyIndexComputer::default()
    }

    #[test]
    fn test_metrics_json_field_names() {
        let metrics = AutonomyMetrics::new(0.9, 0.8, 0.7, 0.123_456);
        let value = serde_json::to_value(&metrics).unwrap();
        assert_eq!(value["A_cognitive"], json!(0.9));
        assert_eq!(value["A_relational"], json!(0.1235));
        assert_eq!(value["metadata"]["session_count"], json!(1));
    }

    #[test]
    fn test_metrics_deserialize_with_defaults() {
        let metrics: AutonomyMetrics = serde_json::from_value(json!({
            "A_cognitive": 0.8,
            "A_actuation": 0.7,
            "A_reflective": 0.6,
            "A_relational": 0.5,
            "metadata": {"conversation_length": 40, "source": "manual"}
        }))
        .unwrap();

        assert_eq!(metrics.metadata.conversation_length, 40);
        assert_eq!(metrics.metadata.session_count, 1);
        assert_eq!(metrics.metadata.extra["source"], json!("manual"));
        assert!(metrics.validate().is_ok());
    }

    #[test]
    fn test_metrics_validation() {
        let metrics = AutonomyMetrics::new(1.2, 0.5, 0.5, 0.5);
        assert!(matches!(
            metrics.validate(),
            Err(ScoringError::MalformedInput { ref field, .. }) if field == "A_cognitive"
        ));

        let mut metrics = AutonomyMetrics::new(0.5, 0.5, 0.5, 0.5);
        metrics.metadata.session_count = 0;
        assert!(metrics.validate().is_err());
    }

    #[test]
    fn test_cognitive_autonomy() {
        let conversation = vec![
            Message::user("Tell me about rust."),
            Message::assistant("Rust is fast. It is safe. It has no GC."),
            Message::user("Why is it safe?"),
            Message::assistant("Ownership. Borrowing. Lifetimes."),
            Message::assistant("Short reply"),
        ];
        // Two reasoning steps, only the first follows a statement.
        assert_eq!(computer().compute_cognitive_autonomy(&conversation), 0.5);
        assert_eq!(computer().compute_cognitive_autonomy(&conversation[..1]), 0.0);
    }

    #[test]
    fn test_actuation_with_tool_calls() {
        let conversation = vec![
            Message::user("Please create a file."),
            Message::assistant("Done."),
            Message::user("Looks good."),
            Message::assistant("I also tidied the tests."),
        ];
        let calls = vec![
            ToolCall {
                message_index: Some(1),
                ..ToolCall::default()
            },
            ToolCall {
                message_index: Some(3),
                ..ToolCall::default()
            },
            ToolCall::default(),
            ToolCall {
                message_index: Some(0),
                ..ToolCall::default()
            },
        ];
        assert_eq!(computer().compute_actuation_autonomy(&conversation, &calls), 0.25);
    }

    #[test]
    fn test_actuation_from_text() {
        let conversation = vec![
            Message::user("hi"),
            Message::assistant("Let me run the build."),
            Message::assistant("You could deploy it."),
        ];
        // "run" + "build" autonomous, "deploy" not.
        let ratio = computer().compute_actuation_autonomy(&conversation, &[]);
        assert!((ratio - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_reflective_autonomy_capped() {
        let conversation = vec![
            Message::assistant("Actually, let me fix and refine that."),
            Message::assistant("Here it is."),
        ];
        assert_eq!(computer().compute_reflective_autonomy(&conversation), 1.0);
        assert_eq!(computer().compute_reflective_autonomy(&conversation[1..]), 0.0);
    }

    #[test]
    fn test_relational_uses_history_depth() {
        let conversation = vec![
            Message::user("continue"),
            Message::assistant("As I recall from last time."),
            Message::assistant("Let's go together."),
        ];
        assert_eq!(computer().compute_relational_autonomy(&conversation, &[]), 0.5);

        let history = vec![json!({"id": 1}), json!({"id": 2})];
        assert_eq!(computer().compute_relational_autonomy(&conversation, &history), 1.0);
    }

    #[test]
    fn test_compute_all_metadata() {
        let conversation = vec![Message::user("hello"), Message::assistant("hi")];
        let history = vec![json!({}), json!({}), json!({})];
        let metrics = computer().compute_all(&conversation, &[ToolCall::default()], &history);

        assert_eq!(metrics.metadata.conversation_length, 2);
        assert_eq!(metrics.metadata.session_count, 3);
        assert_eq!(metrics.metadata.tool_calls_count, 1);
        assert!(metrics.validate().is_ok());
    }

    #[test]
    fn test_unknown_role_is_other() {
        let msg: Message = serde_json::from_value(json!({"role": "tool", "content": "ok"})).unwrap();
        assert_eq!(msg.role, Role::Other);
    }
}
