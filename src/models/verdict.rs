use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::action::ActionKind;

/// Classifier-level decision for one piece of content.
/// Only three outcomes exist at this layer; rule actions are richer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictAction {
    Allow,
    Review,
    Block,
}

impl VerdictAction {
    /// Map into the shared severity order for merging with rule actions.
    /// Review carries flag-level severity.
    pub fn as_action_kind(&self) -> ActionKind {
        match self {
            VerdictAction::Allow => ActionKind::Allow,
            VerdictAction::Review => ActionKind::Flag,
            VerdictAction::Block => ActionKind::Block,
        }
    }
}

/// Moderation verdict for one classification pass. Re-derivable from the
/// content, never authoritative state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationVerdict {
    pub content_id: String,
    pub flagged: bool,
    pub categories: Vec<String>,
    pub scores: HashMap<String, f32>,
    pub action: VerdictAction,
    pub reason: Option<String>,
}

impl ModerationVerdict {
    pub fn allow(content_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            flagged: false,
            categories: Vec::new(),
            scores: HashMap::new(),
            action: VerdictAction::Allow,
            reason: None,
        }
    }
}

/// Outcome of screening a set of profile fields before they are saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileCheck {
    pub valid: bool,
    /// One entry per offending field, `"field: reason"`.
    pub issues: Vec<String>,
}

/// Source of a composite safety-score signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Moderation,
    Spam,
    Profanity,
    Misinformation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSeverity {
    Low,
    Medium,
    High,
}

impl SignalSeverity {
    /// Points subtracted from the composite score.
    pub fn penalty(&self) -> i32 {
        match self {
            SignalSeverity::Low => 10,
            SignalSeverity::Medium => 20,
            SignalSeverity::High => 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetySignal {
    pub signal_type: SignalType,
    pub severity: SignalSeverity,
    pub detail: String,
}

/// Composite per-content safety score (0-100) with its contributing signals.
/// Distinct from the per-user trust score in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyScore {
    pub score: i32,
    pub action: VerdictAction,
    pub signals: Vec<SafetySignal>,
}
