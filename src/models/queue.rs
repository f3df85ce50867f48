use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::action::AutoModAction;

/// Review queue state machine.
///
/// `Pending -> UnderReview -> {ActionTaken, Closed}`, forward-only.
/// The escalate decision is the single exception: it reopens a reviewed
/// item back to `Pending` (handled in the queue service, not here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "queue_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    Pending,
    UnderReview,
    ActionTaken,
    Closed,
}

impl QueueStatus {
    /// Forward transitions only; escalation bypasses this check.
    pub fn can_transition_to(&self, new_status: QueueStatus) -> bool {
        matches!(
            (self, new_status),
            (QueueStatus::Pending, QueueStatus::UnderReview)
                | (QueueStatus::UnderReview, QueueStatus::ActionTaken)
                | (QueueStatus::UnderReview, QueueStatus::Closed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::ActionTaken | QueueStatus::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "PENDING",
            QueueStatus::UnderReview => "UNDER_REVIEW",
            QueueStatus::ActionTaken => "ACTION_TAKEN",
            QueueStatus::Closed => "CLOSED",
        }
    }
}

/// Moderator decision on a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
    Escalate,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewDecision::Approve => "approve",
            ReviewDecision::Reject => "reject",
            ReviewDecision::Escalate => "escalate",
        }
    }
}

/// A unit of human-moderator review work.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ModerationQueueItem {
    pub id: Uuid,
    pub content_id: String,
    pub author_id: Uuid,
    /// What put this item in the queue: a verdict reason or a rule id.
    pub source_ref: String,
    /// The action recorded at decision time, dispatched on reject.
    pub recorded_action: Json<AutoModAction>,
    pub status: QueueStatus,
    pub decision: Option<String>,
    pub notes: Option<String>,
    pub reviewer_id: Option<Uuid>,
    pub escalation_count: i32,
    /// Boosted on escalation so reopened items surface first.
    pub review_priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModerationQueueItem {
    pub fn new(
        content_id: impl Into<String>,
        author_id: Uuid,
        source_ref: impl Into<String>,
        recorded_action: AutoModAction,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            content_id: content_id.into(),
            author_id,
            source_ref: source_ref.into(),
            recorded_action: Json(recorded_action),
            status: QueueStatus::Pending,
            decision: None,
            notes: None,
            reviewer_id: None,
            escalation_count: 0,
            review_priority: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
