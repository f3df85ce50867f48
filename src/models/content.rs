use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Post,
    Comment,
    Message,
    ProfileBio,
    ProfileHeadline,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Post => "post",
            ContentType::Comment => "comment",
            ContentType::Message => "message",
            ContentType::ProfileBio => "profile_bio",
            ContentType::ProfileHeadline => "profile_headline",
        }
    }
}

/// A piece of user-generated content entering the decision pipeline.
/// Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub author_id: Uuid,
    pub content_type: ContentType,
    pub text: String,
    /// Reference to stored media, when the item is not pure text.
    pub media_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn text_only(
        id: impl Into<String>,
        author_id: Uuid,
        content_type: ContentType,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            author_id,
            content_type,
            text: text.into(),
            media_ref: None,
            created_at: Utc::now(),
        }
    }
}

/// Evaluation context for rule matching: where the content was posted
/// and what the engine knows about its author at evaluation time.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    pub community_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    pub account_age_days: f64,
    /// Current trust-ledger score for the author, consumed by
    /// `user_reputation` rule conditions.
    pub user_reputation: f64,
    pub attachment_count: u32,
    pub link_count: u32,
    pub mention_count: u32,
}
