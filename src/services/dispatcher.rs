//! Enforcement dispatch.
//!
//! The engine decides; enforcement (muting, removal, suspension) lives in
//! collaborating services reached through this trait. Dispatch is fallible
//! and retried by the queue service; the decision itself is persisted
//! before the first attempt.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{AutoModAction, ModerationQueueItem};

#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn dispatch(&self, item: &ModerationQueueItem, action: &AutoModAction) -> Result<()>;
}

/// Default dispatcher: emits the enforcement decision as a structured log
/// line for downstream consumers.
pub struct LoggingDispatcher;

#[async_trait]
impl ActionDispatcher for LoggingDispatcher {
    async fn dispatch(&self, item: &ModerationQueueItem, action: &AutoModAction) -> Result<()> {
        tracing::info!(
            queue_item_id = %item.id,
            content_id = %item.content_id,
            author_id = %item.author_id,
            action = %action.kind.as_str(),
            reason = %action.log_reason,
            "Enforcement action dispatched"
        );
        Ok(())
    }
}
