//! Database operations for the moderation review queue

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::QueueStore;
use crate::error::{Result, SafetyError};
use crate::models::{ModerationQueueItem, QueueStatus};

const QUEUE_COLUMNS: &str = "id, content_id, author_id, source_ref, recorded_action, \
     status, decision, notes, reviewer_id, escalation_count, review_priority, \
     created_at, updated_at";

pub struct QueueDb {
    pool: Arc<PgPool>,
}

impl QueueDb {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueueStore for QueueDb {
    async fn insert(&self, item: ModerationQueueItem) -> Result<ModerationQueueItem> {
        let stored = sqlx::query_as::<_, ModerationQueueItem>(&format!(
            r#"
            INSERT INTO moderation_queue (
                id, content_id, author_id, source_ref, recorded_action,
                status, decision, notes, reviewer_id, escalation_count,
                review_priority, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {QUEUE_COLUMNS}
            "#
        ))
        .bind(item.id)
        .bind(&item.content_id)
        .bind(item.author_id)
        .bind(&item.source_ref)
        .bind(&item.recorded_action)
        .bind(item.status)
        .bind(&item.decision)
        .bind(&item.notes)
        .bind(item.reviewer_id)
        .bind(item.escalation_count)
        .bind(item.review_priority)
        .bind(item.created_at)
        .bind(item.updated_at)
        .fetch_one(&*self.pool)
        .await?;

        tracing::info!(
            item_id = %stored.id,
            content_id = %stored.content_id,
            "Queue item created"
        );

        Ok(stored)
    }

    async fn get(&self, item_id: Uuid) -> Result<ModerationQueueItem> {
        sqlx::query_as::<_, ModerationQueueItem>(&format!(
            "SELECT {QUEUE_COLUMNS} FROM moderation_queue WHERE id = $1"
        ))
        .bind(item_id)
        .fetch_optional(&*self.pool)
        .await?
        .ok_or_else(|| SafetyError::NotFound(format!("Queue item {} not found", item_id)))
    }

    async fn update(&self, item: ModerationQueueItem) -> Result<ModerationQueueItem> {
        let updated = sqlx::query_as::<_, ModerationQueueItem>(&format!(
            r#"
            UPDATE moderation_queue
            SET status = $2,
                decision = $3,
                notes = $4,
                reviewer_id = $5,
                escalation_count = $6,
                review_priority = $7,
                updated_at = $8
            WHERE id = $1
            RETURNING {QUEUE_COLUMNS}
            "#
        ))
        .bind(item.id)
        .bind(item.status)
        .bind(&item.decision)
        .bind(&item.notes)
        .bind(item.reviewer_id)
        .bind(item.escalation_count)
        .bind(item.review_priority)
        .bind(item.updated_at)
        .fetch_optional(&*self.pool)
        .await?
        .ok_or_else(|| SafetyError::NotFound(format!("Queue item {} not found", item.id)))?;

        Ok(updated)
    }

    async fn list_by_status(
        &self,
        status: QueueStatus,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ModerationQueueItem>> {
        let items = sqlx::query_as::<_, ModerationQueueItem>(&format!(
            r#"
            SELECT {QUEUE_COLUMNS}
            FROM moderation_queue
            WHERE status = $1
            ORDER BY review_priority DESC, created_at ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await?;

        Ok(items)
    }
}
