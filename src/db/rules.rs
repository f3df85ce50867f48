//! Database operations for AutoMod rules

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::RuleStore;
use crate::error::{Result, SafetyError};
use crate::models::{AutoModRule, RuleScope};

const RULE_COLUMNS: &str = "id, name, rule_type, enabled, priority, conditions, \
     action, scope, scope_id, created_by, created_at, updated_at";

pub struct RulesDb {
    pool: Arc<PgPool>,
}

impl RulesDb {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleStore for RulesDb {
    async fn insert(&self, rule: AutoModRule) -> Result<AutoModRule> {
        let stored = sqlx::query_as::<_, AutoModRule>(&format!(
            r#"
            INSERT INTO automod_rules (
                id, name, rule_type, enabled, priority, conditions,
                action, scope, scope_id, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {RULE_COLUMNS}
            "#
        ))
        .bind(rule.id)
        .bind(&rule.name)
        .bind(&rule.rule_type)
        .bind(rule.enabled)
        .bind(rule.priority)
        .bind(&rule.conditions)
        .bind(&rule.action)
        .bind(rule.scope)
        .bind(rule.scope_id)
        .bind(rule.created_by)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .fetch_one(&*self.pool)
        .await?;

        tracing::info!(
            rule_id = %stored.id,
            name = %stored.name,
            scope = %stored.scope.as_str(),
            priority = %stored.priority,
            "AutoMod rule created"
        );

        Ok(stored)
    }

    async fn get(&self, rule_id: Uuid) -> Result<AutoModRule> {
        sqlx::query_as::<_, AutoModRule>(&format!(
            "SELECT {RULE_COLUMNS} FROM automod_rules WHERE id = $1"
        ))
        .bind(rule_id)
        .fetch_optional(&*self.pool)
        .await?
        .ok_or_else(|| SafetyError::NotFound(format!("Rule {} not found", rule_id)))
    }

    async fn set_enabled(&self, rule_id: Uuid, enabled: bool) -> Result<AutoModRule> {
        let rule = sqlx::query_as::<_, AutoModRule>(&format!(
            r#"
            UPDATE automod_rules
            SET enabled = $2, updated_at = $3
            WHERE id = $1
            RETURNING {RULE_COLUMNS}
            "#
        ))
        .bind(rule_id)
        .bind(enabled)
        .bind(Utc::now())
        .fetch_optional(&*self.pool)
        .await?
        .ok_or_else(|| SafetyError::NotFound(format!("Rule {} not found", rule_id)))?;

        tracing::info!(rule_id = %rule_id, enabled = %enabled, "AutoMod rule toggled");

        Ok(rule)
    }

    async fn list_enabled_for(
        &self,
        community_id: Option<Uuid>,
        channel_id: Option<Uuid>,
    ) -> Result<Vec<AutoModRule>> {
        let rules = sqlx::query_as::<_, AutoModRule>(&format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM automod_rules
            WHERE enabled = TRUE
              AND (
                    scope = 'global'
                 OR (scope = 'community' AND scope_id = $1)
                 OR (scope = 'channel' AND scope_id = $2)
              )
            ORDER BY priority ASC, id ASC
            "#
        ))
        .bind(community_id)
        .bind(channel_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(rules)
    }

    async fn any_for_scope(&self, scope: RuleScope, scope_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM automod_rules WHERE scope = $1 AND scope_id = $2)",
        )
        .bind(scope)
        .bind(scope_id)
        .fetch_one(&*self.pool)
        .await?;

        Ok(exists)
    }
}
