//! Database operations for the safety incident log

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::IncidentStore;
use crate::error::{Result, SafetyError};
use crate::models::{Incident, IncidentType};

const INCIDENT_COLUMNS: &str = "id, user_id, incident_type, severity, reason, \
     reporter_id, content_ref, verified, created_at, resolved_at";

pub struct IncidentsDb {
    pool: Arc<PgPool>,
}

impl IncidentsDb {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IncidentStore for IncidentsDb {
    async fn append(&self, incident: Incident) -> Result<Incident> {
        let stored = sqlx::query_as::<_, Incident>(&format!(
            r#"
            INSERT INTO safety_incidents (
                id, user_id, incident_type, severity, reason,
                reporter_id, content_ref, verified, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {INCIDENT_COLUMNS}
            "#
        ))
        .bind(incident.id)
        .bind(incident.user_id)
        .bind(incident.incident_type)
        .bind(incident.severity)
        .bind(&incident.reason)
        .bind(incident.reporter_id)
        .bind(&incident.content_ref)
        .bind(incident.verified)
        .bind(incident.created_at)
        .fetch_one(&*self.pool)
        .await?;

        tracing::info!(
            incident_id = %stored.id,
            user_id = %stored.user_id,
            incident_type = %stored.incident_type.as_str(),
            "Incident recorded"
        );

        Ok(stored)
    }

    async fn get(&self, incident_id: Uuid) -> Result<Incident> {
        sqlx::query_as::<_, Incident>(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM safety_incidents WHERE id = $1"
        ))
        .bind(incident_id)
        .fetch_optional(&*self.pool)
        .await?
        .ok_or_else(|| SafetyError::NotFound(format!("Incident {} not found", incident_id)))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Incident>> {
        let incidents = sqlx::query_as::<_, Incident>(&format!(
            r#"
            SELECT {INCIDENT_COLUMNS}
            FROM safety_incidents
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(incidents)
    }

    async fn count_recent(
        &self,
        user_id: Uuid,
        incident_type: IncidentType,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM safety_incidents
            WHERE user_id = $1 AND incident_type = $2 AND created_at >= $3
            "#,
        )
        .bind(user_id)
        .bind(incident_type)
        .bind(since)
        .fetch_one(&*self.pool)
        .await?;

        Ok(count)
    }

    async fn count_reported_by(&self, reporter_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM safety_incidents WHERE reporter_id = $1 AND incident_type = $2",
        )
        .bind(reporter_id)
        .bind(IncidentType::Report)
        .fetch_one(&*self.pool)
        .await?;

        Ok(count)
    }

    async fn mark_verified(
        &self,
        incident_id: Uuid,
        verified: bool,
        resolved_at: DateTime<Utc>,
    ) -> Result<Incident> {
        let incident = sqlx::query_as::<_, Incident>(&format!(
            r#"
            UPDATE safety_incidents
            SET verified = $2, resolved_at = $3
            WHERE id = $1
            RETURNING {INCIDENT_COLUMNS}
            "#
        ))
        .bind(incident_id)
        .bind(verified)
        .bind(resolved_at)
        .fetch_optional(&*self.pool)
        .await?
        .ok_or_else(|| SafetyError::NotFound(format!("Incident {} not found", incident_id)))?;

        tracing::info!(
            incident_id = %incident_id,
            verified = %verified,
            "Incident verification updated"
        );

        Ok(incident)
    }

    async fn users_with_incidents_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let users = sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT user_id FROM safety_incidents WHERE created_at < $1",
        )
        .bind(cutoff)
        .fetch_all(&*self.pool)
        .await?;

        Ok(users)
    }
}
