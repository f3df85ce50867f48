//! Database operations for user trust records

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::TrustStore;
use crate::error::Result;
use crate::models::UserTrustRecord;

const TRUST_COLUMNS: &str = "user_id, trust_score, risk_tier, restrictions, badges, \
     reports_submitted, reports_against, last_incident_at, updated_at, version";

pub struct TrustDb {
    pool: Arc<PgPool>,
}

impl TrustDb {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrustStore for TrustDb {
    async fn get(&self, user_id: Uuid) -> Result<Option<UserTrustRecord>> {
        let record = sqlx::query_as::<_, UserTrustRecord>(&format!(
            "SELECT {TRUST_COLUMNS} FROM user_trust_records WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(record)
    }

    async fn write_versioned(
        &self,
        record: &UserTrustRecord,
        expected_version: i64,
    ) -> Result<bool> {
        // Insert-or-update guarded by the version column. A concurrent
        // writer bumps the version first and this statement affects zero
        // rows, signalling the caller to re-read and recompute.
        let rows = sqlx::query(
            r#"
            INSERT INTO user_trust_records (
                user_id, trust_score, risk_tier, restrictions, badges,
                reports_submitted, reports_against, last_incident_at,
                updated_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO UPDATE
            SET trust_score = EXCLUDED.trust_score,
                risk_tier = EXCLUDED.risk_tier,
                restrictions = EXCLUDED.restrictions,
                badges = EXCLUDED.badges,
                reports_submitted = EXCLUDED.reports_submitted,
                reports_against = EXCLUDED.reports_against,
                last_incident_at = EXCLUDED.last_incident_at,
                updated_at = EXCLUDED.updated_at,
                version = EXCLUDED.version
            WHERE user_trust_records.version = $11
            "#,
        )
        .bind(record.user_id)
        .bind(record.trust_score)
        .bind(record.risk_tier)
        .bind(&record.restrictions)
        .bind(&record.badges)
        .bind(record.reports_submitted)
        .bind(record.reports_against)
        .bind(record.last_incident_at)
        .bind(record.updated_at)
        .bind(record.version)
        .bind(expected_version)
        .execute(&*self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            tracing::debug!(
                user_id = %record.user_id,
                expected_version = %expected_version,
                "Trust record write lost the version race"
            );
        }

        Ok(rows > 0)
    }
}
