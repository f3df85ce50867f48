//! Storage and capability traits consumed by the decision engine, with
//! Postgres implementations per store and an in-memory implementation for
//! tests and local development.

pub mod incidents;
pub mod memory;
pub mod queue;
pub mod rules;
pub mod trust;

pub use incidents::IncidentsDb;
pub use memory::{
    InMemoryIncidents, InMemoryQueue, InMemoryRules, InMemoryTrust, StaticRoster, StaticSignals,
};
pub use queue::QueueDb;
pub use rules::RulesDb;
pub use trust::TrustDb;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AutoModRule, Incident, IncidentType, ModerationQueueItem, PositiveSignals, QueueStatus,
    RuleScope, UserTrustRecord,
};

/// Append-only incident log. Only `verified`/`resolved_at` are ever updated.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn append(&self, incident: Incident) -> Result<Incident>;
    async fn get(&self, incident_id: Uuid) -> Result<Incident>;
    /// Full history for a user, newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Incident>>;
    async fn count_recent(
        &self,
        user_id: Uuid,
        incident_type: IncidentType,
        since: DateTime<Utc>,
    ) -> Result<i64>;
    /// Reports this user has filed against others.
    async fn count_reported_by(&self, reporter_id: Uuid) -> Result<i64>;
    async fn mark_verified(
        &self,
        incident_id: Uuid,
        verified: bool,
        resolved_at: DateTime<Utc>,
    ) -> Result<Incident>;
    /// Users holding incidents created before the cutoff; drives the
    /// idempotent decay sweep.
    async fn users_with_incidents_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>>;
}

/// Versioned per-user trust records.
#[async_trait]
pub trait TrustStore: Send + Sync {
    async fn get(&self, user_id: Uuid) -> Result<Option<UserTrustRecord>>;
    /// Write `record` only if the stored version still equals
    /// `expected_version` (0 means "no record yet"). Returns false when
    /// another writer got there first.
    async fn write_versioned(
        &self,
        record: &UserTrustRecord,
        expected_version: i64,
    ) -> Result<bool>;
}

/// AutoMod rule storage, queryable by scope.
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn insert(&self, rule: AutoModRule) -> Result<AutoModRule>;
    async fn get(&self, rule_id: Uuid) -> Result<AutoModRule>;
    async fn set_enabled(&self, rule_id: Uuid, enabled: bool) -> Result<AutoModRule>;
    /// Enabled rules applicable to the given community/channel (always
    /// including global scope), sorted ascending by priority then id.
    async fn list_enabled_for(
        &self,
        community_id: Option<Uuid>,
        channel_id: Option<Uuid>,
    ) -> Result<Vec<AutoModRule>>;
    async fn any_for_scope(&self, scope: RuleScope, scope_id: Uuid) -> Result<bool>;
}

/// Human-review queue storage.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn insert(&self, item: ModerationQueueItem) -> Result<ModerationQueueItem>;
    async fn get(&self, item_id: Uuid) -> Result<ModerationQueueItem>;
    async fn update(&self, item: ModerationQueueItem) -> Result<ModerationQueueItem>;
    /// Items in a given status, highest review priority first.
    async fn list_by_status(
        &self,
        status: QueueStatus,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ModerationQueueItem>>;
}

/// Positive-signal source (profile, verification, engagement). The engine
/// consumes these; it does not own them.
#[async_trait]
pub trait UserSignals: Send + Sync {
    async fn positive_signals(&self, user_id: Uuid) -> Result<PositiveSignals>;
}

/// Moderator role lookup backing the queue's permission check.
#[async_trait]
pub trait ModeratorRoster: Send + Sync {
    async fn is_moderator(&self, user_id: Uuid) -> Result<bool>;
}
