//! In-memory store implementations backed by `DashMap`.
//!
//! Used by the test suite and for local development without Postgres.
//! Semantics mirror the SQL implementations, including the versioned
//! trust-record write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Mutex;
use uuid::Uuid;

use super::{
    IncidentStore, ModeratorRoster, QueueStore, RuleStore, TrustStore, UserSignals,
};
use crate::error::{Result, SafetyError};
use crate::models::{
    AutoModRule, Incident, IncidentType, ModerationQueueItem, PositiveSignals, QueueStatus,
    RuleScope, UserTrustRecord,
};

#[derive(Default)]
pub struct InMemoryIncidents {
    incidents: DashMap<Uuid, Incident>,
}

impl InMemoryIncidents {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IncidentStore for InMemoryIncidents {
    async fn append(&self, incident: Incident) -> Result<Incident> {
        self.incidents.insert(incident.id, incident.clone());
        Ok(incident)
    }

    async fn get(&self, incident_id: Uuid) -> Result<Incident> {
        self.incidents
            .get(&incident_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| SafetyError::NotFound(format!("Incident {} not found", incident_id)))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Incident>> {
        let mut incidents: Vec<Incident> = self
            .incidents
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect();
        incidents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(incidents)
    }

    async fn count_recent(
        &self,
        user_id: Uuid,
        incident_type: IncidentType,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        Ok(self
            .incidents
            .iter()
            .filter(|entry| {
                entry.user_id == user_id
                    && entry.incident_type == incident_type
                    && entry.created_at >= since
            })
            .count() as i64)
    }

    async fn count_reported_by(&self, reporter_id: Uuid) -> Result<i64> {
        Ok(self
            .incidents
            .iter()
            .filter(|entry| {
                entry.reporter_id == Some(reporter_id)
                    && entry.incident_type == IncidentType::Report
            })
            .count() as i64)
    }

    async fn mark_verified(
        &self,
        incident_id: Uuid,
        verified: bool,
        resolved_at: DateTime<Utc>,
    ) -> Result<Incident> {
        let mut entry = self.incidents.get_mut(&incident_id).ok_or_else(|| {
            SafetyError::NotFound(format!("Incident {} not found", incident_id))
        })?;
        entry.verified = verified;
        entry.resolved_at = Some(resolved_at);
        Ok(entry.clone())
    }

    async fn users_with_incidents_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let users: HashSet<Uuid> = self
            .incidents
            .iter()
            .filter(|entry| entry.created_at < cutoff)
            .map(|entry| entry.user_id)
            .collect();
        Ok(users.into_iter().collect())
    }
}

#[derive(Default)]
pub struct InMemoryTrust {
    // Mutex rather than DashMap: the versioned compare-and-write must be
    // atomic across read and insert.
    records: Mutex<std::collections::HashMap<Uuid, UserTrustRecord>>,
}

impl InMemoryTrust {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrustStore for InMemoryTrust {
    async fn get(&self, user_id: Uuid) -> Result<Option<UserTrustRecord>> {
        Ok(self
            .records
            .lock()
            .expect("trust store lock poisoned")
            .get(&user_id)
            .cloned())
    }

    async fn write_versioned(
        &self,
        record: &UserTrustRecord,
        expected_version: i64,
    ) -> Result<bool> {
        let mut records = self.records.lock().expect("trust store lock poisoned");
        let current_version = records.get(&record.user_id).map(|r| r.version).unwrap_or(0);
        if current_version != expected_version {
            return Ok(false);
        }
        records.insert(record.user_id, record.clone());
        Ok(true)
    }
}

#[derive(Default)]
pub struct InMemoryRules {
    rules: DashMap<Uuid, AutoModRule>,
}

impl InMemoryRules {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleStore for InMemoryRules {
    async fn insert(&self, rule: AutoModRule) -> Result<AutoModRule> {
        self.rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn get(&self, rule_id: Uuid) -> Result<AutoModRule> {
        self.rules
            .get(&rule_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| SafetyError::NotFound(format!("Rule {} not found", rule_id)))
    }

    async fn set_enabled(&self, rule_id: Uuid, enabled: bool) -> Result<AutoModRule> {
        let mut entry = self
            .rules
            .get_mut(&rule_id)
            .ok_or_else(|| SafetyError::NotFound(format!("Rule {} not found", rule_id)))?;
        entry.enabled = enabled;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn list_enabled_for(
        &self,
        community_id: Option<Uuid>,
        channel_id: Option<Uuid>,
    ) -> Result<Vec<AutoModRule>> {
        let mut rules: Vec<AutoModRule> = self
            .rules
            .iter()
            .filter(|entry| {
                entry.enabled
                    && match entry.scope {
                        RuleScope::Global => true,
                        RuleScope::Community => entry.scope_id == community_id,
                        RuleScope::Channel => entry.scope_id == channel_id,
                    }
            })
            .map(|entry| entry.clone())
            .collect();
        rules.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)));
        Ok(rules)
    }

    async fn any_for_scope(&self, scope: RuleScope, scope_id: Uuid) -> Result<bool> {
        Ok(self
            .rules
            .iter()
            .any(|entry| entry.scope == scope && entry.scope_id == Some(scope_id)))
    }
}

#[derive(Default)]
pub struct InMemoryQueue {
    items: DashMap<Uuid, ModerationQueueItem>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueue {
    async fn insert(&self, item: ModerationQueueItem) -> Result<ModerationQueueItem> {
        self.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn get(&self, item_id: Uuid) -> Result<ModerationQueueItem> {
        self.items
            .get(&item_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| SafetyError::NotFound(format!("Queue item {} not found", item_id)))
    }

    async fn update(&self, item: ModerationQueueItem) -> Result<ModerationQueueItem> {
        if !self.items.contains_key(&item.id) {
            return Err(SafetyError::NotFound(format!(
                "Queue item {} not found",
                item.id
            )));
        }
        self.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn list_by_status(
        &self,
        status: QueueStatus,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ModerationQueueItem>> {
        let mut items: Vec<ModerationQueueItem> = self
            .items
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.clone())
            .collect();
        items.sort_by(|a, b| {
            b.review_priority
                .cmp(&a.review_priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(items
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}

/// Fixed positive signals per user; defaults to an empty profile.
#[derive(Default)]
pub struct StaticSignals {
    signals: DashMap<Uuid, PositiveSignals>,
}

impl StaticSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, user_id: Uuid, signals: PositiveSignals) {
        self.signals.insert(user_id, signals);
    }
}

#[async_trait]
impl UserSignals for StaticSignals {
    async fn positive_signals(&self, user_id: Uuid) -> Result<PositiveSignals> {
        Ok(self
            .signals
            .get(&user_id)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }
}

/// Fixed moderator set.
#[derive(Default)]
pub struct StaticRoster {
    moderators: DashMap<Uuid, ()>,
}

impl StaticRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, user_id: Uuid) {
        self.moderators.insert(user_id, ());
    }
}

#[async_trait]
impl ModeratorRoster for StaticRoster {
    async fn is_moderator(&self, user_id: Uuid) -> Result<bool> {
        Ok(self.moderators.contains_key(&user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IncidentSeverity, NewIncident};

    fn report_for(user_id: Uuid) -> Incident {
        NewIncident {
            user_id,
            incident_type: IncidentType::Report,
            severity: IncidentSeverity::Medium,
            reason: "test".to_string(),
            reporter_id: Some(Uuid::new_v4()),
            content_ref: None,
            verified: false,
        }
        .into_incident()
    }

    #[tokio::test]
    async fn test_incident_history_ordering() {
        let store = InMemoryIncidents::new();
        let user_id = Uuid::new_v4();
        let mut first = report_for(user_id);
        first.created_at = Utc::now() - chrono::Duration::days(2);
        store.append(first.clone()).await.unwrap();
        let second = report_for(user_id);
        store.append(second.clone()).await.unwrap();

        let history = store.list_for_user(user_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);
    }

    #[tokio::test]
    async fn test_versioned_write_detects_conflict() {
        let store = InMemoryTrust::new();
        let user_id = Uuid::new_v4();

        let mut record = UserTrustRecord::initial(user_id);
        record.version = 1;
        assert!(store.write_versioned(&record, 0).await.unwrap());

        // A stale writer that read version 0 must lose.
        let mut stale = UserTrustRecord::initial(user_id);
        stale.version = 1;
        assert!(!store.write_versioned(&stale, 0).await.unwrap());

        // The current writer at version 1 wins.
        record.version = 2;
        assert!(store.write_versioned(&record, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_queue_priority_ordering() {
        let store = InMemoryQueue::new();
        let author = Uuid::new_v4();
        let action = crate::models::AutoModAction::new(crate::models::ActionKind::Flag, "t");

        let plain = ModerationQueueItem::new("c1", author, "verdict", action.clone());
        let mut boosted = ModerationQueueItem::new("c2", author, "verdict", action);
        boosted.review_priority = 5;

        store.insert(plain.clone()).await.unwrap();
        store.insert(boosted.clone()).await.unwrap();

        let pending = store
            .list_by_status(QueueStatus::Pending, 10, 0)
            .await
            .unwrap();
        assert_eq!(pending[0].id, boosted.id);
        assert_eq!(pending[1].id, plain.id);
    }
}
