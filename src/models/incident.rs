use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Kind of recorded negative event against a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "incident_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentType {
    Report,
    Block,
    ContentRemoval,
    Suspension,
    Warning,
}

impl IncidentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentType::Report => "REPORT",
            IncidentType::Block => "BLOCK",
            IncidentType::ContentRemoval => "CONTENT_REMOVAL",
            IncidentType::Suspension => "SUSPENSION",
            IncidentType::Warning => "WARNING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "incident_severity", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum IncidentSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// An immutable recorded negative event against a user. Append-only:
/// only `verified` and `resolved_at` are ever mutated, by a moderator.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Incident {
    pub id: Uuid,
    pub user_id: Uuid,
    pub incident_type: IncidentType,
    pub severity: IncidentSeverity,
    pub reason: String,
    pub reporter_id: Option<Uuid>,
    pub content_ref: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Input for appending a new incident to the log.
#[derive(Debug, Clone)]
pub struct NewIncident {
    pub user_id: Uuid,
    pub incident_type: IncidentType,
    pub severity: IncidentSeverity,
    pub reason: String,
    pub reporter_id: Option<Uuid>,
    pub content_ref: Option<String>,
    pub verified: bool,
}

impl NewIncident {
    pub fn into_incident(self) -> Incident {
        Incident {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            incident_type: self.incident_type,
            severity: self.severity,
            reason: self.reason,
            reporter_id: self.reporter_id,
            content_ref: self.content_ref,
            verified: self.verified,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }
}
