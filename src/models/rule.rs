use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::action::AutoModAction;
use crate::error::{Result, SafetyError};

/// Where an AutoMod rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "rule_scope", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RuleScope {
    Global,
    Community,
    Channel,
}

impl RuleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleScope::Global => "global",
            RuleScope::Community => "community",
            RuleScope::Channel => "channel",
        }
    }
}

/// Content/user attribute a condition tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionField {
    Content,
    UserAge,
    UserReputation,
    AttachmentCount,
    LinkCount,
    MentionCount,
}

impl ConditionField {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, ConditionField::Content)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionField::Content => "content",
            ConditionField::UserAge => "user_age",
            ConditionField::UserReputation => "user_reputation",
            ConditionField::AttachmentCount => "attachment_count",
            ConditionField::LinkCount => "link_count",
            ConditionField::MentionCount => "mention_count",
        }
    }
}

/// Condition operator with its operand baked in, so `in`/`not_in` always
/// carry an array and the numeric comparators always carry a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum ConditionOp {
    Contains(String),
    /// Regex match against the field.
    Matches(String),
    Equals(String),
    Gt(f64),
    Lt(f64),
    Gte(f64),
    Lte(f64),
    In(Vec<String>),
    NotIn(Vec<String>),
}

impl ConditionOp {
    pub fn name(&self) -> &'static str {
        match self {
            ConditionOp::Contains(_) => "contains",
            ConditionOp::Matches(_) => "matches",
            ConditionOp::Equals(_) => "equals",
            ConditionOp::Gt(_) => "gt",
            ConditionOp::Lt(_) => "lt",
            ConditionOp::Gte(_) => "gte",
            ConditionOp::Lte(_) => "lte",
            ConditionOp::In(_) => "in",
            ConditionOp::NotIn(_) => "not_in",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub field: ConditionField,
    #[serde(flatten)]
    pub op: ConditionOp,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl RuleCondition {
    /// Reject operator/field combinations that can never evaluate.
    /// Called at rule creation; invalid conditions are never stored.
    pub fn validate(&self) -> Result<()> {
        match (&self.op, self.field.is_numeric()) {
            (ConditionOp::Contains(_) | ConditionOp::Matches(_), true) => {
                Err(SafetyError::Validation(format!(
                    "operator '{}' cannot apply to numeric field '{}'",
                    self.op.name(),
                    self.field.as_str()
                )))
            }
            (ConditionOp::Gt(_) | ConditionOp::Lt(_) | ConditionOp::Gte(_) | ConditionOp::Lte(_), false) => {
                Err(SafetyError::Validation(format!(
                    "operator '{}' requires a numeric field, got '{}'",
                    self.op.name(),
                    self.field.as_str()
                )))
            }
            (ConditionOp::Equals(value), true) if value.parse::<f64>().is_err() => {
                Err(SafetyError::Validation(format!(
                    "equals operand '{}' is not numeric for field '{}'",
                    value,
                    self.field.as_str()
                )))
            }
            (ConditionOp::Matches(pattern), false) => regex::Regex::new(pattern)
                .map(|_| ())
                .map_err(|e| SafetyError::Validation(format!("invalid regex pattern: {}", e))),
            _ => Ok(()),
        }
    }
}

/// A declarative, scoped AutoMod policy record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AutoModRule {
    pub id: Uuid,
    pub name: String,
    pub rule_type: String,
    pub enabled: bool,
    /// Lower priority evaluates first; ties break on rule id.
    pub priority: i32,
    pub conditions: Json<Vec<RuleCondition>>,
    pub action: Json<AutoModAction>,
    pub scope: RuleScope,
    pub scope_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied rule payload, validated before storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDraft {
    pub name: String,
    pub rule_type: String,
    pub enabled: bool,
    pub priority: i32,
    pub conditions: Vec<RuleCondition>,
    pub action: AutoModAction,
    pub scope: RuleScope,
    pub scope_id: Option<Uuid>,
}

impl RuleDraft {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SafetyError::Validation("rule name is required".into()));
        }
        if self.conditions.is_empty() {
            return Err(SafetyError::Validation(
                "a rule must have at least one condition".into(),
            ));
        }
        if self.scope != RuleScope::Global && self.scope_id.is_none() {
            return Err(SafetyError::Validation(format!(
                "scope '{}' requires a scope_id",
                self.scope.as_str()
            )));
        }
        for condition in &self.conditions {
            condition.validate()?;
        }
        Ok(())
    }

    pub fn into_rule(self, creator_id: Uuid) -> AutoModRule {
        let now = Utc::now();
        AutoModRule {
            id: Uuid::new_v4(),
            name: self.name,
            rule_type: self.rule_type,
            enabled: self.enabled,
            priority: self.priority,
            conditions: Json(self.conditions),
            action: Json(self.action),
            scope: self.scope,
            scope_id: self.scope_id,
            created_by: creator_id,
            created_at: now,
            updated_at: now,
        }
    }
}
