//! Prioritized, scoped AutoMod rule engine.
//!
//! Rules are evaluated in ascending priority (ties on rule id) against a
//! read-mostly snapshot cached with a short TTL. A rule triggers when all
//! of its conditions hold. Every triggered rule is recorded for audit;
//! the primary action is the most severe one, merged with the verdict
//! combiner's output under the shared severity order.

use dashmap::DashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::classifier::ClassifierGateway;
use super::verdict::VerdictCombiner;
use crate::db::{QueueStore, RuleStore};
use crate::error::Result;
use crate::models::{
    ActionKind, AutoModAction, AutoModRule, ConditionField, ConditionOp, ContentItem,
    EvaluationContext, ModerationQueueItem, ModerationVerdict, ProfileCheck, RuleCondition,
    RuleDraft, RuleScope, SafetyScore,
};

/// Outcome of a full content evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoModResult {
    /// True iff the merged primary action allows publication
    /// (allow or a standalone flag).
    pub passed: bool,
    pub triggered_rules: Vec<Uuid>,
    /// Actions of every triggered rule, recorded for audit.
    pub actions: Vec<AutoModAction>,
    pub primary_action: ActionKind,
    pub verdict: ModerationVerdict,
    pub safety: SafetyScore,
    pub confidence: f32,
    pub details: Vec<String>,
    /// Review queue item created for any non-allow outcome.
    pub queue_item_id: Option<Uuid>,
}

type SnapshotKey = (Option<Uuid>, Option<Uuid>);

pub struct RuleEngine {
    rules: Arc<dyn RuleStore>,
    queue: Arc<dyn QueueStore>,
    gateway: Arc<ClassifierGateway>,
    combiner: Arc<VerdictCombiner>,
    snapshots: DashMap<SnapshotKey, (Vec<AutoModRule>, Instant)>,
    snapshot_ttl: Duration,
}

impl RuleEngine {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        queue: Arc<dyn QueueStore>,
        gateway: Arc<ClassifierGateway>,
        combiner: Arc<VerdictCombiner>,
        snapshot_ttl: Duration,
    ) -> Self {
        Self {
            rules,
            queue,
            gateway,
            combiner,
            snapshots: DashMap::new(),
            snapshot_ttl,
        }
    }

    /// Validate and persist a new rule. Malformed rules are rejected with
    /// `Validation` and never stored.
    pub async fn create_rule(&self, creator_id: Uuid, draft: RuleDraft) -> Result<AutoModRule> {
        draft.validate()?;
        let rule = self.rules.insert(draft.into_rule(creator_id)).await?;
        self.snapshots.clear();
        Ok(rule)
    }

    pub async fn set_rule_enabled(&self, rule_id: Uuid, enabled: bool) -> Result<AutoModRule> {
        let rule = self.rules.set_enabled(rule_id, enabled).await?;
        self.snapshots.clear();
        Ok(rule)
    }

    /// Enabled rules for the given scope, ascending priority. Served from
    /// a short-TTL snapshot that rule writes invalidate.
    pub async fn get_applicable_rules(
        &self,
        community_id: Option<Uuid>,
        channel_id: Option<Uuid>,
    ) -> Result<Vec<AutoModRule>> {
        let key = (community_id, channel_id);
        if let Some(entry) = self.snapshots.get(&key) {
            let (rules, cached_at) = entry.value();
            if cached_at.elapsed() < self.snapshot_ttl {
                return Ok(rules.clone());
            }
        }

        let rules = self.rules.list_enabled_for(community_id, channel_id).await?;
        self.snapshots.insert(key, (rules.clone(), Instant::now()));
        Ok(rules)
    }

    /// Run the full decision pipeline for one piece of content.
    pub async fn process_content(
        &self,
        content: &ContentItem,
        ctx: &EvaluationContext,
    ) -> Result<AutoModResult> {
        let rules = self
            .get_applicable_rules(ctx.community_id, ctx.channel_id)
            .await?;

        let mut triggered_rules = Vec::new();
        let mut actions = Vec::new();
        let mut details = Vec::new();
        let mut rule_action = ActionKind::Allow;

        for rule in &rules {
            if rule_triggers(rule, &content.text, ctx) {
                tracing::debug!(
                    rule_id = %rule.id,
                    rule_name = %rule.name,
                    content_id = %content.id,
                    "AutoMod rule triggered"
                );
                triggered_rules.push(rule.id);
                rule_action = rule_action.max_severity(rule.action.kind);
                details.push(format!("rule '{}': {}", rule.name, rule.action.log_reason));
                actions.push(rule.action.0.clone());
            }
        }

        let signal = self.gateway.classify_text(&content.text).await;
        let verdict = self.combiner.text_verdict(&content.id, &signal);
        let safety = self.combiner.evaluate_safety_score(&content.text, &verdict);
        if let Some(reason) = &verdict.reason {
            details.push(format!("verdict: {}", reason));
        }

        let primary_action = rule_action.max_severity(safety.action.as_action_kind());
        let passed = primary_action.is_passing();

        let confidence = if triggered_rules.is_empty() {
            verdict
                .scores
                .values()
                .fold(0.0_f32, |acc, score| acc.max(*score))
        } else {
            0.9
        };

        let queue_item_id = if primary_action.needs_review() {
            let source_ref = triggered_rules
                .first()
                .map(|id| format!("rule:{}", id))
                .unwrap_or_else(|| "verdict".to_string());
            let recorded = AutoModAction::new(
                primary_action,
                details.first().cloned().unwrap_or_else(|| {
                    format!("{} decision", primary_action.as_str())
                }),
            );
            let item = self
                .queue
                .insert(ModerationQueueItem::new(
                    content.id.clone(),
                    content.author_id,
                    source_ref,
                    recorded,
                ))
                .await?;
            Some(item.id)
        } else {
            None
        };

        tracing::info!(
            content_id = %content.id,
            author_id = %content.author_id,
            primary_action = %primary_action.as_str(),
            passed = %passed,
            triggered = %triggered_rules.len(),
            "Content processed"
        );

        Ok(AutoModResult {
            passed,
            triggered_rules,
            actions,
            primary_action,
            verdict,
            safety,
            confidence,
            details,
            queue_item_id,
        })
    }

    /// Strict screening for a direct message: any flag denies, bypassing
    /// the rule layer entirely.
    pub async fn moderate_message(&self, content: &ContentItem) -> Result<ModerationVerdict> {
        let signal = self.gateway.classify_text(&content.text).await;
        Ok(self.combiner.message_verdict(&content.id, &signal))
    }

    /// Screen image bytes attached to content.
    pub async fn moderate_image(&self, content_id: &str, bytes: &[u8]) -> Result<ModerationVerdict> {
        let signal = self.gateway.classify_image(bytes).await;
        Ok(self.combiner.image_verdict(content_id, &signal))
    }

    /// Classify several texts concurrently, one verdict per item.
    pub async fn moderate_batch(&self, items: &[ContentItem]) -> Result<Vec<ModerationVerdict>> {
        let signals = futures::future::join_all(
            items.iter().map(|item| self.gateway.classify_text(&item.text)),
        )
        .await;

        Ok(items
            .iter()
            .zip(signals.iter())
            .map(|(item, signal)| self.combiner.text_verdict(&item.id, signal))
            .collect())
    }

    /// Screen profile fields before they are saved. Non-allow verdicts
    /// become per-field issues; the profile is valid only when clean.
    pub async fn moderate_profile(&self, fields: &[(String, String)]) -> Result<ProfileCheck> {
        let mut issues = Vec::new();
        for (name, text) in fields {
            if text.trim().is_empty() {
                continue;
            }
            let signal = self.gateway.classify_text(text).await;
            let verdict = self.combiner.text_verdict(name, &signal);
            if verdict.action != crate::models::VerdictAction::Allow {
                issues.push(format!(
                    "{}: {}",
                    name,
                    verdict
                        .reason
                        .unwrap_or_else(|| "content flagged".to_string())
                ));
            }
        }
        Ok(ProfileCheck {
            valid: issues.is_empty(),
            issues,
        })
    }

    /// Seed the default rule set for a new community. Idempotent: a no-op
    /// when any rule already exists for the scope.
    pub async fn initialize_community_rules(
        &self,
        community_id: Uuid,
        creator_id: Uuid,
    ) -> Result<Vec<AutoModRule>> {
        if self
            .rules
            .any_for_scope(RuleScope::Community, community_id)
            .await?
        {
            tracing::debug!(
                community_id = %community_id,
                "Community already has rules, skipping initialization"
            );
            return Ok(Vec::new());
        }

        let mut seeded = Vec::new();
        for draft in default_community_rules(community_id) {
            seeded.push(self.create_rule(creator_id, draft).await?);
        }

        tracing::info!(
            community_id = %community_id,
            count = %seeded.len(),
            "Default community rules initialized"
        );

        Ok(seeded)
    }
}

/// Whether every condition of the rule holds (AND).
fn rule_triggers(rule: &AutoModRule, text: &str, ctx: &EvaluationContext) -> bool {
    rule.conditions
        .iter()
        .all(|condition| evaluate_condition(condition, text, ctx))
}

fn evaluate_condition(condition: &RuleCondition, text: &str, ctx: &EvaluationContext) -> bool {
    match condition.field {
        ConditionField::Content => evaluate_text(condition, text),
        field => {
            let value = numeric_field_value(field, ctx);
            evaluate_numeric(&condition.op, value)
        }
    }
}

fn numeric_field_value(field: ConditionField, ctx: &EvaluationContext) -> f64 {
    match field {
        ConditionField::UserAge => ctx.account_age_days,
        ConditionField::UserReputation => ctx.user_reputation,
        ConditionField::AttachmentCount => ctx.attachment_count as f64,
        ConditionField::LinkCount => ctx.link_count as f64,
        ConditionField::MentionCount => ctx.mention_count as f64,
        // Routed to evaluate_text before this point.
        ConditionField::Content => 0.0,
    }
}

fn evaluate_text(condition: &RuleCondition, text: &str) -> bool {
    let fold = |s: &str| {
        if condition.case_sensitive {
            s.to_string()
        } else {
            s.to_lowercase()
        }
    };
    let haystack = fold(text);

    match &condition.op {
        ConditionOp::Contains(needle) => haystack.contains(&fold(needle)),
        ConditionOp::Matches(pattern) => {
            let pattern = if condition.case_sensitive {
                pattern.clone()
            } else {
                format!("(?i){}", pattern)
            };
            // Pattern validity is checked at rule creation.
            Regex::new(&pattern)
                .map(|re| re.is_match(text))
                .unwrap_or(false)
        }
        ConditionOp::Equals(expected) => haystack == fold(expected),
        ConditionOp::In(values) => values.iter().any(|v| fold(v) == haystack),
        ConditionOp::NotIn(values) => !values.iter().any(|v| fold(v) == haystack),
        // Numeric operators never validate against a content field.
        ConditionOp::Gt(_) | ConditionOp::Lt(_) | ConditionOp::Gte(_) | ConditionOp::Lte(_) => {
            false
        }
    }
}

fn evaluate_numeric(op: &ConditionOp, value: f64) -> bool {
    match op {
        ConditionOp::Gt(bound) => value > *bound,
        ConditionOp::Lt(bound) => value < *bound,
        ConditionOp::Gte(bound) => value >= *bound,
        ConditionOp::Lte(bound) => value <= *bound,
        ConditionOp::Equals(expected) => expected
            .parse::<f64>()
            .map(|bound| (value - bound).abs() < f64::EPSILON)
            .unwrap_or(false),
        ConditionOp::In(values) => values
            .iter()
            .filter_map(|v| v.parse::<f64>().ok())
            .any(|bound| (value - bound).abs() < f64::EPSILON),
        ConditionOp::NotIn(values) => !values
            .iter()
            .filter_map(|v| v.parse::<f64>().ok())
            .any(|bound| (value - bound).abs() < f64::EPSILON),
        ConditionOp::Contains(_) | ConditionOp::Matches(_) => false,
    }
}

/// Fixed default rules seeded for every new community.
fn default_community_rules(community_id: Uuid) -> Vec<RuleDraft> {
    vec![
        RuleDraft {
            name: "Reputation gate".to_string(),
            rule_type: "reputation_gate".to_string(),
            enabled: true,
            priority: 5,
            conditions: vec![RuleCondition {
                field: ConditionField::UserReputation,
                op: ConditionOp::Lt(25.0),
                case_sensitive: false,
            }],
            action: AutoModAction::new(
                ActionKind::Quarantine,
                "author reputation below community floor",
            ),
            scope: RuleScope::Community,
            scope_id: Some(community_id),
        },
        RuleDraft {
            name: "Keyword spam filter".to_string(),
            rule_type: "keyword_spam".to_string(),
            enabled: true,
            priority: 10,
            conditions: vec![RuleCondition {
                field: ConditionField::Content,
                op: ConditionOp::Matches(
                    "(click here now|act now|limited time offer|earn money fast)".to_string(),
                ),
                case_sensitive: false,
            }],
            action: AutoModAction::new(ActionKind::Flag, "known spam phrasing"),
            scope: RuleScope::Community,
            scope_id: Some(community_id),
        },
        RuleDraft {
            name: "Mass mention limit".to_string(),
            rule_type: "rate_limit".to_string(),
            enabled: true,
            priority: 15,
            conditions: vec![RuleCondition {
                field: ConditionField::MentionCount,
                op: ConditionOp::Gte(10.0),
                case_sensitive: false,
            }],
            action: AutoModAction::new(ActionKind::Warn, "mention flood"),
            scope: RuleScope::Community,
            scope_id: Some(community_id),
        },
    ]
}
