//! Per-user trust ledger.
//!
//! The incident log is the source of truth; the trust record is a cache
//! of a full recomputation over that log plus externally-sourced positive
//! signals. Updates go through an optimistic-concurrency retry loop on
//! the record's version column, and standing events are edge-triggered
//! off the before/after scores of a successful write.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{IncidentStore, ModeratorRoster, TrustStore, UserSignals};
use crate::error::{Result, SafetyError};
use crate::events::{EventBus, ModerationEvent};
use crate::models::{
    Incident, IncidentSeverity, IncidentType, NewIncident, PositiveSignals, RiskTier, ScoreFactor,
    StandingLevel, TrustBreakdown, UserReputation, UserTrustRecord,
};

const BASE_SCORE: f64 = 75.0;
const AGE_BONUS_CAP: f64 = 36.5;
const IDENTITY_BONUS: f64 = 20.0;
const EMPLOYER_BONUS: f64 = 15.0;
const PROFILE_BONUS: f64 = 10.0;
const ENGAGEMENT_CAP: f64 = 20.0;
const MENTOR_CAP: f64 = 25.0;

/// Incidents younger than this carry full weight.
const DECAY_GRACE_DAYS: f64 = 90.0;
/// Weight halves per this many days past the grace period.
const DECAY_HALF_LIFE_DAYS: f64 = 90.0;
const DECAY_FLOOR: f64 = 0.1;

/// One-update score drop that triggers a standing notification.
const STANDING_DROP_THRESHOLD: i32 = 15;
/// Crossing below this score raises an admin flag.
const ADMIN_FLAG_THRESHOLD: i32 = 25;

/// Blocks received within this window escalate severity.
const BLOCK_WINDOW_DAYS: i64 = 7;

/// Time-decay multiplier for an incident of the given age.
pub fn decay_factor(age_days: f64) -> f64 {
    if age_days <= DECAY_GRACE_DAYS {
        1.0
    } else {
        let half_lives = (age_days - DECAY_GRACE_DAYS) / DECAY_HALF_LIFE_DAYS;
        0.5_f64.powf(half_lives).max(DECAY_FLOOR)
    }
}

/// Undecayed penalty for one incident. Verified reports weigh more than
/// unverified ones.
fn incident_weight(incident: &Incident) -> f64 {
    match incident.incident_type {
        IncidentType::Report => {
            if incident.verified {
                -25.0
            } else {
                -10.0
            }
        }
        IncidentType::Block => -5.0,
        IncidentType::ContentRemoval => -15.0,
        IncidentType::Suspension => -50.0,
        // Warnings are advisory: logged in the history, no score impact.
        IncidentType::Warning => 0.0,
    }
}

/// Full trust-score recomputation. Pure: same history, signals and clock
/// always produce the same breakdown.
pub fn compute_breakdown(
    history: &[Incident],
    signals: &PositiveSignals,
    now: DateTime<Utc>,
) -> TrustBreakdown {
    let mut factors = Vec::new();
    let mut score = BASE_SCORE;

    factors.push(ScoreFactor {
        category: "base".to_string(),
        impact: BASE_SCORE,
        details: "baseline for every account".to_string(),
    });

    let age_bonus = (signals.account_age_days * 0.1).min(AGE_BONUS_CAP);
    if age_bonus > 0.0 {
        score += age_bonus;
        factors.push(ScoreFactor {
            category: "account_age".to_string(),
            impact: age_bonus,
            details: format!("{:.0} days on platform", signals.account_age_days),
        });
    }

    if signals.identity_verified {
        score += IDENTITY_BONUS;
        factors.push(ScoreFactor {
            category: "identity_verified".to_string(),
            impact: IDENTITY_BONUS,
            details: "identity verification completed".to_string(),
        });
    }

    if signals.employer_verified {
        score += EMPLOYER_BONUS;
        factors.push(ScoreFactor {
            category: "employer_verified".to_string(),
            impact: EMPLOYER_BONUS,
            details: "employer verification completed".to_string(),
        });
    }

    if signals.profile_fields_completed >= 2 {
        score += PROFILE_BONUS;
        factors.push(ScoreFactor {
            category: "profile_completeness".to_string(),
            impact: PROFILE_BONUS,
            details: format!("{} profile fields completed", signals.profile_fields_completed),
        });
    }

    // Comments count half, floored, so an odd comment never shifts the
    // rounded total by itself.
    let engagement =
        ((signals.like_count + signals.comment_count / 2) as f64).min(ENGAGEMENT_CAP);
    if engagement > 0.0 {
        score += engagement;
        factors.push(ScoreFactor {
            category: "engagement".to_string(),
            impact: engagement,
            details: format!(
                "{} likes, {} comments received",
                signals.like_count, signals.comment_count
            ),
        });
    }

    let mentoring = (signals.completed_mentor_sessions as f64 * 5.0).min(MENTOR_CAP);
    if mentoring > 0.0 {
        score += mentoring;
        factors.push(ScoreFactor {
            category: "mentoring".to_string(),
            impact: mentoring,
            details: format!(
                "{} completed mentor sessions",
                signals.completed_mentor_sessions
            ),
        });
    }

    for incident in history {
        let age_days = (now - incident.created_at).num_seconds() as f64 / 86_400.0;
        let impact = incident_weight(incident) * decay_factor(age_days);
        score += impact;
        factors.push(ScoreFactor {
            category: format!("incident:{}", incident.incident_type.as_str()),
            impact,
            details: format!(
                "{} ({:.0} days old{})",
                incident.reason,
                age_days,
                if incident.verified { ", verified" } else { "" }
            ),
        });
    }

    let score = (score.round() as i32).clamp(0, 100);
    let risk_tier = RiskTier::from_score(score);

    TrustBreakdown {
        score,
        factors,
        risk_tier,
        restrictions: risk_tier.restrictions(),
    }
}

pub struct TrustScoreLedger {
    incidents: Arc<dyn IncidentStore>,
    trust: Arc<dyn TrustStore>,
    signals: Arc<dyn UserSignals>,
    roster: Arc<dyn ModeratorRoster>,
    events: Arc<dyn EventBus>,
    write_retry_attempts: u32,
}

impl TrustScoreLedger {
    pub fn new(
        incidents: Arc<dyn IncidentStore>,
        trust: Arc<dyn TrustStore>,
        signals: Arc<dyn UserSignals>,
        roster: Arc<dyn ModeratorRoster>,
        events: Arc<dyn EventBus>,
        write_retry_attempts: u32,
    ) -> Self {
        Self {
            incidents,
            trust,
            signals,
            roster,
            events,
            write_retry_attempts,
        }
    }

    /// Current trust record, or the fresh baseline for unknown users.
    pub async fn get_record(&self, user_id: Uuid) -> Result<UserTrustRecord> {
        Ok(self
            .trust
            .get(user_id)
            .await?
            .unwrap_or_else(|| UserTrustRecord::initial(user_id)))
    }

    /// Recompute the full score with its factor breakdown, without
    /// persisting anything.
    pub async fn get_breakdown(&self, user_id: Uuid) -> Result<TrustBreakdown> {
        let history = self.incidents.list_for_user(user_id).await?;
        let signals = self.signals.positive_signals(user_id).await?;
        Ok(compute_breakdown(&history, &signals, Utc::now()))
    }

    /// Reputation view consumed by rule conditions and upstream services.
    pub async fn calculate_user_reputation(&self, user_id: Uuid) -> Result<UserReputation> {
        let record = self.get_record(user_id).await?;
        Ok(UserReputation {
            user_id,
            reputation: record.trust_score,
        })
    }

    pub async fn standing(&self, user_id: Uuid) -> Result<StandingLevel> {
        let record = self.get_record(user_id).await?;
        Ok(StandingLevel::from_score(record.trust_score))
    }

    /// Append an incident and recompute the user's record.
    pub async fn record_incident(
        &self,
        incident: NewIncident,
    ) -> Result<(Incident, UserTrustRecord)> {
        let user_id = incident.user_id;
        let stored = self.incidents.append(incident.into_incident()).await?;
        tracing::info!(
            user_id = %user_id,
            incident_id = %stored.id,
            incident_type = %stored.incident_type.as_str(),
            "Incident recorded"
        );
        let record = self.recompute_and_store(user_id).await?;
        Ok((stored, record))
    }

    /// Moderator verdict on a reported incident. Verification changes the
    /// incident's weight, so the subject's record is recomputed.
    pub async fn verify_incident(
        &self,
        moderator_id: Uuid,
        incident_id: Uuid,
        verified: bool,
    ) -> Result<Incident> {
        if !self.roster.is_moderator(moderator_id).await? {
            return Err(SafetyError::Permission(
                "only moderators may verify incidents".into(),
            ));
        }

        let incident = self
            .incidents
            .mark_verified(incident_id, verified, Utc::now())
            .await?;
        tracing::info!(
            incident_id = %incident_id,
            moderator_id = %moderator_id,
            verified = %verified,
            "Incident verification updated"
        );
        self.recompute_and_store(incident.user_id).await?;
        Ok(incident)
    }

    /// A user reported another user. Reports enter unverified.
    pub async fn handle_user_report(
        &self,
        reporter_id: Uuid,
        target_id: Uuid,
        reason: impl Into<String>,
        content_ref: Option<String>,
    ) -> Result<(Incident, UserTrustRecord)> {
        self.record_incident(NewIncident {
            user_id: target_id,
            incident_type: IncidentType::Report,
            severity: IncidentSeverity::Medium,
            reason: reason.into(),
            reporter_id: Some(reporter_id),
            content_ref,
            verified: false,
        })
        .await
    }

    /// A user blocked another user. Repeated blocks inside a one-week
    /// window escalate the recorded severity.
    pub async fn handle_user_block(
        &self,
        blocker_id: Uuid,
        target_id: Uuid,
    ) -> Result<(Incident, UserTrustRecord)> {
        let window_start = Utc::now() - Duration::days(BLOCK_WINDOW_DAYS);
        let recent = self
            .incidents
            .count_recent(target_id, IncidentType::Block, window_start)
            .await?;
        let blocks_this_week = recent + 1;

        let severity = if blocks_this_week >= 5 {
            IncidentSeverity::High
        } else if blocks_this_week >= 2 {
            IncidentSeverity::Medium
        } else {
            IncidentSeverity::Low
        };

        self.record_incident(NewIncident {
            user_id: target_id,
            incident_type: IncidentType::Block,
            severity,
            reason: format!("blocked by another user ({} this week)", blocks_this_week),
            reporter_id: Some(blocker_id),
            content_ref: None,
            verified: true,
        })
        .await
    }

    /// Moderation removed a piece of the user's content.
    pub async fn handle_content_removal(
        &self,
        user_id: Uuid,
        content_ref: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<(Incident, UserTrustRecord)> {
        self.record_incident(NewIncident {
            user_id,
            incident_type: IncidentType::ContentRemoval,
            severity: IncidentSeverity::High,
            reason: reason.into(),
            reporter_id: None,
            content_ref: Some(content_ref.into()),
            verified: true,
        })
        .await
    }

    /// Recompute the record from scratch and persist it with an
    /// optimistic-concurrency write, retrying on version conflicts.
    /// Standing events fire only after a successful write.
    pub async fn recompute_and_store(&self, user_id: Uuid) -> Result<UserTrustRecord> {
        for attempt in 0..self.write_retry_attempts {
            let current = self.get_record(user_id).await?;
            let expected_version = current.version;

            let history = self.incidents.list_for_user(user_id).await?;
            let signals = self.signals.positive_signals(user_id).await?;
            let breakdown = compute_breakdown(&history, &signals, Utc::now());

            let reports_against = history
                .iter()
                .filter(|i| i.incident_type == IncidentType::Report)
                .count() as i32;
            let reports_submitted = self.incidents.count_reported_by(user_id).await? as i32;
            let last_incident_at = history.first().map(|i| i.created_at);

            let record = UserTrustRecord {
                user_id,
                trust_score: breakdown.score,
                risk_tier: breakdown.risk_tier,
                restrictions: breakdown
                    .restrictions
                    .iter()
                    .map(|r| r.as_str().to_string())
                    .collect(),
                badges: signals.badges.clone(),
                reports_submitted,
                reports_against,
                last_incident_at,
                updated_at: Utc::now(),
                version: expected_version + 1,
            };

            if self.trust.write_versioned(&record, expected_version).await? {
                self.emit_standing_events(&current, &record);
                tracing::debug!(
                    user_id = %user_id,
                    score = %record.trust_score,
                    tier = ?record.risk_tier,
                    version = %record.version,
                    "Trust record updated"
                );
                return Ok(record);
            }

            tracing::debug!(
                user_id = %user_id,
                attempt = %(attempt + 1),
                "Trust record version conflict, retrying"
            );
        }

        Err(SafetyError::Conflict(format!(
            "trust record for user {} kept changing under us",
            user_id
        )))
    }

    /// Sweep users with decay-eligible incidents and refresh their
    /// records. The cutoff is fixed once at the start so the sweep is
    /// idempotent over its own runtime.
    pub async fn decay_sweep(&self) -> Result<u32> {
        let cutoff = Utc::now() - Duration::days(DECAY_GRACE_DAYS as i64);
        let users = self.incidents.users_with_incidents_before(cutoff).await?;

        let mut updated = 0u32;
        for user_id in users {
            self.recompute_and_store(user_id).await?;
            updated += 1;
        }

        tracing::info!(updated = %updated, "Decay sweep complete");
        Ok(updated)
    }

    fn emit_standing_events(&self, old: &UserTrustRecord, new: &UserTrustRecord) {
        let drop = old.trust_score - new.trust_score;
        if drop >= STANDING_DROP_THRESHOLD {
            self.events.publish(ModerationEvent::StandingChanged {
                user_id: new.user_id,
                old_score: old.trust_score,
                new_score: new.trust_score,
            });
        }

        // Edge-triggered: fires once, on the crossing.
        if old.trust_score >= ADMIN_FLAG_THRESHOLD && new.trust_score < ADMIN_FLAG_THRESHOLD {
            self.events.publish(ModerationEvent::AdminFlagCreated {
                user_id: new.user_id,
                score: new.trust_score,
            });
        }
    }
}
