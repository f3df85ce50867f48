use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Risk tier derived from the trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "risk_tier", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub fn from_score(score: i32) -> Self {
        if score >= 70 {
            RiskTier::Low
        } else if score >= 50 {
            RiskTier::Medium
        } else if score >= 25 {
            RiskTier::High
        } else {
            RiskTier::Critical
        }
    }

    /// Escalating restrictions per tier.
    pub fn restrictions(&self) -> Vec<Restriction> {
        match self {
            RiskTier::Low => vec![],
            RiskTier::Medium => vec![Restriction::RateLimited],
            RiskTier::High => vec![
                Restriction::LimitedMessaging,
                Restriction::PostsRequireReview,
            ],
            RiskTier::Critical => vec![
                Restriction::CannotMessage,
                Restriction::CannotPost,
                Restriction::CannotComment,
                Restriction::ReviewRequired,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Restriction {
    RateLimited,
    LimitedMessaging,
    PostsRequireReview,
    CannotMessage,
    CannotPost,
    CannotComment,
    ReviewRequired,
}

impl Restriction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Restriction::RateLimited => "rate_limited",
            Restriction::LimitedMessaging => "limited_messaging",
            Restriction::PostsRequireReview => "posts_require_review",
            Restriction::CannotMessage => "cannot_message",
            Restriction::CannotPost => "cannot_post",
            Restriction::CannotComment => "cannot_comment",
            Restriction::ReviewRequired => "review_required",
        }
    }
}

/// Public-facing standing level shown on profiles. Coarser than the
/// internal risk tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StandingLevel {
    Trusted,
    Good,
    Caution,
    Restricted,
}

impl StandingLevel {
    pub fn from_score(score: i32) -> Self {
        if score >= 85 {
            StandingLevel::Trusted
        } else if score >= 60 {
            StandingLevel::Good
        } else if score >= 35 {
            StandingLevel::Caution
        } else {
            StandingLevel::Restricted
        }
    }
}

/// Positive signals about a user, sourced from the profile/engagement
/// systems the engine does not own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositiveSignals {
    pub account_age_days: f64,
    pub identity_verified: bool,
    pub employer_verified: bool,
    /// Populated optional profile fields (about, links, ...).
    pub profile_fields_completed: u32,
    pub like_count: u32,
    pub comment_count: u32,
    pub completed_mentor_sessions: u32,
    pub badges: Vec<String>,
}

/// One contribution to a computed trust score, kept for auditability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreFactor {
    pub category: String,
    pub impact: f64,
    pub details: String,
}

/// Fully recomputed score with its breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustBreakdown {
    pub score: i32,
    pub factors: Vec<ScoreFactor>,
    pub risk_tier: RiskTier,
    pub restrictions: Vec<Restriction>,
}

/// Per-user trust state. Fully recomputed from incident history plus
/// positive signals on every update; never hand-edited. The `version`
/// column backs the optimistic-concurrency write.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserTrustRecord {
    pub user_id: Uuid,
    pub trust_score: i32,
    pub risk_tier: RiskTier,
    pub restrictions: Vec<String>,
    pub badges: Vec<String>,
    pub reports_submitted: i32,
    pub reports_against: i32,
    pub last_incident_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl UserTrustRecord {
    /// Fresh record for a user with no history: base score, LOW tier.
    pub fn initial(user_id: Uuid) -> Self {
        Self {
            user_id,
            trust_score: 75,
            risk_tier: RiskTier::Low,
            restrictions: Vec::new(),
            badges: Vec::new(),
            reports_submitted: 0,
            reports_against: 0,
            last_incident_at: None,
            updated_at: Utc::now(),
            version: 0,
        }
    }
}

/// Exposed reputation view consumed by rule conditions and upstream
/// authorization checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReputation {
    pub user_id: Uuid,
    pub reputation: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(RiskTier::from_score(70), RiskTier::Low);
        assert_eq!(RiskTier::from_score(69), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(50), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(49), RiskTier::High);
        assert_eq!(RiskTier::from_score(25), RiskTier::High);
        assert_eq!(RiskTier::from_score(24), RiskTier::Critical);
        assert_eq!(RiskTier::from_score(0), RiskTier::Critical);
        assert_eq!(RiskTier::from_score(100), RiskTier::Low);
    }

    #[test]
    fn test_restrictions_per_tier() {
        assert!(RiskTier::Low.restrictions().is_empty());
        assert_eq!(RiskTier::Medium.restrictions(), vec![Restriction::RateLimited]);
        assert_eq!(RiskTier::High.restrictions().len(), 2);
        let critical = RiskTier::Critical.restrictions();
        assert_eq!(critical.len(), 4);
        assert!(critical.contains(&Restriction::ReviewRequired));
    }

    #[test]
    fn test_standing_levels() {
        assert_eq!(StandingLevel::from_score(85), StandingLevel::Trusted);
        assert_eq!(StandingLevel::from_score(60), StandingLevel::Good);
        assert_eq!(StandingLevel::from_score(35), StandingLevel::Caution);
        assert_eq!(StandingLevel::from_score(34), StandingLevel::Restricted);
    }
}
