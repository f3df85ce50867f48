pub mod action;
pub mod content;
pub mod incident;
pub mod queue;
pub mod rule;
pub mod trust;
pub mod verdict;

pub use action::{ActionKind, AutoModAction};
pub use content::{ContentItem, ContentType, EvaluationContext};
pub use incident::{Incident, IncidentSeverity, IncidentType, NewIncident};
pub use queue::{ModerationQueueItem, QueueStatus, ReviewDecision};
pub use rule::{AutoModRule, ConditionField, ConditionOp, RuleCondition, RuleDraft, RuleScope};
pub use trust::{
    PositiveSignals, Restriction, RiskTier, ScoreFactor, StandingLevel, TrustBreakdown,
    UserReputation, UserTrustRecord,
};
pub use verdict::{
    ModerationVerdict, ProfileCheck, SafetyScore, SafetySignal, SignalSeverity, SignalType,
    VerdictAction,
};
