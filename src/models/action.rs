use serde::{Deserialize, Serialize};

/// The kind of enforcement an AutoMod rule or a merged decision carries.
///
/// Severity is a strict total order:
/// `escalate > block > quarantine > shadowban > mute > warn > flag > allow`.
/// Comparison goes through [`ActionKind::severity_rank`], which matches
/// exhaustively so a new variant fails to compile until it is ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "action_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Allow,
    Flag,
    Warn,
    Mute,
    Shadowban,
    Quarantine,
    Block,
    Escalate,
}

impl ActionKind {
    pub fn severity_rank(&self) -> u8 {
        match self {
            ActionKind::Allow => 0,
            ActionKind::Flag => 1,
            ActionKind::Warn => 2,
            ActionKind::Mute => 3,
            ActionKind::Shadowban => 4,
            ActionKind::Quarantine => 5,
            ActionKind::Block => 6,
            ActionKind::Escalate => 7,
        }
    }

    /// The more severe of two actions.
    pub fn max_severity(self, other: ActionKind) -> ActionKind {
        if other.severity_rank() > self.severity_rank() {
            other
        } else {
            self
        }
    }

    /// Whether content carrying this action may still be published.
    /// A standalone flag routes to review but does not fail the check.
    pub fn is_passing(&self) -> bool {
        matches!(self, ActionKind::Allow | ActionKind::Flag)
    }

    /// Whether this action requires a human-review queue item.
    pub fn needs_review(&self) -> bool {
        !matches!(self, ActionKind::Allow)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Allow => "allow",
            ActionKind::Flag => "flag",
            ActionKind::Warn => "warn",
            ActionKind::Mute => "mute",
            ActionKind::Shadowban => "shadowban",
            ActionKind::Quarantine => "quarantine",
            ActionKind::Block => "block",
            ActionKind::Escalate => "escalate",
        }
    }
}

impl PartialOrd for ActionKind {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ActionKind {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.severity_rank().cmp(&other.severity_rank())
    }
}

/// Full enforcement payload attached to an AutoMod rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoModAction {
    pub kind: ActionKind,
    /// For time-boxed actions (mute, quarantine), in seconds.
    pub duration_secs: Option<i64>,
    pub notify_user: bool,
    pub notify_moderators: bool,
    pub log_reason: String,
    pub custom_message: Option<String>,
}

impl AutoModAction {
    pub fn new(kind: ActionKind, log_reason: impl Into<String>) -> Self {
        Self {
            kind,
            duration_secs: None,
            notify_user: false,
            notify_moderators: kind.severity_rank() >= ActionKind::Quarantine.severity_rank(),
            log_reason: log_reason.into(),
            custom_message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_total_order() {
        let ordered = [
            ActionKind::Allow,
            ActionKind::Flag,
            ActionKind::Warn,
            ActionKind::Mute,
            ActionKind::Shadowban,
            ActionKind::Quarantine,
            ActionKind::Block,
            ActionKind::Escalate,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0] < pair[1], "{:?} should rank below {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_max_severity() {
        assert_eq!(
            ActionKind::Mute.max_severity(ActionKind::Flag),
            ActionKind::Mute
        );
        assert_eq!(
            ActionKind::Flag.max_severity(ActionKind::Escalate),
            ActionKind::Escalate
        );
        assert_eq!(
            ActionKind::Block.max_severity(ActionKind::Block),
            ActionKind::Block
        );
    }

    #[test]
    fn test_passing_actions() {
        assert!(ActionKind::Allow.is_passing());
        assert!(ActionKind::Flag.is_passing());
        assert!(!ActionKind::Mute.is_passing());
        assert!(!ActionKind::Block.is_passing());
        assert!(!ActionKind::Escalate.is_passing());
    }
}
