//! Verdict combination: classifier signal + local heuristics into one
//! moderation verdict and a composite per-content safety score.

use std::collections::HashMap;
use std::sync::Arc;

use super::classifier::TextSignal;
use super::heuristics::ContentHeuristics;
use crate::models::{
    ModerationVerdict, SafetyScore, SafetySignal, SignalSeverity, SignalType, VerdictAction,
};

pub struct VerdictCombiner {
    heuristics: Arc<ContentHeuristics>,
}

impl VerdictCombiner {
    pub fn new(heuristics: Arc<ContentHeuristics>) -> Self {
        Self { heuristics }
    }

    /// First-match verdict policy over the flagged categories.
    pub fn text_verdict(&self, content_id: &str, signal: &TextSignal) -> ModerationVerdict {
        let (flagged, scores) = match signal {
            TextSignal::Scored { flagged, scores } => (flagged.clone(), scores.clone()),
            TextSignal::Unavailable => {
                // Degraded classification is never allowed through and
                // never auto-blocked; a human looks at it.
                return ModerationVerdict {
                    content_id: content_id.to_string(),
                    flagged: false,
                    categories: Vec::new(),
                    scores: HashMap::new(),
                    action: VerdictAction::Review,
                    reason: Some("Moderation service unavailable".to_string()),
                };
            }
        };

        let (action, reason) = if flagged.iter().any(|c| c == "sexual/minors") {
            (
                VerdictAction::Block,
                Some("Content violates child safety policies".to_string()),
            )
        } else if flagged.iter().any(|c| c.contains("threatening")) {
            (
                VerdictAction::Block,
                Some("Content contains threatening language".to_string()),
            )
        } else if flagged.len() > 2 {
            (
                VerdictAction::Block,
                Some("Content violates multiple community guidelines".to_string()),
            )
        } else if !flagged.is_empty() {
            (
                VerdictAction::Review,
                Some(format!("Content flagged for: {}", flagged.join(", "))),
            )
        } else {
            (VerdictAction::Allow, None)
        };

        ModerationVerdict {
            content_id: content_id.to_string(),
            flagged: !flagged.is_empty(),
            categories: flagged,
            scores,
            action,
            reason,
        }
    }

    /// Strict verdict for direct messages: any flagged category denies.
    /// Messages have no public-review middle ground.
    pub fn message_verdict(&self, content_id: &str, signal: &TextSignal) -> ModerationVerdict {
        let verdict = self.text_verdict(content_id, signal);
        if verdict.flagged && verdict.action != VerdictAction::Block {
            return ModerationVerdict {
                action: VerdictAction::Block,
                reason: Some(format!(
                    "Message blocked for: {}",
                    verdict.categories.join(", ")
                )),
                ..verdict
            };
        }
        verdict
    }

    /// Image verdict from normalized label names.
    pub fn image_verdict(&self, content_id: &str, signal: &TextSignal) -> ModerationVerdict {
        let (labels, scores) = match signal {
            TextSignal::Scored { flagged, scores } => (flagged.clone(), scores.clone()),
            TextSignal::Unavailable => {
                return ModerationVerdict {
                    content_id: content_id.to_string(),
                    flagged: false,
                    categories: Vec::new(),
                    scores: HashMap::new(),
                    action: VerdictAction::Review,
                    reason: Some("Image moderation service unavailable".to_string()),
                };
            }
        };

        if labels.is_empty() {
            return ModerationVerdict::allow(content_id);
        }

        let has_explicit = labels
            .iter()
            .any(|l| l.contains("explicit") || l.contains("nudity") || l.contains("pornography"));
        let has_violence = labels.iter().any(|l| l.contains("violence"));
        let has_substances = labels
            .iter()
            .any(|l| l.contains("drugs") || l.contains("tobacco") || l.contains("alcohol"));

        let (action, reason) = if has_explicit {
            (
                VerdictAction::Block,
                "Image contains explicit content".to_string(),
            )
        } else if has_violence {
            (
                VerdictAction::Review,
                "Image contains violent content".to_string(),
            )
        } else if has_substances {
            (
                VerdictAction::Review,
                "Image contains regulated substances".to_string(),
            )
        } else {
            (
                VerdictAction::Review,
                format!("Flagged for: {}", labels.join(", ")),
            )
        };

        ModerationVerdict {
            content_id: content_id.to_string(),
            flagged: true,
            categories: labels,
            scores,
            action,
            reason: Some(reason),
        }
    }

    /// Composite safety score: start at 100, subtract per-signal penalties,
    /// clamp to [0, 100]. The final action honors both the numeric bands
    /// and the moderation verdict (a block verdict always blocks).
    pub fn evaluate_safety_score(&self, text: &str, verdict: &ModerationVerdict) -> SafetyScore {
        let mut signals = Vec::new();

        if verdict.flagged || verdict.action != VerdictAction::Allow {
            let severity = if verdict.action == VerdictAction::Block {
                SignalSeverity::High
            } else {
                SignalSeverity::Medium
            };
            // The degraded-classifier review verdict is not itself a
            // moderation flag; only real flags count against the score.
            if verdict.flagged {
                signals.push(SafetySignal {
                    signal_type: SignalType::Moderation,
                    severity,
                    detail: verdict
                        .reason
                        .clone()
                        .unwrap_or_else(|| "Moderation flags detected".to_string()),
                });
            }
        }

        let spam = self.heuristics.detect_spam(text);
        if spam.is_spam {
            signals.push(SafetySignal {
                signal_type: SignalType::Spam,
                severity: SignalSeverity::Medium,
                detail: spam.reason.unwrap_or_else(|| "Spam pattern detected".to_string()),
            });
        }

        if self.heuristics.contains_profanity(text) {
            signals.push(SafetySignal {
                signal_type: SignalType::Profanity,
                severity: SignalSeverity::Low,
                detail: "Profanity detected".to_string(),
            });
        }

        let misinfo = self.heuristics.detect_misinformation(text);
        if misinfo.is_likely {
            signals.push(SafetySignal {
                signal_type: SignalType::Misinformation,
                severity: SignalSeverity::High,
                detail: misinfo
                    .reason
                    .unwrap_or_else(|| "Potential misinformation detected".to_string()),
            });
        }

        let mut score: i32 = 100;
        for signal in &signals {
            score -= signal.severity.penalty();
        }
        score = score.clamp(0, 100);

        let action = if verdict.action == VerdictAction::Block || score < 50 {
            VerdictAction::Block
        } else if verdict.action == VerdictAction::Review || score < 80 {
            VerdictAction::Review
        } else {
            VerdictAction::Allow
        };

        SafetyScore {
            score,
            action,
            signals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classifier::TextSignal;
    use std::collections::HashMap;

    fn combiner() -> VerdictCombiner {
        VerdictCombiner::new(Arc::new(ContentHeuristics::with_words(vec![
            "badword".to_string(),
        ])))
    }

    fn scored(flagged: &[&str]) -> TextSignal {
        TextSignal::Scored {
            flagged: flagged.iter().map(|s| s.to_string()).collect(),
            scores: HashMap::new(),
        }
    }

    #[test]
    fn test_sexual_minors_always_blocks() {
        let c = combiner();
        let verdict = c.text_verdict("c1", &scored(&["sexual/minors"]));
        assert_eq!(verdict.action, VerdictAction::Block);

        // Even alongside otherwise mild flags.
        let verdict = c.text_verdict("c1", &scored(&["hate", "sexual/minors"]));
        assert_eq!(verdict.action, VerdictAction::Block);
        assert_eq!(
            verdict.reason.as_deref(),
            Some("Content violates child safety policies")
        );
    }

    #[test]
    fn test_threatening_category_blocks() {
        let c = combiner();
        let verdict = c.text_verdict("c1", &scored(&["harassment/threatening"]));
        assert_eq!(verdict.action, VerdictAction::Block);
    }

    #[test]
    fn test_many_categories_block() {
        let c = combiner();
        let verdict = c.text_verdict("c1", &scored(&["hate", "harassment", "violence"]));
        assert_eq!(verdict.action, VerdictAction::Block);
    }

    #[test]
    fn test_few_categories_review() {
        let c = combiner();
        let verdict = c.text_verdict("c1", &scored(&["hate"]));
        assert_eq!(verdict.action, VerdictAction::Review);
        assert!(verdict.reason.unwrap().contains("hate"));

        let verdict = c.text_verdict("c1", &scored(&["hate", "harassment"]));
        assert_eq!(verdict.action, VerdictAction::Review);
    }

    #[test]
    fn test_clean_content_allows() {
        let c = combiner();
        let verdict = c.text_verdict("c1", &scored(&[]));
        assert_eq!(verdict.action, VerdictAction::Allow);
        assert!(!verdict.flagged);
    }

    #[test]
    fn test_unavailable_defaults_to_review() {
        let c = combiner();
        let verdict = c.text_verdict("c1", &TextSignal::Unavailable);
        assert_eq!(verdict.action, VerdictAction::Review);
        assert!(!verdict.flagged);
    }

    #[test]
    fn test_spam_only_composite_is_exactly_80_and_allows() {
        // Spam is a medium signal: 100 - 20 = 80, and 80 is not < 80.
        let c = combiner();
        let text = "visit https://a.com https://b.com https://c.com https://d.com";
        let verdict = c.text_verdict("c1", &scored(&[]));
        let safety = c.evaluate_safety_score(text, &verdict);

        assert_eq!(safety.score, 80);
        assert_eq!(safety.action, VerdictAction::Allow);
        assert_eq!(safety.signals.len(), 1);
        assert_eq!(safety.signals[0].signal_type, SignalType::Spam);
    }

    #[test]
    fn test_block_verdict_forces_block_action() {
        let c = combiner();
        let verdict = c.text_verdict("c1", &scored(&["sexual/minors"]));
        let safety = c.evaluate_safety_score("clean text", &verdict);
        assert_eq!(safety.action, VerdictAction::Block);
    }

    #[test]
    fn test_stacked_signals_drive_score_down() {
        let c = combiner();
        let verdict = c.text_verdict("c1", &scored(&[]));
        // misinformation (high, -30) + profanity (low, -10) + spam phrase (medium, -20)
        let text = "badword miracle cure, act now";
        let safety = c.evaluate_safety_score(text, &verdict);
        assert_eq!(safety.score, 40);
        assert_eq!(safety.action, VerdictAction::Block);
    }

    #[test]
    fn test_review_band() {
        let c = combiner();
        let verdict = c.text_verdict("c1", &scored(&[]));
        // misinformation alone: 100 - 30 = 70 -> review band
        let safety = c.evaluate_safety_score("one weird trick they hate", &verdict);
        assert_eq!(safety.score, 70);
        assert_eq!(safety.action, VerdictAction::Review);
    }

    #[test]
    fn test_message_verdict_is_strict() {
        let c = combiner();
        // A single mild flag would only review a post, but denies a message.
        let verdict = c.message_verdict("m1", &scored(&["hate"]));
        assert_eq!(verdict.action, VerdictAction::Block);

        let verdict = c.message_verdict("m1", &scored(&[]));
        assert_eq!(verdict.action, VerdictAction::Allow);

        // Degraded classification still routes to review, not denial.
        let verdict = c.message_verdict("m1", &TextSignal::Unavailable);
        assert_eq!(verdict.action, VerdictAction::Review);
    }

    #[test]
    fn test_image_explicit_blocks() {
        let c = combiner();
        let signal = scored(&["explicit nudity"]);
        let verdict = c.image_verdict("img1", &signal);
        assert_eq!(verdict.action, VerdictAction::Block);
    }

    #[test]
    fn test_image_violence_reviews() {
        let c = combiner();
        let verdict = c.image_verdict("img1", &scored(&["graphic violence"]));
        assert_eq!(verdict.action, VerdictAction::Review);
    }

    #[test]
    fn test_image_no_labels_allows() {
        let c = combiner();
        let verdict = c.image_verdict("img1", &scored(&[]));
        assert_eq!(verdict.action, VerdictAction::Allow);
    }
}
