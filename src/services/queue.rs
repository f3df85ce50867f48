//! Human-review queue service.
//!
//! Items move `Pending -> UnderReview -> {ActionTaken, Closed}`. The one
//! exception to forward-only movement is the escalate decision, which
//! reopens an item to `Pending` with boosted priority, bounded by the
//! escalation cap. On reject, the reviewed decision is persisted before
//! enforcement dispatch so a dispatch outage never loses the verdict.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::dispatcher::ActionDispatcher;
use crate::db::{ModeratorRoster, QueueStore};
use crate::error::{Result, SafetyError};
use crate::models::{ModerationQueueItem, QueueStatus, ReviewDecision};

/// Priority boost applied each time an item is escalated.
const ESCALATION_PRIORITY_BOOST: i32 = 10;

pub struct ModerationQueue {
    store: Arc<dyn QueueStore>,
    roster: Arc<dyn ModeratorRoster>,
    dispatcher: Arc<dyn ActionDispatcher>,
    escalation_cap: i32,
    dispatch_retry_attempts: u32,
}

impl ModerationQueue {
    pub fn new(
        store: Arc<dyn QueueStore>,
        roster: Arc<dyn ModeratorRoster>,
        dispatcher: Arc<dyn ActionDispatcher>,
        escalation_cap: i32,
        dispatch_retry_attempts: u32,
    ) -> Self {
        Self {
            store,
            roster,
            dispatcher,
            escalation_cap,
            dispatch_retry_attempts,
        }
    }

    pub async fn enqueue(&self, item: ModerationQueueItem) -> Result<ModerationQueueItem> {
        let item = self.store.insert(item).await?;
        tracing::info!(
            queue_item_id = %item.id,
            content_id = %item.content_id,
            source = %item.source_ref,
            "Queue item created"
        );
        Ok(item)
    }

    /// Pending work, highest review priority first.
    pub async fn pending(&self, limit: i64, offset: i64) -> Result<Vec<ModerationQueueItem>> {
        self.store
            .list_by_status(QueueStatus::Pending, limit, offset)
            .await
    }

    /// Take a pending item into review, recording the reviewer.
    pub async fn claim_item(
        &self,
        moderator_id: Uuid,
        item_id: Uuid,
    ) -> Result<ModerationQueueItem> {
        self.require_moderator(moderator_id).await?;

        let mut item = self.store.get(item_id).await?;
        if !item.status.can_transition_to(QueueStatus::UnderReview) {
            return Err(SafetyError::InvalidQueueTransition {
                from: item.status.as_str().to_string(),
                to: QueueStatus::UnderReview.as_str().to_string(),
            });
        }

        item.status = QueueStatus::UnderReview;
        item.reviewer_id = Some(moderator_id);
        item.updated_at = Utc::now();
        self.store.update(item).await
    }

    /// Apply a moderator decision to a claimed item.
    pub async fn process_queue_item(
        &self,
        moderator_id: Uuid,
        item_id: Uuid,
        decision: ReviewDecision,
        notes: Option<String>,
    ) -> Result<ModerationQueueItem> {
        self.require_moderator(moderator_id).await?;

        let mut item = self.store.get(item_id).await?;

        match decision {
            ReviewDecision::Approve => {
                self.ensure_transition(&item, QueueStatus::Closed)?;
                item.status = QueueStatus::Closed;
                item.decision = Some(decision.as_str().to_string());
                item.notes = notes;
                item.reviewer_id = Some(moderator_id);
                item.updated_at = Utc::now();
                let item = self.store.update(item).await?;
                tracing::info!(
                    queue_item_id = %item.id,
                    moderator_id = %moderator_id,
                    "Queue item approved and closed"
                );
                Ok(item)
            }
            ReviewDecision::Reject => {
                self.ensure_transition(&item, QueueStatus::ActionTaken)?;
                item.status = QueueStatus::ActionTaken;
                item.decision = Some(decision.as_str().to_string());
                item.notes = notes;
                item.reviewer_id = Some(moderator_id);
                item.updated_at = Utc::now();
                let item = self.store.update(item).await?;
                tracing::info!(
                    queue_item_id = %item.id,
                    moderator_id = %moderator_id,
                    action = %item.recorded_action.kind.as_str(),
                    "Queue item rejected, dispatching enforcement"
                );
                self.dispatch_with_retries(&item).await?;
                Ok(item)
            }
            ReviewDecision::Escalate => {
                // Escalation is the one sanctioned backward move: it
                // reopens claimed or even already-decided items.
                if item.status == QueueStatus::Pending {
                    return Err(SafetyError::InvalidQueueTransition {
                        from: item.status.as_str().to_string(),
                        to: QueueStatus::Pending.as_str().to_string(),
                    });
                }
                if item.escalation_count >= self.escalation_cap {
                    return Err(SafetyError::Validation(format!(
                        "queue item {} already escalated {} times",
                        item.id, item.escalation_count
                    )));
                }

                item.status = QueueStatus::Pending;
                item.escalation_count += 1;
                item.review_priority += ESCALATION_PRIORITY_BOOST;
                item.decision = None;
                item.notes = notes;
                item.reviewer_id = None;
                item.updated_at = Utc::now();
                let item = self.store.update(item).await?;
                tracing::info!(
                    queue_item_id = %item.id,
                    escalation_count = %item.escalation_count,
                    review_priority = %item.review_priority,
                    "Queue item escalated back to pending"
                );
                Ok(item)
            }
        }
    }

    fn ensure_transition(&self, item: &ModerationQueueItem, to: QueueStatus) -> Result<()> {
        if item.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(SafetyError::InvalidQueueTransition {
                from: item.status.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    async fn require_moderator(&self, user_id: Uuid) -> Result<()> {
        if self.roster.is_moderator(user_id).await? {
            Ok(())
        } else {
            Err(SafetyError::Permission(
                "only moderators may work the review queue".into(),
            ))
        }
    }

    /// The decision is already persisted; enforcement gets a bounded
    /// number of attempts and the last error surfaces to the caller.
    async fn dispatch_with_retries(&self, item: &ModerationQueueItem) -> Result<()> {
        let mut last_error = None;
        for attempt in 1..=self.dispatch_retry_attempts {
            match self.dispatcher.dispatch(item, &item.recorded_action).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        queue_item_id = %item.id,
                        attempt = %attempt,
                        error = %e,
                        "Enforcement dispatch failed"
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            SafetyError::Internal("dispatch retry loop ran zero attempts".into())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{InMemoryQueue, StaticRoster};
    use crate::models::{ActionKind, AutoModAction};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingDispatcher {
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl CountingDispatcher {
        fn reliable() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first: 0,
            }
        }

        fn failing_first(n: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first: n,
            }
        }
    }

    #[async_trait]
    impl ActionDispatcher for CountingDispatcher {
        async fn dispatch(
            &self,
            _item: &ModerationQueueItem,
            _action: &AutoModAction,
        ) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(SafetyError::Internal("downstream unavailable".into()))
            } else {
                Ok(())
            }
        }
    }

    struct Fixture {
        queue: ModerationQueue,
        store: Arc<InMemoryQueue>,
        dispatcher: Arc<CountingDispatcher>,
        moderator: Uuid,
    }

    fn fixture_with(dispatcher: CountingDispatcher) -> Fixture {
        let store = Arc::new(InMemoryQueue::new());
        let roster = Arc::new(StaticRoster::new());
        let moderator = Uuid::new_v4();
        roster.add(moderator);
        let dispatcher = Arc::new(dispatcher);
        let queue = ModerationQueue::new(store.clone(), roster, dispatcher.clone(), 3, 3);
        Fixture {
            queue,
            store,
            dispatcher,
            moderator,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(CountingDispatcher::reliable())
    }

    async fn enqueued(f: &Fixture) -> ModerationQueueItem {
        f.queue
            .enqueue(ModerationQueueItem::new(
                "content-1",
                Uuid::new_v4(),
                "verdict",
                AutoModAction::new(ActionKind::Mute, "needs review"),
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_claim_then_approve_closes_item() {
        let f = fixture();
        let item = enqueued(&f).await;

        let claimed = f.queue.claim_item(f.moderator, item.id).await.unwrap();
        assert_eq!(claimed.status, QueueStatus::UnderReview);
        assert_eq!(claimed.reviewer_id, Some(f.moderator));

        let closed = f
            .queue
            .process_queue_item(
                f.moderator,
                item.id,
                ReviewDecision::Approve,
                Some("false positive".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(closed.status, QueueStatus::Closed);
        assert_eq!(closed.decision.as_deref(), Some("approve"));
        // Approval dispatches nothing.
        assert_eq!(f.dispatcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_decision_on_unclaimed_item_rejected() {
        let f = fixture();
        let item = enqueued(&f).await;

        let err = f
            .queue
            .process_queue_item(f.moderator, item.id, ReviewDecision::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SafetyError::InvalidQueueTransition { .. }));
    }

    #[tokio::test]
    async fn test_non_moderator_rejected() {
        let f = fixture();
        let item = enqueued(&f).await;
        let outsider = Uuid::new_v4();

        let err = f.queue.claim_item(outsider, item.id).await.unwrap_err();
        assert!(matches!(err, SafetyError::Permission(_)));
        let err = f
            .queue
            .process_queue_item(outsider, item.id, ReviewDecision::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SafetyError::Permission(_)));
    }

    #[tokio::test]
    async fn test_reject_dispatches_recorded_action() {
        let f = fixture();
        let item = enqueued(&f).await;
        f.queue.claim_item(f.moderator, item.id).await.unwrap();

        let taken = f
            .queue
            .process_queue_item(f.moderator, item.id, ReviewDecision::Reject, None)
            .await
            .unwrap();
        assert_eq!(taken.status, QueueStatus::ActionTaken);
        assert_eq!(f.dispatcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_retries_transient_failures() {
        let f = fixture_with(CountingDispatcher::failing_first(2));
        let item = enqueued(&f).await;
        f.queue.claim_item(f.moderator, item.id).await.unwrap();

        f.queue
            .process_queue_item(f.moderator, item.id, ReviewDecision::Reject, None)
            .await
            .unwrap();
        assert_eq!(f.dispatcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_decision_persists_even_when_dispatch_exhausts() {
        let f = fixture_with(CountingDispatcher::failing_first(10));
        let item = enqueued(&f).await;
        f.queue.claim_item(f.moderator, item.id).await.unwrap();

        let err = f
            .queue
            .process_queue_item(f.moderator, item.id, ReviewDecision::Reject, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SafetyError::Internal(_)));

        // The reviewed decision survived the dispatch outage.
        let stored = f.store.get(item.id).await.unwrap();
        assert_eq!(stored.status, QueueStatus::ActionTaken);
        assert_eq!(stored.decision.as_deref(), Some("reject"));
    }

    #[tokio::test]
    async fn test_escalate_reopens_with_boosted_priority() {
        let f = fixture();
        let item = enqueued(&f).await;
        f.queue.claim_item(f.moderator, item.id).await.unwrap();

        let reopened = f
            .queue
            .process_queue_item(
                f.moderator,
                item.id,
                ReviewDecision::Escalate,
                Some("needs senior review".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(reopened.status, QueueStatus::Pending);
        assert_eq!(reopened.escalation_count, 1);
        assert_eq!(reopened.review_priority, ESCALATION_PRIORITY_BOOST);
        assert!(reopened.reviewer_id.is_none());

        // The reopened item surfaces ahead of ordinary pending work.
        let pending = f.queue.pending(10, 0).await.unwrap();
        assert_eq!(pending[0].id, item.id);
    }

    #[tokio::test]
    async fn test_escalation_cap_enforced() {
        let f = fixture();
        let item = enqueued(&f).await;

        for _ in 0..3 {
            f.queue.claim_item(f.moderator, item.id).await.unwrap();
            f.queue
                .process_queue_item(f.moderator, item.id, ReviewDecision::Escalate, None)
                .await
                .unwrap();
        }

        f.queue.claim_item(f.moderator, item.id).await.unwrap();
        let err = f
            .queue
            .process_queue_item(f.moderator, item.id, ReviewDecision::Escalate, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SafetyError::Validation(_)));
    }

    #[tokio::test]
    async fn test_terminal_items_immutable() {
        let f = fixture();
        let item = enqueued(&f).await;
        f.queue.claim_item(f.moderator, item.id).await.unwrap();
        f.queue
            .process_queue_item(f.moderator, item.id, ReviewDecision::Approve, None)
            .await
            .unwrap();

        for decision in [ReviewDecision::Approve, ReviewDecision::Reject] {
            let err = f
                .queue
                .process_queue_item(f.moderator, item.id, decision, None)
                .await
                .unwrap_err();
            assert!(matches!(err, SafetyError::InvalidQueueTransition { .. }));
        }

        let err = f.queue.claim_item(f.moderator, item.id).await.unwrap_err();
        assert!(matches!(err, SafetyError::InvalidQueueTransition { .. }));
    }

    #[tokio::test]
    async fn test_escalate_reopens_a_closed_item() {
        let f = fixture();
        let item = enqueued(&f).await;
        f.queue.claim_item(f.moderator, item.id).await.unwrap();
        f.queue
            .process_queue_item(f.moderator, item.id, ReviewDecision::Approve, None)
            .await
            .unwrap();

        let reopened = f
            .queue
            .process_queue_item(f.moderator, item.id, ReviewDecision::Escalate, None)
            .await
            .unwrap();
        assert_eq!(reopened.status, QueueStatus::Pending);
        assert_eq!(reopened.escalation_count, 1);

        // An item that is already pending has nothing to escalate.
        let err = f
            .queue
            .process_queue_item(f.moderator, item.id, ReviewDecision::Escalate, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SafetyError::InvalidQueueTransition { .. }));
    }
}
