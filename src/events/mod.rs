//! Moderation event bus.
//!
//! Events are published through an explicitly injected trait object rather
//! than a process-global emitter, so the ledger can be tested in isolation
//! and callers decide how notifications fan out.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModerationEvent {
    /// The user's standing dropped significantly (>= 15 points in one update).
    StandingChanged {
        user_id: Uuid,
        old_score: i32,
        new_score: i32,
    },
    /// The user's score crossed below the critical threshold. Edge-triggered:
    /// emitted exactly once at the crossing.
    AdminFlagCreated { user_id: Uuid, score: i32 },
}

pub trait EventBus: Send + Sync {
    fn publish(&self, event: ModerationEvent);
}

/// Default bus: structured log lines, consumed by the notification
/// collaborator out of process.
pub struct TracingEventBus;

impl EventBus for TracingEventBus {
    fn publish(&self, event: ModerationEvent) {
        match &event {
            ModerationEvent::StandingChanged {
                user_id,
                old_score,
                new_score,
            } => {
                tracing::info!(
                    user_id = %user_id,
                    old_score = %old_score,
                    new_score = %new_score,
                    "standing_changed"
                );
            }
            ModerationEvent::AdminFlagCreated { user_id, score } => {
                tracing::warn!(
                    user_id = %user_id,
                    score = %score,
                    "admin_flag_created"
                );
            }
        }
    }
}

/// Records every published event; used by tests to assert emission.
#[derive(Default)]
pub struct RecordingEventBus {
    events: Mutex<Vec<ModerationEvent>>,
}

impl RecordingEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<ModerationEvent> {
        std::mem::take(&mut *self.events.lock().expect("event bus lock poisoned"))
    }

    pub fn snapshot(&self) -> Vec<ModerationEvent> {
        self.events.lock().expect("event bus lock poisoned").clone()
    }
}

impl EventBus for RecordingEventBus {
    fn publish(&self, event: ModerationEvent) {
        self.events
            .lock()
            .expect("event bus lock poisoned")
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_bus_captures_events() {
        let bus = RecordingEventBus::new();
        let user_id = Uuid::new_v4();
        bus.publish(ModerationEvent::AdminFlagCreated { user_id, score: 20 });

        let events = bus.snapshot();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            ModerationEvent::AdminFlagCreated { user_id, score: 20 }
        );
    }
}
