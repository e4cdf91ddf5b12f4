use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ReviewOutcome, SessionType};
use crate::scheduler::SessionEvaluation;
use crate::state::{TopicReviewState, TopicStatus};

/// Identity shared by persisted records: an opaque key plus bookkeeping
/// timestamps. Two identities are equal when their keys are, whatever the
/// timestamps say.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(id: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            updated_at: created_at,
        }
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Facts emitted while a session is applied to a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewEvent {
    SessionLogged {
        session_type: SessionType,
        outcome: Option<ReviewOutcome>,
    },
    ReviewScheduled {
        interval_days: f64,
        interval_index: usize,
        next_due_at: DateTime<Utc>,
    },
    MasteryChanged {
        from: u8,
        to: u8,
    },
    StatusChanged {
        from: TopicStatus,
        to: TopicStatus,
    },
}

impl ReviewEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ReviewEvent::SessionLogged { .. } => "session_logged",
            ReviewEvent::ReviewScheduled { .. } => "review_scheduled",
            ReviewEvent::MasteryChanged { .. } => "mastery_changed",
            ReviewEvent::StatusChanged { .. } => "status_changed",
        }
    }
}

/// A topic's review state together with the events produced during the
/// current unit of work. Whoever persists the aggregate drains the events
/// with [`TopicReviews::take_events`].
#[derive(Debug, Clone)]
pub struct TopicReviews {
    topic_id: i64,
    state: TopicReviewState,
    version: i64,
    events: Vec<ReviewEvent>,
}

impl TopicReviews {
    pub fn load(topic_id: i64, state: TopicReviewState, version: i64) -> Self {
        Self {
            topic_id,
            state,
            version,
            events: Vec::new(),
        }
    }

    pub fn topic_id(&self) -> i64 {
        self.topic_id
    }

    pub fn state(&self) -> &TopicReviewState {
        &self.state
    }

    /// Version the state was loaded at; writes must match it.
    pub fn version(&self) -> i64 {
        self.version
    }

    #[cfg(test)]
    pub fn pending_events(&self) -> &[ReviewEvent] {
        &self.events
    }

    /// Folds an evaluated session into the aggregate. Returns true when the
    /// scheduling state changed and therefore needs to be written back.
    pub fn record(
        &mut self,
        evaluation: SessionEvaluation,
        outcome: Option<ReviewOutcome>,
    ) -> bool {
        self.events.push(ReviewEvent::SessionLogged {
            session_type: evaluation.session_type,
            outcome,
        });

        let Some(next) = evaluation.new_state else {
            return false;
        };

        if let (Some(interval_days), Some(next_due_at)) =
            (next.current_interval_days, next.next_due_at)
        {
            self.events.push(ReviewEvent::ReviewScheduled {
                interval_days,
                interval_index: next.interval_index,
                next_due_at,
            });
        }
        if next.mastery_level != self.state.mastery_level {
            self.events.push(ReviewEvent::MasteryChanged {
                from: self.state.mastery_level,
                to: next.mastery_level,
            });
        }
        if next.status != self.state.status {
            self.events.push(ReviewEvent::StatusChanged {
                from: self.state.status,
                to: next.status,
            });
        }

        self.state = next;
        true
    }

    /// Called by the store once the state row has been written.
    pub fn mark_saved(&mut self) {
        self.version += 1;
    }

    pub fn take_events(&mut self) -> Vec<ReviewEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ReviewPolicy;
    use crate::scheduler::apply_review;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap()
    }

    mod identity_tests {
        use super::*;

        #[test]
        fn equality_ignores_timestamps() {
            let a = Identity::new(1, at(1));
            let mut b = Identity::new(1, at(2));
            b.updated_at = at(5);
            assert_eq!(a, b);
            assert_ne!(a, Identity::new(2, at(1)));
        }

        #[test]
        fn hashes_by_key() {
            let mut set = HashSet::new();
            set.insert(Identity::new(3, at(1)));
            set.insert(Identity::new(3, at(9)));
            set.insert(Identity::new(4, at(1)));
            assert_eq!(set.len(), 2);
        }
    }

    mod aggregate_tests {
        use super::*;

        fn first_review() -> SessionEvaluation {
            let state = TopicReviewState::default();
            let next = apply_review(
                &ReviewPolicy::default(),
                &state,
                SessionType::FirstTime,
                ReviewOutcome::Perfect,
                at(1),
            )
            .unwrap();
            SessionEvaluation {
                session_type: SessionType::FirstTime,
                new_state: Some(next),
            }
        }

        #[test]
        fn practice_only_logs_session() {
            let mut agg = TopicReviews::load(1, TopicReviewState::default(), 0);
            let changed = agg.record(
                SessionEvaluation {
                    session_type: SessionType::Practice,
                    new_state: None,
                },
                Some(ReviewOutcome::Good),
            );
            assert!(!changed);
            assert_eq!(agg.pending_events().len(), 1);
            assert_eq!(agg.state(), &TopicReviewState::default());
        }

        #[test]
        fn scheduling_session_emits_all_changes() {
            let mut agg = TopicReviews::load(1, TopicReviewState::default(), 0);
            assert!(agg.record(first_review(), Some(ReviewOutcome::Perfect)));

            let kinds: Vec<&str> = agg.pending_events().iter().map(|e| e.kind()).collect();
            assert_eq!(
                kinds,
                vec!["session_logged", "review_scheduled", "mastery_changed", "status_changed"]
            );
            assert_eq!(agg.state().mastery_level, 3);
        }

        #[test]
        fn events_are_drained_once() {
            let mut agg = TopicReviews::load(1, TopicReviewState::default(), 0);
            agg.record(first_review(), Some(ReviewOutcome::Perfect));

            let drained = agg.take_events();
            assert_eq!(drained.len(), 4);
            assert!(agg.take_events().is_empty());
            assert!(agg.pending_events().is_empty());
        }

        #[test]
        fn event_serializes_with_kind_tag() {
            let event = ReviewEvent::MasteryChanged { from: 1, to: 3 };
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["kind"], "mastery_changed");
            assert_eq!(json["to"], 3);
        }
    }
}
