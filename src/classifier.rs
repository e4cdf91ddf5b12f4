use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::models::SessionType;
use crate::state::TopicReviewState;

/// Decides the effective type of a newly logged session.
///
/// Pure: the answer depends only on the state snapshot, the clock value and
/// the caller's override, so repeated calls with the same inputs agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClassifier {
    grace: Duration,
}

impl Default for SessionClassifier {
    fn default() -> Self {
        Self {
            grace: Duration::zero(),
        }
    }
}

impl SessionClassifier {
    /// Negative windows are treated as zero.
    pub fn new(grace: Duration) -> Self {
        Self {
            grace: grace.max(Duration::zero()),
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    pub fn classify(
        &self,
        state: &TopicReviewState,
        now: DateTime<Utc>,
        explicit: Option<SessionType>,
    ) -> SessionType {
        if let Some(session_type) = explicit {
            return session_type;
        }

        let session_type = if !state.has_history() {
            SessionType::FirstTime
        } else if state.is_due(now, self.grace) {
            SessionType::Review
        } else {
            SessionType::Practice
        };

        debug!(
            "classified session as {} (reviews={}, next_due={:?})",
            session_type.as_str(),
            state.review_count,
            state.next_due_at
        );
        session_type
    }
}
