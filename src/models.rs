use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Identity;
use crate::error::{ScheduleError, StoreError};
use crate::state::TopicReviewState;

pub const MAX_SESSION_MINUTES: u32 = 24 * 60;
pub const MAX_NOTES_LEN: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    #[serde(flatten)]
    pub identity: Identity,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

impl Topic {
    pub fn id(&self) -> i64 {
        self.identity.id
    }
}

impl PartialEq for Topic {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

// Self-reported recall quality for a completed review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    Perfect,
    Good,
    Regular,
    Bad,
}

impl ReviewOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewOutcome::Perfect => "perfect",
            ReviewOutcome::Good => "good",
            ReviewOutcome::Regular => "regular",
            ReviewOutcome::Bad => "bad",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "perfect" => Some(ReviewOutcome::Perfect),
            "good" => Some(ReviewOutcome::Good),
            "regular" => Some(ReviewOutcome::Regular),
            "bad" => Some(ReviewOutcome::Bad),
            _ => None,
        }
    }

    /// Like [`ReviewOutcome::from_str`], but reports the rejected literal.
    pub fn parse(s: &str) -> Result<Self, ScheduleError> {
        Self::from_str(s).ok_or_else(|| {
            ScheduleError::InvalidOutcome(format!(
                "'{}' (expected perfect, good, regular or bad)",
                s
            ))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    FirstTime,
    Review,
    Practice,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::FirstTime => "first_time",
            SessionType::Review => "review",
            SessionType::Practice => "practice",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "first_time" | "first-time" | "first" => Some(SessionType::FirstTime),
            "review" | "r" => Some(SessionType::Review),
            "practice" | "p" => Some(SessionType::Practice),
            _ => None,
        }
    }

    /// Whether a session of this type feeds the scheduler.
    pub fn is_scheduling(&self) -> bool {
        !matches!(self, SessionType::Practice)
    }

    pub fn description(&self) -> &'static str {
        match self {
            SessionType::FirstTime => "First exposure to the topic",
            SessionType::Review => "Scheduled review, updates the interval",
            SessionType::Practice => "Ahead-of-schedule practice, logged only",
        }
    }
}

/// A logged study session. Never modified after it is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(flatten)]
    pub identity: Identity,
    pub topic_id: i64,
    pub session_type: SessionType,
    pub outcome: Option<ReviewOutcome>,
    pub occurred_at: DateTime<Utc>,
    pub duration_minutes: Option<u32>,
    pub quality: Option<u8>,
    pub notes: Option<String>,
}

/// Caller-supplied fields for a session about to be logged.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub explicit_type: Option<SessionType>,
    pub outcome: Option<ReviewOutcome>,
    pub occurred_at: DateTime<Utc>,
    pub duration_minutes: Option<u32>,
    pub quality: Option<u8>,
    pub notes: Option<String>,
}

impl NewSession {
    pub fn at(occurred_at: DateTime<Utc>) -> Self {
        Self {
            explicit_type: None,
            outcome: None,
            occurred_at,
            duration_minutes: None,
            quality: None,
            notes: None,
        }
    }

    pub fn with_outcome(mut self, outcome: ReviewOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_type(mut self, session_type: SessionType) -> Self {
        self.explicit_type = Some(session_type);
        self
    }
}

pub fn validate_new_session(session: &NewSession) -> Result<(), StoreError> {
    if let Some(minutes) = session.duration_minutes {
        if minutes > MAX_SESSION_MINUTES {
            return Err(StoreError::InvalidSession(format!(
                "duration of {} minutes exceeds one day",
                minutes
            )));
        }
    }

    if let Some(q) = session.quality {
        if !(1..=5).contains(&q) {
            return Err(StoreError::InvalidSession(format!(
                "quality must be between 1 and 5, got {}",
                q
            )));
        }
    }

    if let Some(notes) = &session.notes {
        if notes.chars().count() > MAX_NOTES_LEN {
            return Err(StoreError::InvalidSession(format!(
                "notes longer than {} characters",
                MAX_NOTES_LEN
            )));
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub topic_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicWithState {
    pub topic: Topic,
    pub state: TopicReviewState,
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
