use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ReviewOutcome;

pub const MIN_MASTERY: u8 = 1;
pub const MAX_MASTERY: u8 = 10;

// Keeps due dates inside chrono's representable range under unbounded growth.
pub const MAX_INTERVAL_DAYS: f64 = 365_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    NotStarted,
    InProgress,
    Mastered,
}

impl TopicStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicStatus::NotStarted => "not_started",
            TopicStatus::InProgress => "in_progress",
            TopicStatus::Mastered => "mastered",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "not_started" => Some(TopicStatus::NotStarted),
            "in_progress" => Some(TopicStatus::InProgress),
            "mastered" => Some(TopicStatus::Mastered),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TopicStatus::NotStarted => "Not Started",
            TopicStatus::InProgress => "In Progress",
            TopicStatus::Mastered => "Mastered",
        }
    }
}

/// Lifecycle status after a completed review.
///
/// Status only moves forward, with one exception: a `bad` outcome on a
/// mastered topic drops it back to in progress.
pub fn next_status(
    previous: TopicStatus,
    mastery_level: u8,
    review_count: u32,
    outcome: ReviewOutcome,
) -> TopicStatus {
    if review_count == 0 {
        return TopicStatus::NotStarted;
    }
    if outcome == ReviewOutcome::Bad && previous == TopicStatus::Mastered {
        return TopicStatus::InProgress;
    }
    if mastery_level >= MAX_MASTERY {
        return TopicStatus::Mastered;
    }
    previous.max(TopicStatus::InProgress)
}

/// Scheduling state of one topic. Created with defaults alongside the topic
/// and replaced only by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicReviewState {
    pub mastery_level: u8,
    pub status: TopicStatus,
    pub interval_index: usize,
    pub current_interval_days: Option<f64>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub next_due_at: Option<DateTime<Utc>>,
    pub review_count: u32,
}

impl Default for TopicReviewState {
    fn default() -> Self {
        Self {
            mastery_level: MIN_MASTERY,
            status: TopicStatus::NotStarted,
            interval_index: 0,
            current_interval_days: None,
            last_reviewed_at: None,
            next_due_at: None,
            review_count: 0,
        }
    }
}

impl TopicReviewState {
    pub fn has_history(&self) -> bool {
        self.review_count > 0
    }

    /// A topic never reviewed is always due.
    pub fn is_due(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        match self.next_due_at {
            // A window reaching past chrono's range covers any due date
            Some(due) => now.checked_add_signed(grace).map_or(true, |t| t >= due),
            None => true,
        }
    }

    pub fn mastery_label(&self) -> &'static str {
        match self.mastery_level {
            1..=2 => "New",
            3..=4 => "Learning",
            5..=6 => "Familiar",
            7..=8 => "Proficient",
            9 => "Strong",
            10 => "Mastered",
            _ => "Unknown",
        }
    }
}

pub fn clamp_mastery(level: i16) -> u8 {
    level.clamp(MIN_MASTERY as i16, MAX_MASTERY as i16) as u8
}

/// Due date `days` after `from`, at millisecond precision.
pub fn due_after(from: DateTime<Utc>, days: f64) -> DateTime<Utc> {
    let millis = (days.min(MAX_INTERVAL_DAYS) * 86_400_000.0).round() as i64;
    from + Duration::milliseconds(millis)
}
