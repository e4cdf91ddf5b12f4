pub mod dashboard;
pub mod topic_detail;
pub mod topics;

use chrono::{DateTime, Duration, Utc};
use ratatui::style::Color;

use crate::models::ReviewOutcome;
use crate::state::{TopicStatus, MAX_MASTERY};

pub(crate) fn mastery_bar(level: u8) -> String {
    let filled = level.min(MAX_MASTERY) as usize;
    let empty = MAX_MASTERY as usize - filled;
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}

pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

pub(crate) fn short_date(dt: DateTime<Utc>) -> String {
    dt.format("%b %d").to_string()
}

/// Due label relative to `now`; unscheduled topics read as due now.
pub(crate) fn due_label(due: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match due {
        None => "now".to_string(),
        Some(d) if d <= now => format!("{} !", short_date(d)),
        Some(d) => short_date(d),
    }
}

/// Compact `1h30m` style label; zero reads as `off`.
pub(crate) fn duration_label(d: Duration) -> String {
    let minutes = d.num_minutes();
    match (minutes / 60, minutes % 60) {
        (0, 0) => "off".to_string(),
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h{}m", h, m),
    }
}

pub(crate) fn outcome_style(outcome: Option<ReviewOutcome>) -> (&'static str, Color) {
    match outcome {
        Some(ReviewOutcome::Perfect) => ("Perfect", Color::Green),
        Some(ReviewOutcome::Good) => ("Good", Color::LightGreen),
        Some(ReviewOutcome::Regular) => ("Regular", Color::Yellow),
        Some(ReviewOutcome::Bad) => ("Bad", Color::Red),
        None => ("-", Color::DarkGray),
    }
}

pub(crate) fn status_color(status: TopicStatus) -> Color {
    match status {
        TopicStatus::NotStarted => Color::DarkGray,
        TopicStatus::InProgress => Color::Cyan,
        TopicStatus::Mastered => Color::Green,
    }
}
