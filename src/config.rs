use std::path::PathBuf;

use chrono::Duration;

use crate::classifier::SessionClassifier;

const DEFAULT_DB_NAME: &str = "studylog.db";
pub const DEFAULT_USER: &str = "default";

pub const DB_ENV: &str = "STUDYLOG_DB";
pub const USER_ENV: &str = "STUDYLOG_USER";
pub const GRACE_ENV: &str = "STUDYLOG_GRACE_HOURS";

/// Upper bound for the grace window: one year.
pub const MAX_GRACE_HOURS: f64 = 24.0 * 365.0;

/// Runtime settings. Flags win over environment, environment over defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub user: String,
    pub grace_window: Duration,
}

impl AppConfig {
    pub fn resolve(
        db_flag: Option<PathBuf>,
        user_flag: Option<String>,
        grace_flag: Option<f64>,
    ) -> Result<Self, String> {
        let db_path = db_flag.unwrap_or_else(default_db_path);

        let user = user_flag
            .or_else(|| std::env::var(USER_ENV).ok())
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_USER.to_string());

        let grace_hours = match grace_flag {
            Some(h) => h,
            None => match std::env::var(GRACE_ENV) {
                Ok(raw) => raw.trim().parse::<f64>().map_err(|_| {
                    format!("{} must be a number of hours, got '{}'", GRACE_ENV, raw)
                })?,
                Err(_) => 0.0,
            },
        };

        Ok(Self {
            db_path,
            user,
            grace_window: grace_from_hours(grace_hours)?,
        })
    }

    pub fn classifier(&self) -> SessionClassifier {
        SessionClassifier::new(self.grace_window)
    }
}

pub fn grace_from_hours(hours: f64) -> Result<Duration, String> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(format!(
            "grace window must be a non-negative number of hours, got {}",
            hours
        ));
    }
    if hours > MAX_GRACE_HOURS {
        return Err(format!(
            "grace window must be at most {} hours, got {}",
            MAX_GRACE_HOURS, hours
        ));
    }
    Duration::try_seconds((hours * 3600.0).round() as i64)
        .ok_or_else(|| format!("grace window of {} hours is out of range", hours))
}

pub fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var(DB_ENV) {
        return PathBuf::from(path);
    }

    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("studylog");

    std::fs::create_dir_all(&config_dir).ok();
    config_dir.join(DEFAULT_DB_NAME)
}
