use chrono::{DateTime, SecondsFormat, Utc};
use log::{info, warn};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Result, Row, Transaction, TransactionBehavior};
use serde::Serialize;
use std::path::Path;
use std::time::Duration as StdDuration;

use crate::classifier::SessionClassifier;
use crate::domain::{Identity, ReviewEvent, TopicReviews};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    validate_new_session, NewSession, ReviewOutcome, Session, SessionType, Tag, Topic,
    TopicWithState,
};
use crate::policy::{PolicyInput, ReviewPolicy};
use crate::scheduler::evaluate_session;
use crate::state::{TopicReviewState, TopicStatus};

const TOPIC_COLUMNS: &str = "t.id, t.name, t.description, t.created_at, t.updated_at";
const STATE_COLUMNS: &str = "rs.mastery_level, rs.status, rs.interval_index, \
     rs.current_interval_days, rs.last_reviewed_at, rs.next_due_at, rs.review_count";
const SESSION_COLUMNS: &str = "s.id, s.topic_id, s.session_type, s.outcome, s.occurred_at, \
     s.created_at, s.duration_minutes, s.quality, s.notes";

pub struct Database {
    conn: Connection,
}

/// Outcome of persisting one logged session.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedSession {
    pub session: Session,
    pub state: TopicReviewState,
    pub scheduled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredEvent {
    pub id: i64,
    pub session_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub event: ReviewEvent,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_topics: i64,
    pub total_sessions: i64,
    pub total_reviews: i64,
    pub practice_sessions: i64,
    pub mastered: i64,
    pub due_now: i64,
    pub avg_mastery: f64,
}

// Fixed-width RFC 3339 so text comparison in SQL matches time order.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(idx: usize, s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_ts(row: &Row, idx: usize) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

fn topic_from_row(row: &Row) -> Result<Topic> {
    let created: String = row.get(3)?;
    let updated: String = row.get(4)?;
    Ok(Topic {
        identity: Identity {
            id: row.get(0)?,
            created_at: parse_ts(3, &created)?,
            updated_at: parse_ts(4, &updated)?,
        },
        name: row.get(1)?,
        description: row.get(2)?,
        tags: vec![],
    })
}

fn state_from_row(row: &Row, base: usize) -> Result<TopicReviewState> {
    let status: String = row.get(base + 1)?;
    let interval_index: i64 = row.get(base + 2)?;
    Ok(TopicReviewState {
        mastery_level: row.get(base)?,
        status: TopicStatus::from_str(&status).unwrap_or(TopicStatus::NotStarted),
        interval_index: interval_index.max(0) as usize,
        current_interval_days: row.get(base + 3)?,
        last_reviewed_at: opt_ts(row, base + 4)?,
        next_due_at: opt_ts(row, base + 5)?,
        review_count: row.get(base + 6)?,
    })
}

fn session_from_row(row: &Row) -> Result<Session> {
    let session_type: String = row.get(2)?;
    let outcome: Option<String> = row.get(3)?;
    let occurred: String = row.get(4)?;
    let created: String = row.get(5)?;
    let created_at = parse_ts(5, &created)?;
    Ok(Session {
        identity: Identity::new(row.get(0)?, created_at),
        topic_id: row.get(1)?,
        session_type: SessionType::from_str(&session_type).unwrap_or(SessionType::Practice),
        outcome: outcome.and_then(|s| ReviewOutcome::from_str(&s)),
        occurred_at: parse_ts(4, &occurred)?,
        duration_minutes: row.get(6)?,
        quality: row.get(7)?,
        notes: row.get(8)?,
    })
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(StdDuration::from_secs(5))?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS topics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS topic_tags (
                topic_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,
                PRIMARY KEY (topic_id, tag_id),
                FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );

            -- One scheduling row per topic; version guards read-evaluate-write
            CREATE TABLE IF NOT EXISTS review_state (
                topic_id INTEGER PRIMARY KEY,
                mastery_level INTEGER NOT NULL DEFAULT 1 CHECK(mastery_level BETWEEN 1 AND 10),
                status TEXT NOT NULL DEFAULT 'not_started'
                    CHECK(status IN ('not_started', 'in_progress', 'mastered')),
                interval_index INTEGER NOT NULL DEFAULT 0 CHECK(interval_index >= 0),
                current_interval_days REAL,
                last_reviewed_at TEXT,
                next_due_at TEXT,
                review_count INTEGER NOT NULL DEFAULT 0,
                version INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                topic_id INTEGER NOT NULL,
                session_type TEXT NOT NULL
                    CHECK(session_type IN ('first_time', 'review', 'practice')),
                outcome TEXT CHECK(outcome IN ('perfect', 'good', 'regular', 'bad')),
                occurred_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                duration_minutes INTEGER,
                quality INTEGER CHECK(quality BETWEEN 1 AND 5),
                notes TEXT,
                FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
            );

            CREATE TRIGGER IF NOT EXISTS sessions_append_only
            BEFORE UPDATE ON sessions
            BEGIN
                SELECT RAISE(ABORT, 'sessions are append-only');
            END;

            CREATE TABLE IF NOT EXISTS review_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                topic_id INTEGER NOT NULL,
                session_id INTEGER,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE,
                FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS review_policies (
                user TEXT PRIMARY KEY,
                policy TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_review_state_due ON review_state(next_due_at);
            CREATE INDEX IF NOT EXISTS idx_review_state_status ON review_state(status);
            CREATE INDEX IF NOT EXISTS idx_topic_tags_topic ON topic_tags(topic_id);
            CREATE INDEX IF NOT EXISTS idx_topic_tags_tag ON topic_tags(tag_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_topic ON sessions(topic_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_occurred ON sessions(occurred_at);
            CREATE INDEX IF NOT EXISTS idx_review_events_topic ON review_events(topic_id);
            "#,
        )?;

        Ok(())
    }

    // Topic operations
    pub fn add_topic(&self, name: &str, description: Option<&str>, tags: &[String]) -> Result<i64> {
        let now = ts(Utc::now());
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO topics (name, description, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            "#,
            params![name, description, now],
        )?;
        let topic_id = tx.last_insert_rowid();

        // Every topic starts with default scheduling state
        tx.execute(
            "INSERT INTO review_state (topic_id) VALUES (?1)",
            params![topic_id],
        )?;

        for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            let tag_id = self.get_or_create_tag(tag)?;
            tx.execute(
                "INSERT OR IGNORE INTO topic_tags (topic_id, tag_id) VALUES (?1, ?2)",
                params![topic_id, tag_id],
            )?;
        }

        tx.commit()?;
        Ok(topic_id)
    }

    pub fn get_topic(&self, id: i64) -> Result<Option<Topic>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM topics t WHERE t.id = ?1",
            TOPIC_COLUMNS
        ))?;

        match stmt.query_row(params![id], topic_from_row) {
            Ok(mut t) => {
                t.tags = self.get_topic_tags(id)?;
                Ok(Some(t))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn delete_topic(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM topics WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub fn update_topic_tags(&self, topic_id: i64, tags: &[String]) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let updated = tx.execute(
            "UPDATE topics SET updated_at = ?1 WHERE id = ?2",
            params![ts(Utc::now()), topic_id],
        )?;
        if updated == 0 {
            return Err(StoreError::TopicNotFound(topic_id));
        }

        tx.execute(
            "DELETE FROM topic_tags WHERE topic_id = ?1",
            params![topic_id],
        )?;

        for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            let tag_id = self.get_or_create_tag(tag)?;
            tx.execute(
                "INSERT OR IGNORE INTO topic_tags (topic_id, tag_id) VALUES (?1, ?2)",
                params![topic_id, tag_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    // Tag operations
    fn get_or_create_tag(&self, name: &str) -> Result<i64> {
        let existing: Result<i64> =
            self.conn
                .query_row("SELECT id FROM tags WHERE name = ?1", params![name], |row| {
                    row.get(0)
                });

        match existing {
            Ok(id) => Ok(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                self.conn
                    .execute("INSERT INTO tags (name) VALUES (?1)", params![name])?;
                Ok(self.conn.last_insert_rowid())
            }
            Err(e) => Err(e),
        }
    }

    fn get_topic_tags(&self, topic_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT tg.name
            FROM tags tg
            JOIN topic_tags tt ON tg.id = tt.tag_id
            WHERE tt.topic_id = ?1
            ORDER BY tg.name
            "#,
        )?;

        let rows = stmt.query_map(params![topic_id], |row| row.get(0))?;
        rows.collect()
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT tg.id, tg.name, COUNT(tt.topic_id) as topic_count
            FROM tags tg
            LEFT JOIN topic_tags tt ON tg.id = tt.tag_id
            GROUP BY tg.id, tg.name
            ORDER BY tg.name
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
                topic_count: row.get(2)?,
            })
        })?;
        rows.collect()
    }

    // Review state operations
    pub fn get_review_state(&self, topic_id: i64) -> Result<Option<TopicReviewState>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM review_state rs WHERE rs.topic_id = ?1",
            STATE_COLUMNS
        ))?;

        match stmt.query_row(params![topic_id], |row| state_from_row(row, 0)) {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn load_reviews(&self, topic_id: i64) -> StoreResult<TopicReviews> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {}, rs.version FROM review_state rs WHERE rs.topic_id = ?1",
            STATE_COLUMNS
        ))?;

        let loaded = stmt.query_row(params![topic_id], |row| {
            Ok((state_from_row(row, 0)?, row.get::<_, i64>(7)?))
        });

        match loaded {
            Ok((state, version)) => Ok(TopicReviews::load(topic_id, state, version)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::TopicNotFound(topic_id)),
            Err(e) => Err(e.into()),
        }
    }

    // Policy operations
    pub fn get_policy(&self, user: &str) -> StoreResult<ReviewPolicy> {
        let stored: Result<String> = self.conn.query_row(
            "SELECT policy FROM review_policies WHERE user = ?1",
            params![user],
            |row| row.get(0),
        );

        match stored {
            Ok(json) => {
                let input: PolicyInput = serde_json::from_str(&json)?;
                Ok(ReviewPolicy::new(input)?)
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(ReviewPolicy::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the user's policy wholesale.
    pub fn set_policy(&self, user: &str, policy: &ReviewPolicy) -> StoreResult<()> {
        let json = serde_json::to_string(policy)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO review_policies (user, policy, updated_at) VALUES (?1, ?2, ?3)",
            params![user, json, ts(Utc::now())],
        )?;
        info!("replaced review policy for user '{}'", user);
        Ok(())
    }

    pub fn reset_policy(&self, user: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM review_policies WHERE user = ?1", params![user])?;
        Ok(rows > 0)
    }

    // Session operations

    /// Classifies, schedules and logs one session as a single write unit.
    ///
    /// The transaction takes SQLite's write lock up front, and the state row
    /// is additionally guarded by its version, so two submissions for the same
    /// topic can never both build on the same prior state.
    pub fn record_session(
        &self,
        topic_id: i64,
        user: &str,
        input: &NewSession,
        classifier: &SessionClassifier,
    ) -> StoreResult<RecordedSession> {
        validate_new_session(input)?;

        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;

        let policy = self.get_policy(user)?;
        let mut reviews = self.load_reviews(topic_id)?;
        let evaluation = evaluate_session(
            topic_id,
            reviews.state(),
            &policy,
            classifier,
            input.explicit_type,
            input.outcome,
            input.occurred_at,
        )?;
        let session_type = evaluation.session_type;
        let scheduled = reviews.record(evaluation, input.outcome);

        let session = self.commit_reviews(&mut reviews, scheduled, session_type, input)?;
        tx.commit()?;

        info!(
            "topic {}: logged {} session {} (reviews={}, next_due={:?})",
            topic_id,
            session_type.as_str(),
            session.identity.id,
            reviews.state().review_count,
            reviews.state().next_due_at
        );

        Ok(RecordedSession {
            session,
            state: reviews.state().clone(),
            scheduled,
        })
    }

    /// Writes an aggregate back: the state row (when `scheduled`), the session
    /// log entry and the drained events. Callers wrap this in a transaction.
    pub fn commit_reviews(
        &self,
        reviews: &mut TopicReviews,
        scheduled: bool,
        session_type: SessionType,
        input: &NewSession,
    ) -> StoreResult<Session> {
        let topic_id = reviews.topic_id();

        if scheduled {
            let state = reviews.state();
            let rows = self.conn.execute(
                r#"
                UPDATE review_state
                SET mastery_level = ?1,
                    status = ?2,
                    interval_index = ?3,
                    current_interval_days = ?4,
                    last_reviewed_at = ?5,
                    next_due_at = ?6,
                    review_count = ?7,
                    version = version + 1
                WHERE topic_id = ?8 AND version = ?9
                "#,
                params![
                    state.mastery_level,
                    state.status.as_str(),
                    state.interval_index as i64,
                    state.current_interval_days,
                    state.last_reviewed_at.map(ts),
                    state.next_due_at.map(ts),
                    state.review_count,
                    topic_id,
                    reviews.version()
                ],
            )?;

            if rows == 0 {
                warn!(
                    "topic {}: review state changed since version {}, rejecting write",
                    topic_id,
                    reviews.version()
                );
                return Err(StoreError::Conflict { topic_id });
            }
            reviews.mark_saved();
        }

        let created_at = Utc::now();
        self.conn.execute(
            r#"
            INSERT INTO sessions (topic_id, session_type, outcome, occurred_at, created_at,
                                  duration_minutes, quality, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                topic_id,
                session_type.as_str(),
                input.outcome.map(|o| o.as_str()),
                ts(input.occurred_at),
                ts(created_at),
                input.duration_minutes,
                input.quality,
                input.notes
            ],
        )?;
        let session_id = self.conn.last_insert_rowid();

        for event in reviews.take_events() {
            self.conn.execute(
                r#"
                INSERT INTO review_events (topic_id, session_id, kind, payload, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    topic_id,
                    session_id,
                    event.kind(),
                    serde_json::to_string(&event)?,
                    ts(created_at)
                ],
            )?;
        }

        Ok(Session {
            identity: Identity::new(session_id, created_at),
            topic_id,
            session_type,
            outcome: input.outcome,
            occurred_at: input.occurred_at,
            duration_minutes: input.duration_minutes,
            quality: input.quality,
            notes: input.notes.clone(),
        })
    }

    pub fn list_sessions(&self, topic_id: Option<i64>) -> Result<Vec<Session>> {
        let (query, params_vec): (String, Vec<Box<dyn rusqlite::ToSql>>) = if let Some(tid) =
            topic_id
        {
            (
                format!(
                    r#"
                    SELECT {} FROM sessions s
                    WHERE s.topic_id = ?1
                    ORDER BY s.occurred_at DESC, s.id DESC
                    "#,
                    SESSION_COLUMNS
                ),
                vec![Box::new(tid)],
            )
        } else {
            (
                format!(
                    "SELECT {} FROM sessions s ORDER BY s.occurred_at DESC, s.id DESC",
                    SESSION_COLUMNS
                ),
                vec![],
            )
        };

        let mut stmt = self.conn.prepare(&query)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|b| b.as_ref()).collect();

        let rows = stmt.query_map(params_refs.as_slice(), session_from_row)?;
        rows.collect()
    }

    pub fn recent_sessions_with_topics(&self, limit: usize) -> Result<Vec<(Session, String)>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {}, t.name
            FROM sessions s
            JOIN topics t ON t.id = s.topic_id
            ORDER BY s.occurred_at DESC, s.id DESC
            LIMIT ?1
            "#,
            SESSION_COLUMNS
        ))?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((session_from_row(row)?, row.get(9)?))
        })?;
        rows.collect()
    }

    pub fn list_events(&self, topic_id: i64) -> StoreResult<Vec<StoredEvent>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, session_id, payload, created_at
            FROM review_events
            WHERE topic_id = ?1
            ORDER BY id ASC
            "#,
        )?;

        let rows = stmt.query_map(params![topic_id], |row| {
            let created: String = row.get(3)?;
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<i64>>(1)?,
                row.get::<_, String>(2)?,
                parse_ts(3, &created)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, session_id, payload, created_at) = row?;
            events.push(StoredEvent {
                id,
                session_id,
                created_at,
                event: serde_json::from_str(&payload)?,
            });
        }
        Ok(events)
    }

    // Topic + state queries
    pub fn topics_with_state(&self, tag_filter: Option<&str>) -> Result<Vec<TopicWithState>> {
        let base_query = format!(
            "SELECT {}, {} FROM topics t JOIN review_state rs ON rs.topic_id = t.id",
            TOPIC_COLUMNS, STATE_COLUMNS
        );

        let (query, params_vec): (String, Vec<Box<dyn rusqlite::ToSql>>) = if let Some(tag) =
            tag_filter
        {
            (
                format!(
                    r#"{}
                    WHERE t.id IN (
                        SELECT tt.topic_id FROM topic_tags tt
                        JOIN tags tg ON tt.tag_id = tg.id
                        WHERE tg.name = ?1
                    )
                    ORDER BY t.name
                    "#,
                    base_query
                ),
                vec![Box::new(tag.to_string())],
            )
        } else {
            (format!("{} ORDER BY t.name", base_query), vec![])
        };

        self.query_topics_with_state(&query, params_vec)
    }

    /// Topics due at or before `cutoff`, never-reviewed topics first, then by
    /// due date and lowest mastery.
    pub fn due_topics(
        &self,
        tag_filter: Option<&str>,
        cutoff: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<TopicWithState>> {
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(ts(cutoff))];
        let mut query = format!(
            r#"
            SELECT {}, {}
            FROM topics t
            JOIN review_state rs ON rs.topic_id = t.id
            WHERE (rs.next_due_at IS NULL OR rs.next_due_at <= ?1)
            "#,
            TOPIC_COLUMNS, STATE_COLUMNS
        );

        if let Some(tag) = tag_filter {
            query.push_str(
                r#"
                AND t.id IN (
                    SELECT tt.topic_id FROM topic_tags tt
                    JOIN tags tg ON tt.tag_id = tg.id
                    WHERE tg.name = ?2
                )
                "#,
            );
            params_vec.push(Box::new(tag.to_string()));
        }

        query.push_str(
            " ORDER BY rs.next_due_at IS NOT NULL, rs.next_due_at ASC, rs.mastery_level ASC",
        );
        if let Some(n) = limit {
            query.push_str(&format!(" LIMIT {}", n));
        }

        self.query_topics_with_state(&query, params_vec)
    }

    fn query_topics_with_state(
        &self,
        query: &str,
        params_vec: Vec<Box<dyn rusqlite::ToSql>>,
    ) -> Result<Vec<TopicWithState>> {
        let mut stmt = self.conn.prepare(query)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|b| b.as_ref()).collect();

        let rows = stmt.query_map(params_refs.as_slice(), |row| {
            Ok(TopicWithState {
                topic: topic_from_row(row)?,
                state: state_from_row(row, 5)?,
            })
        })?;
        let mut result = rows.collect::<Result<Vec<_>>>()?;

        for tws in &mut result {
            tws.topic.tags = self.get_topic_tags(tws.topic.id())?;
        }

        Ok(result)
    }

    pub fn get_stats(&self, cutoff: DateTime<Utc>) -> Result<Stats> {
        let total_topics: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM topics", [], |row| row.get(0))?;

        let (total_sessions, practice_sessions): (i64, i64) = self.conn.query_row(
            r#"
            SELECT COUNT(*), COALESCE(SUM(session_type = 'practice'), 0)
            FROM sessions
            "#,
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mastered: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM review_state WHERE status = 'mastered'",
            [],
            |row| row.get(0),
        )?;

        let due_now: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM review_state WHERE next_due_at IS NULL OR next_due_at <= ?1",
            params![ts(cutoff)],
            |row| row.get(0),
        )?;

        let avg_mastery: f64 = self.conn.query_row(
            "SELECT COALESCE(AVG(mastery_level), 0.0) FROM review_state",
            [],
            |row| row.get(0),
        )?;

        Ok(Stats {
            total_topics,
            total_sessions,
            total_reviews: total_sessions - practice_sessions,
            practice_sessions,
            mastered,
            due_now,
            avg_mastery,
        })
    }
}
