mod classifier;
mod config;
mod db;
mod domain;
mod error;
mod models;
mod policy;
mod scheduler;
mod state;
mod tui;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use log::warn;
use std::path::PathBuf;

use config::AppConfig;
use db::Database;
use models::{JsonOutput, NewSession, ReviewOutcome, SessionType};
use policy::{parse_intervals, validate_policy_input, ReviewPolicy};
use scheduler::apply_review;
use state::TopicReviewState;

#[derive(Parser)]
#[command(name = "studylog")]
#[command(about = "A study session log with spaced-repetition review scheduling")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Database file (overrides STUDYLOG_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// User whose review policy applies (overrides STUDYLOG_USER)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Hours before the due date that still count as a review
    #[arg(long, global = true)]
    grace_hours: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Manage topics
    #[command(subcommand)]
    Topic(TopicCommands),

    /// List all tags
    Tags,

    /// Show study statistics
    Stats,

    /// Log a study session for a topic
    Log {
        /// Topic ID
        id: i64,

        /// Recall outcome: perfect/good/regular/bad
        #[arg(long, short)]
        outcome: Option<String>,

        /// Force the session type: first_time/review/practice
        #[arg(long = "type", short = 'T')]
        session_type: Option<String>,

        /// Duration in minutes
        #[arg(long, short)]
        duration: Option<u32>,

        /// Self-rated session quality (1-5)
        #[arg(long, short)]
        quality: Option<u8>,

        /// Optional notes about the session
        #[arg(long, short)]
        notes: Option<String>,
    },

    /// Show the state a review would produce without saving it
    Preview {
        /// Topic ID
        id: i64,

        /// Recall outcome: perfect/good/regular/bad
        #[arg(long, short)]
        outcome: String,
    },

    /// List topics due for review
    Due {
        /// Filter by tag
        #[arg(long, short)]
        tag: Option<String>,

        /// Maximum number of topics
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Show the session log of a topic
    History {
        /// Topic ID
        id: i64,

        /// Show scheduling events instead of sessions
        #[arg(long)]
        events: bool,
    },

    /// Manage the review policy
    #[command(subcommand)]
    Policy(PolicyCommands),

    /// Launch interactive terminal UI
    Tui,
}

#[derive(Subcommand)]
enum TopicCommands {
    /// List all topics
    List {
        /// Filter by tag
        #[arg(long, short)]
        tag: Option<String>,
    },

    /// Add a new topic
    Add {
        /// Topic name
        name: String,

        /// Topic description
        #[arg(long, short)]
        description: Option<String>,

        /// Comma-separated tags
        #[arg(long, short)]
        tags: Option<String>,
    },

    /// Show topic details
    Show {
        /// Topic ID
        id: i64,
    },

    /// Delete a topic
    Delete {
        /// Topic ID
        id: i64,
    },

    /// Update topic tags
    Tag {
        /// Topic ID
        id: i64,

        /// Comma-separated tags (replaces existing)
        #[arg(long, short)]
        tags: String,
    },
}

#[derive(Subcommand)]
enum PolicyCommands {
    /// Show the active review policy
    Show,

    /// Replace the review policy; omitted fields keep their current value
    Set {
        /// Comma-separated base intervals in days
        #[arg(long, short)]
        intervals: Option<String>,

        #[arg(long)]
        perfect: Option<f64>,

        #[arg(long)]
        good: Option<f64>,

        #[arg(long)]
        regular: Option<f64>,

        /// Restart from the first interval after a bad review
        #[arg(long)]
        bad_reset: Option<bool>,
    },

    /// Go back to the default policy
    Reset,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(e) = run(cli) {
        if json {
            println!(
                "{}",
                serde_json::to_string(&JsonOutput::<()>::err(e.to_string()))
                    .unwrap_or_else(|_| format!("{{\"success\":false,\"error\":\"{}\"}}", e))
            );
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::resolve(cli.db, cli.user, cli.grace_hours)?;
    let db = Database::open(&config.db_path)?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
            } else {
                println!("Database initialized at: {}", config.db_path.display());
            }
        }

        Commands::Topic(topic_cmd) => match topic_cmd {
            TopicCommands::List { tag } => {
                let topics = db.topics_with_state(tag.as_deref())?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&topics))?);
                } else if topics.is_empty() {
                    println!("No topics found.");
                } else {
                    println!("{:<5} {:<36} {:<12} {:<12} TAGS", "ID", "NAME", "STATUS", "NEXT DUE");
                    println!("{}", "-".repeat(80));
                    for tws in topics {
                        println!(
                            "{:<5} {:<36} {:<12} {:<12} {}",
                            tws.topic.id(),
                            truncate(&tws.topic.name, 34),
                            tws.state.status.label(),
                            format_due(tws.state.next_due_at),
                            join_tags(&tws.topic.tags)
                        );
                    }
                }
            }

            TopicCommands::Add {
                name,
                description,
                tags,
            } => {
                let tag_list = split_tags(tags.as_deref().unwrap_or(""));
                let id = db.add_topic(&name, description.as_deref(), &tag_list)?;

                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                            "id": id,
                            "name": name
                        })))?
                    );
                } else {
                    println!("Added topic '{}' with ID: {}", name, id);
                }
            }

            TopicCommands::Show { id } => {
                if let Some(topic) = db.get_topic(id)? {
                    let state = db.get_review_state(id)?.unwrap_or_default();

                    if cli.json {
                        println!(
                            "{}",
                            serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                                "topic": topic,
                                "state": state
                            })))?
                        );
                    } else {
                        println!("Topic: {}", topic.name);
                        println!("ID: {}", topic.id());
                        if let Some(desc) = &topic.description {
                            println!("Description: {}", desc);
                        }
                        println!("Tags: {}", join_tags(&topic.tags));
                        println!("Created: {}", topic.identity.created_at.format("%Y-%m-%d %H:%M"));
                        println!();
                        print_state(&state);
                    }
                } else if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::<()>::err("Topic not found"))?
                    );
                } else {
                    println!("Topic not found.");
                }
            }

            TopicCommands::Delete { id } => {
                if db.delete_topic(id)? {
                    if cli.json {
                        println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
                    } else {
                        println!("Topic {} deleted.", id);
                    }
                } else if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::<()>::err("Topic not found"))?
                    );
                } else {
                    println!("Topic not found.");
                }
            }

            TopicCommands::Tag { id, tags } => {
                db.update_topic_tags(id, &split_tags(&tags))?;

                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
                } else {
                    println!("Updated tags for topic {}.", id);
                }
            }
        },

        Commands::Tags => {
            let tags = db.list_tags()?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&tags))?);
            } else if tags.is_empty() {
                println!("No tags found.");
            } else {
                println!("{:<5} {:<30} TOPICS", "ID", "TAG");
                println!("{}", "-".repeat(50));
                for tag in tags {
                    println!("{:<5} {:<30} {}", tag.id, tag.name, tag.topic_count);
                }
            }
        }

        Commands::Stats => {
            let stats = db.get_stats(Utc::now() + config.grace_window)?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&stats))?);
            } else {
                println!("=== Study Statistics ===");
                println!("Total topics: {}", stats.total_topics);
                println!(
                    "Total sessions: {} ({} reviews, {} practice)",
                    stats.total_sessions, stats.total_reviews, stats.practice_sessions
                );
                println!("Mastered: {}", stats.mastered);
                println!("Due for review: {}", stats.due_now);
                println!("Average mastery: {:.1}/10", stats.avg_mastery);
            }
        }

        Commands::Log {
            id,
            outcome,
            session_type,
            duration,
            quality,
            notes,
        } => {
            let mut input = NewSession::at(Utc::now());
            if let Some(raw) = outcome.as_deref() {
                input = input.with_outcome(ReviewOutcome::parse(raw)?);
            }
            if let Some(raw) = session_type.as_deref() {
                let forced = SessionType::from_str(raw).ok_or_else(|| {
                    format!(
                        "Invalid session type '{}'. Use: first_time, review, or practice",
                        raw
                    )
                })?;
                input = input.with_type(forced);
            }
            input.duration_minutes = duration;
            input.quality = quality;
            input.notes = notes;

            let recorded = db.record_session(id, &config.user, &input, &config.classifier())?;

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&recorded))?);
            } else {
                println!(
                    "Logged {} session for topic {}.",
                    recorded.session.session_type.description(),
                    id
                );
                if recorded.scheduled {
                    println!();
                    print_state(&recorded.state);
                } else {
                    println!(
                        "Not due yet; scheduling unchanged (next review {}).",
                        format_due(recorded.state.next_due_at)
                    );
                }
            }
        }

        Commands::Preview { id, outcome } => {
            let outcome = ReviewOutcome::parse(&outcome)?;
            let state = db
                .get_review_state(id)?
                .ok_or_else(|| format!("Topic {} not found", id))?;
            let policy = db.get_policy(&config.user)?;
            let session_type = if state.has_history() {
                SessionType::Review
            } else {
                SessionType::FirstTime
            };
            let next = apply_review(&policy, &state, session_type, outcome, Utc::now())?;

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "current": state,
                        "preview": next
                    })))?
                );
            } else {
                println!("If you log '{}' now:", outcome.as_str());
                println!();
                print_state(&next);
            }
        }

        Commands::Due { tag, limit } => {
            let cutoff = Utc::now() + config.grace_window;
            let due = db.due_topics(tag.as_deref(), cutoff, limit)?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&due))?);
            } else if due.is_empty() {
                println!("Nothing due. Come back later!");
            } else {
                println!("{:<5} {:<36} {:<12} {:<8} NEXT DUE", "ID", "NAME", "MASTERY", "REVIEWS");
                println!("{}", "-".repeat(80));
                for tws in due {
                    println!(
                        "{:<5} {:<36} {:<12} {:<8} {}",
                        tws.topic.id(),
                        truncate(&tws.topic.name, 34),
                        tws.state.mastery_label(),
                        tws.state.review_count,
                        format_due(tws.state.next_due_at)
                    );
                }
            }
        }

        Commands::History { id, events } => {
            if db.get_topic(id)?.is_none() {
                return Err(format!("Topic {} not found", id).into());
            }

            if events {
                let events = db.list_events(id)?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&events))?);
                } else if events.is_empty() {
                    println!("No events recorded.");
                } else {
                    for e in events {
                        println!(
                            "{}  {:<18} {}",
                            e.created_at.format("%Y-%m-%d %H:%M"),
                            e.event.kind(),
                            serde_json::to_string(&e.event)?
                        );
                    }
                }
            } else {
                let sessions = db.list_sessions(Some(id))?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&sessions))?);
                } else if sessions.is_empty() {
                    println!("No sessions logged.");
                } else {
                    println!("{:<17} {:<11} {:<8} {:<6} NOTES", "WHEN", "TYPE", "OUTCOME", "MIN");
                    println!("{}", "-".repeat(70));
                    for s in sessions {
                        println!(
                            "{:<17} {:<11} {:<8} {:<6} {}",
                            s.occurred_at.format("%Y-%m-%d %H:%M"),
                            s.session_type.as_str(),
                            s.outcome.map(|o| o.as_str()).unwrap_or("-"),
                            s.duration_minutes.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
                            truncate(s.notes.as_deref().unwrap_or(""), 30)
                        );
                    }
                }
            }
        }

        Commands::Policy(policy_cmd) => match policy_cmd {
            PolicyCommands::Show => {
                let policy = db.get_policy(&config.user)?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&policy))?);
                } else {
                    print_policy(&config.user, &policy);
                }
            }

            PolicyCommands::Set {
                intervals,
                perfect,
                good,
                regular,
                bad_reset,
            } => {
                let mut input = db.get_policy(&config.user)?.to_input();
                if let Some(raw) = intervals {
                    input.base_intervals = parse_intervals(&raw)?;
                }
                if let Some(m) = perfect {
                    input.perfect_multiplier = m;
                }
                if let Some(m) = good {
                    input.good_multiplier = m;
                }
                if let Some(m) = regular {
                    input.regular_multiplier = m;
                }
                if let Some(reset) = bad_reset {
                    input.bad_reset = reset;
                }

                if let Err(e) = validate_policy_input(&input) {
                    warn!("rejected policy update for user '{}': {}", config.user, e);
                    return Err(e.into());
                }
                let policy = ReviewPolicy::new(input)?;
                db.set_policy(&config.user, &policy)?;

                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&policy))?);
                } else {
                    print_policy(&config.user, &policy);
                }
            }

            PolicyCommands::Reset => {
                db.reset_policy(&config.user)?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
                } else {
                    println!("Review policy for '{}' reset to defaults.", config.user);
                }
            }
        },

        Commands::Tui => {
            tui::run(db, config)?;
        }
    }

    Ok(())
}

fn print_state(state: &TopicReviewState) {
    println!("--- Review State ---");
    println!(
        "Status: {} | Mastery: {} (level {})",
        state.status.label(),
        state.mastery_label(),
        state.mastery_level
    );
    println!("Reviews: {}", state.review_count);
    if let Some(days) = state.current_interval_days {
        println!("Interval: {} (step {})", format_days(days), state.interval_index + 1);
    }
    if let Some(last) = state.last_reviewed_at {
        println!("Last reviewed: {}", last.format("%Y-%m-%d %H:%M"));
    }
    println!("Next review: {}", format_due(state.next_due_at));
}

fn print_policy(user: &str, policy: &ReviewPolicy) {
    println!("=== Review Policy ({}) ===", user);
    let intervals: Vec<String> = policy.base_intervals().iter().map(|d| format_days(*d)).collect();
    println!("Base intervals: {}", intervals.join(", "));
    println!("Perfect multiplier: {}", policy.perfect_multiplier());
    println!("Good multiplier: {}", policy.good_multiplier());
    println!("Regular multiplier: {}", policy.regular_multiplier());
    println!("Reset on bad: {}", if policy.bad_reset() { "yes" } else { "no" });
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn join_tags(tags: &[String]) -> String {
    if tags.is_empty() {
        String::from("-")
    } else {
        tags.join(", ")
    }
}

fn format_due(due: Option<DateTime<Utc>>) -> String {
    match due {
        Some(d) => d.format("%Y-%m-%d").to_string(),
        None => String::from("now"),
    }
}

fn format_days(days: f64) -> String {
    if days.fract() == 0.0 {
        format!("{}d", days as i64)
    } else {
        format!("{:.1}d", days)
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
