mod ui;
mod widgets;

use std::io;
use std::time::Duration;

use chrono::Utc;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::config::AppConfig;
use crate::db::{Database, Stats};
use crate::models::{Session, TopicWithState};

const DUE_PREVIEW_LEN: usize = 5;
const RECENT_SESSIONS_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Topics,
    TopicDetail,
}

impl View {
    fn next(&self) -> Self {
        match self {
            View::Dashboard => View::Topics,
            View::Topics => View::Dashboard,
            View::TopicDetail => View::Topics,
        }
    }

    fn prev(&self) -> Self {
        match self {
            View::Dashboard => View::Topics,
            View::Topics => View::Dashboard,
            View::TopicDetail => View::Topics,
        }
    }
}

pub struct StatefulList<T> {
    pub items: Vec<T>,
    pub selected: Option<usize>,
}

impl<T> StatefulList<T> {
    fn with_items(items: Vec<T>) -> Self {
        let selected = if items.is_empty() { None } else { Some(0) };
        Self { items, selected }
    }

    fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) if i + 1 < self.items.len() => i + 1,
            _ => 0,
        };
        self.selected = Some(i);
    }

    fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(0) | None => self.items.len() - 1,
            Some(i) => i - 1,
        };
        self.selected = Some(i);
    }

    fn selected_item(&self) -> Option<&T> {
        self.selected.and_then(|i| self.items.get(i))
    }
}

/// Read-only dashboard state. Nothing here writes to the database.
pub struct App {
    db: Database,
    config: AppConfig,
    pub view: View,
    pub topics: StatefulList<TopicWithState>,
    pub selected_topic: Option<TopicWithState>,
    pub selected_topic_sessions: Vec<Session>,
    pub stats: Stats,
    pub due_topics: Vec<TopicWithState>,
    pub recent_sessions: Vec<(Session, String)>, // session + topic name
    pub filter_tag: Option<String>,
    pub filter_input: String,
    pub filter_mode: bool,
    pub should_quit: bool,
}

impl App {
    pub fn new(db: Database, config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let cutoff = Utc::now() + config.grace_window;
        let stats = db.get_stats(cutoff)?;
        let topics_data = db.topics_with_state(None)?;
        let due_topics = db.due_topics(None, cutoff, Some(DUE_PREVIEW_LEN))?;
        let recent_sessions = db.recent_sessions_with_topics(RECENT_SESSIONS_LEN)?;

        Ok(Self {
            db,
            config,
            view: View::Dashboard,
            topics: StatefulList::with_items(topics_data),
            selected_topic: None,
            selected_topic_sessions: Vec::new(),
            stats,
            due_topics,
            recent_sessions,
            filter_tag: None,
            filter_input: String::new(),
            filter_mode: false,
            should_quit: false,
        })
    }

    pub fn user(&self) -> &str {
        &self.config.user
    }

    pub fn grace_label(&self) -> String {
        widgets::duration_label(self.config.classifier().grace())
    }

    pub fn refresh_data(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let cutoff = Utc::now() + self.config.grace_window;
        self.stats = self.db.get_stats(cutoff)?;
        let topics = self.db.topics_with_state(self.filter_tag.as_deref())?;
        self.topics = StatefulList::with_items(topics);
        self.due_topics = self.db.due_topics(None, cutoff, Some(DUE_PREVIEW_LEN))?;
        self.recent_sessions = self.db.recent_sessions_with_topics(RECENT_SESSIONS_LEN)?;

        if let Some(current) = &self.selected_topic {
            let id = current.topic.id();
            self.selected_topic = self.topics.items.iter().find(|t| t.topic.id() == id).cloned();
            self.selected_topic_sessions = self.db.list_sessions(Some(id))?;
        }
        Ok(())
    }

    fn apply_filter(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.filter_input.is_empty() {
            self.filter_tag = None;
        } else {
            self.filter_tag = Some(self.filter_input.clone());
        }
        let topics = self.db.topics_with_state(self.filter_tag.as_deref())?;
        self.topics = StatefulList::with_items(topics);
        Ok(())
    }

    fn select_topic(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(tws) = self.topics.selected_item() {
            self.selected_topic = Some(tws.clone());
            self.selected_topic_sessions = self.db.list_sessions(Some(tws.topic.id()))?;
            self.view = View::TopicDetail;
        }
        Ok(())
    }

    fn close_topic(&mut self) {
        self.view = View::Topics;
        self.selected_topic = None;
        self.selected_topic_sessions.clear();
    }

    fn handle_key(
        &mut self,
        key: KeyCode,
        modifiers: KeyModifiers,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if self.filter_mode {
            match key {
                KeyCode::Esc => {
                    self.filter_mode = false;
                    self.filter_input.clear();
                }
                KeyCode::Enter => {
                    self.filter_mode = false;
                    self.apply_filter()?;
                }
                KeyCode::Backspace => {
                    self.filter_input.pop();
                }
                KeyCode::Char(c) => {
                    self.filter_input.push(c);
                }
                _ => {}
            }
            return Ok(());
        }

        match key {
            KeyCode::Char('q') => self.should_quit = true,

            KeyCode::Char('r') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.refresh_data()?;
            }

            KeyCode::Char('/') if self.view == View::Topics => {
                self.filter_mode = true;
                self.filter_input.clear();
            }

            KeyCode::Esc => match self.view {
                View::TopicDetail => self.close_topic(),
                View::Topics if self.filter_tag.is_some() => {
                    self.filter_input.clear();
                    self.apply_filter()?;
                }
                _ => {}
            },

            KeyCode::Char('h') | KeyCode::Left => match self.view {
                View::TopicDetail => self.close_topic(),
                _ => self.view = self.view.prev(),
            },
            KeyCode::Char('l') | KeyCode::Right => match self.view {
                View::Topics => self.select_topic()?,
                _ => self.view = self.view.next(),
            },

            KeyCode::Tab => {
                if modifiers.contains(KeyModifiers::SHIFT) {
                    self.view = self.view.prev();
                } else {
                    self.view = self.view.next();
                }
            }
            KeyCode::BackTab => {
                self.view = self.view.prev();
            }

            KeyCode::Char('j') | KeyCode::Down if self.view == View::Topics => self.topics.next(),
            KeyCode::Char('k') | KeyCode::Up if self.view == View::Topics => {
                self.topics.previous()
            }

            KeyCode::Char('g') if self.view == View::Topics && !self.topics.items.is_empty() => {
                self.topics.selected = Some(0);
            }
            KeyCode::Char('G') if self.view == View::Topics && !self.topics.items.is_empty() => {
                self.topics.selected = Some(self.topics.items.len() - 1);
            }

            KeyCode::Enter if self.view == View::Topics => self.select_topic()?,

            _ => {}
        }
        Ok(())
    }
}

pub fn run(db: Database, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Build state before touching the terminal so load errors print normally
    let mut app = App::new(db, config)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key.code, key.modifiers)?;
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
