use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use super::widgets::{dashboard, topic_detail, topics};
use super::{App, View};

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_header(f, app, chunks[0]);

    match app.view {
        View::Dashboard => dashboard::draw(f, app, chunks[1]),
        View::Topics => topics::draw(f, app, chunks[1]),
        View::TopicDetail => topic_detail::draw(f, app, chunks[1]),
    }

    draw_key_hints(f, app, chunks[2]);
}

fn tab_titles(app: &App) -> Vec<String> {
    let topics = match (&app.filter_tag, app.view) {
        (_, View::TopicDetail) => app
            .selected_topic
            .as_ref()
            .map(|t| format!("Topics > {}", t.topic.name))
            .unwrap_or_else(|| "Topics".to_string()),
        (Some(tag), _) => format!("Topics [{}]", tag),
        (None, _) => format!("Topics ({})", app.topics.items.len()),
    };
    vec![format!("Dashboard ({} due)", app.stats.due_now), topics]
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" studylog ")
        .title_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(32)])
        .split(inner);

    let selected = if app.view == View::Dashboard { 0 } else { 1 };
    let tabs = Tabs::new(tab_titles(app))
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, cols[0]);

    let session = Line::from(vec![
        Span::styled("user ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.user().to_string(), Style::default().fg(Color::White)),
        Span::styled("  grace ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.grace_label(), Style::default().fg(Color::White)),
    ]);
    f.render_widget(Paragraph::new(session).alignment(Alignment::Right), cols[1]);
}

/// Keys the current view responds to, as (key, action) pairs.
fn key_hints(app: &App) -> Vec<(&'static str, &'static str)> {
    if app.filter_mode {
        return vec![("<CR>", "Apply tag"), ("<Esc>", "Cancel")];
    }

    let mut hints = match app.view {
        View::Dashboard => vec![("h/l/Tab", "Views"), ("^r", "Refresh")],
        View::Topics => {
            let mut h = vec![
                ("h/Tab", "Views"),
                ("j/k", "Nav"),
                ("g/G", "Top/Bot"),
                ("l/<CR>", "Open"),
                ("/", "Tag filter"),
            ];
            if app.filter_tag.is_some() {
                h.push(("<Esc>", "Clear filter"));
            }
            h
        }
        View::TopicDetail => vec![("h/<Esc>", "Back"), ("^r", "Refresh")],
    };
    hints.push(("q", "Quit"));
    hints
}

fn draw_key_hints(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = Vec::new();
    if app.filter_mode {
        spans.push(Span::styled("tag: ", Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(app.filter_input.clone()));
        spans.push(Span::styled("█ ", Style::default().fg(Color::Yellow)));
    }
    for (key, action) in key_hints(app) {
        spans.push(Span::styled(key, Style::default().fg(Color::Cyan)));
        spans.push(Span::raw(format!(" {}  ", action)));
    }

    let bar = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    f.render_widget(bar, area);
}
