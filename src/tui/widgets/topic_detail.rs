use chrono::Utc;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use super::{due_label, mastery_bar, outcome_style, short_date, status_color, truncate};
use crate::models::TopicWithState;
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let Some(tws) = &app.selected_topic else {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Topic Detail ");
        let paragraph = Paragraph::new("No topic selected").block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Header info
            Constraint::Length(6), // Review state
            Constraint::Min(0),    // Sessions
        ])
        .split(area);

    draw_header(f, tws, chunks[0]);
    draw_review_state(f, tws, chunks[1]);
    draw_sessions(f, app, chunks[2]);
}

fn draw_header(f: &mut Frame, tws: &TopicWithState, area: Rect) {
    let description = tws.topic.description.as_deref().unwrap_or("No description");

    let tags = if tws.topic.tags.is_empty() {
        "None".to_string()
    } else {
        tws.topic.tags.join(", ")
    };

    let text = vec![
        Line::from(vec![
            Span::styled("Description: ", Style::default().fg(Color::Gray)),
            Span::styled(description, Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::styled("Tags: ", Style::default().fg(Color::Gray)),
            Span::styled(tags, Style::default().fg(Color::Cyan)),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", tws.topic.name))
        .title_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_review_state(f: &mut Frame, tws: &TopicWithState, area: Rect) {
    let state = &tws.state;

    let interval = match state.current_interval_days {
        Some(days) => format!("{:.1} days (step {})", days, state.interval_index + 1),
        None => "-".to_string(),
    };
    let last = state
        .last_reviewed_at
        .map(|d| d.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "Never".to_string());

    let text = vec![
        Line::from(vec![
            Span::styled("Mastery: ", Style::default().fg(Color::Gray)),
            Span::styled(mastery_bar(state.mastery_level), Style::default().fg(Color::Green)),
            Span::styled(
                format!(" {}/10 ({})", state.mastery_level, state.mastery_label()),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw("  "),
            Span::styled("Status: ", Style::default().fg(Color::Gray)),
            Span::styled(state.status.label(), Style::default().fg(status_color(state.status))),
        ]),
        Line::from(vec![
            Span::styled("Reviews: ", Style::default().fg(Color::Gray)),
            Span::styled(format!("{}", state.review_count), Style::default().fg(Color::White)),
            Span::raw("  "),
            Span::styled("Interval: ", Style::default().fg(Color::Gray)),
            Span::styled(interval, Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::styled("Last: ", Style::default().fg(Color::Gray)),
            Span::styled(last, Style::default().fg(Color::White)),
            Span::raw("  "),
            Span::styled("Next: ", Style::default().fg(Color::Gray)),
            Span::styled(
                due_label(state.next_due_at, Utc::now()),
                Style::default().fg(Color::White),
            ),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Review State ")
        .title_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(text).block(block);
    f.render_widget(paragraph, area);
}

fn draw_sessions(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .selected_topic_sessions
        .iter()
        .take(15)
        .map(|session| {
            let (outcome_text, outcome_color) = outcome_style(session.outcome);

            let duration = session
                .duration_minutes
                .map(|m| format!("{}m", m))
                .unwrap_or_default();

            let notes = session
                .notes
                .as_deref()
                .map(|s| format!("\"{}\"", truncate(s, 40)))
                .unwrap_or_default();

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<8}", short_date(session.occurred_at)),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{:<12}", session.session_type.as_str()),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(
                    format!("{:<9}", outcome_text),
                    Style::default().fg(outcome_color),
                ),
                Span::styled(format!("{:<6}", duration), Style::default().fg(Color::Gray)),
                Span::styled(notes, Style::default().fg(Color::Gray)),
            ]))
        })
        .collect();

    let title = if app.selected_topic_sessions.is_empty() {
        " Sessions (none) ".to_string()
    } else {
        format!(" Sessions ({}) ", app.selected_topic_sessions.len())
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Magenta));

    if items.is_empty() {
        let paragraph = Paragraph::new("No sessions yet. Log one with `studylog log <id>`.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(paragraph, area);
    } else {
        let list = List::new(items).block(block);
        f.render_widget(list, area);
    }
}
