use chrono::Utc;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use super::{due_label, mastery_bar, outcome_style, short_date, truncate};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(9), // Stats + Due topics row
            Constraint::Min(0),    // Recent sessions
        ])
        .split(area);

    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[0]);

    draw_stats(f, app, top_chunks[0]);
    draw_due_topics(f, app, top_chunks[1]);
    draw_recent_sessions(f, app, chunks[1]);
}

fn stat_line(label: &str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{}: ", label), Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

fn draw_stats(f: &mut Frame, app: &App, area: Rect) {
    let stats = &app.stats;

    let text = vec![
        Line::from(vec![
            Span::styled("Topics: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", stats.total_topics),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        stat_line(
            "Sessions",
            format!("{} ({} practice)", stats.total_sessions, stats.practice_sessions),
            Color::White,
        ),
        stat_line("Reviews", format!("{}", stats.total_reviews), Color::White),
        stat_line("Mastered", format!("{}", stats.mastered), Color::Green),
        stat_line(
            "Due",
            format!("{}", stats.due_now),
            if stats.due_now > 0 {
                Color::Yellow
            } else {
                Color::White
            },
        ),
        stat_line("Avg Mastery", format!("{:.1}/10", stats.avg_mastery), Color::Cyan),
    ];

    let title = format!(" Stats (grace {}) ", app.grace_label());

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(text).block(block);
    f.render_widget(paragraph, area);
}

fn draw_due_topics(f: &mut Frame, app: &App, area: Rect) {
    let now = Utc::now();
    let items: Vec<ListItem> = app
        .due_topics
        .iter()
        .enumerate()
        .map(|(i, tws)| {
            let style = if tws.state.has_history() {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::Red)
            };

            ListItem::new(Line::from(vec![
                Span::styled(format!("{}. ", i + 1), Style::default().fg(Color::DarkGray)),
                Span::styled(format!("{:<22}", truncate(&tws.topic.name, 20)), style),
                Span::styled(
                    mastery_bar(tws.state.mastery_level),
                    Style::default().fg(Color::Green),
                ),
                Span::raw(" "),
                Span::styled(
                    due_label(tws.state.next_due_at, now),
                    Style::default().fg(Color::Gray),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Due Topics ")
        .title_style(Style::default().fg(Color::Yellow));

    if items.is_empty() {
        let paragraph = Paragraph::new("Nothing due right now.")
            .style(Style::default().fg(Color::Green))
            .block(block);
        f.render_widget(paragraph, area);
    } else {
        f.render_widget(List::new(items).block(block), area);
    }
}

fn draw_recent_sessions(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .recent_sessions
        .iter()
        .map(|(session, topic_name)| {
            let (outcome_text, outcome_color) = outcome_style(session.outcome);

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<8}", short_date(session.occurred_at)),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{:<24}", truncate(topic_name, 22)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:<12}", session.session_type.as_str()),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(outcome_text, Style::default().fg(outcome_color)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Recent Sessions ")
        .title_style(Style::default().fg(Color::Magenta));

    let list = List::new(items).block(block);
    f.render_widget(list, area);
}
