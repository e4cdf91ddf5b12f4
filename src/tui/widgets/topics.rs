use chrono::Utc;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::{due_label, mastery_bar, status_color, truncate};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let title = if let Some(tag) = &app.filter_tag {
        format!(" Topics (filter: {}) ", tag)
    } else {
        " Topics ".to_string()
    };

    let now = Utc::now();
    let items: Vec<ListItem> = app
        .topics
        .items
        .iter()
        .map(|tws| {
            let state = &tws.state;
            let due = due_label(state.next_due_at, now);
            let due_color = if state.has_history() && state.next_due_at.map_or(true, |d| d <= now) {
                Color::Red
            } else {
                Color::White
            };

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<30}", truncate(&tws.topic.name, 28)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(mastery_bar(state.mastery_level), Style::default().fg(Color::Green)),
                Span::styled(
                    format!(" {:>2} ", state.mastery_level),
                    Style::default().fg(Color::Yellow),
                ),
                Span::styled(
                    format!("{:<13}", state.status.label()),
                    Style::default().fg(status_color(state.status)),
                ),
                Span::styled(due, Style::default().fg(due_color)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Cyan));

    let header_style = Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::BOLD);
    let header = Line::from(vec![
        Span::styled(format!("{:<30}", "Name"), header_style),
        Span::styled(format!("{:<14}", "Mastery"), header_style),
        Span::styled(format!("{:<13}", "Status"), header_style),
        Span::styled("Next Review", header_style),
    ]);

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.topics.selected);

    // Header sits on the first inner row; the list is shifted below it
    let header_area = Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: 1,
    };
    f.render_widget(Paragraph::new(header), header_area);

    let list_area = Rect {
        x: area.x,
        y: area.y + 1,
        width: area.width,
        height: area.height.saturating_sub(1),
    };

    f.render_stateful_widget(list, list_area, &mut state);
}
