//! UI rendering functions for the dashboard.
//!
//! Draws a header, the question list, the answer panel, and a status bar
//! using ratatui widgets and layout management.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use time::OffsetDateTime;
use time::macros::format_description;

use super::app::{App, Focus};
use crate::qa::AnswerState;

const ACCENT: Color = Color::Rgb(0x6C, 0x63, 0xFF);

/// Main rendering function for the dashboard.
pub fn draw(frame: &mut Frame, app: &App) {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content area
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(main_chunks[1]);

    render_header(frame, app, main_chunks[0]);
    render_question_list(frame, app, content_chunks[0]);
    render_answer_view(frame, app, content_chunks[1]);
    render_status_bar(frame, app, main_chunks[2]);
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    }
}

fn format_time(at: OffsetDateTime) -> String {
    at.format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| "??:??:??".to_string())
}

/// Truncates `text` to at most `max_chars` characters, adding an ellipsis.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() > max_chars {
        let truncated: String = single_line.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        single_line
    }
}

/// Short marker and color for an answer state.
pub(crate) fn state_marker(state: &AnswerState) -> (&'static str, Color) {
    match state {
        AnswerState::Pending => ("…", Color::Yellow),
        AnswerState::Answered(_) => ("✓", Color::Green),
        AnswerState::Failed(_) => ("!", Color::Red),
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let board = app.board();
    let line = Line::from(vec![
        Span::styled(
            "🦋 Butterfly Q&A",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            format!("document: {}", app.document()),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw("  "),
        Span::raw(format!(
            "{} questions, {} pending",
            board.len(),
            board.pending_count()
        )),
    ]);

    let paragraph = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn render_question_list(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Questions")
        .border_style(border_style(app.focus() == Focus::QuestionList));

    let items: Vec<ListItem> = app
        .board()
        .records()
        .iter()
        .map(|record| {
            let (marker, color) = state_marker(&record.answer);
            ListItem::new(Line::from(vec![
                Span::styled(format!("{marker} "), Style::default().fg(color)),
                Span::styled(
                    format!("{} ", format_time(record.received_at)),
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                ),
                Span::raw(preview(&record.question, 60)),
            ]))
        })
        .collect();

    let list = List::new(items).block(block).highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::REVERSED),
    );

    let mut list_state = ListState::default();
    list_state.select(app.selected_index());

    frame.render_stateful_widget(list, area, &mut list_state);
}

fn render_answer_view(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Answer")
        .border_style(border_style(app.focus() == Focus::AnswerView));

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let content = if let Some(record) = app.selected_record() {
        let mut text = Text::default();
        text.lines
            .push(Line::from(vec![Span::styled("Question:", bold)]));
        text.lines.push(Line::from(record.question.clone()));
        text.lines.push(Line::from(""));
        text.lines.push(Line::from(vec![Span::styled("🦋 Suggestion:", bold)]));

        let answer_style = match record.answer {
            AnswerState::Pending => Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
            AnswerState::Answered(_) => Style::default(),
            AnswerState::Failed(_) => Style::default().fg(Color::Red),
        };
        for line in record.answer.display_text().lines() {
            text.lines
                .push(Line::from(Span::styled(line.to_string(), answer_style)));
        }

        text.lines.push(Line::from(""));
        text.lines.push(Line::from(vec![
            Span::styled("Received:", bold),
            Span::raw(" "),
            Span::styled(
                format_time(record.received_at),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        text
    } else if app.board().is_empty() {
        Text::from("Waiting for audience questions...")
    } else {
        Text::from("No question selected")
    };

    let paragraph = Paragraph::new(content)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll(), 0));

    frame.render_widget(paragraph, area);
}

/// Builds the status bar: shortcuts, then the polling status.
pub(crate) fn status_line(app: &App) -> Line<'static> {
    let key_style = Style::default().fg(Color::Cyan);
    let sep_style = Style::default().fg(Color::DarkGray);

    let mut spans = vec![
        Span::styled("q", key_style),
        Span::raw(": quit"),
        Span::styled(" | ", sep_style),
        Span::styled("Tab", key_style),
        Span::raw(": switch panel"),
        Span::styled(" | ", sep_style),
        Span::styled("j/k", key_style),
        Span::raw(match app.focus() {
            Focus::QuestionList => ": navigate",
            Focus::AnswerView => ": scroll",
        }),
        Span::styled(" | ", sep_style),
        Span::styled("g", key_style),
        Span::raw(": newest"),
        Span::styled(" | ", sep_style),
    ];

    match (app.poller_stopped(), app.last_poll_error()) {
        (Some(Some(reason)), _) => spans.push(Span::styled(
            format!("Polling stopped: {reason}"),
            Style::default().fg(Color::Red),
        )),
        (Some(None), _) => spans.push(Span::styled(
            "Polling stopped",
            Style::default().fg(Color::Red),
        )),
        (None, Some((at, message))) => spans.push(Span::styled(
            format!("Error polling Livestorm at {}: {message}", format_time(*at)),
            Style::default().fg(Color::Yellow),
        )),
        (None, None) => spans.push(Span::styled("Polling", Style::default().fg(Color::Green))),
    }

    Line::from(spans)
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    frame.render_widget(Paragraph::new(status_line(app)), area);
}
