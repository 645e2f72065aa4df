//! Rendering routines for the Callboard dashboard.

use crate::app::{App, format_duration};
use callboard_rs_core::{DashboardView, Route, Stats};
use callboard_rs_protocol::CallRecord;
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap,
};

const PRIMARY: Color = Color::Rgb(236, 91, 43);
const SECONDARY: Color = Color::Rgb(238, 121, 72);
const TEXT: Color = Color::Rgb(238, 238, 238);
const TEXT_MUTED: Color = Color::Rgb(128, 128, 128);
const BORDER: Color = Color::Rgb(60, 60, 60);
const YELLOW: Color = Color::Rgb(229, 192, 123);
const GREEN: Color = Color::Rgb(120, 220, 140);
const BLUE: Color = Color::Rgb(120, 190, 255);

const SIDEBAR_WIDTH: u16 = 26;
const TILE_HEIGHT: u16 = 4;

/// Draw the entire TUI frame.
pub fn draw(frame: &mut Frame<'_>, app: &App) {
    let view = app.view();
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)])
        .split(frame.area());

    draw_sidebar(frame, app, &view, cols[0]);

    // Tiles only on the home route.
    let tile_height = if view.route == Route::Home {
        TILE_HEIGHT
    } else {
        0
    };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),           // title
            Constraint::Length(tile_height), // stats tiles
            Constraint::Min(0),              // call list
            Constraint::Length(1),           // status bar
        ])
        .split(cols[1]);

    draw_title(frame, &view, rows[0]);
    if tile_height > 0 {
        draw_tiles(frame, &view.stats, rows[1]);
    }
    draw_calls(frame, app, &view, rows[2]);
    draw_status_bar(frame, app, rows[3]);

    if let Some(record) = app.detail_record() {
        draw_detail(frame, record, frame.area());
    }
}

fn draw_sidebar(frame: &mut Frame<'_>, app: &App, view: &DashboardView, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER))
        .title(Span::styled(
            " Callboard ",
            Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD),
        ));

    let mut lines = vec![Line::from("")];
    for (idx, route) in Route::ALL.iter().enumerate() {
        let active = *route == app.route;
        let marker = if active { "> " } else { "  " };
        let style = if active {
            Style::default().fg(SECONDARY).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(TEXT)
        };
        lines.push(Line::from(vec![
            Span::styled(marker, style),
            Span::styled(format!("{} ", idx + 1), Style::default().fg(TEXT_MUTED)),
            Span::styled(route.title(), style),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("  {} calls stored", view.stats.total),
        Style::default().fg(TEXT_MUTED),
    )));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_title(frame: &mut Frame<'_>, view: &DashboardView, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER));
    let line = Line::from(vec![
        Span::styled(
            format!(" {}", view.route.title()),
            Style::default().fg(TEXT).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {} shown", view.records.len()),
            Style::default().fg(TEXT_MUTED),
        ),
    ]);
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_tiles(frame: &mut Frame<'_>, stats: &Stats, area: Rect) {
    let tiles = [
        ("Total calls", stats.total.to_string(), TEXT),
        (
            "Avg duration",
            format_duration(stats.average_duration_seconds),
            BLUE,
        ),
        ("Meetings", stats.meeting_count.to_string(), YELLOW),
        ("Positive", stats.positive_count.to_string(), GREEN),
    ];
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(area);

    for ((label, value, color), area) in tiles.into_iter().zip(cols.iter()) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(BORDER))
            .title(Span::styled(
                format!(" {label} "),
                Style::default().fg(TEXT_MUTED),
            ));
        let value = Paragraph::new(Line::from(Span::styled(
            format!(" {value}"),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )))
        .block(block);
        frame.render_widget(value, *area);
    }
}

fn draw_calls(frame: &mut Frame<'_>, app: &App, view: &DashboardView, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER))
        .title(Span::styled(" Calls ", Style::default().fg(TEXT_MUTED)));

    if view.records.is_empty() {
        let message = if view.loading {
            "Loading calls..."
        } else {
            "No calls to display"
        };
        let paragraph = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(
                format!("  {message}"),
                Style::default().fg(TEXT_MUTED),
            )),
        ])
        .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem<'_>> = view.records.iter().map(call_item).collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(BORDER))
        .highlight_symbol("> ");
    let mut state = ListState::default().with_selected(Some(app.selected));
    frame.render_stateful_widget(list, area, &mut state);
}

/// Two-line card for one call.
fn call_item(record: &CallRecord) -> ListItem<'static> {
    let mut headline = vec![
        Span::styled(
            record.created_at.format("%Y-%m-%d %H:%M").to_string(),
            Style::default().fg(TEXT),
        ),
        Span::styled(format!("  {}", record.status), Style::default().fg(BLUE)),
        Span::styled(
            format!("  {}", format_duration(record.duration)),
            Style::default().fg(TEXT_MUTED),
        ),
    ];
    if record.meeting_requested {
        headline.push(Span::styled("  [meeting]", Style::default().fg(YELLOW)));
    }
    if record.love_the_call {
        headline.push(Span::styled("  [positive]", Style::default().fg(GREEN)));
    }
    let agent = record.agent_id.as_deref().unwrap_or("-");
    let detail = Line::from(Span::styled(
        format!("  call {}  agent {}", record.call_id, agent),
        Style::default().fg(TEXT_MUTED),
    ));
    ListItem::new(vec![Line::from(headline), detail])
}

fn draw_status_bar(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let status_color = if app.status.last_error.is_some() {
        YELLOW
    } else if app.status.listening {
        GREEN
    } else {
        TEXT_MUTED
    };

    let shortcuts = vec![
        Span::styled(" q", Style::default().fg(TEXT_MUTED)),
        Span::styled(" quit", Style::default().fg(BORDER)),
        Span::styled("  1-4/Tab", Style::default().fg(TEXT_MUTED)),
        Span::styled(" route", Style::default().fg(BORDER)),
        Span::styled("  Enter", Style::default().fg(TEXT_MUTED)),
        Span::styled(" details", Style::default().fg(BORDER)),
        Span::styled("  r", Style::default().fg(TEXT_MUTED)),
        Span::styled(" refresh", Style::default().fg(BORDER)),
    ];

    let right_text = format!(" {} ", app.status_text());
    let right_len = (right_text.chars().count() as u16).min(area.width);
    let left_area = Rect {
        width: area.width.saturating_sub(right_len),
        ..area
    };
    let right_area = Rect {
        x: area.x + area.width.saturating_sub(right_len),
        width: right_len,
        ..area
    };

    frame.render_widget(Paragraph::new(Line::from(shortcuts)), left_area);
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            right_text,
            Style::default().fg(status_color),
        ))),
        right_area,
    );
}

fn draw_detail(frame: &mut Frame<'_>, record: &CallRecord, area: Rect) {
    let area = centered(area, 80, 80);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(SECONDARY))
        .title(Span::styled(
            " Call details ",
            Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD),
        ))
        .title_bottom(Span::styled(
            " Esc to close ",
            Style::default().fg(TEXT_MUTED),
        ));

    let paragraph = Paragraph::new(detail_lines(record))
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn detail_lines(record: &CallRecord) -> Vec<Line<'static>> {
    let label = Style::default().fg(TEXT_MUTED);
    let value = Style::default().fg(TEXT);
    let yes_no = |flag: bool| if flag { "yes" } else { "no" };
    let field = |name: &str, text: String| {
        Line::from(vec![
            Span::styled(format!(" {name:<18}"), label),
            Span::styled(text, value),
        ])
    };

    let mut lines = vec![
        field("Call", record.call_id.clone()),
        field(
            "Agent",
            record.agent_id.clone().unwrap_or_else(|| "-".to_string()),
        ),
        field("Status", record.status.clone()),
        field("Duration", format_duration(record.duration)),
        field(
            "Created",
            record.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ),
        field("Meeting requested", yes_no(record.meeting_requested).to_string()),
        field("Positive", yes_no(record.love_the_call).to_string()),
        field(
            "Recording",
            record
                .recording_url
                .clone()
                .unwrap_or_else(|| "-".to_string()),
        ),
        Line::from(""),
        Line::from(Span::styled(
            " Transcript",
            Style::default().fg(SECONDARY).add_modifier(Modifier::BOLD),
        )),
    ];
    match record.transcript.as_deref() {
        Some(transcript) if !transcript.trim().is_empty() => {
            lines.extend(
                transcript
                    .lines()
                    .map(|line| Line::from(Span::styled(format!(" {line}"), value))),
            );
        }
        _ => lines.push(Line::from(Span::styled(" No transcript", label))),
    }
    if let Some(metadata) = &record.metadata {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            " Metadata",
            Style::default().fg(SECONDARY).add_modifier(Modifier::BOLD),
        )));
        let pretty = serde_json::to_string_pretty(metadata).unwrap_or_else(|_| metadata.to_string());
        lines.extend(
            pretty
                .lines()
                .map(|line| Line::from(Span::styled(format!(" {line}"), label))),
        );
    }
    lines
}

/// Rect of `percent_x` by `percent_y` centered in `area`.
fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(rows[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use callboard_rs_core::SyncStatus;
    use callboard_rs_protocol::parse_timestamp;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use serde_json::json;

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).expect("terminal");
        terminal.draw(|frame| draw(frame, app)).expect("draw");
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn loaded() -> SyncStatus {
        SyncStatus {
            loading: false,
            ..SyncStatus::default()
        }
    }

    fn record(id: &str) -> CallRecord {
        CallRecord {
            id: id.to_string(),
            call_id: format!("call-{id}"),
            agent_id: Some("agent-7".to_string()),
            status: "completed".to_string(),
            duration: 75,
            transcript: Some("Agent: hello\nLead: hi there".to_string()),
            recording_url: Some("https://cdn.example/rec.mp3".to_string()),
            love_the_call: true,
            meeting_requested: true,
            metadata: Some(json!({ "campaign": "spring" })),
            created_at: parse_timestamp("2024-01-01T10:00:00Z").expect("timestamp"),
        }
    }

    #[test]
    fn shows_loading_then_empty_state() {
        let mut app = App::new(Route::Home);
        assert!(render(&app).contains("Loading calls..."));
        app.set_status(loaded());
        let screen = render(&app);
        assert!(screen.contains("No calls to display"));
        assert!(screen.contains("Total calls"));
    }

    #[test]
    fn tiles_only_on_home() {
        let mut app = App::new(Route::Calls);
        app.set_status(loaded());
        app.set_records(vec![record("1")]);
        let screen = render(&app);
        assert!(screen.contains("Call log"));
        assert!(!screen.contains("Avg duration"));
        assert!(screen.contains("call call-1"));
    }

    #[test]
    fn detail_overlay_shows_transcript_and_metadata() {
        let mut app = App::new(Route::Home);
        app.set_status(loaded());
        app.set_records(vec![record("1")]);
        app.open_detail();
        let screen = render(&app);
        assert!(screen.contains("Call details"));
        assert!(screen.contains("Lead: hi there"));
        assert!(screen.contains("https://cdn.example/rec.mp3"));
        assert!(screen.contains("campaign"));
    }
}
