use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use tokio::sync::mpsc::UnboundedReceiver;

use super::dashboard::LiveDashboard;
use super::input::{Field, InputModeController};
use super::pagination::PaginationView;
use super::runtime::Services;
use super::state::{AppState, PushConnection, View};
use super::types::{AppEvent, Notice, PushLink, Route};
use super::ui_utils::{
    centered_rect, field_text, focus_border_style, hint_style, key_style, notice_style,
};

const STATUS_LINES: usize = 5;

pub fn draw_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    state: &mut AppState,
    services: &Services,
    rx: &mut UnboundedReceiver<AppEvent>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(120);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(event) = rx.try_recv() {
            if let Some(effect) = state.handle_event(event) {
                if services.execute(state, effect).is_break() {
                    return Ok(());
                }
            }
        }
        state.drain_push();

        terminal.draw(|f| render(f, state))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if let Some(effect) = state.handle_key(key) {
                    if services.execute(state, effect).is_break() {
                        return Ok(());
                    }
                }
            }
        }
        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }
}

fn render(f: &mut Frame<'_>, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, chunks[0], state);
    match &state.view {
        View::Landing => render_landing(f, chunks[1], &state.input),
        View::Results {
            route,
            pagination,
            sentinel,
        } => render_results(f, chunks[1], route, pagination, sentinel.as_deref()),
        View::Admin {
            dashboard,
            connection,
        } => render_admin(f, chunks[1], dashboard, connection.as_ref()),
    }
    render_footer(f, chunks[2], state);

    if let Some(notice) = &state.notice {
        render_notice(f, notice);
    }
}

fn render_header(f: &mut Frame<'_>, area: Rect, state: &AppState) {
    let route = state.view.route();
    let mut spans = vec![Span::styled(
        route.title(),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )];
    if route == Route::Landing {
        spans.push(Span::styled("  |  mode ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(state.input.indicator(), key_style()));
    }
    if let Some(pending) = &state.pending {
        spans.push(Span::styled(
            format!("  |  loading {}...", pending.path()),
            Style::default().fg(Color::Yellow),
        ));
    }
    f.render_widget(
        Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn input_box<'a>(title: String, text: &'a str, placeholder: &'a str, focused: bool) -> Paragraph<'a> {
    let (shown, style) = field_text(text, placeholder);
    Paragraph::new(Span::styled(shown, style)).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(focus_border_style(focused)),
    )
}

fn hint_line(pairs: &[(&'static str, &'static str)]) -> Line<'static> {
    let mut spans = Vec::with_capacity(pairs.len() * 2);
    for (key, label) in pairs {
        spans.push(Span::styled(*key, key_style()));
        spans.push(Span::styled(format!(" {label}   "), hint_style()));
    }
    Line::from(spans)
}

fn render_landing(f: &mut Frame<'_>, area: Rect, input: &InputModeController) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(3),
        ])
        .split(area);

    f.render_widget(
        input_box(
            format!("Query [{}]", input.indicator()),
            input.primary_text(),
            input.placeholder(),
            input.focus() == Field::Primary,
        ),
        rows[0],
    );
    f.render_widget(
        input_box(
            "Index URL directly".to_string(),
            input.direct_index_text(),
            "https://...",
            input.focus() == Field::DirectIndex,
        ),
        rows[1],
    );
    f.render_widget(
        Paragraph::new(vec![
            hint_line(&[("enter", "submit"), ("tab", "switch field"), ("F2", "toggle mode")]),
            hint_line(&[("F4", "admin dashboard"), ("ctrl+u", "clear field"), ("esc", "quit")]),
        ])
        .block(Block::default().borders(Borders::ALL).title("Keys"))
        .wrap(Wrap { trim: true }),
        rows[2],
    );
}

fn render_results(
    f: &mut Frame<'_>,
    area: Rect,
    route: &Route,
    pagination: &PaginationView,
    sentinel: Option<&str>,
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(4)])
        .split(area);

    let lines = match sentinel {
        Some(message) => vec![Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Yellow),
        ))],
        None if pagination.items().is_empty() => vec![Line::from(Span::styled(
            "Nothing to show.",
            hint_style(),
        ))],
        None => {
            let mut lines = Vec::new();
            for item in pagination.visible_items() {
                lines.push(Line::from(item.text.clone()));
                if let Some(link) = &item.link {
                    lines.push(Line::from(Span::styled(
                        format!("  {link}"),
                        Style::default().fg(Color::DarkGray),
                    )));
                }
            }
            lines
        }
    };
    f.render_widget(
        Paragraph::new(lines)
            .block(
                Block::default()
                    .title(format!(
                        "Results ({} of {})",
                        pagination.visible_count(),
                        pagination.items().len()
                    ))
                    .borders(Borders::ALL),
            )
            .wrap(Wrap { trim: true }),
        rows[0],
    );

    let pager = if pagination.controls_enabled() {
        Line::from(vec![
            Span::styled(
                format!("{} of {}", pagination.page_label(), pagination.total_pages()),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled("   ", hint_style()),
            Span::styled("left/p", key_style()),
            Span::styled(" previous   ", hint_style()),
            Span::styled("right/n", key_style()),
            Span::styled(" next", hint_style()),
        ])
    } else {
        Line::from(Span::styled("Paging disabled", hint_style()))
    };
    let actions = match route {
        Route::Search { .. } => hint_line(&[
            ("h", "request external ingestion"),
            ("a", "advice"),
            ("esc", "back"),
        ]),
        _ => hint_line(&[("esc", "back")]),
    };
    f.render_widget(
        Paragraph::new(vec![pager, actions]).block(Block::default().borders(Borders::ALL)),
        rows[1],
    );
}

fn render_admin(
    f: &mut Frame<'_>,
    area: Rect,
    dashboard: &LiveDashboard,
    connection: Option<&PushConnection>,
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(6),
            Constraint::Length(STATUS_LINES as u16 + 2),
        ])
        .split(area);
    let tables = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);

    let barrels = dashboard.barrels_table();
    let searches = dashboard.searches_table();
    f.render_widget(barrels.widget(false), tables[0]);
    f.render_widget(searches.widget(false), tables[1]);

    let link = connection.map_or(PushLink::Connecting, PushConnection::link);
    let title = format!("Push channel ({})", link.label());
    let lines = dashboard
        .status_messages()
        .take(STATUS_LINES)
        .map(|message| Line::from(message.to_string()))
        .collect::<Vec<_>>();
    f.render_widget(
        Paragraph::new(lines)
            .block(Block::default().title(title).borders(Borders::ALL))
            .wrap(Wrap { trim: true }),
        rows[1],
    );
}

fn render_footer(f: &mut Frame<'_>, area: Rect, state: &AppState) {
    let line = if let Some(status) = state.latest_status() {
        Line::from(status.to_string())
    } else {
        Line::from(Span::styled("ctrl+c quits from anywhere", hint_style()))
    };
    f.render_widget(
        Paragraph::new(line).block(Block::default().title("Status").borders(Borders::ALL)),
        area,
    );
}

fn render_notice(f: &mut Frame<'_>, notice: &Notice) {
    let area = centered_rect(60, 30, f.area());
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(vec![
            Line::from(notice.message.clone()),
            Line::from(""),
            Line::from(Span::styled("Press Enter or Esc to close.", hint_style())),
        ])
        .block(
            Block::default()
                .title(notice.kind.title())
                .borders(Borders::ALL)
                .border_style(notice_style(notice.kind)),
        )
        .wrap(Wrap { trim: true }),
        area,
    );
}
