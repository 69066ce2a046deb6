use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use termchat_core::Session;
use termchat_core::prompt::decode;
use unicode_width::UnicodeWidthStr;

use crate::app::App;
use crate::theme;

pub fn draw(frame: &mut Frame, app: &App) {
    frame.render_widget(Block::default().style(theme::base_bg()), frame.area());

    let chunks = Layout::vertical([
        Constraint::Length(1),          // status bar
        Constraint::Percentage(40),     // history
        Constraint::Min(3),             // terminal
        Constraint::Length(1),          // help bar
    ])
    .split(frame.area());

    draw_status_bar(frame, app, chunks[0]);
    draw_history(frame, app, chunks[1]);
    draw_terminal(frame, app, chunks[2]);
    draw_help_bar(frame, chunks[3]);
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let session = app.terminal.session();
    let spans = vec![
        Span::styled(" termchat", theme::app_title()),
        Span::styled(theme::STATUS_SEP, theme::status_separator()),
        Span::styled(
            format!("{}@{}", session.user, session.system),
            theme::status_text(),
        ),
        Span::styled(theme::STATUS_SEP, theme::status_separator()),
        Span::styled(session.path.as_str(), theme::status_text()),
        Span::styled(theme::STATUS_SEP, theme::status_separator()),
        Span::styled(
            format!("{} msgs", app.history_lines.len()),
            theme::status_text(),
        ),
        Span::styled(theme::STATUS_SEP, theme::status_separator()),
        Span::styled(app.server.as_str(), theme::status_text()),
    ];
    frame.render_widget(Paragraph::new(Line::from(spans)).style(theme::bar_bg()), area);
}

fn draw_history(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(theme::history_border())
        .title(Span::styled(format!(" {} ", app.history_label), theme::history_title()));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines: Vec<Line> = tail(&app.history_lines, inner.height as usize)
        .iter()
        .map(|l| history_line(l))
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}

/// `alias@at:` in accent, the rest as body text.
fn history_line(line: &str) -> Line<'_> {
    match line.find(": ") {
        Some(i) => Line::from(vec![
            Span::styled(&line[..i + 1], theme::history_alias()),
            Span::styled(&line[i + 1..], theme::history_text()),
        ]),
        None => Line::from(Span::styled(line, theme::history_text())),
    }
}

fn draw_terminal(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.terminal.is_focused();
    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(theme::terminal_border(focused));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows: Vec<String> = app.terminal.rows().map(decode).collect();
    let visible = tail(&rows, inner.height as usize);
    let session = app.terminal.session();
    let lines: Vec<Line> = visible.iter().map(|r| prompt_line(r, session)).collect();
    frame.render_widget(
        Paragraph::new(lines).style(theme::terminal_pane(app.terminal.theme(), focused)),
        inner,
    );

    if focused && let Some(last) = visible.last() {
        let x = inner.x + (last.width() as u16).min(inner.width.saturating_sub(1));
        let y = inner.y + visible.len().saturating_sub(1) as u16;
        frame.set_cursor_position(Position::new(x, y));
    }
}

/// Color the `user@system:path$` prefix of a row.
fn prompt_line<'a>(row: &'a str, session: &Session) -> Line<'a> {
    let head = format!("{}@{}:", session.user, session.system);
    let Some(rest) = row.strip_prefix(head.as_str()) else {
        return Line::from(row);
    };
    let tail_start = format!("{} ", session.prompt_symbol);
    match rest.find(tail_start.as_str()) {
        Some(i) => {
            let split = head.len() + i + tail_start.len();
            Line::from(vec![
                Span::styled(&row[..head.len()], theme::prompt_user()),
                Span::styled(&row[head.len()..split], theme::prompt_path()),
                Span::raw(&row[split..]),
            ])
        }
        None => Line::from(row),
    }
}

fn draw_help_bar(frame: &mut Frame, area: Rect) {
    let help = Line::from(vec![
        Span::styled(" Enter", theme::help_key()),
        Span::styled(" run  ", theme::help_desc()),
        Span::styled("help", theme::help_key()),
        Span::styled(" commands  ", theme::help_desc()),
        Span::styled("^L", theme::help_key()),
        Span::styled(" clear  ", theme::help_desc()),
        Span::styled("Esc", theme::help_key()),
        Span::styled(" unfocus  ", theme::help_desc()),
        Span::styled("^C", theme::help_key()),
        Span::styled(" quit", theme::help_desc()),
    ]);
    frame.render_widget(Paragraph::new(help).style(theme::bar_bg()), area);
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}
