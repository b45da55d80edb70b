//! UI rendering for the TUI.

use super::app::{App, FocusArea, InputMode, Mode};
use super::settings::SettingsField;
use crate::render::{Direction as LineDirection, HexRow, TextLine};
use crate::state::ConnectionState;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io::{self, Stdout};

/// Set up the terminal for TUI rendering.
pub fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(
        stdout,
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restore the terminal to normal mode.
pub fn restore_terminal(mut terminal: Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::event::DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Render the entire UI.
pub fn render(app: &App, frame: &mut Frame) {
    let size = frame.area();

    // Main layout: header, body, footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(10),   // Body
            Constraint::Length(3), // Input
            Constraint::Length(1), // Status bar
        ])
        .split(size);

    render_header(app, frame, chunks[0]);
    render_body(app, frame, chunks[1]);
    render_input(app, frame, chunks[2]);
    render_status_bar(app, frame, chunks[3]);

    if app.mode == Mode::Help {
        render_help_overlay(app, frame, size);
    }
}

fn border_style(app: &App, focused: bool) -> Style {
    if focused {
        Style::default().fg(app.theme.accent)
    } else {
        Style::default().fg(app.theme.border)
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let port_info = match &app.connected_device {
        Some(device) => {
            let settings = app
                .session()
                .active_settings()
                .unwrap_or_else(|| app.session().pending_settings());
            format!("{} {} {}", device.path(), settings.port, settings.encoding)
        }
        None => "Not connected".to_string(),
    };

    let state_color = match app.connection {
        ConnectionState::Connected => app.theme.success_color,
        ConnectionState::Disconnected => app.theme.inactive,
        ConnectionState::Connecting | ConnectionState::Disconnecting => app.theme.warning_color,
    };

    let header = Line::from(vec![
        Span::styled(
            " serial-console ",
            Style::default()
                .fg(app.theme.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(port_info, Style::default().fg(app.theme.fg)),
        Span::raw(" | "),
        Span::styled(app.connection.as_str(), Style::default().fg(state_color)),
        Span::raw(" | "),
        Span::styled(app.uptime_string(), Style::default().fg(app.theme.fg)),
    ]);

    let header_widget = Paragraph::new(header).style(Style::default().bg(app.theme.selection));

    frame.render_widget(header_widget, area);
}

fn render_body(app: &App, frame: &mut Frame, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(28), Constraint::Min(40)])
        .split(area);

    if app.controls.settings_visible {
        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(4),
                Constraint::Length(SettingsField::ALL.len() as u16 + 2),
            ])
            .split(columns[0]);
        render_port_list(app, frame, left[0]);
        render_settings(app, frame, left[1]);
    } else {
        render_port_list(app, frame, columns[0]);
    }

    let views = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(columns[1]);
    render_text_view(app, frame, views[0]);
    render_hex_view(app, frame, views[1]);
}

fn render_port_list(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app, app.focus == FocusArea::PortList))
        .title(" Ports ");

    if !app.capabilities.serial {
        let notice = Paragraph::new("No serial support on this platform")
            .style(Style::default().fg(app.theme.inactive))
            .wrap(Wrap { trim: true })
            .block(block);
        frame.render_widget(notice, area);
        return;
    }

    let connected_path = app.connected_device.as_ref().map(|d| d.path());
    let items: Vec<ListItem> = app
        .devices
        .iter()
        .enumerate()
        .map(|(i, device)| {
            let is_connected = connected_path == Some(device.path());
            let style = if i == app.selected_port {
                Style::default()
                    .fg(app.theme.fg)
                    .bg(app.theme.selection)
                    .add_modifier(Modifier::BOLD)
            } else if is_connected {
                Style::default().fg(app.theme.success_color)
            } else if app.controls.device_selection_enabled {
                Style::default().fg(app.theme.fg)
            } else {
                Style::default().fg(app.theme.inactive)
            };

            let prefix = if is_connected {
                "● "
            } else if i == app.selected_port {
                "> "
            } else {
                "  "
            };

            ListItem::new(format!("{}{}", prefix, device.path())).style(style)
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn render_settings(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusArea::Settings;
    let settings = app.session().pending_settings();

    let lines: Vec<Line> = SettingsField::ALL
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let style = if focused && i == app.selected_field {
                Style::default()
                    .fg(app.theme.fg)
                    .bg(app.theme.selection)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(app.theme.fg)
            };
            Line::from(vec![
                Span::styled(format!("{:<10}", field.label()), style),
                Span::styled(field.value(&settings), style.fg(app.theme.accent)),
            ])
        })
        .collect();

    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style(app, focused))
            .title(" Settings "),
    );
    frame.render_widget(widget, area);
}

fn render_text_view(app: &App, frame: &mut Frame, area: Rect) {
    let height = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = app
        .text_pane
        .visible(height)
        .map(|line| format_text_line(app, line))
        .collect();

    let title = if app.text_pane.is_at_bottom() {
        " Text ".to_string()
    } else {
        format!(" Text [+{}] ", app.text_pane.scroll_offset())
    };

    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style(app, app.focus == FocusArea::Text))
            .title(title),
    );
    frame.render_widget(widget, area);
}

fn format_text_line<'a>(app: &App, line: &TextLine) -> Line<'a> {
    let mut spans = Vec::with_capacity(3);
    if app.show_timestamps {
        spans.push(Span::styled(
            line.timestamp.format("%H:%M:%S%.3f ").to_string(),
            Style::default().fg(app.theme.inactive),
        ));
    }

    let color = match (line.direction, line.severity) {
        (LineDirection::Outgoing, _) => app.theme.tx_color,
        (LineDirection::Incoming, Some(severity)) => app.theme.severity_color(severity),
        (LineDirection::Incoming, None) => app.theme.rx_color,
    };
    if line.direction == LineDirection::Outgoing {
        spans.push(Span::styled("> ", Style::default().fg(color)));
    }
    spans.push(Span::styled(
        line.display(app.show_non_printable),
        Style::default().fg(color),
    ));

    Line::from(spans)
}

fn render_hex_view(app: &App, frame: &mut Frame, area: Rect) {
    let height = area.height.saturating_sub(2) as usize;
    let width = app.config.render.hex_row_width;
    let lines: Vec<Line> = app
        .hex_pane
        .visible(height)
        .map(|row| format_hex_row(app, row, width))
        .collect();

    let title = if app.hex_pane.is_at_bottom() {
        " Hex ".to_string()
    } else {
        format!(" Hex [+{}] ", app.hex_pane.scroll_offset())
    };

    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style(app, app.focus == FocusArea::Hex))
            .title(title),
    );
    frame.render_widget(widget, area);
}

fn format_hex_row<'a>(app: &App, row: &HexRow, width: usize) -> Line<'a> {
    let color = match row.direction {
        LineDirection::Incoming => app.theme.rx_color,
        LineDirection::Outgoing => app.theme.tx_color,
    };
    Line::from(vec![
        Span::styled(
            format!("{:<pad$} ", row.hex(), pad = width * 3),
            Style::default().fg(color),
        ),
        Span::styled(row.ascii(), Style::default().fg(app.theme.inactive)),
    ])
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.mode == Mode::Insert;

    let mode_indicator = match app.mode {
        Mode::Insert => "[INSERT]",
        _ => "[NORMAL]",
    };
    let title = match app.input_mode {
        InputMode::Text => format!(" Input {} TEXT +{} ", mode_indicator, app.line_ending),
        InputMode::Bytes => format!(" Input {} BYTES ", mode_indicator),
    };

    let style = if app.controls.write_enabled {
        Style::default().fg(app.theme.fg)
    } else {
        Style::default().fg(app.theme.inactive)
    };

    let input_widget = Paragraph::new(app.input.as_str()).style(style).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style(app, focused))
            .title(title),
    );

    frame.render_widget(input_widget, area);

    if focused {
        let cursor_x = area.x + 1 + app.cursor_pos as u16;
        frame.set_cursor_position((cursor_x, area.y + 1));
    }
}

fn render_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let status_text = app.status_message.as_deref().unwrap_or("Ready");

    let keybinds = if app.controls.device_selection_enabled {
        "q:quit  c:connect  Tab:focus  ←/→:setting  F1:help"
    } else {
        "q:quit  i:insert  d:disconnect  b:bytes  F1:help"
    };

    let status = Line::from(vec![
        Span::styled(
            format!(" {} ", status_text),
            Style::default().fg(app.theme.fg),
        ),
        Span::raw(" | "),
        Span::styled(keybinds, Style::default().fg(app.theme.inactive)),
    ]);

    let status_widget = Paragraph::new(status).style(Style::default().bg(app.theme.selection));

    frame.render_widget(status_widget, area);
}

fn render_help_overlay(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 80, area);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let help_text = vec![
        Line::from(Span::styled(
            "Keybindings",
            Style::default()
                .fg(app.theme.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Normal Mode:"),
        Line::from("  q          - Quit"),
        Line::from("  i          - Enter insert mode"),
        Line::from("  Tab        - Cycle focus"),
        Line::from("  c / Enter  - Connect to selected port"),
        Line::from("  d          - Disconnect"),
        Line::from("  ←/→        - Change selected setting"),
        Line::from("  j/k        - Move selection or scroll"),
        Line::from("  PgUp/PgDn  - Scroll focused view"),
        Line::from("  G / End    - Follow new output"),
        Line::from("  Ctrl+L     - Clear views"),
        Line::from("  e          - Cycle line ending"),
        Line::from("  b          - Toggle text/bytes input"),
        Line::from("  n          - Toggle non-printable markers"),
        Line::from("  t          - Toggle timestamps"),
        Line::from("  r          - Refresh port list"),
        Line::from(""),
        Line::from("Insert Mode:"),
        Line::from("  Esc        - Return to normal"),
        Line::from("  Enter      - Send"),
        Line::from("  Tab        - Toggle text/bytes input"),
        Line::from("  Up/Down    - History navigation"),
        Line::from(""),
        Line::from(Span::styled(
            "Press Esc or F1 to close",
            Style::default().fg(app.theme.inactive),
        )),
    ];

    let help_widget = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(app.theme.accent))
                .title(" Help ")
                .style(Style::default().bg(app.theme.bg)),
        )
        .wrap(Wrap { trim: false });

    frame.render_widget(help_widget, popup_area);
}

/// Create a centered rectangle with the given percentage of the parent area.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
