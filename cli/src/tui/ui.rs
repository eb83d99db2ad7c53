//! TUI rendering.

use port_arranger_core::{InjectionType, ProcessMapping, ProcessStatus};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
};

use super::app::App;
use crate::commands::truncate;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Table
            Constraint::Length(7), // Details
            Constraint::Length(3), // Footer
        ])
        .split(f.area());

    draw_header(f, app, chunks[0]);
    draw_table(f, app, chunks[1]);
    draw_details(f, app, chunks[2]);
    draw_footer(f, app, chunks[3]);
}

fn bordered() -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let running = app
        .processes()
        .iter()
        .filter(|(_, m)| m.status.is_running())
        .count();
    let title = format!(
        "Port Arranger | {} processes, {} running",
        app.processes().len(),
        running
    );

    let header = Paragraph::new(title)
        .style(Style::default().fg(Color::Cyan).bold())
        .block(bordered());

    f.render_widget(header, area);
}

fn status_cell(status: ProcessStatus) -> Cell<'static> {
    match status {
        ProcessStatus::Running => Cell::from("● running").style(Style::default().fg(Color::Green)),
        ProcessStatus::Stopped => Cell::from("○ stopped").style(Style::default().fg(Color::Red)),
    }
}

fn type_color(injection: InjectionType) -> Color {
    match injection {
        InjectionType::Env => Color::Yellow,
        InjectionType::Flag => Color::Green,
        InjectionType::Arg => Color::Magenta,
        InjectionType::Compose => Color::Blue,
    }
}

fn draw_table(f: &mut Frame, app: &App, area: Rect) {
    let header_cells = ["NAME", "PORT", "PID", "STATUS", "TYPE", "COMMAND"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).bold()));
    let header = Row::new(header_cells).height(1).bottom_margin(1);

    let rows = app.processes().iter().enumerate().map(|(i, (name, mapping))| {
        let port = match &mapping.compose_ports {
            Some(services) if services.len() > 1 => {
                format!("{} +{}", mapping.port, services.len() - 1)
            }
            _ => mapping.port.to_string(),
        };

        let cells = vec![
            Cell::from(truncate(name, 20)),
            Cell::from(port),
            Cell::from(mapping.pid.to_string()),
            status_cell(mapping.status),
            Cell::from(mapping.injection_type.as_str())
                .style(Style::default().fg(type_color(mapping.injection_type))),
            Cell::from(truncate(&mapping.original_command, 40)),
        ];

        let style = if i == app.selected {
            Style::default().bg(Color::DarkGray).fg(Color::White)
        } else {
            Style::default()
        };

        Row::new(cells).style(style)
    });

    let widths = [
        Constraint::Length(20),
        Constraint::Length(10),
        Constraint::Length(8),
        Constraint::Length(10),
        Constraint::Length(8),
        Constraint::Min(10),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(bordered().title(" Tracked Processes "))
        .row_highlight_style(Style::default().add_modifier(Modifier::BOLD));

    let mut state = TableState::default();
    if !app.processes().is_empty() {
        state.select(Some(app.selected));
    }

    f.render_stateful_widget(table, area, &mut state);
}

fn detail_lines(mapping: &ProcessMapping) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from(vec![
            Span::styled("command  ", label),
            Span::raw(mapping.command.clone()),
        ]),
        Line::from(vec![
            Span::styled("cwd      ", label),
            Span::raw(mapping.cwd.clone()),
        ]),
        Line::from(vec![
            Span::styled("started  ", label),
            Span::raw(
                mapping
                    .started_at
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
            ),
        ]),
    ];

    if let Some(services) = &mapping.compose_ports {
        let mut spans = vec![Span::styled("services ", label)];
        for service in services {
            let color = match service.running {
                Some(true) => Color::Green,
                Some(false) => Color::Red,
                None => Color::DarkGray,
            };
            spans.push(Span::styled(
                format!("{}:{} ", service.service_name, service.port),
                Style::default().fg(color),
            ));
        }
        lines.push(Line::from(spans));
    }

    lines
}

fn draw_details(f: &mut Frame, app: &App, area: Rect) {
    let (title, lines) = match app.selected_entry() {
        Some((name, mapping)) => (format!(" {} ", name), detail_lines(mapping)),
        None => (
            " Details ".to_string(),
            vec![Line::from("No tracked processes. Start one with: pa run \"<command>\"")],
        ),
    };

    let details = Paragraph::new(lines).block(bordered().title(title));
    f.render_widget(details, area);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let status = app.get_status().unwrap_or("");
    let help = "j/k: navigate | s: stop | r: restart | o: open | q: quit";

    let footer_text = if status.is_empty() {
        help.to_string()
    } else {
        format!("{} | {}", status, help)
    };

    let footer = Paragraph::new(footer_text)
        .style(Style::default().fg(Color::DarkGray))
        .block(bordered());

    f.render_widget(footer, area);
}
