use ratatui::{prelude::*, widgets::*};

use crate::{
    app::{App, Dialog, Focus},
    history::HistoryRow,
    time::format_time,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Theme {
    pub work_color: Color,
    pub break_color: Color,
    pub alarm_color: Color,
    pub border_color: Color,
    pub accent_color: Color,
}

pub fn get_theme(name: &str) -> Theme {
    match name {
        "nord" => Theme {
            work_color: Color::Rgb(136, 192, 208),
            break_color: Color::Rgb(163, 190, 140),
            alarm_color: Color::Rgb(191, 97, 106),
            border_color: Color::Rgb(129, 161, 193),
            accent_color: Color::Rgb(235, 203, 139),
        },
        "dracula" => Theme {
            work_color: Color::Rgb(189, 147, 249),
            break_color: Color::Rgb(80, 250, 123),
            alarm_color: Color::Rgb(255, 85, 85),
            border_color: Color::Rgb(98, 114, 164),
            accent_color: Color::Rgb(255, 121, 198),
        },
        "gruvbox" => Theme {
            work_color: Color::Rgb(254, 128, 25),
            break_color: Color::Rgb(184, 187, 38),
            alarm_color: Color::Rgb(251, 73, 52),
            border_color: Color::Rgb(213, 196, 161),
            accent_color: Color::Rgb(250, 189, 47),
        },
        _ => Theme {
            work_color: Color::Rgb(100, 181, 246),
            break_color: Color::Rgb(0, 230, 150),
            alarm_color: Color::Rgb(255, 60, 90),
            border_color: Color::Rgb(0, 200, 255),
            accent_color: Color::Rgb(255, 140, 0),
        },
    }
}

// ============================================================================
// UI Rendering
// ============================================================================

pub fn render_ui(f: &mut Frame, app: &App) {
    render_main(f, app);

    if app.controller.alarm_active() {
        render_alarm(f, app);
    } else if app.controller.prompt().is_some() {
        render_break_prompt(f, app);
    }

    match &app.dialog {
        Some(Dialog::Message(text)) => render_dialog(f, app, " Notice ", text, "Press any key"),
        Some(Dialog::ConfirmClear) => render_dialog(f, app, " Clear ", "Clear all history?", "Y: Confirm  •  N/Esc: Cancel"),
        None => {}
    }
}

fn state_color(app: &App) -> Color {
    if app.controller.alarm_active() {
        app.theme.alarm_color
    } else if app.controller.is_breaking() {
        app.theme.break_color
    } else {
        app.theme.work_color
    }
}

fn rounded(title: &str, app: &App) -> Block<'static> {
    Block::default()
        .title(title.to_string())
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(app.theme.border_color))
}

fn render_main(f: &mut Frame, app: &App) {
    let display = app.controller.display();
    let color = state_color(app);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(3),
        ])
        .split(f.size());

    // Header
    let header = Paragraph::new(Line::from(vec![
        Span::styled(" FLOWTIME ", Style::default().fg(app.theme.accent_color).add_modifier(Modifier::BOLD)),
        Span::raw(" • "),
        Span::styled(display.status, Style::default().fg(color)),
    ]))
    .alignment(Alignment::Center)
    .block(rounded("", app));
    f.render_widget(header, chunks[0]);

    // Timer
    let timer = Paragraph::new(vec![
        Line::from(Span::styled(display.label, Style::default().fg(Color::Gray))),
        Line::from(""),
        Line::from(Span::styled(display.timer, Style::default().fg(color).add_modifier(Modifier::BOLD))),
    ])
    .alignment(Alignment::Center)
    .block(rounded("", app));
    f.render_widget(timer, chunks[1]);

    // Task field
    let task_style = if app.controller.is_working() {
        Style::default().fg(Color::DarkGray)
    } else if app.focus == Focus::Task {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    let mut task_line = vec![Span::styled(app.task_input.clone(), task_style)];
    if app.focus == Focus::Task && !app.controller.is_working() {
        task_line.push(Span::styled("█", Style::default().fg(app.theme.accent_color)));
    } else if app.task_input.is_empty() {
        task_line.push(Span::styled("What are you working on?", Style::default().fg(Color::DarkGray)));
    }
    f.render_widget(Paragraph::new(Line::from(task_line)).block(rounded(" Task ", app)), chunks[2]);

    // Action button
    let button_style = if app.controller.is_working() {
        Style::default().fg(Color::Black).bg(app.theme.alarm_color)
    } else if app.controller.is_breaking() {
        Style::default().fg(Color::Black).bg(Color::Gray)
    } else {
        Style::default().fg(Color::Black).bg(app.theme.work_color)
    };
    f.render_widget(
        Paragraph::new(Span::styled(format!("  {}  ", display.button), button_style.add_modifier(Modifier::BOLD)))
            .alignment(Alignment::Center)
            .block(Block::default().padding(Padding::vertical(1))),
        chunks[3],
    );

    render_history(f, app, chunks[4]);

    // Controls
    let footer = match &app.notice {
        Some(notice) => Line::from(Span::styled(notice.clone(), Style::default().fg(app.theme.accent_color))),
        None => Line::from(vec![
            span_key("Enter", app), Span::raw(" Start/Stop/Skip  •  "),
            span_key("Tab", app), Span::raw(" Switch focus  •  "),
            span_key("C", app), Span::raw(" Clear  •  "),
            span_key("E", app), Span::raw(" Export  •  "),
            span_key("Q", app), Span::raw(" Quit"),
        ]),
    };
    f.render_widget(
        Paragraph::new(footer).alignment(Alignment::Center).style(Style::default().fg(Color::DarkGray)),
        chunks[5],
    );
}

fn span_key<'a>(text: &'a str, app: &App) -> Span<'a> {
    Span::styled(text, Style::default().fg(app.theme.accent_color).add_modifier(Modifier::BOLD))
}

fn render_history(f: &mut Frame, app: &App, area: Rect) {
    let rows = app.controller.history().rows();
    let block = rounded(" History ", app);

    if rows.is_empty() {
        f.render_widget(
            Paragraph::new(Span::styled("No sessions yet. Start focusing!", Style::default().fg(Color::DarkGray)))
                .alignment(Alignment::Center)
                .block(block),
            area,
        );
        return;
    }

    let header = Row::new(["Task", "Time", "Duration", "Break"])
        .style(Style::default().fg(app.theme.accent_color).add_modifier(Modifier::BOLD));
    let table = Table::new(
        rows.into_iter().map(history_row),
        [Constraint::Min(12), Constraint::Length(13), Constraint::Length(10), Constraint::Length(10)],
    )
    .header(header)
    .block(block);
    f.render_widget(table, area);
}

fn history_row(row: HistoryRow) -> Row<'static> {
    Row::new(vec![
        Cell::from(row.task),
        Cell::from(row.range).style(Style::default().fg(Color::Gray)),
        Cell::from(row.duration),
        Cell::from(row.break_time),
    ])
}

fn render_break_prompt(f: &mut Frame, app: &App) {
    let Some(prompt) = app.controller.prompt() else {
        return;
    };
    let area = centered_rect(60, 50, f.size());

    let presets: Vec<Span> = app
        .config
        .break_presets
        .iter()
        .enumerate()
        .flat_map(|(i, m)| {
            let style = if app.preset_index == Some(i) {
                Style::default().fg(Color::Black).bg(app.theme.break_color)
            } else {
                Style::default().fg(app.theme.break_color)
            };
            [Span::styled(format!(" {m}m "), style), Span::raw(" ")]
        })
        .collect();

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled("SESSION COMPLETE", Style::default().fg(app.theme.accent_color).add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(vec![
            Span::raw("You focused for "),
            Span::styled(format_time(prompt.work_secs), Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::raw("Break minutes: "),
            Span::styled(prompt.input.clone(), Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Span::styled("█", Style::default().fg(Color::Green)),
        ]),
        Line::from(""),
        Line::from(presets),
        Line::from(""),
        Line::from(Span::styled(
            "Tab/←→: Presets  •  Enter: Start break  •  Esc: Not now",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];

    f.render_widget(Clear, area);
    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center).block(rounded(" Take a Break ", app)), area);
}

fn render_alarm(f: &mut Frame, app: &App) {
    let area = f.size();
    let color = app.theme.alarm_color;
    let mut lines = vec![Line::from(""); (area.height as usize / 2).saturating_sub(3)];
    lines.extend([
        Line::from(Span::styled("⏰  BREAK IS OVER  ⏰", Style::default().fg(color).add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from("Time to get back to focus."),
        Line::from(""),
        Line::from(Span::styled("Press Enter to dismiss", Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC))),
    ]);

    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Thick)
                .border_style(Style::default().fg(color)),
        ),
        area,
    );
}

fn render_dialog(f: &mut Frame, app: &App, title: &str, text: &str, hint: &str) {
    let area = centered_rect(50, 30, f.size());
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(text.to_string(), Style::default().fg(Color::White).add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(Span::styled(hint.to_string(), Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC))),
    ];
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center).wrap(Wrap { trim: true }).block(rounded(title, app)),
        area,
    );
}

fn centered_rect(w: u16, h: u16, r: Rect) -> Rect {
    let v = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h) / 2),
            Constraint::Percentage(h),
            Constraint::Percentage((100 - h) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w) / 2),
            Constraint::Percentage(w),
            Constraint::Percentage((100 - w) / 2),
        ])
        .split(v[1])[1]
}
