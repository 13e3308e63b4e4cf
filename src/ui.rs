use crate::app::{App, Form, FormKind, InputMode};
use crate::guard::Route;
use crate::models::Task;
use crate::parser::priority_label;
use crate::schedule::DayKey;
use crate::upsell::{AdBanner, UpsellState};
use chrono::Local;
use crossterm::event::{self, Event as CEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

fn centered_rect_absolute(width: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length((r.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Length((r.height.saturating_sub(height) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length((r.width.saturating_sub(width)) / 2),
                Constraint::Length(width),
                Constraint::Length((r.width.saturating_sub(width) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn key_hint(key: &'static str, action: &'static str) -> [Span<'static>; 2] {
    [
        Span::styled(key, Style::default().fg(Color::Red)),
        Span::raw(action),
    ]
}

fn get_legend(app: &App) -> Text<'static> {
    let hints: Vec<[Span<'static>; 2]> = match (&app.input_mode, &app.route) {
        (InputMode::Editing, Route::Login) => vec![
            key_hint(" Tab ", ": Next Field "),
            key_hint(" Enter ", ": Sign In "),
            key_hint(" Ctrl-r ", ": Create Account "),
            key_hint(" Ctrl-c ", ": Quit "),
        ],
        (InputMode::Editing, Route::Register) => vec![
            key_hint(" Tab ", ": Next Field "),
            key_hint(" Enter ", ": Register "),
            key_hint(" Ctrl-r ", ": Back to Sign In "),
            key_hint(" Ctrl-c ", ": Quit "),
        ],
        (InputMode::Editing, _) => vec![
            key_hint(" Tab ", ": Next Field "),
            key_hint(" Enter ", ": Submit "),
            key_hint(" Esc ", ": Cancel "),
        ],
        (InputMode::Normal, Route::Projects) => vec![
            key_hint(" q ", ": Quit "),
            key_hint(" 1/2/3 ", ": Views "),
            key_hint(" j/k ", ": Move "),
            key_hint(" Enter ", ": Open "),
            key_hint(" a ", ": New Project "),
            key_hint(" e ", ": Rename "),
            key_hint(" d ", ": Delete "),
            key_hint(" u ", ": Upgrade "),
            key_hint(" L ", ": Log Out "),
        ],
        (InputMode::Normal, route) => {
            let mut hints = vec![
                key_hint(" q ", ": Quit "),
                key_hint(" 1/2/3 ", ": Views "),
                key_hint(" j/k ", ": Move "),
                key_hint(" x ", ": Toggle Done "),
                key_hint(" e ", ": Edit "),
                key_hint(" d ", ": Delete "),
            ];
            if !matches!(route, Route::Upcoming) {
                hints.push(key_hint(" a ", ": Add Task "));
            }
            if matches!(route, Route::Project(_)) {
                hints.push(key_hint(" Esc ", ": Back "));
            }
            hints.push(key_hint(" r ", ": Refresh "));
            hints.push(key_hint(" u ", ": Upgrade "));
            hints.push(key_hint(" L ", ": Log Out "));
            hints
        }
    };
    Text::from(Line::from(hints.into_iter().flatten().collect::<Vec<_>>()))
}

pub async fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> io::Result<()> {
    loop {
        app.drain_fetches();
        terminal.draw(|f| draw(f, &mut app))?;

        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if app.handle_input(key).await {
                    return Ok(());
                }
            }
        }
    }
}

fn draw(f: &mut Frame, app: &mut App) {
    let size = f.area();
    let banner = AdBanner::for_session(&app.session, &app.config.ads);

    let mut constraints = vec![
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ];
    if banner != AdBanner::Hidden {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Length(2));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints(constraints)
        .split(size);

    let header_chunk = chunks[0];
    let body_chunk = chunks[1];
    let status_chunk = chunks[2];
    let footer_chunk = chunks[chunks.len() - 1];

    render_header(f, app, header_chunk);

    match app.route {
        Route::Login | Route::Register => render_auth(f, app, body_chunk),
        Route::Projects => render_projects(f, app, body_chunk),
        _ => render_tasks(f, app, body_chunk),
    }

    if let Some(status) = &app.status {
        let style = if app.route.is_protected() {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Red)
        };
        f.render_widget(Paragraph::new(status.as_str()).style(style), status_chunk);
    } else if app.loading {
        f.render_widget(
            Paragraph::new("Loading...").style(Style::default().fg(Color::DarkGray)),
            status_chunk,
        );
    }

    if banner != AdBanner::Hidden {
        render_banner(f, &banner, chunks[3]);
    }

    if app.route.is_protected() {
        if let Some(form) = &app.form {
            render_form_popup(f, form, body_chunk);
        }
    }
    if let Some(confirm) = &app.confirm {
        render_message(f, "Confirm", &confirm.question(), "y: Yes  n: No", Color::Yellow, size);
    }
    if let Some(alert) = &app.alert {
        render_message(f, "Error", alert, "Press any key to continue", Color::Red, size);
    }

    let legend = Paragraph::new(get_legend(app))
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });
    f.render_widget(legend, footer_chunk);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(40)].as_ref())
        .split(area);

    if app.route.is_protected() {
        let selected = match app.route {
            Route::Today => 0,
            Route::Upcoming => 1,
            _ => 2,
        };
        let tabs = Tabs::new(vec!["1 Today", "2 Upcoming", "3 Projects"])
            .select(selected)
            .highlight_style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            );
        f.render_widget(tabs, chunks[0]);
    } else {
        f.render_widget(
            Paragraph::new(" Todo").style(Style::default().add_modifier(Modifier::BOLD)),
            chunks[0],
        );
    }

    let Some(user) = app.session.user() else {
        return;
    };
    let badge = match app.upsell.state() {
        UpsellState::Premium => Span::styled("★ Premium", Style::default().fg(Color::Yellow)),
        UpsellState::CheckoutPending => {
            Span::styled("Checkout pending", Style::default().fg(Color::Cyan))
        }
        UpsellState::Free => Span::styled("Free", Style::default().fg(Color::DarkGray)),
    };
    let line = Line::from(vec![Span::raw(format!("{}  ", user.email)), badge, Span::raw(" ")]);
    f.render_widget(
        Paragraph::new(line).alignment(Alignment::Right),
        chunks[1],
    );
}

fn render_auth(f: &mut Frame, app: &App, area: Rect) {
    let Some(form) = &app.form else {
        return;
    };

    let mut lines: Vec<Line> = Vec::new();
    if let Some(message) = app.prompt.message() {
        lines.push(Line::from(Span::styled(
            message,
            Style::default().fg(Color::Yellow),
        )));
        lines.push(Line::from(""));
    }
    lines.extend(form_lines(form));
    lines.push(Line::from(""));
    let switch = if form.kind == FormKind::Login {
        "No account yet? Press Ctrl-r to register."
    } else {
        "Already registered? Press Ctrl-r to sign in."
    };
    lines.push(Line::from(Span::styled(
        switch,
        Style::default().fg(Color::DarkGray),
    )));

    let height = lines.len() as u16 + 2;
    let popup_area = centered_rect_absolute(50.min(area.width), height.min(area.height), area);
    let block = Block::default()
        .title(form.title())
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Green));
    f.render_widget(
        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false }),
        popup_area,
    );
}

fn form_lines(form: &Form) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (i, field) in form.fields.iter().enumerate() {
        let label_style = if i == form.active {
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let value = if field.secret {
            "*".repeat(field.value.chars().count())
        } else {
            field.value.clone()
        };
        let cursor = if i == form.active { "_" } else { "" };
        lines.push(Line::from(Span::styled(field.label, label_style)));
        lines.push(Line::from(vec![
            Span::styled(value, Style::default().fg(Color::White)),
            Span::styled(cursor, Style::default().fg(Color::Green)),
        ]));
    }
    lines
}

/// `percent` of `width`, computed wide so large terminals cannot overflow.
fn percent_of(width: u16, percent: u32) -> u16 {
    (u32::from(width) * percent / 100) as u16
}

fn render_form_popup(f: &mut Frame, form: &Form, area: Rect) {
    let popup_width = percent_of(area.width, 60).saturating_sub(2).max(10);

    let lines_required: usize = form
        .fields
        .iter()
        .map(|field| 1 + calculate_wrapped_lines(&field.value, popup_width).max(1))
        .sum();
    let popup_height = (lines_required as u16 + 2).min(area.height);

    let popup_area = centered_rect_absolute(popup_width + 2, popup_height, area);
    let popup_block = Block::default()
        .title(if form.submitting {
            format!("{} (Sending...)", form.title())
        } else {
            format!("{} (Press Enter to Submit)", form.title())
        })
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Green));

    let input = Paragraph::new(form_lines(form))
        .block(popup_block)
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(input, popup_area);
}

fn render_message(
    f: &mut Frame,
    title: &str,
    message: &str,
    hint: &str,
    color: Color,
    area: Rect,
) {
    let width = percent_of(area.width, 50).max(30).min(area.width);
    let height = (calculate_wrapped_lines(message, width.saturating_sub(2)) as u16 + 4).min(area.height);
    let popup_area = centered_rect_absolute(width, height, area);

    let text = vec![
        Line::from(message.to_string()),
        Line::from(""),
        Line::from(Span::styled(
            hint.to_string(),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .style(Style::default().fg(color));

    f.render_widget(Clear, popup_area);
    f.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
        popup_area,
    );
}

fn render_banner(f: &mut Frame, banner: &AdBanner, area: Rect) {
    let text = match banner {
        AdBanner::Hidden => return,
        AdBanner::Placeholder => Line::from(vec![
            Span::raw("Advertisement  "),
            Span::styled("Press u to go premium and remove ads", Style::default().fg(Color::Yellow)),
        ]),
        AdBanner::Slot { client, slot } => Line::from(vec![
            Span::raw(format!("Sponsored [{} / {}]  ", client, slot)),
            Span::styled("Press u to remove ads", Style::default().fg(Color::Yellow)),
        ]),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::DarkGray));
    f.render_widget(
        Paragraph::new(text).block(block).alignment(Alignment::Center),
        area,
    );
}

fn task_item(task: &Task) -> ListItem<'static> {
    let mut spans = Vec::new();
    if task.status.is_completed() {
        spans.push(Span::styled("[x] ", Style::default().fg(Color::Green)));
        spans.push(Span::styled(
            task.title.clone(),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::CROSSED_OUT),
        ));
    } else {
        spans.push(Span::raw("[ ] "));
        spans.push(Span::raw(task.title.clone()));
    }
    if let Some(label) = priority_label(task.priority) {
        spans.push(Span::styled(
            format!(" {}", label),
            Style::default().fg(Color::Red),
        ));
    }
    if let Some(due) = task.due_date {
        spans.push(Span::styled(
            format!("  {}", due.with_timezone(&Local).format("%b %-d %H:%M")),
            Style::default().fg(Color::Blue),
        ));
    }
    ListItem::new(Line::from(spans))
}

fn render_tasks(f: &mut Frame, app: &mut App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)].as_ref())
        .split(area);

    let title = match &app.route {
        Route::Project(_) => app
            .project
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "Project".to_string()),
        route => route.title().to_string(),
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    let highlight = Style::default()
        .fg(Color::Green)
        .add_modifier(Modifier::BOLD);

    if app.route == Route::Upcoming {
        // day headers take rows of their own, so the selection is remapped
        let today = Local::now().date_naive();
        let mut items = Vec::new();
        let mut row = None;
        let mut index = 0;
        for bucket in &app.upcoming {
            let header_style = match bucket.day {
                DayKey::Date(d) if d == today => Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
                _ => Style::default().add_modifier(Modifier::BOLD),
            };
            items.push(ListItem::new(Line::from(Span::styled(
                bucket.label(today),
                header_style,
            ))));
            for task in &bucket.tasks {
                if app.state.selected() == Some(index) {
                    row = Some(items.len());
                }
                items.push(task_item(task));
                index += 1;
            }
        }

        let widget = if items.is_empty() {
            List::new(vec![ListItem::new("Nothing scheduled for the next two weeks")]).block(block)
        } else {
            List::new(items)
                .block(block)
                .highlight_style(highlight)
                .highlight_symbol(">> ")
        };
        let mut state = ListState::default().with_selected(row);
        f.render_stateful_widget(widget, chunks[0], &mut state);
    } else {
        let widget = if app.tasks.is_empty() {
            let empty = if app.loading { "" } else { "No tasks here" };
            List::new(vec![ListItem::new(empty)]).block(block)
        } else {
            List::new(app.tasks.iter().map(task_item).collect::<Vec<_>>())
                .block(block)
                .highlight_style(highlight)
                .highlight_symbol(">> ")
        };
        f.render_stateful_widget(widget, chunks[0], &mut app.state);
    }

    render_detail(f, app.selected_task(), chunks[1]);
}

fn render_detail(f: &mut Frame, task: Option<&Task>, area: Rect) {
    let detail_block = Block::default().borders(Borders::ALL).title("Task Details");
    let Some(task) = task else {
        let paragraph = Paragraph::new("No task selected")
            .block(detail_block)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
        return;
    };

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines: Vec<Line<'static>> = vec![Line::from(Span::styled(task.title.clone(), bold))];
    lines.push(Line::from(""));

    let due = task
        .due_date
        .map(|d| d.with_timezone(&Local).format("%A, %B %-d %H:%M").to_string())
        .unwrap_or_else(|| "No due date".to_string());
    lines.push(Line::from(vec![
        Span::styled("Due Date: ", bold),
        Span::raw(due),
    ]));

    let priority = priority_label(task.priority).unwrap_or_else(|| "None".to_string());
    lines.push(Line::from(vec![
        Span::styled("Priority: ", bold),
        Span::raw(priority),
    ]));
    lines.push(Line::from(vec![
        Span::styled("Status: ", bold),
        Span::raw(task.status.to_string()),
    ]));

    lines.push(Line::from(vec![Span::styled("Labels: ", bold)]));
    if task.labels.is_empty() {
        lines.push(Line::from(Span::raw("No labels")));
    } else {
        let mut label_spans: Vec<Span<'static>> = Vec::new();
        for (i, label) in task.labels.iter().enumerate() {
            if i > 0 {
                label_spans.push(Span::raw(" "));
            }
            let bg = label.color.parse::<Color>().unwrap_or(Color::Yellow);
            label_spans.push(Span::styled(
                format!(" {} ", label.name),
                Style::default().bg(bg).fg(Color::Black),
            ));
        }
        lines.push(Line::from(label_spans));
    }

    lines.push(Line::from(vec![Span::styled("Description: ", bold)]));
    match &task.description {
        Some(desc) => lines.extend(desc.lines().map(|l| Line::from(l.to_string()))),
        None => lines.push(Line::from(Span::raw("No description"))),
    }

    let paragraph = Paragraph::new(lines)
        .block(detail_block)
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn render_projects(f: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Projects");
    let widget = if app.projects.is_empty() {
        let empty = if app.loading { "" } else { "No projects yet, press a to create one" };
        List::new(vec![ListItem::new(empty)]).block(block)
    } else {
        let items: Vec<ListItem> = app
            .projects
            .iter()
            .map(|project| {
                let dot = project
                    .color
                    .as_deref()
                    .and_then(|c| c.parse::<Color>().ok())
                    .unwrap_or(Color::Gray);
                ListItem::new(Line::from(vec![
                    Span::styled("● ", Style::default().fg(dot)),
                    Span::raw(project.name.clone()),
                ]))
            })
            .collect();
        List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ")
    };
    f.render_stateful_widget(widget, area, &mut app.state);
}

fn calculate_wrapped_lines(text: &str, max_width: u16) -> usize {
    if max_width == 0 {
        return 0;
    }
    let mut line_count = 0;
    for line in text.lines() {
        let line_width = line.chars().count() as u16;
        line_count += line_width.div_ceil(max_width).max(1) as usize;
    }
    line_count
}
