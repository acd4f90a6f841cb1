use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
};
use crate::app::{
    App, AuthPhase, ChatFocus, InputMode, LoginField, RegisterField, Route, SUGGESTED_PROMPTS,
    placeholder_for,
};
use crate::auth::strength_label;
use crate::session::Role;

const THINKING_FRAMES: [&str; 3] = ["Thinking.", "Thinking..", "Thinking..."];

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // The initial session check renders nothing conclusive.
    if app.auth_phase == AuthPhase::Checking {
        render_checking(frame, area);
        return;
    }

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.route {
        Route::Login => render_login(app, frame, body_area),
        Route::Register => render_register(app, frame, body_area),
        Route::Dashboard => render_dashboard(app, frame, body_area),
        Route::Chat => render_chat(app, frame, body_area),
        Route::Properties | Route::Valuation | Route::Documents | Route::Approvals => {
            render_placeholder(app, frame, body_area)
        }
    }

    render_footer(app, frame, footer_area);

    if app.show_rename {
        render_rename_popup(app, frame, area);
    }
}

fn render_checking(frame: &mut Frame, area: Rect) {
    let block = Paragraph::new("Loading...")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
    let center = centered_rect(30, 3, area);
    frame.render_widget(block, center);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let user_indicator = app
        .user
        .as_ref()
        .map(|u| format!(" {} ", u.name))
        .unwrap_or_default();

    let title = Line::from(vec![
        Span::styled(" PurityProp ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            "Tamil Nadu Real Estate Assistant",
            Style::default().fg(Color::Gray),
        ),
        Span::raw(" "),
        Span::styled(user_indicator, Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints: Vec<Span> = Vec::new();
    match app.route {
        Route::Login => {
            hints.extend(vec![
                Span::styled(" Tab ", key_style),
                Span::styled(" field ", label_style),
                Span::styled(" Enter ", key_style),
                Span::styled(" sign in ", label_style),
                Span::styled(" ^P ", key_style),
                Span::styled(" show pw ", label_style),
                Span::styled(" ^R ", key_style),
                Span::styled(" register ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" quit ", label_style),
            ]);
        }
        Route::Register => {
            hints.extend(vec![
                Span::styled(" Tab ", key_style),
                Span::styled(" field ", label_style),
                Span::styled(" Enter ", key_style),
                Span::styled(" create ", label_style),
                Span::styled(" ^P ", key_style),
                Span::styled(" show pw ", label_style),
                Span::styled(" ^L ", key_style),
                Span::styled(" login ", label_style),
            ]);
        }
        Route::Dashboard => {
            if app.input_mode == InputMode::Editing {
                hints.extend(vec![
                    Span::styled(" Enter ", key_style),
                    Span::styled(" ask ", label_style),
                    Span::styled(" Esc ", key_style),
                    Span::styled(" cards ", label_style),
                ]);
            } else {
                hints.extend(vec![
                    Span::styled(" j/k ", key_style),
                    Span::styled(" cards ", label_style),
                    Span::styled(" Enter ", key_style),
                    Span::styled(" ask ", label_style),
                    Span::styled(" i ", key_style),
                    Span::styled(" type ", label_style),
                    Span::styled(" 1-6 ", key_style),
                    Span::styled(" pages ", label_style),
                    Span::styled(" q ", key_style),
                    Span::styled(" quit ", label_style),
                ]);
            }
        }
        Route::Chat => {
            if app.input_mode == InputMode::Editing {
                hints.extend(vec![
                    Span::styled(" Enter ", key_style),
                    Span::styled(" send ", label_style),
                    Span::styled(" Esc ", key_style),
                    Span::styled(" normal ", label_style),
                ]);
            } else if app.chat_focus == ChatFocus::Sidebar {
                hints.extend(vec![
                    Span::styled(" j/k ", key_style),
                    Span::styled(" chats ", label_style),
                    Span::styled(" Enter ", key_style),
                    Span::styled(" open ", label_style),
                    Span::styled(" n ", key_style),
                    Span::styled(" new ", label_style),
                    Span::styled(" r ", key_style),
                    Span::styled(" rename ", label_style),
                    Span::styled(" d ", key_style),
                    Span::styled(" delete ", label_style),
                    Span::styled(" Tab ", key_style),
                    Span::styled(" input ", label_style),
                ]);
            } else {
                hints.extend(vec![
                    Span::styled(" j/k ", key_style),
                    Span::styled(" scroll ", label_style),
                    Span::styled(" i ", key_style),
                    Span::styled(" type ", label_style),
                    Span::styled(" n ", key_style),
                    Span::styled(" new ", label_style),
                    Span::styled(" Tab ", key_style),
                    Span::styled(" chats ", label_style),
                    Span::styled(" 1-6 ", key_style),
                    Span::styled(" pages ", label_style),
                ]);
            }
        }
        _ => {
            hints.extend(vec![
                Span::styled(" 1-6 ", key_style),
                Span::styled(" pages ", label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" dashboard ", label_style),
                Span::styled(" q ", key_style),
                Span::styled(" quit ", label_style),
            ]);
        }
    }

    let footer = Paragraph::new(Line::from(hints));
    frame.render_widget(footer, area);
}

// --- Auth screens ---

fn field_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::Gray)
    }
}

fn masked(value: &str, show: bool) -> String {
    if show {
        value.to_string()
    } else {
        "•".repeat(value.chars().count())
    }
}

fn render_login(app: &App, frame: &mut Frame, area: Rect) {
    let card = centered_rect(50, 16, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Welcome back ")
        .title_alignment(Alignment::Center);
    frame.render_widget(block.clone(), card);
    let inner = block.inner(card);

    let [subtitle_area, error_area, email_area, password_area, remember_area, status_area] =
        Layout::vertical([
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(2),
        ])
        .areas(inner);

    let subtitle = Paragraph::new("Sign in to your account")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(subtitle, subtitle_area);

    if let Some(error) = &app.login.error {
        let line = Paragraph::new(error.as_str())
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Red));
        frame.render_widget(line, error_area);
    }

    let focused = app.login.field;

    let email = Paragraph::new(app.login.email.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Email Address ")
            .border_style(field_style(focused == LoginField::Email)),
    );
    frame.render_widget(email, email_area);

    let password = Paragraph::new(masked(&app.login.password, app.login.show_password)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Password ")
            .border_style(field_style(focused == LoginField::Password)),
    );
    frame.render_widget(password, password_area);

    let remember = Paragraph::new(Line::from(vec![
        Span::styled(
            if app.login.remember { "[x] " } else { "[ ] " },
            field_style(focused == LoginField::Remember),
        ),
        Span::styled("Remember me", field_style(focused == LoginField::Remember)),
    ]));
    frame.render_widget(remember, remember_area);

    let status = if app.auth_loading {
        Line::from(Span::styled(
            "Signing in...",
            Style::default().fg(Color::Yellow),
        ))
    } else {
        Line::from(vec![
            Span::styled("Don't have an account? ", Style::default().fg(Color::DarkGray)),
            Span::styled("^R to create one", Style::default().fg(Color::Cyan)),
        ])
    };
    frame.render_widget(Paragraph::new(status).alignment(Alignment::Center), status_area);
}

fn render_register(app: &App, frame: &mut Frame, area: Rect) {
    let card = centered_rect(50, 22, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Create your account ")
        .title_alignment(Alignment::Center);
    frame.render_widget(block.clone(), card);
    let inner = block.inner(card);

    let [error_area, name_area, email_area, password_area, strength_area, confirm_area, status_area] =
        Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(2),
        ])
        .areas(inner);

    if let Some(error) = &app.register.error {
        let line = Paragraph::new(error.as_str())
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Red));
        frame.render_widget(line, error_area);
    }

    let focused = app.register.field;

    let name = Paragraph::new(app.register.name.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Full Name ")
            .border_style(field_style(focused == RegisterField::Name)),
    );
    frame.render_widget(name, name_area);

    let email = Paragraph::new(app.register.email.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Email Address ")
            .border_style(field_style(focused == RegisterField::Email)),
    );
    frame.render_widget(email, email_area);

    let password = Paragraph::new(masked(&app.register.password, app.register.show_password))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Password ")
                .border_style(field_style(focused == RegisterField::Password)),
        );
    frame.render_widget(password, password_area);

    if !app.register.password.is_empty() {
        let strength = app.register.strength;
        let color = if strength < 50 {
            Color::Red
        } else if strength < 75 {
            Color::Yellow
        } else {
            Color::Green
        };
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(color))
            .ratio(strength as f64 / 100.0)
            .label(strength_label(strength));
        frame.render_widget(gauge, strength_area);
    }

    let confirm = Paragraph::new(masked(&app.register.confirm, app.register.show_password)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Confirm Password ")
            .border_style(field_style(focused == RegisterField::Confirm)),
    );
    frame.render_widget(confirm, confirm_area);

    let status = if app.auth_loading {
        Line::from(Span::styled(
            "Creating account...",
            Style::default().fg(Color::Yellow),
        ))
    } else {
        Line::from(vec![
            Span::styled("Already have an account? ", Style::default().fg(Color::DarkGray)),
            Span::styled("^L to sign in", Style::default().fg(Color::Cyan)),
        ])
    };
    frame.render_widget(Paragraph::new(status).alignment(Alignment::Center), status_area);
}

// --- Dashboard ---

fn render_dashboard(app: &mut App, frame: &mut Frame, area: Rect) {
    let [headline_area, input_area, prompts_area] = Layout::vertical([
        Constraint::Length(4),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    let headline = Paragraph::new(vec![
        Line::from(Span::styled(
            "What property are you working on?",
            Style::default().fg(Color::White).bold(),
        )),
        Line::from(Span::styled(
            "Your AI-powered assistant for Tamil Nadu real estate",
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().padding(ratatui::widgets::Padding::vertical(1)));
    frame.render_widget(headline, headline_area);

    let input_style = if app.input_mode == InputMode::Editing {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::Gray)
    };
    let input = Paragraph::new(app.dashboard_input.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Ask about registration, documents, loans, or measurements ")
            .border_style(input_style),
    );
    frame.render_widget(input, input_area);

    if app.input_mode == InputMode::Editing {
        frame.set_cursor_position((
            input_area.x + 1 + app.dashboard_cursor as u16,
            input_area.y + 1,
        ));
    }

    let items: Vec<ListItem> = SUGGESTED_PROMPTS
        .iter()
        .map(|card| {
            ListItem::new(vec![
                Line::from(vec![
                    Span::raw(format!("{} ", card.icon)),
                    Span::styled(card.title, Style::default().fg(Color::White).bold()),
                ]),
                Line::from(Span::styled(
                    format!("   {}", card.description),
                    Style::default().fg(Color::DarkGray),
                )),
                Line::default(),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" Suggested "))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));
    frame.render_stateful_widget(list, prompts_area, &mut app.prompt_state);
}

// --- Chat ---

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let [sidebar_area, main_area] =
        Layout::horizontal([Constraint::Length(28), Constraint::Min(0)]).areas(area);

    render_sidebar(app, frame, sidebar_area);

    let error_height = if app.chat_error.is_some() { 1 } else { 0 };
    let [transcript_area, error_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(error_height),
        Constraint::Length(3),
    ])
    .areas(main_area);

    render_transcript(app, frame, transcript_area);

    if let Some(error) = &app.chat_error {
        let line = Paragraph::new(error.as_str()).style(Style::default().fg(Color::Red));
        frame.render_widget(line, error_area);
    }

    let input_style = if app.input_mode == InputMode::Editing {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::Gray)
    };
    let input = Paragraph::new(app.chat_input.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Message ")
            .border_style(input_style),
    );
    frame.render_widget(input, input_area);

    if app.input_mode == InputMode::Editing {
        frame.set_cursor_position((
            input_area.x + 1 + app.chat_cursor as u16,
            input_area.y + 1,
        ));
    }
}

fn render_sidebar(app: &mut App, frame: &mut Frame, area: Rect) {
    let active_id = app.store.active_id();
    let items: Vec<ListItem> = app
        .store
        .conversations()
        .iter()
        .map(|conv| {
            let style = if Some(conv.id) == active_id {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default().fg(Color::Gray)
            };
            ListItem::new(Line::from(Span::styled(conv.title.clone(), style)))
        })
        .collect();

    let border_style = if app.chat_focus == ChatFocus::Sidebar {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::Gray)
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Chats ")
                .border_style(border_style),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));
    frame.render_stateful_widget(list, area, &mut app.sidebar_state);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    let title = app
        .store
        .active_title()
        .map(|t| format!(" {} ", t))
        .unwrap_or_else(|| " New Chat ".to_string());
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);

    // Record dimensions for scroll calculations on the next append.
    app.chat_height = inner.height;
    app.chat_width = inner.width;

    let mut lines: Vec<Line> = Vec::new();
    for msg in app.store.messages() {
        let role_line = match msg.role {
            Role::User => Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Green).bold(),
            )),
            Role::Assistant => {
                let mut spans = vec![Span::styled(
                    "AI Assistant:",
                    Style::default().fg(Color::Magenta).bold(),
                )];
                if let Some(lang) = &msg.language {
                    spans.push(Span::styled(
                        format!(" [{}]", lang),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                Line::from(spans)
            }
        };
        lines.push(role_line);
        for line in msg.content.lines() {
            lines.push(Line::from(line.to_string()));
        }
        lines.push(Line::default());
    }

    if app.chat_loading {
        lines.push(Line::from(Span::styled(
            "AI Assistant:",
            Style::default().fg(Color::Magenta).bold(),
        )));
        lines.push(Line::from(Span::styled(
            THINKING_FRAMES[app.animation_frame as usize % THINKING_FRAMES.len()],
            Style::default().fg(Color::DarkGray),
        )));
    }

    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "Ask about registration, stamp duty, land measurements, or loans.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let transcript = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(transcript, area);
}

// --- Placeholders ---

fn render_placeholder(app: &App, frame: &mut Frame, area: Rect) {
    let Some(page) = placeholder_for(app.route) else {
        return;
    };

    let card = centered_rect(60, 8, area);
    let lines = vec![
        Line::from(page.icon),
        Line::default(),
        Line::from(Span::styled(
            page.title,
            Style::default().fg(Color::White).bold(),
        )),
        Line::from(Span::styled(
            page.description,
            Style::default().fg(Color::DarkGray),
        )),
        Line::default(),
        Line::from(Span::styled(
            " Coming Soon ",
            Style::default().bg(Color::Yellow).fg(Color::Black),
        )),
    ];
    let placeholder = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(placeholder, card);
}

fn render_rename_popup(app: &App, frame: &mut Frame, area: Rect) {
    let popup = centered_rect(40, 3, area);
    frame.render_widget(Clear, popup);

    let input = Paragraph::new(app.rename_input.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Rename chat ")
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(input, popup);
    frame.set_cursor_position((popup.x + 1 + app.rename_cursor as u16, popup.y + 1));
}

/// Center a fixed-size rect inside `area`, clamped to fit.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}
