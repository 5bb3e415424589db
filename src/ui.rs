use acechat_core::transcript::{SUGGESTIONS, WELCOME_GREETING, WELCOME_TITLE};
use acechat_core::{ChatMessage, ChatRole, Entry, Notice, NoticeKind};
use ratatui::{
    layout::{Constraint, Layout, Margin, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{
        Block, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
    },
    Frame,
};

use crate::app::{App, InputMode, SettingsField, SettingsForm};
use crate::markup;

const SIDEBAR_WIDTH: u16 = 30;
const SLIDER_CELLS: usize = 20;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let main_area = if app.show_sidebar {
        let [sidebar_area, main_area] =
            Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)])
                .areas(body_area);
        render_sidebar(app, frame, sidebar_area);
        main_area
    } else {
        body_area
    };

    let [transcript_area, compose_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(app.compose_height() + 2),
    ])
    .areas(main_area);

    render_transcript(app, frame, transcript_area);
    render_compose(app, frame, compose_area);
    render_footer(app, frame, footer_area);

    if let Some(form) = &app.settings_form {
        render_settings(form, frame, area);
    }
    if let Some(notice) = app.session.notice() {
        render_toast(notice, frame, body_area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" ACE AI ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("[{}]", app.session.model_label()),
            Style::default().fg(Color::White),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_sidebar(app: &App, frame: &mut Frame, area: Rect) {
    let label = Style::default().fg(Color::DarkGray);
    let key = Style::default().fg(Color::Cyan);

    let mut lines = vec![
        Line::from(Span::styled("Model", label)),
        Line::from(Span::styled(app.session.model_label().to_string(), Style::default().bold())),
        Line::default(),
        Line::from(Span::styled("Server", label)),
        Line::from(app.server_url.clone()),
        Line::default(),
        Line::from(Span::styled("Shortcuts", label)),
    ];
    let shortcuts = [
        ("Ctrl+N", "new chat"),
        ("Ctrl+L", "clear"),
        ("Ctrl+S", "settings"),
        ("Ctrl+R", "voice input"),
        ("Ctrl+B", "hide sidebar"),
        ("Ctrl+C", "quit"),
    ];
    for (k, what) in shortcuts {
        lines.push(Line::from(vec![
            Span::styled(format!("{k:<7}"), key),
            Span::raw(" "),
            Span::raw(what),
        ]));
    }

    let sidebar = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(" Session "),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(sidebar, area);
}

fn role_style(role: ChatRole) -> Style {
    match role {
        ChatRole::User => Style::default().fg(Color::Cyan),
        ChatRole::Assistant => Style::default().fg(Color::Yellow),
        ChatRole::Error => Style::default().fg(Color::Red),
    }
}

fn role_header(role: ChatRole) -> Line<'static> {
    Line::from(Span::styled(
        format!("{} {}", role.glyph(), role.label()),
        role_style(role).add_modifier(Modifier::BOLD),
    ))
}

fn push_welcome(lines: &mut Vec<Line<'static>>) {
    lines.push(Line::from(Span::styled(
        WELCOME_TITLE,
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(WELCOME_GREETING));
    lines.push(Line::default());
    for (i, suggestion) in SUGGESTIONS.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(
                format!(" {} ", i + 1),
                Style::default().bg(Color::DarkGray).fg(Color::White),
            ),
            Span::raw(" "),
            Span::styled(*suggestion, Style::default().fg(Color::Gray)),
        ]));
    }
    lines.push(Line::default());
}

fn push_message(msg: &ChatMessage, lines: &mut Vec<Line<'static>>) {
    lines.push(role_header(msg.role));

    let mut base = match msg.role {
        ChatRole::Error => Style::default().fg(Color::Red),
        _ => Style::default(),
    };
    // Fresh messages fade in
    if msg.is_revealing() {
        base = base.add_modifier(Modifier::DIM);
    }
    lines.extend(markup::to_lines(msg.markup(), base));
    lines.push(Line::default());
}

fn push_typing(frame_idx: u8, lines: &mut Vec<Line<'static>>) {
    lines.push(role_header(ChatRole::Assistant));
    let dots: Vec<Span<'static>> = (0..3u8)
        .map(|i| {
            let style = if i == frame_idx {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Span::styled("● ", style)
        })
        .collect();
    lines.push(Line::from(dots));
    lines.push(Line::default());
}

fn transcript_lines(app: &App) -> Vec<Line<'static>> {
    let transcript = app.session.transcript();
    let mut lines = Vec::new();
    for entry in transcript.entries() {
        match entry {
            Entry::Welcome => push_welcome(&mut lines),
            Entry::Message(msg) => push_message(msg, &mut lines),
            Entry::Typing => push_typing(transcript.typing_frame(), &mut lines),
        }
    }
    lines
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    app.transcript_area = Some(area);

    let border_color = if app.input_mode() == InputMode::Normal && app.settings_form.is_none() {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Chat ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Measure wrapped height before scrolling so follow mode lands on the end
    let paragraph = Paragraph::new(transcript_lines(app)).wrap(Wrap { trim: false });
    let content_height = paragraph.line_count(inner.width).min(u16::MAX as usize) as u16;
    app.session
        .transcript_mut()
        .set_metrics(content_height, inner.height);
    let offset = app.session.transcript().scroll_offset();

    frame.render_widget(paragraph.scroll((offset, 0)), inner);

    if content_height > inner.height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let max_offset = content_height - inner.height;
        let mut scrollbar_state = ScrollbarState::new(max_offset as usize + 1)
            .position(offset as usize);

        frame.render_stateful_widget(
            scrollbar,
            area.inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn render_compose(app: &App, frame: &mut Frame, area: Rect) {
    let gate = app.session.gate();

    let (title, border_color) = if app.session.is_listening() {
        (" Listening... ", Color::Magenta)
    } else if !gate.controls_enabled() {
        (" Waiting for reply... ", Color::DarkGray)
    } else if app.input_mode() == InputMode::Editing {
        (" Message ", Color::Yellow)
    } else {
        (" Message (i to type) ", Color::DarkGray)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);
    let inner = block.inner(area);

    if app.compose.is_empty() {
        let placeholder = Paragraph::new("Type your message...")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(placeholder, area);
    } else {
        // Keep the cursor inside the visible window
        let (row, col) = app.cursor_row_col();
        let scroll_y = (row as u16).saturating_sub(inner.height.saturating_sub(1));
        let scroll_x = (col as u16).saturating_sub(inner.width.saturating_sub(1));

        let text_style = if gate.controls_enabled() {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let input = Paragraph::new(app.compose.as_str())
            .style(text_style)
            .block(block)
            .scroll((scroll_y, scroll_x));
        frame.render_widget(input, area);
    }

    if app.can_type() {
        let (row, col) = app.cursor_row_col();
        let x = (col as u16).min(inner.width.saturating_sub(1));
        let y = (row as u16).min(inner.height.saturating_sub(1));
        frame.set_cursor_position((inner.x + x, inner.y + y));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = if app.settings_form.is_some() {
        (" SETTINGS ", Style::default().bg(Color::Magenta).fg(Color::White))
    } else {
        match app.input_mode() {
            InputMode::Editing => (" TYPE ", Style::default().bg(Color::Yellow).fg(Color::Black)),
            InputMode::Normal => (" VIEW ", Style::default().bg(Color::Blue).fg(Color::White)),
        }
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: Vec<(&str, &str)> = if app.settings_form.is_some() {
        vec![
            (" Tab ", " field "),
            (" ←/→ ", " change "),
            (" Enter ", " save "),
            (" Esc ", " cancel "),
        ]
    } else {
        match app.input_mode() {
            InputMode::Editing => vec![
                (" Enter ", " send "),
                (" Alt+Enter ", " newline "),
                (" Esc ", " stop typing "),
                (" ^S ", " settings "),
                (" ^N ", " new chat "),
            ],
            InputMode::Normal => vec![
                (" j/k ", " scroll "),
                (" i ", " type "),
                (" 1-3 ", " suggest "),
                (" ^R ", " voice "),
                (" ^B ", " sidebar "),
                (" q ", " quit "),
            ],
        }
    };

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
    ];
    for (k, label) in pairs {
        spans.push(Span::styled(k, key_style));
        spans.push(Span::styled(label, label_style));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn slider(value: f64) -> String {
    let filled = ((value / 2.0) * SLIDER_CELLS as f64).round() as usize;
    let filled = filled.min(SLIDER_CELLS);
    format!("{}●{}", "━".repeat(filled), "─".repeat(SLIDER_CELLS - filled))
}

fn render_settings(form: &SettingsForm, frame: &mut Frame, area: Rect) {
    // Calculate popup size and position (centered)
    let popup_width = 50.min(area.width.saturating_sub(4));
    let popup_height = 11.min(area.height.saturating_sub(2));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Settings ");

    let field_style = |field: SettingsField| {
        if form.field == field {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };
    let max_tokens = if form.field == SettingsField::MaxTokens {
        format!("{}_", form.max_tokens)
    } else {
        form.max_tokens.clone()
    };

    let lines = vec![
        Line::from(Span::styled(" Model ", field_style(SettingsField::Model))),
        Line::from(format!("  < {} >", form.model())),
        Line::default(),
        Line::from(Span::styled(" Temperature ", field_style(SettingsField::Temperature))),
        Line::from(format!("  {} {:.1}", slider(form.temperature), form.temperature)),
        Line::default(),
        Line::from(Span::styled(" Max tokens ", field_style(SettingsField::MaxTokens))),
        Line::from(format!("  {max_tokens}")),
        Line::from(Span::styled(
            "Enter to save, Esc to cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    frame.render_widget(Paragraph::new(lines).block(block), popup_area);
}

/// Message plus borders and padding, never wider than `max`.
fn toast_width(message: &str, max: u16) -> u16 {
    let wanted = message.chars().count().saturating_add(4);
    wanted.min(usize::from(max)) as u16
}

fn render_toast(notice: &Notice, frame: &mut Frame, area: Rect) {
    let color = match notice.kind {
        NoticeKind::Success => Color::Green,
        NoticeKind::Error => Color::Red,
    };

    let width = toast_width(&notice.message, area.width);
    let height = 3.min(area.height);
    let toast_area = Rect::new(
        area.x + area.width.saturating_sub(width + 1),
        area.y + area.height.saturating_sub(height + 1),
        width,
        height,
    );

    frame.render_widget(Clear, toast_area);
    let toast = Paragraph::new(notice.message.as_str())
        .style(Style::default().fg(color))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        );
    frame.render_widget(toast, toast_area);
}
