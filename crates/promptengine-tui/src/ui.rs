use ratatui::{
    Frame,
    layout::{Constraint, Layout, Margin, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, List, ListItem, ListState, Paragraph, Scrollbar,
        ScrollbarOrientation, ScrollbarState, Wrap,
    },
};
use promptengine_core::history::format_timestamp;
use promptengine_core::ChatRole;
use crate::app::{App, AuthField, FocusPane, InputMode, KnowledgeInput, Screen, TextInput};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            // Consume the second *
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;

            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else if c == '#' && current_text.is_empty() && spans.is_empty() {
            // Heading line: drop the hashes and bold the rest
            let rest: String = chars.by_ref().collect();
            let heading = rest.trim_start_matches('#').trim().to_string();
            return Line::from(Span::styled(
                heading,
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ));
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn thinking(app: &App, label: &str) -> String {
    // Animated ellipsis: cycles through ".", "..", "..."
    format!("{}{}", label, ".".repeat((app.animation_frame as usize) + 1))
}

/// Rectangle of the given size centered in `area`
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

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

    match app.screen {
        Screen::Login | Screen::Signup => render_auth_screen(app, frame, body_area),
        Screen::Generator => {
            if app.workspace.is_active() {
                render_workspace(app, frame, body_area);
            } else {
                render_hero(app, frame, body_area);
            }
        }
        Screen::Knowledge => render_knowledge_screen(app, frame, body_area),
        Screen::History => render_history_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    if let Some(notice) = app.voice.notice.clone() {
        render_notice(frame, area, &notice);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(" Prompt Engine ", Style::default().fg(Color::Cyan).bold()),
        Span::raw(" "),
    ];

    // Navbar
    if app.screen.is_protected() {
        for (key, screen) in [
            ("F1", Screen::Generator),
            ("F2", Screen::Knowledge),
            ("F3", Screen::History),
        ] {
            let style = if app.screen == screen {
                Style::default().bg(Color::Cyan).fg(Color::Black).bold()
            } else {
                Style::default().fg(Color::Gray)
            };
            spans.push(Span::styled(format!(" {} {} ", key, screen.title()), style));
            spans.push(Span::raw(" "));
        }
    }

    spans.push(Span::styled(
        format!("v{}", env!("CARGO_PKG_VERSION")),
        Style::default().fg(Color::DarkGray),
    ));

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Login => " LOGIN ",
        Screen::Signup => " SIGNUP ",
        Screen::Generator if app.workspace.is_active() => " WORKSPACE ",
        Screen::Generator => " GENERATE ",
        Screen::Knowledge => " KNOWLEDGE ",
        Screen::History => " HISTORY ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: Vec<(&str, &str)> = match (app.screen, app.input_mode) {
        (Screen::Login, _) => vec![
            ("Tab", "field"),
            ("Enter", "sign in"),
            ("^G", "GitHub"),
            ("^O", "Google"),
            ("^N", "sign up"),
            ("^P", "show password"),
        ],
        (Screen::Signup, _) => vec![
            ("Tab", "field"),
            ("Enter", "create"),
            ("^P", "show password"),
            ("Esc", "sign in"),
        ],
        (Screen::Generator, InputMode::Editing) if app.workspace.is_active() => match app.focus {
            FocusPane::Chat => vec![("Enter", "refine"), ("Tab", "draft"), ("Esc", "stop typing")],
            FocusPane::Draft => vec![("Enter", "newline"), ("Tab", "chat"), ("Esc", "stop typing")],
        },
        (Screen::Generator, InputMode::Editing) => vec![
            ("Enter", "generate"),
            ("Tab", "model"),
            ("S-Tab", "mode"),
            ("^R", "voice"),
            ("Esc", "stop typing"),
        ],
        (Screen::Generator, InputMode::Normal) if app.workspace.is_active() => vec![
            ("i", "edit"),
            ("Tab", "focus"),
            ("j/k", "scroll"),
            ("c", if app.show_context { "hide context" } else { "context" }),
            ("y", "copy draft"),
            ("r", "regenerate"),
            ("b", "back"),
            ("F10", "logout"),
        ],
        (Screen::Generator, InputMode::Normal) => vec![
            ("i", "edit"),
            ("m", "model"),
            ("o", "mode"),
            ("v", "voice"),
            ("F10", "logout"),
            ("q", "quit"),
        ],
        (Screen::Knowledge, InputMode::Editing) => vec![
            ("Enter", "upload"),
            ("Tab", "files/note"),
            ("Esc", "stop typing"),
        ],
        (Screen::Knowledge, InputMode::Normal) => vec![
            ("j/k", "browse"),
            ("i", "edit"),
            ("Tab", "files/note"),
            ("x", "dismiss"),
            ("F10", "logout"),
            ("q", "quit"),
        ],
        (Screen::History, _) => vec![
            ("j/k", "nav"),
            ("Enter", "expand"),
            ("c", "continue"),
            ("r", "reload"),
            ("F10", "logout"),
            ("q", "quit"),
        ],
    };

    let hints = pairs.into_iter().flat_map(|(key, label)| {
        [
            Span::styled(format!(" {} ", key), key_style),
            Span::styled(format!(" {} ", label), label_style),
        ]
    });

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

/// Bordered single-line input with horizontal scrolling and cursor placement
fn render_input(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    input: &TextInput,
    focused: bool,
    show_cursor: bool,
    mask: bool,
) {
    let border_color = if focused { Color::Yellow } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" {} ", title));

    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = input.cursor;

    // Scroll offset that keeps the cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = if mask {
        "*".repeat(input.value.chars().count().saturating_sub(scroll_offset).min(inner_width))
    } else {
        input
            .value
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect()
    };

    let paragraph = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(paragraph, area);

    if focused && show_cursor {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_auth_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let is_login = app.screen == Screen::Login;
    let card = centered(area, 64, if is_login { 22 } else { 16 });
    frame.render_widget(Clear, card);

    let (title, subtitle) = if is_login {
        (" Welcome back ", "Sign in to your account")
    } else {
        (" Create account ", "Sign up to start generating prompts")
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);
    let inner = block.inner(card);
    frame.render_widget(block, card);

    let mut constraints = vec![
        Constraint::Length(1), // subtitle
        Constraint::Length(3), // email
        Constraint::Length(3), // password
    ];
    if is_login {
        constraints.push(Constraint::Length(3)); // callback URL
    }
    constraints.push(Constraint::Min(0)); // messages
    let rows = Layout::vertical(constraints).split(inner);

    frame.render_widget(
        Paragraph::new(subtitle).style(Style::default().fg(Color::DarkGray)),
        rows[0],
    );

    let password_title = if app.show_password {
        "Password (^P to hide)"
    } else {
        "Password (^P to show)"
    };
    render_input(frame, rows[1], "Email", &app.email, app.auth_field == AuthField::Email, true, false);
    render_input(
        frame,
        rows[2],
        password_title,
        &app.password,
        app.auth_field == AuthField::Password,
        true,
        !app.show_password,
    );
    if is_login {
        render_input(
            frame,
            rows[3],
            "OAuth callback URL (paste after ^G / ^O)",
            &app.callback,
            app.auth_field == AuthField::Callback,
            true,
            false,
        );
    }

    let mut lines: Vec<Line> = Vec::new();
    if app.auth_pending {
        let label = if is_login { "Signing in" } else { "Creating account" };
        lines.push(Line::from(Span::styled(
            thinking(app, label),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }
    if let Some(error) = &app.auth_error {
        lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
    }
    if let Some(notice) = &app.auth_notice {
        lines.push(Line::from(Span::styled(notice.clone(), Style::default().fg(Color::Green))));
    }
    if let Some(url) = &app.oauth_url {
        lines.push(Line::from(Span::styled(url.clone(), Style::default().fg(Color::Blue))));
    }
    if is_login && lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "Don't have an account? Press ^N to sign up.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let messages = Paragraph::new(lines).wrap(Wrap { trim: true });
    let last = rows[rows.len() - 1];
    frame.render_widget(messages, last.inner(Margin { vertical: 0, horizontal: 1 }));
}

fn model_line(app: &App) -> Line<'static> {
    Line::from(vec![
        Span::styled("Model: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.workspace.model.display_name(), Style::default().fg(Color::Green).bold()),
        Span::styled("   Mode: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.workspace.mode.display_name(), Style::default().fg(Color::Magenta).bold()),
    ])
}

fn render_hero(app: &mut App, frame: &mut Frame, area: Rect) {
    let card = centered(area, 90, 14);

    let [title_area, input_area, model_area, status_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(2),
        Constraint::Min(0),
    ])
    .areas(card);

    let title = Paragraph::new(vec![
        Line::from(Span::styled(
            "What do you want to build?",
            Style::default().fg(Color::Cyan).bold(),
        )),
        Line::from(Span::styled(
            "Describe the task and get an engineered prompt grounded in your knowledge base.",
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .centered();
    frame.render_widget(title, title_area);

    let input_title = if app.voice.is_listening() {
        "Your request (listening...)"
    } else {
        "Your request"
    };
    let editing = app.input_mode == InputMode::Editing;
    render_input(frame, input_area, input_title, &app.query, editing, editing, false);

    frame.render_widget(Paragraph::new(model_line(app)).centered(), model_area);

    let mut lines: Vec<Line> = Vec::new();
    if !app.voice.interim.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("Heard: {}", app.voice.interim),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }
    if app.workspace.is_generating() {
        lines.push(Line::from(Span::styled(
            thinking(app, "Generating"),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        )));
    }
    if let Some(error) = &app.workspace.error {
        lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
    }
    frame.render_widget(Paragraph::new(lines).centered().wrap(Wrap { trim: true }), status_area);
}

fn render_workspace(app: &mut App, frame: &mut Frame, area: Rect) {
    // Split layout: editable draft on the left, refinement chat on the right
    let [draft_area, chat_side] = Layout::horizontal([
        Constraint::Percentage(55),
        Constraint::Percentage(45),
    ])
    .areas(area);

    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(chat_side);

    if app.show_context {
        let [draft_area, context_area] = Layout::vertical([
            Constraint::Percentage(60),
            Constraint::Percentage(40),
        ])
        .areas(draft_area);
        render_draft(app, frame, draft_area);
        render_context(app, frame, context_area);
    } else {
        render_draft(app, frame, draft_area);
    }

    render_chat(app, frame, chat_area);

    let editing_chat = app.input_mode == InputMode::Editing && app.focus == FocusPane::Chat;
    let refine_title = if app.voice.is_listening() {
        "Refine (listening...)"
    } else {
        "Refine (e.g. make it shorter)"
    };
    render_input(
        frame,
        input_area,
        refine_title,
        &app.instruction,
        editing_chat,
        editing_chat,
        false,
    );
}

fn render_draft(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Draft;
    let editing = focused && app.input_mode == InputMode::Editing;
    let border_color = if editing {
        Color::Yellow
    } else if focused {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let mut title = format!(
        " Draft: {} / {} ",
        app.workspace.model.display_name(),
        app.workspace.mode.display_name()
    );
    if app.workspace.is_generating() {
        title = format!(" {} ", thinking(app, "Regenerating"));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);
    let inner = block.inner(area);

    if editing && inner.height > 0 && inner.width > 0 {
        // No wrapping while editing so the cursor maps onto rows and columns
        let before = app.draft.before_cursor();
        let cursor_row = before.matches('\n').count() as u16;
        let cursor_col = before.rsplit('\n').next().unwrap_or_default().chars().count() as u16;

        if cursor_row < app.draft_scroll {
            app.draft_scroll = cursor_row;
        } else if cursor_row >= app.draft_scroll + inner.height {
            app.draft_scroll = cursor_row + 1 - inner.height;
        }
        let col_offset = cursor_col.saturating_sub(inner.width.saturating_sub(1));

        let paragraph = Paragraph::new(app.draft.value.as_str())
            .block(block)
            .scroll((app.draft_scroll, col_offset));
        frame.render_widget(paragraph, area);
        frame.set_cursor_position((
            inner.x + cursor_col - col_offset,
            inner.y + cursor_row - app.draft_scroll,
        ));
        return;
    }

    let lines: Vec<Line> = app
        .workspace
        .result
        .draft
        .lines()
        .map(parse_markdown_line)
        .collect();
    let total_lines = lines.len() as u16;

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.draft_scroll, 0));
    frame.render_widget(paragraph, area);

    if total_lines > inner.height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));
        let mut scrollbar_state = ScrollbarState::new(total_lines as usize)
            .position(app.draft_scroll as usize);
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

fn render_context(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(format!(
            " Sources ({}) / Context ({}) ",
            app.workspace.result.sources.len(),
            app.workspace.result.context.len()
        ));

    let mut lines: Vec<Line> = Vec::new();
    for source in &app.workspace.result.sources {
        lines.push(Line::from(vec![
            Span::styled("* ", Style::default().fg(Color::Magenta)),
            Span::styled(source.clone(), Style::default().fg(Color::Yellow)),
        ]));
    }
    if !app.workspace.result.context.is_empty() {
        lines.push(Line::default());
    }
    for chunk in &app.workspace.result.context {
        lines.push(Line::from(Span::styled(
            chunk.clone(),
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::default());
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "No retrieved context for this draft.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store area for mouse hit-testing and scroll calculations (inner size minus borders)
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let focused = app.focus == FocusPane::Chat;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Refinement chat ");

    let chat_text = if app.workspace.transcript.is_empty() && !app.workspace.is_refining() {
        Text::from(Span::styled(
            "Ask for changes to the draft...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in &app.workspace.transcript {
            match msg.role {
                ChatRole::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    lines.push(Line::from(msg.content.clone()));
                    lines.push(Line::default());
                }
                ChatRole::Assistant => {
                    lines.push(Line::from(Span::styled(
                        "AI:",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(parse_markdown_line(line));
                    }
                    lines.push(Line::default());
                }
            }
        }

        if app.workspace.is_refining() {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(Span::styled(
                thinking(app, "Thinking"),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_knowledge_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [input_area, banner_area, gallery_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Min(0),
    ])
    .areas(area);

    let editing = app.input_mode == InputMode::Editing;
    let (title, input) = match app.knowledge_input {
        KnowledgeInput::Paths => (
            "Drop or type files to upload (png, jpg, jpeg, webp, pdf)",
            &app.paths,
        ),
        KnowledgeInput::Note => ("Add a text note to the knowledge base", &app.note),
    };
    render_input(frame, input_area, title, input, editing, editing, false);

    let banner = if app.uploads_in_flight > 0 {
        Line::from(Span::styled(
            thinking(app, " Uploading"),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        ))
    } else if let Some(banner) = &app.upload_banner {
        let color = if banner.is_error() { Color::Red } else { Color::Green };
        Line::from(Span::styled(format!(" {}", banner.text()), Style::default().fg(color)))
    } else {
        Line::default()
    };
    frame.render_widget(Paragraph::new(banner), banner_area);

    render_gallery(app, frame, gallery_area);
}

fn render_gallery(app: &mut App, frame: &mut Frame, area: Rect) {
    app.list_area = Some(area);

    let count = app
        .gallery
        .total
        .map(|n| n.to_string())
        .unwrap_or_else(|| app.gallery.documents.len().to_string());
    let mut title = format!(" Knowledge base ({}) ", count);
    if let Some(error) = &app.gallery.error {
        title = format!(" Knowledge base ({}) - {} ", count, error);
    }
    let border_color = if app.gallery.error.is_some() { Color::Red } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    if app.gallery.is_empty() {
        let placeholder = Paragraph::new("No documents yet. Upload a file to get started.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let preview_width = area.width.saturating_sub(8) as usize;
    let items: Vec<ListItem> = app
        .gallery
        .documents
        .iter()
        .map(|doc| {
            let kind = if doc.is_image() { "[img]" } else { "[doc]" };
            let page = doc
                .metadata
                .page
                .map(|p| format!("  p.{}", p))
                .unwrap_or_default();
            let preview: String = doc
                .preview
                .chars()
                .map(|c| if c.is_whitespace() { ' ' } else { c })
                .take(preview_width)
                .collect();
            ListItem::new(vec![
                Line::from(vec![
                    Span::styled(format!("{} ", kind), Style::default().fg(Color::Magenta)),
                    Span::styled(doc.metadata.source.clone(), Style::default().fg(Color::Yellow).bold()),
                    Span::styled(page, Style::default().fg(Color::DarkGray)),
                ]),
                Line::from(Span::styled(preview, Style::default().fg(Color::Gray))),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.gallery_state);
}

fn render_history_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    app.list_area = Some(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" History ({}) ", app.history.records.len()));

    if app.history.loading {
        let placeholder = Paragraph::new(thinking(app, "Loading history"))
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }
    if let Some(error) = &app.history.error {
        let placeholder = Paragraph::new(format!("{}\nPress 'r' to retry.", error))
            .style(Style::default().fg(Color::Red))
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }
    if app.history.records.is_empty() {
        let placeholder = Paragraph::new("No history yet. Generate a prompt to get started.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let width = area.width.saturating_sub(6) as usize;
    let items: Vec<ListItem> = app
        .history
        .records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let expanded = app.history.is_expanded(i);
            let marker = if expanded { "v " } else { "> " };
            let summary: String = record.user.lines().next().unwrap_or_default().chars().take(width).collect();

            let mut lines = vec![Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::DarkGray)),
                Span::styled(summary, Style::default().fg(Color::Cyan).bold()),
                Span::styled(
                    format!("  {}", format_timestamp(&record.timestamp)),
                    Style::default().fg(Color::DarkGray),
                ),
            ])];

            if expanded {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                lines.extend(record.user.lines().map(|l| Line::from(format!("  {}", l))));
                lines.push(Line::from(Span::styled(
                    "AI:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                lines.extend(record.ai.lines().map(|l| {
                    let mut line = parse_markdown_line(l);
                    line.spans.insert(0, Span::raw("  "));
                    line
                }));
                lines.push(Line::from(Span::styled(
                    "Press 'c' to continue this conversation",
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
                lines.push(Line::default());
            }
            ListItem::new(lines)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray));

    let mut state = ListState::default().with_selected(Some(app.history.selected));
    frame.render_stateful_widget(list, area, &mut state);
}

/// One-off notice box (voice capability missing, recognizer errors)
fn render_notice(frame: &mut Frame, area: Rect, notice: &str) {
    let popup_area = centered(area, 60, 5);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Voice input ");

    let text = Paragraph::new(vec![
        Line::from(notice.to_string()),
        Line::from(Span::styled(
            "Press x (normal mode) to dismiss",
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .block(block)
    .wrap(Wrap { trim: true });

    frame.render_widget(text, popup_area);
}
