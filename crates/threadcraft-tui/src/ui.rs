use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use threadcraft_core::Role;
use crate::app::{App, EditorField, FocusPane, InputMode, Screen, TextField};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        match after.find("**") {
            Some(end) if end > 0 => {
                if start > 0 {
                    spans.push(Span::raw(rest[..start].to_string()));
                }
                spans.push(Span::styled(
                    after[..end].to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                ));
                rest = &after[end + 2..];
            }
            // No closing **, treat as literal
            _ => break,
        }
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    Line::from(spans)
}

/// Centered popup rectangle clamped to the frame
fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
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

    // Saved panel docks on the right of either screen
    let main_area = if app.show_saved_panel {
        let [main_area, saved_area] = Layout::horizontal([
            Constraint::Percentage(65),
            Constraint::Percentage(35),
        ])
        .areas(body_area);
        render_saved_panel(app, frame, saved_area);
        main_area
    } else {
        body_area
    };

    match app.screen {
        Screen::Compose => render_compose_screen(app, frame, main_area),
        Screen::Chat => render_chat_screen(app, frame, main_area),
    }

    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if app.api_key_input.is_some() {
        render_api_key_input(app, frame, area);
    } else if app.editor.is_some() {
        render_template_editor(app, frame, area);
    } else if app.rename_input.is_some() {
        render_rename_input(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let saved_indicator = if app.saved.is_empty() {
        String::new()
    } else {
        format!(" [{} saved]", app.saved.len())
    };

    let client = app.session.client();
    let model = if client.is_available() {
        Span::styled(format!(" {} ", client.model()), Style::default().fg(Color::Green))
    } else {
        Span::styled(" no API key (K) ", Style::default().fg(Color::Red))
    };

    let title = Line::from(vec![
        Span::styled(" threadcraft ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(saved_indicator, Style::default().fg(Color::Gray)),
        model,
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // A status message replaces the hints until the next key press
    if let Some(status) = &app.status {
        let footer = Paragraph::new(Line::from(Span::styled(
            format!(" {} ", status),
            Style::default().fg(Color::Yellow),
        )))
        .style(Style::default().bg(Color::Black));
        frame.render_widget(footer, area);
        return;
    }

    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Compose => " COMPOSE ",
        Screen::Chat => " THREAD ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [Span::styled(key, key_style), Span::styled(label, label_style)]
    };

    let pairs: Vec<[Span; 2]> = if app.api_key_input.is_some() || app.rename_input.is_some() {
        vec![hint(" Enter ", " save "), hint(" Esc ", " cancel ")]
    } else if app.editor.is_some() {
        vec![
            hint(" Tab ", " field "),
            hint(" ^S ", " save "),
            hint(" ^R ", " reset "),
            hint(" Esc ", " cancel "),
        ]
    } else if app.focus == FocusPane::Saved && app.input_mode == InputMode::Normal {
        vec![
            hint(" j/k ", " nav "),
            hint(" c ", " copy "),
            hint(" d ", " remove "),
            hint(" Tab ", " focus "),
            hint(" S ", " hide saved "),
        ]
    } else {
        match (app.screen, app.input_mode) {
            (Screen::Compose, InputMode::Normal) => vec![
                hint(" j/k ", " style "),
                hint(" i ", " write "),
                hint(" g ", " generate "),
                hint(" e ", " template "),
                hint(" r ", " rename "),
                hint(" n ", " new style "),
                hint(" S ", " saved "),
                hint(" q ", " quit "),
            ],
            (Screen::Compose, InputMode::Editing) => vec![
                hint(" Enter ", " generate "),
                hint(" Alt+Enter ", " newline "),
                hint(" Esc ", " stop typing "),
            ],
            (Screen::Chat, InputMode::Normal) => vec![
                hint(" j/k ", " select "),
                hint(" c ", " copy "),
                hint(" s ", " save "),
                hint(" i ", " refine "),
                hint(" n ", " new thread "),
                hint(" S ", " saved "),
                hint(" q ", " quit "),
            ],
            (Screen::Chat, InputMode::Editing) => vec![
                hint(" Enter ", " send "),
                hint(" Esc ", " stop typing "),
            ],
        }
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(pairs.into_iter().flatten())
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_compose_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [styles_area, input_area] = Layout::horizontal([
        Constraint::Percentage(35),
        Constraint::Percentage(65),
    ])
    .areas(area);

    render_style_list(app, frame, styles_area);

    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let style_name = app.templates.display_name(&app.selected_style).to_string();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" Your messy thoughts \u{2192} {} ", style_name));

    let text = if app.compose_input.text.is_empty() && !editing {
        Text::from(vec![
            Line::from(Span::styled(
                "Type your messy thoughts here... (press i)",
                Style::default().fg(Color::DarkGray),
            )),
            Line::default(),
            Line::from(Span::styled(
                "Pro tip: Don't worry about grammar. Just dump your brain.",
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )),
        ])
    } else {
        Text::from(app.compose_input.text.clone())
    };

    let input = Paragraph::new(text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, input_area);

    if editing {
        place_cursor(frame, input_area, &app.compose_input);
    }
}

fn render_style_list(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Styles && app.screen == Screen::Compose;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Styles ");

    let items: Vec<ListItem> = app
        .templates
        .styles()
        .map(|(key, config)| {
            let name_style = if *key == app.selected_style {
                Style::default().fg(Color::Green).bold()
            } else {
                Style::default().fg(Color::Yellow).bold()
            };
            ListItem::new(vec![
                Line::from(Span::styled(config.name.clone(), name_style)),
                Line::from(Span::styled(
                    config.description.clone(),
                    Style::default().fg(Color::Gray),
                )),
                Line::default(),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::Blue).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.style_state);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let focused = app.focus == FocusPane::Transcript;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let style_name = app.templates.display_name(&app.selected_style).to_string();

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" Thread \u{00B7} {} ", style_name));

    let mut lines: Vec<Line> = Vec::new();
    for (i, msg) in app.session.transcript().iter().enumerate() {
        let selected = app.selected_message == Some(i);
        match msg.role {
            Role::User => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(msg.content.as_str()));
            }
            Role::Model => {
                let marker = if selected { "\u{25B6} Thread:" } else { "Thread:" };
                let label_style = if selected {
                    Style::default().fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                };
                lines.push(Line::from(Span::styled(marker, label_style)));
                // Split response into lines and parse markdown
                for line in msg.content.lines() {
                    lines.push(parse_markdown_line(line));
                }
            }
        }
        lines.push(Line::default());
    }

    if app.is_processing() {
        lines.push(Line::from(Span::styled(
            "Thread:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Writing{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    // Refinement input at the bottom
    let editing = app.input_mode == InputMode::Editing;
    let input_border_color = if editing {
        Color::Yellow
    } else if app.is_processing() {
        Color::Black
    } else {
        Color::DarkGray
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border_color))
        .title(" Not quite right? Ask for changes (i) ");

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.refine_input.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = if app.refine_input.text.is_empty() && !editing {
        "e.g. 'Make it shorter', 'Add more emojis'".to_string()
    } else {
        app.refine_input
            .text
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect()
    };
    let text_color = if app.refine_input.text.is_empty() && !editing {
        Color::DarkGray
    } else {
        Color::Cyan
    };

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(text_color))
        .block(input_block);
    frame.render_widget(input, input_area);

    // Show cursor when editing
    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

fn render_saved_panel(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Saved;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" Saved Threads ({}) ", app.saved.len()));

    if app.saved.is_empty() {
        let placeholder = Paragraph::new("No saved threads yet.\nPress 's' on a reply to save it.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let items: Vec<ListItem> = app
        .saved
        .iter()
        .map(|thread| {
            let preview: String = thread.content.replace('\n', " ").chars().take(60).collect();
            ListItem::new(vec![
                Line::from(vec![
                    Span::styled(
                        app.templates.display_name(&thread.style).to_string(),
                        Style::default().fg(Color::Yellow).bold(),
                    ),
                    Span::styled(
                        format!("  {}", thread.timestamp.format("%H:%M")),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]),
                Line::from(format!("{}...", preview)),
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

    frame.render_stateful_widget(list, area, &mut app.saved_state);
}

fn render_template_editor(app: &App, frame: &mut Frame, area: Rect) {
    let Some(editor) = app.editor.as_ref() else {
        return;
    };

    let popup = popup_area(area, 90, area.height.saturating_sub(4));
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(
            " Prompt Template \u{00B7} {} ",
            app.templates.display_name(&editor.key)
        ));
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let [prompt_area, examples_area] = Layout::vertical([
        Constraint::Percentage(55),
        Constraint::Percentage(45),
    ])
    .areas(inner);

    let fields = [
        (
            EditorField::SystemPrompt,
            " System Prompt (The Persona) ",
            &editor.system_prompt,
            prompt_area,
        ),
        (
            EditorField::Examples,
            " Few-Shot Examples ",
            &editor.examples,
            examples_area,
        ),
    ];

    for (field, title, input, field_area) in fields {
        let active = editor.field == field;
        let border_color = if active { Color::Yellow } else { Color::DarkGray };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color))
            .title(title);

        // Keep the cursor line in view
        let (cursor_line, _) = input.cursor_line_col();
        let visible = field_area.height.saturating_sub(2) as usize;
        let scroll = cursor_line.saturating_sub(visible.saturating_sub(1)) as u16;

        let paragraph = Paragraph::new(input.text.as_str())
            .block(block)
            .scroll((scroll, 0));
        frame.render_widget(paragraph, field_area);

        if active {
            let (line, col) = input.cursor_line_col();
            let y = field_area.y + 1 + (line as u16).saturating_sub(scroll);
            let x = field_area.x + 1 + col as u16;
            frame.set_cursor_position((x.min(field_area.right().saturating_sub(2)), y));
        }
    }
}

fn render_rename_input(app: &App, frame: &mut Frame, area: Rect) {
    let Some(input) = app.rename_input.as_ref() else {
        return;
    };

    let popup = popup_area(area, 50, 3);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Rename Style ");

    let paragraph = Paragraph::new(input.text.as_str())
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(paragraph, popup);

    let cursor_x = input.cursor.min(popup.width.saturating_sub(3) as usize) as u16;
    frame.set_cursor_position((popup.x + 1 + cursor_x, popup.y + 1));
}

fn render_api_key_input(app: &App, frame: &mut Frame, area: Rect) {
    let Some(input) = app.api_key_input.as_ref() else {
        return;
    };

    let popup = popup_area(area, 60, 7);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Enter Gemini API Key ");

    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    // Instructions
    let instructions = Paragraph::new("Paste your API key below. Press Enter to save, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    // Mask the key with asterisks for security (show last 4 chars)
    let char_count = input.text.chars().count();
    let display_text = if char_count <= 4 {
        "*".repeat(char_count)
    } else {
        let masked_len = char_count - 4;
        let last_four: String = input.text.chars().skip(masked_len).collect();
        format!("{}...{}", "*".repeat(masked_len.min(20)), last_four)
    };

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    frame.render_widget(
        Paragraph::new(display_text).style(Style::default().fg(Color::Cyan)),
        input_area,
    );

    let status = Paragraph::new(format!("{} characters", char_count))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(status, Rect::new(inner.x, inner.y + 4, inner.width, 1));
}

fn place_cursor(frame: &mut Frame, area: Rect, field: &TextField) {
    let (line, col) = field.cursor_line_col();
    let x = area.x + 1 + (col as u16).min(area.width.saturating_sub(3));
    let y = area.y + 1 + (line as u16).min(area.height.saturating_sub(3));
    frame.set_cursor_position((x, y));
}
