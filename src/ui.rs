use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
    },
    Frame,
};

use crate::app::{App, ChatRole, FocusPane};
use crate::markdown;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Input grows with its content, within reason
    let input_lines = app.input.split('\n').count() as u16;
    let input_height = (input_lines + 2).clamp(3, 8);

    let [header_area, endpoint_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Min(0),
        Constraint::Length(input_height),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(frame, header_area);
    render_endpoint(app, frame, endpoint_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" MCP Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_endpoint(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Endpoint;
    let border_color = if focused { Color::Yellow } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Endpoint ");

    // Horizontal scroll keeps the cursor visible in a long URL
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.endpoint_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .endpoint_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let field = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);

    frame.render_widget(field, area);

    if focused {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Chat;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Conversation ");

    let inner = block.inner(area);
    app.chat_height = inner.height;
    app.chat_width = inner.width;

    if app.messages.is_empty() {
        let placeholder = Paragraph::new("Type your question or prompt below...")
            .style(Style::default().fg(Color::Gray))
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let lines = transcript_lines(app);
    app.total_chat_lines = wrapped_line_count(&lines, app.chat_width);
    if app.follow_chat {
        app.chat_scroll = app.max_chat_scroll();
    }

    let chat = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);

    if app.total_chat_lines > app.chat_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state = ScrollbarState::new(app.total_chat_lines as usize)
            .position(app.chat_scroll as usize);

        frame.render_stateful_widget(
            scrollbar,
            area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn transcript_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for msg in &app.messages {
        let label_style = match msg.role {
            ChatRole::User => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ChatRole::Assistant => Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        };
        lines.push(Line::from(Span::styled(
            format!("{}:", msg.label),
            label_style,
        )));

        let is_pending = app.awaiting_message_id() == Some(msg.id);
        if is_pending {
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", app.thinking_dots()),
                Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::ITALIC),
            )));
        } else {
            match msg.role {
                ChatRole::User => {
                    for line in msg.content.lines() {
                        lines.push(Line::from(line.to_string()));
                    }
                }
                ChatRole::Assistant => {
                    lines.extend(markdown::render_markdown(&msg.content));
                }
            }
        }

        lines.push(Line::default());
    }

    lines
}

/// Estimate how many terminal rows the transcript occupies once wrapped, for
/// the stick-to-bottom scroll clamp. Character counts, not byte lengths.
fn wrapped_line_count(lines: &[Line], width: u16) -> u16 {
    let width = width.max(1) as usize;
    let mut total: u16 = 0;
    for line in lines {
        let char_count: usize = line.spans.iter().map(|s| s.content.chars().count()).sum();
        if char_count == 0 {
            total += 1;
        } else {
            total += ((char_count - 1) / width + 1) as u16;
        }
    }
    total
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Input;
    let border_color = if focused { Color::Yellow } else { Color::DarkGray };

    let title = if app.is_awaiting_reply() {
        " Prompt (waiting for reply) "
    } else {
        " Prompt "
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let text = Text::from(
        app.input
            .split('\n')
            .map(|line| Line::from(line.to_string()))
            .collect::<Vec<_>>(),
    );

    let input = Paragraph::new(text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);

    frame.render_widget(input, area);

    if focused {
        let (row, col) = input_cursor_position(&app.input, app.input_cursor);
        let inner_width = area.width.saturating_sub(2);
        let inner_height = area.height.saturating_sub(2);
        frame.set_cursor_position((
            area.x + 1 + col.min(inner_width.saturating_sub(1)),
            area.y + 1 + row.min(inner_height.saturating_sub(1)),
        ));
    }
}

/// (row, column) of the cursor within the multiline input, in characters.
fn input_cursor_position(input: &str, cursor: usize) -> (u16, u16) {
    let mut row: u16 = 0;
    let mut col: u16 = 0;
    for c in input.chars().take(cursor) {
        if c == '\n' {
            row += 1;
            col = 0;
        } else {
            col += 1;
        }
    }
    (row, col)
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.focus {
        FocusPane::Input => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Shift+Enter ", key_style),
            Span::styled(" newline ", label_style),
            Span::styled(" Tab ", key_style),
            Span::styled(" focus ", label_style),
            Span::styled(" Ctrl+C ", key_style),
            Span::styled(" quit ", label_style),
        ],
        FocusPane::Endpoint => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" done ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" back ", label_style),
            Span::styled(" Tab ", key_style),
            Span::styled(" focus ", label_style),
        ],
        FocusPane::Chat => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" g/G ", key_style),
            Span::styled(" top/bottom ", label_style),
            Span::styled(" i ", key_style),
            Span::styled(" prompt ", label_style),
            Span::styled(" e ", key_style),
            Span::styled(" endpoint ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
    };

    let mode_style = Style::default().bg(Color::Blue).fg(Color::White);
    let mode_text = match app.focus {
        FocusPane::Input => " PROMPT ",
        FocusPane::Endpoint => " ENDPOINT ",
        FocusPane::Chat => " CHAT ",
    };

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
