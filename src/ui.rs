use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};

use vikey::textbuf::TextBuffer;

use crate::App;

/// Render the editor state to the terminal.
pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Split into text area (all but last row) and status bar (last row).
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // text area
            Constraint::Length(1), // status bar
        ])
        .split(area);

    draw_text_area(frame, app, chunks[0]);
    draw_status_bar(frame, app, chunks[1]);
}

/// The width of the line number gutter, including the trailing space.
fn gutter_width(line_count: usize) -> u16 {
    let digits = if line_count == 0 {
        1
    } else {
        (line_count as f64).log10().floor() as u16 + 1
    };
    digits + 1 // one space of padding after the number
}

fn draw_text_area(frame: &mut Frame, app: &App, area: Rect) {
    let viewport_height = area.height as usize;
    let scroll = app.buffer.scroll_offset();
    let gutter_w = gutter_width(app.buffer.line_count());

    let mut lines: Vec<Line> = Vec::with_capacity(viewport_height);

    for i in 0..viewport_height {
        let file_line = scroll + i;
        if file_line < app.buffer.line_count() {
            let line_num = format!(
                "{:>width$} ",
                file_line + 1,
                width = (gutter_w - 1) as usize
            );
            let spans = vec![
                Span::styled(line_num, Style::default().fg(Color::DarkGray)),
                Span::raw(app.buffer.line_text(file_line)),
            ];
            lines.push(Line::from(spans));
        } else {
            // Filler rows past the end of the file
            let padding = " ".repeat((gutter_w - 1) as usize);
            lines.push(Line::from(vec![
                Span::styled(format!("{padding} "), Style::default().fg(Color::DarkGray)),
                Span::styled("-", Style::default().fg(Color::DarkGray)),
            ]));
        }
    }

    let paragraph = Paragraph::new(lines).block(Block::default());
    frame.render_widget(paragraph, area);

    if app.prompt.is_none() {
        let caret = app.buffer.pos();
        let row = app.buffer.line_of(caret);
        let col = caret - app.buffer.line_start(row);
        let cursor_x = area.x + gutter_w + col as u16;
        let cursor_y = area.y + row.saturating_sub(scroll) as u16;
        frame.set_cursor_position((cursor_x, cursor_y));
    }
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    // An open prompt takes over the whole status row, vi style.
    if let Some(prompt) = &app.prompt {
        let text = format!("{}{}", prompt.leader(), prompt.input);
        let cursor_x = area.x + text.chars().count() as u16;
        frame.render_widget(Paragraph::new(text), area);
        frame.set_cursor_position((cursor_x, area.y));
        return;
    }

    let filename = app.buffer.filename().map_or_else(
        || "[no name]".to_string(),
        |p| {
            p.file_name()
                .map_or_else(|| p.display().to_string(), |f| f.to_string_lossy().to_string())
        },
    );

    let caret = app.buffer.pos();
    let row = app.buffer.line_of(caret);
    let col = caret - app.buffer.line_start(row);
    let position = format!("{}:{}", row + 1, col + 1);

    let mode_str = format!(" {} ", app.status);
    let status = format!(" {filename}");
    // Right-align position info
    let spacing_len =
        (area.width as usize).saturating_sub(mode_str.len() + status.len() + position.len() + 1);
    let spacing = " ".repeat(spacing_len);

    let status_line = Line::from(vec![
        Span::styled(
            mode_str,
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{status}{spacing}{position} "),
            Style::default().bg(Color::DarkGray).fg(Color::White),
        ),
    ]);

    let paragraph = Paragraph::new(status_line);
    frame.render_widget(paragraph, area);
}
