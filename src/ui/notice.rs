//! Full-screen notice for messages the user has to acknowledge.
//!
//! Red background with centered white text, dismissed by any key.

use ratatui::{prelude::*, widgets::Paragraph};

const NOTICE_BG: Color = Color::Rgb(237, 66, 69);

/// Draws `message` over the whole frame.
pub fn render_notice(frame: &mut Frame, message: &str) {
    let area = frame.area();

    frame.render_widget(
        ratatui::widgets::Block::default().style(Style::default().bg(NOTICE_BG)),
        area,
    );

    let mut lines: Vec<Line> = message
        .lines()
        .map(|line| {
            Line::from(Span::styled(
                line.to_string(),
                Style::default().fg(Color::Rgb(255, 255, 255)).bg(NOTICE_BG),
            ))
        })
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "press any key",
        Style::default().fg(Color::Rgb(255, 220, 220)).bg(NOTICE_BG),
    )));

    let padding_x = area.width / 10;
    let text_width = (area.width * 80) / 100;
    let centered_area = Rect {
        x: area.x + padding_x,
        y: area.y + area.height / 3,
        width: text_width,
        height: area.height - area.height / 3,
    };

    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(ratatui::widgets::Wrap { trim: true });
    frame.render_widget(paragraph, centered_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;

    #[test]
    fn notice_text_is_drawn() {
        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        terminal
            .draw(|frame| render_notice(frame, "Could not access microphone."))
            .unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("Could not access microphone."));
        assert!(text.contains("press any key"));
    }
}
