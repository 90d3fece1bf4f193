//! Terminal trigger control.
//!
//! Draws the record button, its amplitude pulse and a scrolling pulse history.
//! [`IndicatorState`] is the [`TriggerControl`] the capture controller talks to;
//! [`TriggerTui`] reads it on every redraw.

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    style::{Color, Style},
    widgets::{Block, BorderType, Borders, Paragraph, Sparkline},
};
use std::error::Error;
use std::io::{stdout, Stdout};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::trigger::TriggerControl;
use super::visualizations::{IndicatorParams, PulseHistory};
use crate::ui::render_notice;

const ACCENT: (u8, u8, u8) = (237, 66, 69);
const BUTTON_WIDTH: f32 = 16.0;
const BUTTON_HEIGHT: f32 = 5.0;

/// User input on the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCommand {
    /// Nothing to do
    Continue,
    /// Start or stop recording (Space or Enter)
    Toggle,
    /// Leave the application (Escape, 'q' or Ctrl+C)
    Quit,
    /// A pending notice was acknowledged
    Dismiss,
}

#[derive(Debug, Default)]
struct Indicator {
    recording: bool,
    recording_since: Option<Instant>,
    params: IndicatorParams,
    notices: Vec<String>,
    status: Option<String>,
}

/// Shared appearance of the trigger.
#[derive(Debug, Clone, Default)]
pub struct IndicatorState {
    inner: Arc<Mutex<Indicator>>,
}

/// Point-in-time copy of the indicator for one redraw.
#[derive(Debug, Clone)]
pub struct IndicatorSnapshot {
    pub recording: bool,
    pub elapsed: Duration,
    pub params: IndicatorParams,
    pub notice: Option<String>,
    pub status: Option<String>,
}

impl IndicatorState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Indicator> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> IndicatorSnapshot {
        let inner = self.lock();
        IndicatorSnapshot {
            recording: inner.recording,
            elapsed: inner
                .recording_since
                .map(|since| since.elapsed())
                .unwrap_or_default(),
            params: inner.params,
            notice: inner.notices.first().cloned(),
            status: inner.status.clone(),
        }
    }

    /// Drops the oldest pending notice.
    pub fn dismiss_notice(&self) {
        let mut inner = self.lock();
        if !inner.notices.is_empty() {
            inner.notices.remove(0);
        }
    }

    pub fn has_notice(&self) -> bool {
        !self.lock().notices.is_empty()
    }

    /// Footer line shown while idle, e.g. where the last clip went.
    pub fn set_status(&self, status: impl Into<String>) {
        self.lock().status = Some(status.into());
    }
}

impl TriggerControl for IndicatorState {
    fn show_recording(&self) {
        let mut inner = self.lock();
        inner.recording = true;
        inner.recording_since = Some(Instant::now());
        inner.status = None;
    }

    fn show_idle(&self) {
        let mut inner = self.lock();
        inner.recording = false;
        inner.recording_since = None;
        inner.params = IndicatorParams::REST;
    }

    fn apply_intensity(&self, params: IndicatorParams) {
        let mut inner = self.lock();
        if inner.recording {
            inner.params = params;
        }
    }

    fn notify(&self, message: &str) {
        tracing::info!("Notice: {message}");
        self.lock().notices.push(message.to_string());
    }
}

/// Terminal UI hosting the record button.
pub struct TriggerTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    indicator: IndicatorState,
    history: PulseHistory,
    was_recording: bool,
}

impl TriggerTui {
    /// Creates a new TUI instance and enters alternate screen mode.
    ///
    /// # Errors
    /// - If raw mode cannot be enabled or the alternate screen cannot be entered
    pub fn new(indicator: IndicatorState) -> Result<Self, Box<dyn Error>> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        let width = terminal.size()?.width as usize;

        Ok(TriggerTui {
            terminal,
            indicator,
            history: PulseHistory::new(width),
            was_recording: false,
        })
    }

    /// Redraws the button, pulse history and footer.
    pub fn render(&mut self) -> Result<(), Box<dyn Error>> {
        let snapshot = self.indicator.snapshot();

        let width = self.terminal.size()?.width as usize;
        if width != self.history.data().len() {
            self.history.resize(width);
        }
        if snapshot.recording && !self.was_recording {
            self.history.clear();
        }
        self.was_recording = snapshot.recording;
        if snapshot.recording {
            self.history.push((snapshot.params.scale - 1.0) / 0.15);
        }

        let history = self.history.data().to_vec();
        self.terminal.draw(|frame| {
            if let Some(notice) = &snapshot.notice {
                render_notice(frame, notice);
                return;
            }
            draw_trigger(frame, &snapshot, &history);
        })?;
        Ok(())
    }

    /// Polls for a key press without blocking.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(&mut self) -> Result<TriggerCommand, Box<dyn Error>> {
        if !event::poll(Duration::ZERO)? {
            return Ok(TriggerCommand::Continue);
        }
        let Event::Key(key) = event::read()? else {
            return Ok(TriggerCommand::Continue);
        };
        if key.kind != KeyEventKind::Press {
            return Ok(TriggerCommand::Continue);
        }

        if self.indicator.has_notice() {
            self.indicator.dismiss_notice();
            return Ok(TriggerCommand::Dismiss);
        }

        Ok(match key.code {
            KeyCode::Char(' ') | KeyCode::Enter => {
                tracing::debug!("Trigger pressed");
                TriggerCommand::Toggle
            }
            KeyCode::Char('q') | KeyCode::Esc => TriggerCommand::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                tracing::debug!("Ctrl+C pressed: quitting");
                TriggerCommand::Quit
            }
            _ => TriggerCommand::Continue,
        })
    }

    /// Restores the terminal.
    ///
    /// # Errors
    /// - If raw mode cannot be disabled or the cursor cannot be shown
    pub fn cleanup(&mut self) -> Result<(), Box<dyn Error>> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

fn accent(strength: f32) -> Color {
    let s = strength.clamp(0.0, 1.0);
    Color::Rgb(
        (ACCENT.0 as f32 * s) as u8,
        (ACCENT.1 as f32 * s) as u8,
        (ACCENT.2 as f32 * s) as u8,
    )
}

/// Rectangle of `width` x `height` centered in `area`, clipped to it.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Button and glow rectangles for the given pulse.
fn button_geometry(area: Rect, params: IndicatorParams) -> (Rect, Rect) {
    let width = (BUTTON_WIDTH * params.scale).round() as u16;
    let height = (BUTTON_HEIGHT * params.scale).round() as u16;
    // One terminal cell per ten pixels of glow spread.
    let spread = (params.glow_spread / 10.0).round() as u16;
    let button = centered(area, width, height);
    let glow = centered(area, width + spread * 4, height + spread * 2);
    (button, glow)
}

fn draw_trigger(frame: &mut Frame, snapshot: &IndicatorSnapshot, history: &[u64]) {
    let area = frame.area();
    frame.render_widget(
        Block::default().style(Style::default().bg(Color::Rgb(0, 0, 0))),
        area,
    );

    let footer_height = 1;
    let history_height = area.height / 4;
    let stage = Rect {
        height: area.height.saturating_sub(footer_height + history_height),
        ..area
    };

    let (button, glow) = button_geometry(stage, snapshot.params);
    if snapshot.recording && glow != button {
        frame.render_widget(
            Block::default().style(Style::default().bg(accent(snapshot.params.glow_radius / 40.0))),
            glow,
        );
    }

    let (label, border) = if snapshot.recording {
        ("■ STOP", accent(1.0))
    } else {
        ("● MIC", Color::Rgb(185, 207, 212))
    };
    let button_widget = Paragraph::new(label)
        .alignment(Alignment::Center)
        .style(Style::default().fg(border).bg(Color::Rgb(20, 20, 20)))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(border)),
        );
    frame.render_widget(button_widget, button);

    let history_area = Rect {
        x: area.x,
        y: area.y + stage.height,
        width: area.width,
        height: history_height,
    };
    frame.render_widget(
        Sparkline::default()
            .data(history)
            .max(100)
            .style(Style::default().bg(Color::Rgb(0, 0, 0)).fg(accent(0.8))),
        history_area,
    );

    let footer_area = Rect {
        x: area.x,
        y: area.y + area.height.saturating_sub(footer_height),
        width: area.width,
        height: footer_height,
    };
    let secs = snapshot.elapsed.as_secs();
    let mut spans = if snapshot.recording {
        vec![
            Span::styled("● ", Style::default().fg(Color::Red)),
            Span::raw(format!("{}:{:02}", secs / 60, secs % 60)),
            Span::raw("  space: stop & send"),
        ]
    } else {
        vec![Span::raw("space: record  q: quit")]
    };
    if let (false, Some(status)) = (snapshot.recording, &snapshot.status) {
        spans.push(Span::raw(format!("  {status}")));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(
            Style::default()
                .fg(Color::Rgb(185, 207, 212))
                .bg(Color::Rgb(0, 0, 0)),
        ),
        footer_area,
    );
}
