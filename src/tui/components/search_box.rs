//! Debounced search input

use std::time::{Duration, Instant};

use ratatui::{
    layout::Rect,
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::tui::ui::Styles;

/// Text input that releases its term once typing pauses
#[derive(Debug, Clone)]
pub struct SearchBox {
    pub value: String,
    pub placeholder: String,
    pub is_focused: bool,
    debounce: Duration,
    last_keystroke: Option<Instant>,
    emitted: String,
}

impl SearchBox {
    pub fn new(placeholder: &str, debounce: Duration) -> Self {
        Self {
            value: String::new(),
            placeholder: placeholder.to_string(),
            is_focused: false,
            debounce,
            last_keystroke: None,
            emitted: String::new(),
        }
    }

    pub fn insert_char(&mut self, c: char, now: Instant) {
        self.value.push(c);
        self.last_keystroke = Some(now);
    }

    pub fn delete_char(&mut self, now: Instant) {
        if self.value.pop().is_some() {
            self.last_keystroke = Some(now);
        }
    }

    pub fn clear(&mut self, now: Instant) {
        if !self.value.is_empty() {
            self.value.clear();
            self.last_keystroke = Some(now);
        }
    }

    /// Whether a term is waiting for the debounce to elapse
    pub fn is_pending(&self) -> bool {
        self.last_keystroke.is_some()
    }

    /// Term to search for once the debounce window has passed since the last keystroke
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        let last = self.last_keystroke?;
        if now.saturating_duration_since(last) < self.debounce {
            return None;
        }
        self.last_keystroke = None;
        self.release()
    }

    /// Release the current term immediately
    pub fn commit(&mut self) -> String {
        self.last_keystroke = None;
        self.emitted = self.value.trim().to_string();
        self.emitted.clone()
    }

    fn release(&mut self) -> Option<String> {
        let term = self.value.trim().to_string();
        if term == self.emitted {
            return None;
        }
        self.emitted = term.clone();
        Some(term)
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let (text, style) = if self.value.is_empty() && !self.is_focused {
            (self.placeholder.clone(), Styles::inactive())
        } else {
            (self.value.clone(), Styles::default())
        };

        let border_style = if self.is_focused {
            Styles::active_border()
        } else {
            Styles::inactive_border()
        };

        let block = Block::default()
            .title("Search (/)")
            .borders(Borders::ALL)
            .border_style(border_style);

        f.render_widget(Paragraph::new(text).style(style).block(block), area);

        if self.is_focused {
            let cursor_x = area.x + 1 + self.value.chars().count() as u16;
            if cursor_x < area.x + area.width.saturating_sub(1) {
                f.set_cursor(cursor_x, area.y + 1);
            }
        }
    }
}
