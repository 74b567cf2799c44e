//! Status bar messages

use std::time::Duration;

use chrono::{DateTime, Local};
use ratatui::{
    layout::Rect,
    style::Style,
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::tui::ui::Styles;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusType {
    Success,
    Error,
    Loading,
}

impl StatusType {
    fn prefix(&self) -> &'static str {
        match self {
            StatusType::Success => "✓",
            StatusType::Error => "✗",
            StatusType::Loading => "⟳",
        }
    }

    fn style(&self) -> Style {
        match self {
            StatusType::Success => Styles::success(),
            StatusType::Loading => Styles::warning(),
            StatusType::Error => Styles::error(),
        }
    }
}

/// Status message with type and content
#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub status_type: StatusType,
    pub timestamp: DateTime<Local>,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>, status_type: StatusType) -> Self {
        Self {
            message: message.into(),
            status_type,
            timestamp: Local::now(),
        }
    }
}

/// Current message plus a short history
#[derive(Debug, Clone)]
pub struct StatusDisplay {
    current: Option<StatusMessage>,
    history: Vec<StatusMessage>,
    max_history: usize,
    show_timestamp: bool,
    auto_clear: Option<Duration>,
}

impl Default for StatusDisplay {
    fn default() -> Self {
        Self {
            current: None,
            history: Vec::new(),
            max_history: 50,
            show_timestamp: false,
            auto_clear: None,
        }
    }
}

impl StatusDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timestamps(mut self) -> Self {
        self.show_timestamp = true;
        self
    }

    pub fn with_auto_clear(mut self, timeout: Duration) -> Self {
        self.auto_clear = Some(timeout);
        self
    }

    pub fn set_message(&mut self, message: StatusMessage) {
        self.archive();
        self.current = Some(message);
    }

    pub fn set_success(&mut self, message: impl Into<String>) {
        self.set_message(StatusMessage::new(message, StatusType::Success));
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.set_message(StatusMessage::new(message, StatusType::Error));
    }

    pub fn set_loading(&mut self, message: impl Into<String>) {
        self.set_message(StatusMessage::new(message, StatusType::Loading));
    }

    pub fn clear(&mut self) {
        self.archive();
    }

    fn archive(&mut self) {
        if let Some(current) = self.current.take() {
            self.history.push(current);
            if self.history.len() > self.max_history {
                self.history.remove(0);
            }
        }
    }

    pub fn current(&self) -> Option<&StatusMessage> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &[StatusMessage] {
        &self.history
    }

    /// Drop the current message once it has been shown long enough
    pub fn expire(&mut self, now: DateTime<Local>) {
        let expired = match (self.auto_clear, &self.current) {
            (Some(timeout), Some(message)) => now
                .signed_duration_since(message.timestamp)
                .to_std()
                .map(|elapsed| elapsed > timeout)
                .unwrap_or(false),
            _ => false,
        };
        if expired {
            self.archive();
        }
    }

    pub fn text(&self) -> String {
        match self.current {
            Some(ref message) if self.show_timestamp => format!(
                "{} [{}] {}",
                message.status_type.prefix(),
                message.timestamp.format("%H:%M:%S"),
                message.message
            ),
            Some(ref message) => format!("{} {}", message.status_type.prefix(), message.message),
            None => "Ready".to_string(),
        }
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let style = self
            .current
            .as_ref()
            .map(|m| m.status_type.style())
            .unwrap_or_else(Styles::default);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Styles::inactive_border());

        f.render_widget(Paragraph::new(self.text()).style(style).block(block), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_rotate_into_history() {
        let mut status = StatusDisplay::new();
        assert_eq!(status.text(), "Ready");
        status.set_loading("Saving unit…");
        status.set_error("registry unreachable");
        assert_eq!(status.text(), "✗ registry unreachable");
        assert_eq!(status.history().len(), 1);
        status.clear();
        assert!(status.current().is_none());
        assert_eq!(status.history().len(), 2);
    }

    #[test]
    fn test_timestamps_prefix_the_message() {
        let mut status = StatusDisplay::new().with_timestamps();
        status.set_success("Unit saved");
        let shown = status.current().map(|m| m.timestamp).unwrap();
        assert_eq!(
            status.text(),
            format!("✓ [{}] Unit saved", shown.format("%H:%M:%S"))
        );
    }

    #[test]
    fn test_auto_clear() {
        let mut status = StatusDisplay::new().with_auto_clear(Duration::from_secs(5));
        status.set_success("Saved");
        let shown = status.current().map(|m| m.timestamp).unwrap();
        status.expire(shown + chrono::Duration::seconds(2));
        assert!(status.current().is_some());
        status.expire(shown + chrono::Duration::seconds(6));
        assert!(status.current().is_none());
    }
}
