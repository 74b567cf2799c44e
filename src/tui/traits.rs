//! Core traits shared by registry screens

use anyhow::Result;
use async_trait::async_trait;
use crossterm::event::KeyEvent;
use ratatui::{layout::Rect, Frame};
use std::time::Instant;

/// Screens reachable from the main menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenId {
    MainMenu,
    Units,
    Employees,
    Persons,
    FamilyMembers,
    Classifications,
    Help,
}

impl ScreenId {
    pub fn title(&self) -> &'static str {
        match self {
            ScreenId::MainMenu => "Main Menu",
            ScreenId::Units => "Units",
            ScreenId::Employees => "Employees",
            ScreenId::Persons => "Persons",
            ScreenId::FamilyMembers => "Family Members",
            ScreenId::Classifications => "Classifications",
            ScreenId::Help => "Help",
        }
    }
}

/// Actions that can be returned from screen event handling
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenAction {
    /// Navigate to a different screen
    NavigateTo(ScreenId),
    /// Go back to previous screen
    NavigateBack,
    /// Quit the application
    Quit,
    SetStatus(String),
    /// Work started that finishes on a later tick
    SetProgress(String),
    SetError(String),
    ClearMessages,
    /// No action taken
    None,
}

/// Core trait for all TUI screens
#[async_trait]
pub trait Screen: Send {
    /// Draw the screen content
    fn draw(&mut self, f: &mut Frame, area: Rect);

    /// Handle keyboard input and return an optional action
    async fn handle_key_event(&mut self, key: KeyEvent, now: Instant) -> Result<ScreenAction>;

    fn screen_id(&self) -> ScreenId;

    /// Whether keys should go to the screen rather than global shortcuts
    fn is_capturing_input(&self) -> bool {
        false
    }

    /// Whether dispatched work is still outstanding
    fn is_busy(&self) -> bool {
        false
    }

    /// Called when screen becomes active
    async fn on_enter(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called on every loop iteration, for debounced work
    async fn tick(&mut self, _now: Instant) -> Result<ScreenAction> {
        Ok(ScreenAction::None)
    }

    /// One-line key reference for the status bar
    fn help_hint(&self) -> &'static str {
        "q: Quit | ?: Help | Esc: Back"
    }
}

/// Trait for components with navigable lists
pub trait Navigable {
    fn navigate_up(&mut self);

    fn navigate_down(&mut self);

    fn get_selected_index(&self) -> Option<usize>;

    fn set_selected_index(&mut self, index: Option<usize>);

    fn get_item_count(&self) -> usize;

    fn navigate_to_first(&mut self) {
        if self.get_item_count() > 0 {
            self.set_selected_index(Some(0));
        }
    }

    fn navigate_to_last(&mut self) {
        let count = self.get_item_count();
        if count > 0 {
            self.set_selected_index(Some(count - 1));
        }
    }
}

/// Trait for form handling
pub trait FormHandler {
    /// Index of the focused field among the visible ones
    fn get_current_field(&self) -> usize;

    fn set_current_field(&mut self, field: usize);

    /// Number of visible fields
    fn get_field_count(&self) -> usize;

    fn next_field(&mut self) {
        let total = self.get_field_count();
        if total == 0 {
            return;
        }
        let current = self.get_current_field();
        self.set_current_field((current + 1) % total);
    }

    fn previous_field(&mut self) {
        let total = self.get_field_count();
        if total == 0 {
            return;
        }
        let current = self.get_current_field();
        self.set_current_field(if current == 0 { total - 1 } else { current - 1 });
    }

    fn handle_char_input(&mut self, c: char);

    fn handle_backspace(&mut self);

    fn handle_delete(&mut self);

    /// First validation failure, as "Label: message"
    fn validate(&self) -> Result<(), String>;
}
