//! Keyboard reference

use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::tui::{
    traits::{Screen, ScreenAction, ScreenId},
    ui::Styles,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpSection {
    Overview,
    Lists,
    Forms,
    Shortcuts,
}

impl HelpSection {
    const ALL: [HelpSection; 4] = [
        HelpSection::Overview,
        HelpSection::Lists,
        HelpSection::Forms,
        HelpSection::Shortcuts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HelpSection::Overview => "Overview",
            HelpSection::Lists => "Record Lists",
            HelpSection::Forms => "Record Forms",
            HelpSection::Shortcuts => "Global Shortcuts",
        }
    }

    /// (key, description) pairs; an empty key is a paragraph of prose
    fn entries(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            HelpSection::Overview => &[
                ("", "Civic Registry keeps the units, staff, beneficiaries and household composition of the social-assistance registry."),
                ("", "Every entity opens as a paginated list. Records are added and edited through a form and removed from the list after confirmation."),
                ("", "Select fields draw their options from other lists (units, persons, classifications) and fill in as soon as those load."),
            ],
            HelpSection::Lists => &[
                ("↑/↓ j/k", "Move the row selection"),
                ("←/→ p/n", "Previous / next page"),
                ("Home/End", "First / last page"),
                ("/", "Search; results follow once typing pauses, Enter searches at once"),
                ("Ctrl+U", "Clear the search term"),
                ("s / S", "Cycle the sort column / reverse the direction"),
                ("z", "Cycle the page size"),
                ("a", "Add a record"),
                ("e / Enter", "Edit the selected record"),
                ("d", "Delete the selected record (asks for confirmation)"),
                ("r", "Reload the current page"),
            ],
            HelpSection::Forms => &[
                ("Tab / ↓", "Next field"),
                ("Shift+Tab / ↑", "Previous field"),
                ("PgUp/PgDn", "Switch tab on tabbed forms"),
                ("Enter", "Save, open a dropdown or toggle a checkbox"),
                ("Space", "Toggle a checkbox"),
                ("Ctrl+S", "Save from any field"),
                ("Esc", "Discard changes and return to the list"),
                ("", "Fields marked * are required. Errors appear next to the label once a field has been visited."),
            ],
            HelpSection::Shortcuts => &[
                ("? / F1", "Toggle the help popup"),
                ("Esc", "Go back"),
                ("q", "Quit (outside text input)"),
            ],
        }
    }
}

pub struct HelpScreen {
    state: ListState,
    scroll_offset: u16,
}

impl Default for HelpScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl HelpScreen {
    pub fn new() -> Self {
        let mut state = ListState::default();
        state.select(Some(0));
        Self {
            state,
            scroll_offset: 0,
        }
    }

    pub fn current_section(&self) -> HelpSection {
        HelpSection::ALL[self.state.selected().unwrap_or(0)]
    }

    fn section_lines(section: HelpSection) -> Vec<Line<'static>> {
        let mut lines = vec![
            Line::from(Span::styled(section.as_str(), Styles::title())),
            Line::from(""),
        ];
        for (key, text) in section.entries() {
            if key.is_empty() {
                lines.push(Line::from(*text));
                lines.push(Line::from(""));
            } else {
                lines.push(Line::from(vec![
                    Span::styled(format!("{:<16}", key), Styles::info()),
                    Span::raw(*text),
                ]));
            }
        }
        lines
    }

    /// Short reference for the popup shown over any screen
    pub fn context_help(screen: ScreenId) -> Vec<Line<'static>> {
        let mut lines = Self::section_lines(HelpSection::Shortcuts);
        let section = match screen {
            ScreenId::MainMenu | ScreenId::Help => None,
            _ => Some(HelpSection::Lists),
        };
        if let Some(section) = section {
            lines.push(Line::from(""));
            lines.extend(Self::section_lines(section));
        }
        lines
    }
}

#[async_trait]
impl Screen for HelpScreen {
    fn draw(&mut self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(24), Constraint::Min(0)])
            .split(area);

        let selected = self.state.selected();
        let items: Vec<ListItem> = HelpSection::ALL
            .iter()
            .enumerate()
            .map(|(i, section)| {
                let style = if Some(i) == selected {
                    Styles::selected()
                } else {
                    Styles::default()
                };
                ListItem::new(section.as_str()).style(style)
            })
            .collect();
        let sections = List::new(items).block(
            Block::default()
                .title("Sections")
                .borders(Borders::ALL)
                .border_style(Styles::active_border()),
        );
        f.render_stateful_widget(sections, chunks[0], &mut self.state);

        let content = Paragraph::new(Self::section_lines(self.current_section()))
            .wrap(Wrap { trim: false })
            .scroll((self.scroll_offset, 0))
            .block(
                Block::default()
                    .title("Help")
                    .borders(Borders::ALL)
                    .border_style(Styles::inactive_border()),
            );
        f.render_widget(content, chunks[1]);
    }

    async fn handle_key_event(&mut self, key: KeyEvent, _now: Instant) -> Result<ScreenAction> {
        let current = self.state.selected().unwrap_or(0);
        match key.code {
            KeyCode::Esc => return Ok(ScreenAction::NavigateBack),
            KeyCode::Up if current > 0 => {
                self.state.select(Some(current - 1));
                self.scroll_offset = 0;
            }
            KeyCode::Down if current + 1 < HelpSection::ALL.len() => {
                self.state.select(Some(current + 1));
                self.scroll_offset = 0;
            }
            KeyCode::PageUp => self.scroll_offset = self.scroll_offset.saturating_sub(10),
            KeyCode::PageDown => self.scroll_offset = self.scroll_offset.saturating_add(10),
            KeyCode::Home => self.scroll_offset = 0,
            _ => {}
        }
        Ok(ScreenAction::None)
    }

    fn screen_id(&self) -> ScreenId {
        ScreenId::Help
    }
}
