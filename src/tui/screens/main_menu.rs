//! Main menu screen

use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::tui::{
    components::menu::{MenuItem, MenuListView},
    traits::{Navigable, Screen, ScreenAction, ScreenId},
    ui::Styles,
};

pub struct MainMenuScreen {
    menu: MenuListView,
    /// "local database" or "remote registry"
    backend: String,
}

impl MainMenuScreen {
    pub fn new(backend: &str) -> Self {
        let items = vec![
            MenuItem::new("Units", ScreenId::Units)
                .with_shortcut('U')
                .with_description("Offices and community centres"),
            MenuItem::new("Employees", ScreenId::Employees)
                .with_shortcut('E')
                .with_description("Staff assigned to units"),
            MenuItem::new("Persons", ScreenId::Persons)
                .with_shortcut('P')
                .with_description("Registered beneficiaries"),
            MenuItem::new("Family Members", ScreenId::FamilyMembers)
                .with_shortcut('F')
                .with_description("Household composition"),
            MenuItem::new("Classifications", ScreenId::Classifications)
                .with_shortcut('C')
                .with_description("Document types, relationships and positions"),
            MenuItem::new("Help", ScreenId::Help)
                .with_shortcut('H')
                .with_description("Keyboard reference"),
        ];

        Self {
            menu: MenuListView::new(items, "Main Menu"),
            backend: backend.to_string(),
        }
    }

    fn draw_title(&self, f: &mut Frame, area: Rect) {
        let title = Paragraph::new(vec![
            Line::from(Span::styled(
                "Civic Registry",
                Styles::title().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                format!("Social-assistance records ({})", self.backend),
                Styles::info(),
            )),
        ])
        .block(Block::default().borders(Borders::ALL));
        f.render_widget(title, area);
    }

    fn draw_instructions(&self, f: &mut Frame, area: Rect) {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let instructions = vec![
            Line::from(vec![
                Span::styled("Navigation: ", Styles::info()),
                Span::raw("↑/↓ to move, "),
                Span::styled("Enter", bold),
                Span::raw(" to open"),
            ]),
            Line::from(vec![
                Span::styled("Shortcuts: ", Styles::info()),
                Span::styled("U/E/P/F/C/H", bold),
                Span::raw(" for direct access, "),
                Span::styled("q", bold),
                Span::raw(" to quit"),
            ]),
        ];

        let paragraph = Paragraph::new(instructions).block(
            Block::default()
                .title("Instructions")
                .borders(Borders::ALL)
                .border_style(Styles::inactive_border()),
        );
        f.render_widget(paragraph, area);
    }
}

#[async_trait]
impl Screen for MainMenuScreen {
    fn draw(&mut self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Min(0),
                Constraint::Length(4),
            ])
            .split(area);

        self.draw_title(f, chunks[0]);
        self.menu.render(f, chunks[1]);
        self.draw_instructions(f, chunks[2]);
    }

    async fn handle_key_event(&mut self, key: KeyEvent, _now: Instant) -> Result<ScreenAction> {
        let action = match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.menu.navigate_up();
                ScreenAction::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.menu.navigate_down();
                ScreenAction::None
            }
            KeyCode::Home => {
                self.menu.navigate_to_first();
                ScreenAction::None
            }
            KeyCode::End => {
                self.menu.navigate_to_last();
                ScreenAction::None
            }
            KeyCode::Enter => match self.menu.selected() {
                Some(item) => ScreenAction::NavigateTo(item.target),
                None => ScreenAction::None,
            },
            KeyCode::Char(c) => match self.menu.select_by_shortcut(c) {
                Some(item) => ScreenAction::NavigateTo(item.target),
                None => ScreenAction::None,
            },
            _ => ScreenAction::None,
        };
        Ok(action)
    }

    fn screen_id(&self) -> ScreenId {
        ScreenId::MainMenu
    }

    fn help_hint(&self) -> &'static str {
        "Enter: Open | U/E/P/F/C: Entities | ?: Help | q: Quit"
    }
}
