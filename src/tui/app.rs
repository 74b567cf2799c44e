//! Main TUI application state and logic

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    backend::Backend as TerminalBackend,
    layout::{Constraint, Direction, Layout, Rect},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};
use tracing::{debug, info, warn};

use super::{
    components::StatusDisplay,
    screens::{EntityScreen, HelpScreen, MainMenuScreen},
    traits::{Screen, ScreenAction, ScreenId},
    ui::{centered_rect, Styles},
};
use crate::catalog::{Backend, Entity, LookupFeeds, Lookups};
use crate::config::Config;
use crate::models::{Classification, Employee, FamilyMember, Person, Unit};

/// How long the loop waits for input before running screen ticks
const POLL_INTERVAL: Duration = Duration::from_millis(50);
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Main TUI application state
pub struct App {
    pub current: ScreenId,
    /// Screens visited before the current one
    history: Vec<ScreenId>,
    screens: HashMap<ScreenId, Box<dyn Screen>>,
    feeds: LookupFeeds,
    pub status: StatusDisplay,
    pub show_help_popup: bool,
    pub should_quit: bool,
}

impl App {
    pub fn new(backend: &Backend, config: &Config) -> Self {
        let (feeds, lookups) = LookupFeeds::new(backend);

        let mut screens: HashMap<ScreenId, Box<dyn Screen>> = HashMap::new();
        screens.insert(
            ScreenId::MainMenu,
            Box::new(MainMenuScreen::new(&backend.describe())),
        );
        screens.insert(ScreenId::Help, Box::new(HelpScreen::new()));
        insert_entity::<Unit>(&mut screens, backend, &lookups, config);
        insert_entity::<Employee>(&mut screens, backend, &lookups, config);
        insert_entity::<Person>(&mut screens, backend, &lookups, config);
        insert_entity::<FamilyMember>(&mut screens, backend, &lookups, config);
        insert_entity::<Classification>(&mut screens, backend, &lookups, config);

        Self {
            current: ScreenId::MainMenu,
            history: Vec::new(),
            screens,
            feeds,
            status: StatusDisplay::new()
                .with_timestamps()
                .with_auto_clear(STATUS_TIMEOUT),
            show_help_popup: false,
            should_quit: false,
        }
    }

    /// Run the main application loop
    pub async fn run<B: TerminalBackend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        self.feeds.spawn_all();

        loop {
            terminal.draw(|f| self.draw(f))?;

            if event::poll(POLL_INTERVAL)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key_event(key, Instant::now()).await?;
                    }
                }
            }

            self.tick(Instant::now()).await?;

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// Handle keyboard input events
    pub async fn handle_key_event(&mut self, key: KeyEvent, now: Instant) -> Result<()> {
        let capturing = self.screen().map(|s| s.is_capturing_input()).unwrap_or(false);

        if self.show_help_popup {
            if matches!(key.code, KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('?')) {
                self.show_help_popup = false;
            }
            return Ok(());
        }

        match key.code {
            KeyCode::F(1) => {
                self.show_help_popup = true;
                return Ok(());
            }
            KeyCode::Char('?') if !capturing => {
                self.show_help_popup = true;
                return Ok(());
            }
            KeyCode::Char('q') if !capturing => {
                self.should_quit = true;
                return Ok(());
            }
            _ => {}
        }

        let action = match self.screens.get_mut(&self.current) {
            Some(screen) => screen.handle_key_event(key, now).await,
            None => Ok(ScreenAction::None),
        };
        self.apply_result(action).await;
        Ok(())
    }

    /// Run time-driven work of the current screen, such as debounced searches
    pub async fn tick(&mut self, now: Instant) -> Result<()> {
        self.status.expire(Local::now());
        let action = match self.screens.get_mut(&self.current) {
            Some(screen) => screen.tick(now).await,
            None => Ok(ScreenAction::None),
        };
        self.apply_result(action).await;
        Ok(())
    }

    async fn apply_result(&mut self, action: Result<ScreenAction>) {
        match action {
            Ok(action) => self.apply(action).await,
            Err(e) => {
                warn!("Screen {:?} failed: {:#}", self.current, e);
                self.status.set_error(format!("{:#}", e));
            }
        }
    }

    pub async fn apply(&mut self, action: ScreenAction) {
        match action {
            ScreenAction::NavigateTo(target) => self.navigate_to(target).await,
            ScreenAction::NavigateBack => self.navigate_back(),
            ScreenAction::Quit => self.should_quit = true,
            ScreenAction::SetStatus(message) => {
                info!("{}", message);
                self.status.set_success(message);
                // a write may have changed what select fields offer
                self.feeds.spawn_all();
            }
            ScreenAction::SetProgress(message) => self.status.set_loading(message),
            ScreenAction::SetError(message) => self.status.set_error(message),
            ScreenAction::ClearMessages => self.status.clear(),
            ScreenAction::None => {}
        }
    }

    pub async fn navigate_to(&mut self, target: ScreenId) {
        if target == self.current {
            return;
        }
        debug!("Navigating {:?} -> {:?}", self.current, target);
        self.history.push(self.current);
        self.current = target;

        if !matches!(target, ScreenId::MainMenu | ScreenId::Help) {
            self.feeds.spawn_all();
        }

        let entered = match self.screens.get_mut(&target) {
            Some(screen) => screen.on_enter().await,
            None => Ok(()),
        };
        if let Err(e) = entered {
            self.status.set_error(format!("Failed to open {}: {:#}", target.title(), e));
        }
    }

    pub fn navigate_back(&mut self) {
        match self.history.pop() {
            Some(previous) => self.current = previous,
            None if self.current != ScreenId::MainMenu => self.current = ScreenId::MainMenu,
            None => {}
        }
    }

    fn screen(&self) -> Option<&dyn Screen> {
        self.screens.get(&self.current).map(|s| s.as_ref())
    }

    /// Draw the UI
    pub fn draw(&mut self, f: &mut Frame) {
        let size = f.size();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        if let Some(screen) = self.screens.get_mut(&self.current) {
            screen.draw(f, chunks[0]);
        }

        self.draw_status_bar(f, chunks[1]);

        if self.show_help_popup {
            self.draw_help_popup(f, size);
        }
    }

    fn draw_status_bar(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        self.status.render(f, chunks[0]);

        let hint = self
            .screen()
            .map(|s| s.help_hint())
            .unwrap_or("q: Quit | ?: Help");
        let busy = self.screen().map(|s| s.is_busy()).unwrap_or(false);
        let title = if busy {
            format!("{} ⟳", self.current.title())
        } else {
            self.current.title().to_string()
        };
        let hints = Paragraph::new(hint).style(Styles::inactive()).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Styles::inactive_border()),
        );
        f.render_widget(hints, chunks[1]);
    }

    fn draw_help_popup(&self, f: &mut Frame, area: Rect) {
        let popup_area = centered_rect(70, 70, area);
        f.render_widget(Clear, popup_area);

        let popup = Paragraph::new(HelpScreen::context_help(self.current))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title("Help - Context Shortcuts")
                    .borders(Borders::ALL)
                    .border_style(Styles::warning()),
            );
        f.render_widget(popup, popup_area);
    }
}

fn insert_entity<R: Entity>(
    screens: &mut HashMap<ScreenId, Box<dyn Screen>>,
    backend: &Backend,
    lookups: &Lookups,
    config: &Config,
) {
    let collection = backend.collection::<R>(config.ui.page_size);
    screens.insert(
        R::SCREEN,
        Box::new(EntityScreen::<R>::new(collection, lookups, config)),
    );
}
