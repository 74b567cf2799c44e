//! Menu list with shortcuts

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

use crate::tui::{
    traits::{Navigable, ScreenId},
    ui::Styles,
};

#[derive(Debug, Clone)]
pub struct MenuItem {
    pub label: String,
    pub shortcut: Option<char>,
    pub description: Option<String>,
    pub target: ScreenId,
}

impl MenuItem {
    pub fn new(label: &str, target: ScreenId) -> Self {
        Self {
            label: label.to_string(),
            shortcut: None,
            description: None,
            target,
        }
    }

    pub fn with_shortcut(mut self, shortcut: char) -> Self {
        self.shortcut = Some(shortcut);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

pub struct MenuListView {
    pub title: String,
    pub items: Vec<MenuItem>,
    pub state: ListState,
}

impl MenuListView {
    pub fn new(items: Vec<MenuItem>, title: &str) -> Self {
        let mut state = ListState::default();
        if !items.is_empty() {
            state.select(Some(0));
        }
        Self {
            title: title.to_string(),
            items,
            state,
        }
    }

    pub fn selected(&self) -> Option<&MenuItem> {
        self.state.selected().and_then(|i| self.items.get(i))
    }

    /// Item whose shortcut matches `key`, case-insensitively
    pub fn select_by_shortcut(&mut self, key: char) -> Option<&MenuItem> {
        let index = self.items.iter().position(|item| {
            item.shortcut
                .map(|s| s.eq_ignore_ascii_case(&key))
                .unwrap_or(false)
        })?;
        self.state.select(Some(index));
        self.items.get(index)
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect) {
        let selected = self.state.selected();
        let items: Vec<ListItem> = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let shortcut = item
                    .shortcut
                    .map(|s| format!("[{}] ", s))
                    .unwrap_or_else(|| "    ".to_string());
                let style = if Some(i) == selected {
                    Styles::selected()
                } else {
                    Styles::default()
                };
                let mut spans = vec![Span::styled(format!("{}{}", shortcut, item.label), style)];
                if let Some(ref description) = item.description {
                    spans.push(Span::styled(format!("  {}", description), Styles::inactive()));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();

        let list = List::new(items).block(
            Block::default()
                .title(self.title.clone())
                .borders(Borders::ALL)
                .border_style(Styles::active_border()),
        );
        f.render_stateful_widget(list, area, &mut self.state);
    }
}

impl Navigable for MenuListView {
    fn navigate_up(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => self.items.len() - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    fn navigate_down(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => (i + 1) % self.items.len(),
            None => 0,
        };
        self.state.select(Some(i));
    }

    fn get_selected_index(&self) -> Option<usize> {
        self.state.selected()
    }

    fn set_selected_index(&mut self, index: Option<usize>) {
        self.state.select(index);
    }

    fn get_item_count(&self) -> usize {
        self.items.len()
    }
}
