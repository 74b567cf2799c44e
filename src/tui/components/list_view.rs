//! Generic records table
//!
//! Renders one page of a [`CollectionState`] through column and action
//! descriptors and turns keystrokes into [`ListIntent`]s. It never dispatches
//! anything itself: the owning screen translates intents into collection
//! operations.

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};
use tracing::debug;

use crate::crud::{CollectionState, SortDirection};
use crate::models::Record;
use crate::tui::{
    components::{
        column::{truncate, ActionDescriptor, ColumnDescriptor},
        search_box::SearchBox,
    },
    traits::Navigable,
    ui::{centered_rect, Styles},
};

/// What the user asked the list for
#[derive(Debug, Clone, PartialEq)]
pub enum ListIntent<K> {
    PageChanged { page: u32, page_size: u32 },
    Search { term: String, fields: Vec<String> },
    Sort { field: Option<String>, direction: SortDirection },
    Refresh,
    Create,
    Edit(K),
    DeleteRequested(K),
}

/// Configuration for list view rendering
#[derive(Debug, Clone)]
pub struct ListViewConfig {
    pub title: String,
    pub empty_message: String,
    pub search_placeholder: String,
    pub page_sizes: Vec<u32>,
    pub search_debounce: Duration,
}

impl Default for ListViewConfig {
    fn default() -> Self {
        Self {
            title: "Records".to_string(),
            empty_message: "No records found".to_string(),
            search_placeholder: "Type to search".to_string(),
            page_sizes: vec![10, 25, 50],
            search_debounce: Duration::from_millis(300),
        }
    }
}

impl ListViewConfig {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn with_empty_message(mut self, message: &str) -> Self {
        self.empty_message = message.to_string();
        self
    }

    pub fn with_search_placeholder(mut self, placeholder: &str) -> Self {
        self.search_placeholder = placeholder.to_string();
        self
    }

    pub fn with_search_debounce(mut self, debounce: Duration) -> Self {
        self.search_debounce = debounce;
        self
    }
}

/// What the table area shows for a given state
#[derive(Debug, Clone, PartialEq)]
pub enum ListBody {
    Loading,
    Empty(String),
    Rows(Vec<Vec<String>>),
}

struct PendingConfirm<R> {
    action: usize,
    record: R,
}

/// Searchable, paginated, actionable table over one collection
pub struct ListRenderer<R: Record> {
    pub config: ListViewConfig,
    pub columns: Vec<ColumnDescriptor>,
    pub actions: Vec<ActionDescriptor<R>>,
    pub searchable: Vec<String>,
    pub search: SearchBox,
    pub state: TableState,
    row_count: usize,
    pending: Option<PendingConfirm<R>>,
}

impl<R: Record> ListRenderer<R> {
    pub fn new(config: ListViewConfig, columns: Vec<ColumnDescriptor>) -> Self {
        let search = SearchBox::new(&config.search_placeholder, config.search_debounce);
        Self {
            config,
            columns,
            actions: Vec::new(),
            searchable: Vec::new(),
            search,
            state: TableState::default(),
            row_count: 0,
            pending: None,
        }
    }

    pub fn with_actions(mut self, actions: Vec<ActionDescriptor<R>>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_searchable(mut self, fields: &[&str]) -> Self {
        self.searchable = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Keep the row selection inside the current page
    pub fn sync(&mut self, view: &CollectionState<R>) {
        self.row_count = view.items().len();
        match self.state.selected() {
            _ if self.row_count == 0 => self.state.select(None),
            Some(i) if i >= self.row_count => self.state.select(Some(self.row_count - 1)),
            None => self.state.select(Some(0)),
            _ => {}
        }
    }

    pub fn body(&self, view: &CollectionState<R>) -> ListBody {
        if view.is_loading() {
            return ListBody::Loading;
        }
        if view.items().is_empty() {
            return ListBody::Empty(self.config.empty_message.clone());
        }
        ListBody::Rows(
            view.items()
                .iter()
                .map(|item| {
                    let projection = serde_json::to_value(item).unwrap_or_default();
                    self.columns.iter().map(|c| c.cell(&projection)).collect()
                })
                .collect(),
        )
    }

    pub fn selected_record(&self, view: &CollectionState<R>) -> Option<R> {
        self.state
            .selected()
            .and_then(|i| view.items().get(i))
            .cloned()
    }

    /// Prompt awaiting y/n, if a guarded action was triggered
    pub fn pending_prompt(&self) -> Option<&str> {
        self.pending
            .as_ref()
            .and_then(|p| self.actions.get(p.action))
            .and_then(|a| a.confirm.as_deref())
    }

    pub fn is_capturing_input(&self) -> bool {
        self.search.is_focused || self.pending.is_some()
    }

    /// Search intent once typing has paused
    pub fn tick(&mut self, now: Instant) -> Option<ListIntent<R::Key>> {
        self.search.poll(now).map(|term| self.search_intent(term))
    }

    fn search_intent(&self, term: String) -> ListIntent<R::Key> {
        debug!(term = %term, "search requested");
        ListIntent::Search {
            term,
            fields: self.searchable.clone(),
        }
    }

    pub fn handle_key(
        &mut self,
        key: KeyEvent,
        view: &CollectionState<R>,
        now: Instant,
    ) -> Option<ListIntent<R::Key>> {
        self.sync(view);

        if let Some(pending) = self.pending.take() {
            return match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => self
                    .actions
                    .get(pending.action)
                    .map(|action| action.invoke(&pending.record)),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => None,
                _ => {
                    self.pending = Some(pending);
                    None
                }
            };
        }

        if self.search.is_focused {
            return match key.code {
                KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.search.clear(now);
                    None
                }
                KeyCode::Char(c) => {
                    self.search.insert_char(c, now);
                    None
                }
                KeyCode::Backspace => {
                    self.search.delete_char(now);
                    None
                }
                KeyCode::Enter => {
                    self.search.is_focused = false;
                    let term = self.search.commit();
                    Some(self.search_intent(term))
                }
                KeyCode::Esc | KeyCode::Down | KeyCode::Tab => {
                    self.search.is_focused = false;
                    None
                }
                _ => None,
            };
        }

        match key.code {
            KeyCode::Char('/') => {
                self.search.is_focused = true;
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.navigate_up();
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.navigate_down();
                None
            }
            KeyCode::Right | KeyCode::Char('n') | KeyCode::PageDown => {
                self.page_intent(view, view.page().saturating_add(1))
            }
            KeyCode::Left | KeyCode::Char('p') | KeyCode::PageUp => {
                self.page_intent(view, view.page().saturating_sub(1))
            }
            KeyCode::Home => self.page_intent(view, 1),
            KeyCode::End => self.page_intent(view, view.total_pages()),
            KeyCode::Char('z') => {
                let sizes = &self.config.page_sizes;
                let next = sizes
                    .iter()
                    .position(|s| *s == view.page_size())
                    .map(|i| sizes[(i + 1) % sizes.len()])
                    .or_else(|| sizes.first().copied())?;
                Some(ListIntent::PageChanged {
                    page: 1,
                    page_size: next,
                })
            }
            KeyCode::Char('s') => Some(self.next_sort(view)),
            KeyCode::Char('S') => {
                let field = view.query().sort_by.clone()?;
                let direction = view.query().sort_direction.unwrap_or(SortDirection::Asc);
                Some(ListIntent::Sort {
                    field: Some(field),
                    direction: direction.toggled(),
                })
            }
            KeyCode::Char('r') => Some(ListIntent::Refresh),
            KeyCode::Char('a') => Some(ListIntent::Create),
            KeyCode::Char(c) => {
                let index = self.actions.iter().position(|a| a.hotkey == c)?;
                self.trigger(index, view)
            }
            KeyCode::Enter => {
                let index = self.actions.iter().position(|a| a.confirm.is_none())?;
                self.trigger(index, view)
            }
            _ => None,
        }
    }

    fn trigger(&mut self, index: usize, view: &CollectionState<R>) -> Option<ListIntent<R::Key>> {
        let record = self.selected_record(view)?;
        let action = &self.actions[index];
        if action.confirm.is_some() {
            self.pending = Some(PendingConfirm {
                action: index,
                record,
            });
            return None;
        }
        Some(action.invoke(&record))
    }

    fn page_intent(&self, view: &CollectionState<R>, page: u32) -> Option<ListIntent<R::Key>> {
        if page < 1 || page > view.total_pages() || page == view.page() {
            return None;
        }
        Some(ListIntent::PageChanged {
            page,
            page_size: view.page_size(),
        })
    }

    /// Next sortable column after the current sort key; past the last one, unsorted
    fn next_sort(&self, view: &CollectionState<R>) -> ListIntent<R::Key> {
        let sortable: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| c.sortable)
            .map(|c| c.key.as_str())
            .collect();
        let current = view.query().sort_by.as_deref();
        let field = match current.and_then(|f| sortable.iter().position(|s| *s == f)) {
            Some(i) => sortable.get(i + 1).map(|s| s.to_string()),
            None => sortable.first().map(|s| s.to_string()),
        };
        ListIntent::Sort {
            field,
            direction: SortDirection::Asc,
        }
    }

    fn header(&self, view: &CollectionState<R>) -> Row<'static> {
        let sort_by = view.query().sort_by.as_deref();
        let arrow = match view.query().sort_direction {
            Some(SortDirection::Desc) => " ▼",
            _ => " ▲",
        };
        Row::new(self.columns.iter().map(|c| {
            let label = if Some(c.key.as_str()) == sort_by {
                format!("{}{}", c.label, arrow)
            } else {
                c.label.clone()
            };
            Cell::from(label)
        }))
        .style(Styles::title())
    }

    fn footer_lines(&self, view: &CollectionState<R>) -> Vec<Line<'static>> {
        let mut paging = format!(
            "{} | Page {}/{} | {} per page",
            view.caption(),
            view.page(),
            view.total_pages().max(1),
            view.page_size()
        );
        if let Some(ref term) = view.query().search {
            paging.push_str(&format!(" | Filter: \"{}\"", term));
        }

        let mut hints: Vec<Span<'static>> = Vec::new();
        for action in &self.actions {
            hints.push(Span::styled(action.hint(), action.style.style()));
            hints.push(Span::raw("  "));
        }
        hints.push(Span::styled(
            "[a] Add  [←/→] Page  [s] Sort  [z] Page size  [r] Refresh",
            Styles::inactive(),
        ));

        vec![Line::from(paging), Line::from(hints)]
    }

    /// Render the list view
    pub fn render(&mut self, f: &mut Frame, area: Rect, view: &CollectionState<R>) {
        self.sync(view);

        let mut constraints = vec![Constraint::Length(3)];
        if view.error().is_some() {
            constraints.push(Constraint::Length(3));
        }
        constraints.push(Constraint::Min(3));
        constraints.push(Constraint::Length(2));

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        self.search.render(f, chunks[0]);

        let mut next = 1;
        if let Some(error) = view.error() {
            let banner = Paragraph::new(format!("✗ {}", error))
                .style(Styles::error())
                .wrap(Wrap { trim: true })
                .block(Block::default().borders(Borders::ALL).border_style(Styles::error()));
            f.render_widget(banner, chunks[next]);
            next += 1;
        }
        let body_area = chunks[next];
        let footer_area = chunks[next + 1];

        let block = Block::default()
            .title(self.config.title.clone())
            .borders(Borders::ALL)
            .border_style(Styles::active_border());

        match self.body(view) {
            ListBody::Loading => {
                let loading = Paragraph::new("⟳ Loading…").style(Styles::warning()).block(block);
                f.render_widget(loading, body_area);
            }
            ListBody::Empty(message) => {
                let empty = Paragraph::new(message).style(Styles::inactive()).block(block);
                f.render_widget(empty, body_area);
            }
            ListBody::Rows(rows) => {
                let rows: Vec<Row> = rows
                    .into_iter()
                    .map(|cells| {
                        Row::new(
                            cells
                                .into_iter()
                                .zip(self.columns.iter())
                                .map(|(text, column)| Cell::from(truncate(&text, column.width as usize))),
                        )
                    })
                    .collect();
                let widths: Vec<Constraint> = self
                    .columns
                    .iter()
                    .map(|c| Constraint::Length(c.width))
                    .collect();

                let table = Table::new(rows, widths)
                    .header(self.header(view))
                    .block(block)
                    .highlight_style(Styles::selected());
                f.render_stateful_widget(table, body_area, &mut self.state);
            }
        }

        f.render_widget(Paragraph::new(self.footer_lines(view)), footer_area);

        if let Some(prompt) = self.pending_prompt() {
            let popup = centered_rect(50, 20, area);
            f.render_widget(Clear, popup);
            let confirm = Paragraph::new(format!("{}\n\n[y] Yes   [n] No", prompt))
                .style(Styles::warning())
                .wrap(Wrap { trim: true })
                .block(
                    Block::default()
                        .title("Confirm")
                        .borders(Borders::ALL)
                        .border_style(Styles::error()),
                );
            f.render_widget(confirm, popup);
        }
    }
}

impl<R: Record> Navigable for ListRenderer<R> {
    fn navigate_up(&mut self) {
        if self.row_count == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => self.row_count - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    fn navigate_down(&mut self) {
        if self.row_count == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => (i + 1) % self.row_count,
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
        self.row_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crud::testing::unit;
    use crate::crud::{LoadParams, Page, Transition};
    use crate::models::Unit;
    use crate::tui::components::column::formatters;
    use ratatui::{backend::TestBackend, Terminal};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn renderer() -> ListRenderer<Unit> {
        ListRenderer::new(
            ListViewConfig::new("Units").with_empty_message("No units registered"),
            vec![
                ColumnDescriptor::new("code", "Code").sortable().with_width(6),
                ColumnDescriptor::new("name", "Name").sortable(),
                ColumnDescriptor::new("active", "Active").with_formatter(formatters::yes_no),
            ],
        )
        .with_actions(vec![ActionDescriptor::edit(), ActionDescriptor::delete()])
        .with_searchable(&["code", "name"])
    }

    fn state(ids: std::ops::RangeInclusive<i64>, total: u64, page: u32) -> CollectionState<Unit> {
        let mut state = CollectionState::new(10);
        let params = LoadParams::new(page, 10);
        state.apply(Transition::LoadRequested { seq: 1, params });
        state.apply(Transition::Loaded {
            seq: 1,
            page: Page {
                data: ids.map(unit).collect(),
                total,
                page,
                page_size: 10,
                total_pages: 0,
            },
        });
        state
    }

    #[test]
    fn test_rows_follow_columns() {
        let list = renderer();
        let body = list.body(&state(1..=2, 2, 1));
        assert_eq!(
            body,
            ListBody::Rows(vec![
                vec!["U001".to_string(), "Unit 1".to_string(), "Yes".to_string()],
                vec!["U002".to_string(), "Unit 2".to_string(), "Yes".to_string()],
            ])
        );
    }

    #[test]
    fn test_loading_and_empty_states() {
        let list = renderer();
        let empty: CollectionState<Unit> = CollectionState::new(10);
        assert_eq!(list.body(&empty), ListBody::Empty("No units registered".to_string()));

        let mut loading = state(1..=3, 3, 1);
        loading.apply(Transition::LoadRequested { seq: 2, params: LoadParams::new(1, 10) });
        assert_eq!(list.body(&loading), ListBody::Loading);
    }

    #[test]
    fn test_paging_is_bounded() {
        let mut list = renderer();
        let now = Instant::now();
        let first = state(1..=10, 25, 1);
        assert_eq!(list.handle_key(key(KeyCode::Left), &first, now), None);
        assert_eq!(
            list.handle_key(key(KeyCode::Right), &first, now),
            Some(ListIntent::PageChanged { page: 2, page_size: 10 })
        );
        assert_eq!(
            list.handle_key(key(KeyCode::End), &first, now),
            Some(ListIntent::PageChanged { page: 3, page_size: 10 })
        );

        let last = state(21..=25, 25, 3);
        assert_eq!(list.handle_key(key(KeyCode::Right), &last, now), None);
        assert_eq!(
            list.handle_key(key(KeyCode::Char('z')), &last, now),
            Some(ListIntent::PageChanged { page: 1, page_size: 25 })
        );
    }

    #[test]
    fn test_delete_waits_for_confirmation() {
        let mut list = renderer();
        let now = Instant::now();
        let view = state(1..=5, 5, 1);
        list.handle_key(key(KeyCode::Down), &view, now);

        assert_eq!(list.handle_key(key(KeyCode::Char('d')), &view, now), None);
        assert_eq!(list.pending_prompt(), Some("Delete this record?"));
        assert_eq!(list.handle_key(key(KeyCode::Char('x')), &view, now), None);
        assert_eq!(
            list.handle_key(key(KeyCode::Char('y')), &view, now),
            Some(ListIntent::DeleteRequested(2))
        );

        list.handle_key(key(KeyCode::Char('d')), &view, now);
        assert_eq!(list.handle_key(key(KeyCode::Esc), &view, now), None);
        assert!(list.pending_prompt().is_none());
    }

    #[test]
    fn test_unguarded_action_runs_immediately() {
        let mut list = renderer();
        let view = state(1..=5, 5, 1);
        assert_eq!(
            list.handle_key(key(KeyCode::Enter), &view, Instant::now()),
            Some(ListIntent::Edit(1))
        );
    }

    #[test]
    fn test_search_is_debounced_and_carries_fields() {
        let mut list = renderer();
        let view = state(1..=5, 5, 1);
        let start = Instant::now();

        list.handle_key(key(KeyCode::Char('/')), &view, start);
        list.handle_key(key(KeyCode::Char('n')), &view, start);
        list.handle_key(key(KeyCode::Char('o')), &view, start + Duration::from_millis(50));
        assert_eq!(list.tick(start + Duration::from_millis(200)), None);

        assert_eq!(
            list.tick(start + Duration::from_millis(400)),
            Some(ListIntent::Search {
                term: "no".to_string(),
                fields: vec!["code".to_string(), "name".to_string()],
            })
        );
    }

    #[test]
    fn test_ctrl_u_clears_the_search_term() {
        let mut list = renderer();
        let view = state(1..=5, 5, 1);
        let start = Instant::now();

        list.handle_key(key(KeyCode::Char('/')), &view, start);
        list.handle_key(key(KeyCode::Char('n')), &view, start);
        assert!(list.tick(start + Duration::from_millis(400)).is_some());

        let later = start + Duration::from_millis(500);
        list.handle_key(
            KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL),
            &view,
            later,
        );
        assert_eq!(list.search.value, "");
        assert_eq!(
            list.tick(later + Duration::from_millis(400)),
            Some(ListIntent::Search {
                term: String::new(),
                fields: vec!["code".to_string(), "name".to_string()],
            })
        );
    }

    #[test]
    fn test_sort_cycles_sortable_columns() {
        let mut list = renderer();
        let now = Instant::now();
        let mut view = state(1..=5, 5, 1);
        assert_eq!(
            list.handle_key(key(KeyCode::Char('s')), &view, now),
            Some(ListIntent::Sort { field: Some("code".to_string()), direction: SortDirection::Asc })
        );

        view.apply(Transition::LoadRequested {
            seq: 2,
            params: LoadParams::new(1, 10).with_sort("name", SortDirection::Asc),
        });
        assert_eq!(
            list.handle_key(key(KeyCode::Char('s')), &view, now),
            Some(ListIntent::Sort { field: None, direction: SortDirection::Asc })
        );
        assert_eq!(
            list.handle_key(key(KeyCode::Char('S')), &view, now),
            Some(ListIntent::Sort { field: Some("name".to_string()), direction: SortDirection::Desc })
        );
    }

    fn rendered_text(list: &mut ListRenderer<Unit>, view: &CollectionState<Unit>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(90, 20)).unwrap();
        terminal.draw(|f| list.render(f, f.size(), view)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer.get(x, y).symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_render_shows_caption_and_error_banner() {
        let mut list = renderer();
        let mut view = state(1..=10, 25, 1);
        let text = rendered_text(&mut list, &view);
        assert!(text.contains("Showing 1–10 of 25"));
        assert!(text.contains("Unit 1"));

        view.apply(Transition::LoadRequested { seq: 2, params: LoadParams::new(2, 10) });
        view.apply(Transition::LoadFailed { seq: 2, message: "registry unreachable".to_string() });
        let text = rendered_text(&mut list, &view);
        assert!(text.contains("registry unreachable"));
        assert!(text.contains("Unit 1"));
    }
}
