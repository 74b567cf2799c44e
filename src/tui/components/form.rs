//! Generic record form
//!
//! Renders one control per [`FieldDescriptor`], optionally split into tabs,
//! and turns a valid set of values into a JSON payload. Saving is the
//! caller's job: `submit` only hands the payload out and `complete` reports
//! how the save went.

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap},
    Frame,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::tui::{
    components::form_field::{FieldControl, FieldDescriptor, FieldKind},
    traits::FormHandler,
    ui::{below, Styles},
};

/// Submission lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    Editing,
    /// Payload handed out, save not yet resolved
    Submitting,
    Submitted,
}

/// What a keystroke asked the owner to do
#[derive(Debug, Clone, PartialEq)]
pub enum FormEvent {
    None,
    Submit(Value),
    Cancel,
}

pub struct FormRenderer {
    pub title: String,
    pub submit_label: String,
    controls: Vec<FieldControl>,
    tabs: Vec<String>,
    selected_tab: usize,
    /// Index into the visible fields of the selected tab
    current: usize,
    phase: FormPhase,
    loading: bool,
    error: Option<String>,
    submit_guard: Duration,
    last_emit: Option<Instant>,
    dropdown_open: bool,
}

impl FormRenderer {
    pub fn new(title: &str, fields: Vec<FieldDescriptor>) -> Self {
        let mut tabs: Vec<String> = Vec::new();
        for tab in fields.iter().filter_map(|f| f.tab.as_ref()) {
            if !tabs.contains(tab) {
                tabs.push(tab.clone());
            }
        }

        let mut form = Self {
            title: title.to_string(),
            submit_label: "Save".to_string(),
            controls: fields.into_iter().map(FieldControl::new).collect(),
            tabs,
            selected_tab: 0,
            current: 0,
            phase: FormPhase::Editing,
            loading: false,
            error: None,
            submit_guard: Duration::from_millis(100),
            last_emit: None,
            dropdown_open: false,
        };
        form.refocus();
        form
    }

    pub fn with_submit_label(mut self, label: &str) -> Self {
        self.submit_label = label.to_string();
        self
    }

    pub fn with_submit_guard(mut self, guard: Duration) -> Self {
        self.submit_guard = guard;
        self
    }

    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub fn tabs(&self) -> &[String] {
        &self.tabs
    }

    pub fn selected_tab(&self) -> usize {
        self.selected_tab
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.controls.iter().map(|c| c.name())
    }

    /// Fields without a tab live on the first one
    fn tab_of(&self, control: &FieldControl) -> usize {
        control
            .descriptor
            .tab
            .as_ref()
            .and_then(|tab| self.tabs.iter().position(|t| t == tab))
            .unwrap_or(0)
    }

    /// Control indices shown on the selected tab
    pub fn visible(&self) -> Vec<usize> {
        (0..self.controls.len())
            .filter(|&i| self.tabs.is_empty() || self.tab_of(&self.controls[i]) == self.selected_tab)
            .collect()
    }

    fn current_index(&self) -> Option<usize> {
        self.visible().get(self.current).copied()
    }

    fn current_control(&mut self) -> Option<&mut FieldControl> {
        let index = self.current_index()?;
        self.controls.get_mut(index)
    }

    fn refocus(&mut self) {
        let focused = self.current_index();
        for (i, control) in self.controls.iter_mut().enumerate() {
            let focus = Some(i) == focused;
            if control.is_focused != focus {
                control.set_focus(focus);
            }
        }
        self.dropdown_open = false;
    }

    pub fn select_tab(&mut self, tab: usize) {
        if tab < self.tabs.len().max(1) && tab != self.selected_tab {
            self.selected_tab = tab;
            self.current = 0;
            self.refocus();
        }
    }

    pub fn next_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.select_tab((self.selected_tab + 1) % self.tabs.len());
        }
    }

    pub fn previous_tab(&mut self) {
        if !self.tabs.is_empty() {
            let count = self.tabs.len();
            self.select_tab((self.selected_tab + count - 1) % count);
        }
    }

    /// Fill every control from a record's JSON projection and start over
    pub fn bind(&mut self, record: &Value) {
        for control in &mut self.controls {
            let raw = control
                .descriptor
                .raw_from_json(record.get(control.name()).unwrap_or(&Value::Null));
            control.set_value(&raw);
        }
        self.reset_flow();
    }

    /// Empty form for a new record
    pub fn reset(&mut self) {
        for control in &mut self.controls {
            *control = FieldControl::new(control.descriptor.clone());
        }
        self.reset_flow();
    }

    fn reset_flow(&mut self) {
        self.phase = FormPhase::Editing;
        self.error = None;
        self.loading = false;
        self.last_emit = None;
        self.selected_tab = 0;
        self.current = 0;
        self.refocus();
        for control in &mut self.controls {
            control.touched = false;
        }
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.controls
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.value.as_str())
    }

    /// Set a field's raw value as if typed; false for unknown fields
    pub fn set_value(&mut self, name: &str, raw: &str) -> bool {
        match self.controls.iter_mut().find(|c| c.name() == name) {
            Some(control) => {
                control.set_value(raw);
                control.touched = true;
            }
            None => return false,
        }
        self.edited();
        true
    }

    /// Payload for the current values, keyed by field name
    pub fn values(&self) -> Value {
        let map: Map<String, Value> = self
            .controls
            .iter()
            .map(|c| (c.name().to_string(), c.descriptor.to_json(&c.value)))
            .collect();
        Value::Object(map)
    }

    /// (field name, message) for each touched invalid field
    pub fn errors(&self) -> Vec<(String, String)> {
        self.controls
            .iter()
            .filter_map(|c| c.error_message().map(|m| (c.name().to_string(), m)))
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        self.controls.iter().all(|c| c.violation().is_none())
    }

    /// Mark everything touched and focus the first invalid field
    pub fn validate_all(&mut self) -> bool {
        for control in &mut self.controls {
            control.touched = true;
        }
        let first_invalid = match self.controls.iter().position(|c| c.violation().is_some()) {
            Some(i) => i,
            None => return true,
        };

        let tab = self.tab_of(&self.controls[first_invalid]);
        if !self.tabs.is_empty() {
            self.selected_tab = tab;
        }
        self.current = self
            .visible()
            .iter()
            .position(|&i| i == first_invalid)
            .unwrap_or(0);
        self.refocus();
        false
    }

    /// Payload to save, when the form is valid and not already saving
    pub fn submit(&mut self, now: Instant) -> Option<Value> {
        if self.phase == FormPhase::Submitting || self.loading {
            debug!(form = %self.title, "submit ignored while busy");
            return None;
        }
        if let Some(last) = self.last_emit {
            if now.saturating_duration_since(last) < self.submit_guard {
                debug!(form = %self.title, "submit ignored inside guard window");
                return None;
            }
        }
        if !self.validate_all() {
            return None;
        }

        self.phase = FormPhase::Submitting;
        self.error = None;
        self.last_emit = Some(now);
        Some(self.values())
    }

    /// Report the outcome of the save started by `submit`
    pub fn complete(&mut self, result: Result<(), String>) {
        match result {
            Ok(()) => self.phase = FormPhase::Submitted,
            Err(message) => {
                self.phase = FormPhase::Editing;
                self.error = Some(message);
            }
        }
    }

    fn edited(&mut self) {
        if self.phase != FormPhase::Editing {
            self.phase = FormPhase::Editing;
        }
    }

    /// Pull the latest select options into every control
    pub fn sync_options(&mut self) {
        for control in &mut self.controls {
            control.sync_options();
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> FormEvent {
        if self.dropdown_open {
            if let Some(control) = self.current_control() {
                match key.code {
                    KeyCode::Up => control.dropdown_up(),
                    KeyCode::Down => control.dropdown_down(),
                    KeyCode::Enter => {
                        control.select_dropdown_value();
                        self.dropdown_open = false;
                        self.edited();
                    }
                    KeyCode::Esc => self.dropdown_open = false,
                    _ => {}
                }
            }
            return FormEvent::None;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
            return self.submit_event(now);
        }

        match key.code {
            KeyCode::Esc => return FormEvent::Cancel,
            KeyCode::Tab | KeyCode::Down => self.next_field(),
            KeyCode::BackTab | KeyCode::Up => self.previous_field(),
            KeyCode::PageDown => self.next_tab(),
            KeyCode::PageUp => self.previous_tab(),
            KeyCode::Left => {
                if let Some(control) = self.current_control() {
                    control.move_cursor_left();
                }
            }
            KeyCode::Right => {
                if let Some(control) = self.current_control() {
                    control.move_cursor_right();
                }
            }
            KeyCode::Home => {
                if let Some(control) = self.current_control() {
                    control.move_cursor_to_start();
                }
            }
            KeyCode::End => {
                if let Some(control) = self.current_control() {
                    control.move_cursor_to_end();
                }
            }
            KeyCode::Backspace => self.handle_backspace(),
            KeyCode::Delete => self.handle_delete(),
            KeyCode::Enter => {
                let kind = match self.current_control() {
                    Some(control) => control.descriptor.kind,
                    None => return self.submit_event(now),
                };
                match kind {
                    FieldKind::Select => self.dropdown_open = true,
                    FieldKind::Checkbox => {
                        if let Some(control) = self.current_control() {
                            control.toggle();
                        }
                        self.edited();
                    }
                    FieldKind::TextArea => self.handle_char_input('\n'),
                    _ => return self.submit_event(now),
                }
            }
            KeyCode::Char(c) => self.handle_char_input(c),
            _ => {}
        }
        FormEvent::None
    }

    fn submit_event(&mut self, now: Instant) -> FormEvent {
        match self.submit(now) {
            Some(values) => FormEvent::Submit(values),
            None => FormEvent::None,
        }
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect) {
        let outer = Block::default()
            .title(self.title.clone())
            .borders(Borders::ALL)
            .border_style(Styles::active_border());
        let inner = outer.inner(area);
        f.render_widget(outer, area);

        let mut constraints = Vec::new();
        if !self.tabs.is_empty() {
            constraints.push(Constraint::Length(1));
        }
        if self.error.is_some() {
            constraints.push(Constraint::Length(3));
        }
        constraints.push(Constraint::Min(3));
        constraints.push(Constraint::Length(1));

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(inner);
        let mut next = 0;

        if !self.tabs.is_empty() {
            let titles: Vec<Line> = self.tabs.iter().map(|t| Line::from(t.clone())).collect();
            let tabs = Tabs::new(titles)
                .select(self.selected_tab)
                .style(Styles::inactive())
                .highlight_style(Styles::active_tab());
            f.render_widget(tabs, chunks[next]);
            next += 1;
        }

        if let Some(ref error) = self.error {
            let banner = Paragraph::new(format!("✗ {}", error))
                .style(Styles::error())
                .wrap(Wrap { trim: true })
                .block(Block::default().borders(Borders::ALL).border_style(Styles::error()));
            f.render_widget(banner, chunks[next]);
            next += 1;
        }

        let fields_area = chunks[next];
        let footer_area = chunks[next + 1];

        if self.loading {
            f.render_widget(
                Paragraph::new("⟳ Loading record…").style(Styles::warning()),
                fields_area,
            );
        } else {
            self.render_fields(f, fields_area);
        }

        let status = match self.phase {
            FormPhase::Submitting => "⟳ Saving…".to_string(),
            _ => format!(
                "[Enter/Ctrl+S] {}  [Tab] Next field  [PgUp/PgDn] Tab  [Esc] Cancel",
                self.submit_label
            ),
        };
        f.render_widget(Paragraph::new(status).style(Styles::inactive()), footer_area);
    }

    fn render_fields(&mut self, f: &mut Frame, area: Rect) {
        let visible = self.visible();

        // Scroll so the focused field is on screen
        let mut start = self.current.min(visible.len().saturating_sub(1));
        let mut used = visible
            .get(start)
            .map(|&i| self.controls[i].height())
            .unwrap_or(0);
        while start > 0 {
            let height = self.controls[visible[start - 1]].height();
            if used + height > area.height {
                break;
            }
            used += height;
            start -= 1;
        }

        let mut y = area.y;
        let mut focused_area = None;
        for (position, &index) in visible.iter().enumerate().skip(start) {
            let control = &self.controls[index];
            let height = control.height();
            if y + height > area.y + area.height {
                break;
            }
            let field_area = Rect::new(area.x, y, area.width, height);
            control.render(f, field_area);
            if position == self.current {
                focused_area = Some((index, field_area));
            }
            y += height;
        }

        if self.dropdown_open {
            if let Some((index, anchor)) = focused_area {
                let entries = self.controls[index].dropdown_entries().len() as u16;
                let popup = below(anchor, entries + 2, area);
                if popup.height > 2 {
                    f.render_widget(Clear, popup);
                    self.controls[index].render_dropdown(f, popup);
                }
            }
        }
    }
}

impl FormHandler for FormRenderer {
    fn get_current_field(&self) -> usize {
        self.current
    }

    fn set_current_field(&mut self, field: usize) {
        if field < self.visible().len() {
            self.current = field;
            self.refocus();
        }
    }

    fn get_field_count(&self) -> usize {
        self.visible().len()
    }

    fn handle_char_input(&mut self, c: char) {
        if let Some(control) = self.current_control() {
            control.insert_char(c);
        }
        self.edited();
    }

    fn handle_backspace(&mut self) {
        if let Some(control) = self.current_control() {
            control.delete_char();
        }
        self.edited();
    }

    fn handle_delete(&mut self) {
        if let Some(control) = self.current_control() {
            control.delete_char_forward();
        }
        self.edited();
    }

    fn validate(&self) -> Result<(), String> {
        match self
            .controls
            .iter()
            .find_map(|c| c.violation().map(|v| (c, v)))
        {
            Some((control, violation)) => Err(format!(
                "{}: {}",
                control.descriptor.label,
                control.descriptor.message_for(violation)
            )),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tui::components::form_field::{OptionsHandle, SelectOption};
    use ratatui::{backend::TestBackend, Terminal};
    use serde_json::json;

    fn unit_form() -> FormRenderer {
        FormRenderer::new(
            "New Unit",
            vec![
                FieldDescriptor::text("code", "Code").required().with_length(Some(2), Some(6)),
                FieldDescriptor::text("name", "Name").required(),
                FieldDescriptor::new("phone", "Phone", FieldKind::Tel),
                FieldDescriptor::new("active", "Active", FieldKind::Checkbox),
            ],
        )
    }

    fn person_form() -> FormRenderer {
        FormRenderer::new(
            "New Person",
            vec![
                FieldDescriptor::text("first_name", "First name").required().in_tab("Identity"),
                FieldDescriptor::select(
                    "document_type",
                    "Document type",
                    OptionsHandle::fixed(vec![SelectOption::new("National ID", "DNI")]),
                )
                .required()
                .in_tab("Identity"),
                FieldDescriptor::new("email", "Email", FieldKind::Email).in_tab("Contact"),
                FieldDescriptor::new("monthly_income", "Monthly income", FieldKind::Number)
                    .with_range(Some(0.0), None)
                    .in_tab("Economy"),
            ],
        )
    }

    #[test]
    fn test_invalid_submit_never_emits() {
        let mut form = unit_form();
        assert_eq!(form.submit(Instant::now()), None);
        assert_eq!(form.phase(), FormPhase::Editing);

        let errors = form.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], ("code".to_string(), "This field is required".to_string()));
        assert!(form.validate().is_err());
    }

    #[test]
    fn test_valid_submit_emits_typed_payload() {
        let mut form = unit_form();
        form.set_value("code", "N01");
        form.set_value("name", "North Office");

        let payload = form.submit(Instant::now());
        assert_eq!(
            payload,
            Some(json!({"code": "N01", "name": "North Office", "phone": null, "active": false}))
        );
        assert_eq!(form.phase(), FormPhase::Submitting);
    }

    #[test]
    fn test_double_submit_inside_guard_emits_once() {
        let mut form = unit_form();
        form.set_value("code", "N01");
        form.set_value("name", "North Office");
        let start = Instant::now();

        assert!(form.submit(start).is_some());
        form.complete(Err("server busy".to_string()));
        assert_eq!(form.error(), Some("server busy"));
        assert_eq!(form.submit(start + Duration::from_millis(50)), None);
        assert!(form.submit(start + Duration::from_millis(150)).is_some());
    }

    #[test]
    fn test_no_submit_while_saving() {
        let mut form = unit_form();
        form.set_value("code", "N01");
        form.set_value("name", "North Office");
        let start = Instant::now();
        assert!(form.submit(start).is_some());
        assert_eq!(form.submit(start + Duration::from_secs(1)), None);

        // Editing during the save returns to Editing
        form.handle_char_input('x');
        assert_eq!(form.phase(), FormPhase::Editing);

        form.complete(Ok(()));
        assert_eq!(form.phase(), FormPhase::Submitted);
    }

    #[test]
    fn test_bind_fills_controls() {
        let mut form = unit_form();
        form.bind(&json!({"id": 4, "code": "S02", "name": "South", "phone": null, "active": true}));
        assert_eq!(form.value("code"), Some("S02"));
        assert_eq!(form.value("phone"), Some(""));
        assert_eq!(form.value("active"), Some("true"));
        assert!(form.errors().is_empty());

        form.reset();
        assert_eq!(form.value("code"), Some(""));
        assert_eq!(form.value("active"), Some("false"));
    }

    #[test]
    fn test_tab_switching_keeps_values() {
        let mut form = person_form();
        assert_eq!(form.tabs(), ["Identity", "Contact", "Economy"]);
        assert_eq!(form.selected_tab(), 0);
        assert_eq!(form.visible(), vec![0, 1]);

        for c in "Ana".chars() {
            form.handle_char_input(c);
        }
        form.next_tab();
        assert_eq!(form.visible(), vec![2]);
        for c in "ana@example.org".chars() {
            form.handle_char_input(c);
        }
        form.previous_tab();

        assert_eq!(form.value("first_name"), Some("Ana"));
        assert_eq!(form.value("email"), Some("ana@example.org"));
    }

    #[test]
    fn test_failed_validation_jumps_to_offending_tab() {
        let mut form = person_form();
        form.set_value("first_name", "Ana");
        form.set_value("document_type", "DNI");
        form.set_value("monthly_income", "-10");

        assert_eq!(form.submit(Instant::now()), None);
        assert_eq!(form.selected_tab(), 2);
        assert_eq!(form.get_current_field(), 0);
    }

    #[test]
    fn test_select_via_keyboard() {
        let mut form = person_form();
        let now = Instant::now();
        let down = KeyEvent::new(KeyCode::Down, KeyModifiers::NONE);
        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);

        form.handle_key(down, now);
        assert_eq!(form.handle_key(enter, now), FormEvent::None);
        form.handle_key(down, now);
        form.handle_key(enter, now);
        assert_eq!(form.value("document_type"), Some("DNI"));
    }

    #[test]
    fn test_render_marks_required_and_errors() {
        let mut form = unit_form();
        form.submit(Instant::now());

        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|f| form.render(f, f.size())).unwrap();
        let buffer = terminal.backend().buffer().clone();
        let text: String = buffer.content().iter().map(|c| c.symbol()).collect();

        assert!(text.contains("Code * - This field is required"));
        assert!(text.contains("Phone"));
    }
}
