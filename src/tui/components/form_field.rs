//! Field descriptors and the input control that edits one field

use std::collections::HashMap;

use chrono::NaiveDate;
use ratatui::{
    layout::Rect,
    style::Style,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use crate::tui::{components::column::display_value, ui::Styles};

/// Kind of input a field renders as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Email,
    Select,
    Checkbox,
    TextArea,
    Date,
    Tel,
}

/// Constraint a value failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Violation {
    Required,
    Email,
    Min,
    Max,
    MinLength,
    MaxLength,
    /// Not a number, date or phone number
    Format,
}

/// One entry of a select field
#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    pub label: String,
    pub value: Value,
}

impl SelectOption {
    pub fn new(label: &str, value: impl Into<Value>) -> Self {
        Self {
            label: label.to_string(),
            value: value.into(),
        }
    }

    /// Form of the value stored in a control
    pub fn raw_value(&self) -> String {
        display_value(&self.value)
    }
}

/// Live option list of a select field; updated by whoever holds the sender
#[derive(Debug, Clone)]
pub struct OptionsHandle(watch::Receiver<Vec<SelectOption>>);

/// Publishing side of an [`OptionsHandle`]
pub type OptionsPublisher = watch::Sender<Vec<SelectOption>>;

pub fn options_channel(initial: Vec<SelectOption>) -> (OptionsPublisher, OptionsHandle) {
    let (tx, rx) = watch::channel(initial);
    (tx, OptionsHandle(rx))
}

impl OptionsHandle {
    /// Options that never change
    pub fn fixed(options: Vec<SelectOption>) -> Self {
        options_channel(options).1
    }

    pub fn current(&self) -> Vec<SelectOption> {
        self.0.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn find(&self, raw: &str) -> Option<SelectOption> {
        self.0.borrow().iter().find(|o| o.raw_value() == raw).cloned()
    }

    pub fn label_for(&self, value: &Value) -> Option<String> {
        let raw = display_value(value);
        self.find(&raw).map(|o| o.label)
    }
}

/// Declarative description of one form input
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
    pub placeholder: String,
    pub options: Option<OptionsHandle>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub messages: HashMap<Violation, String>,
    /// Tab group for long forms
    pub tab: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            required: false,
            placeholder: String::new(),
            options: None,
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            messages: HashMap::new(),
            tab: None,
        }
    }

    pub fn text(name: &str, label: &str) -> Self {
        Self::new(name, label, FieldKind::Text)
    }

    pub fn select(name: &str, label: &str, options: OptionsHandle) -> Self {
        Self::new(name, label, FieldKind::Select).with_options(options)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = placeholder.to_string();
        self
    }

    pub fn with_options(mut self, options: OptionsHandle) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_message(mut self, violation: Violation, message: &str) -> Self {
        self.messages.insert(violation, message.to_string());
        self
    }

    pub fn in_tab(mut self, tab: &str) -> Self {
        self.tab = Some(tab.to_string());
        self
    }

    /// First constraint `raw` violates, if any
    pub fn validate(&self, raw: &str) -> Option<Violation> {
        let value = raw.trim();

        if self.kind == FieldKind::Checkbox {
            return (self.required && value != "true").then_some(Violation::Required);
        }
        if value.is_empty() {
            return self.required.then_some(Violation::Required);
        }

        let length = value.chars().count();
        match self.kind {
            FieldKind::Number => {
                let number: f64 = match value.parse() {
                    Ok(n) => n,
                    Err(_) => return Some(Violation::Format),
                };
                if self.min.map(|min| number < min).unwrap_or(false) {
                    return Some(Violation::Min);
                }
                if self.max.map(|max| number > max).unwrap_or(false) {
                    return Some(Violation::Max);
                }
                return None;
            }
            FieldKind::Date => {
                if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
                    return Some(Violation::Format);
                }
                return None;
            }
            FieldKind::Select => {
                if let Some(ref options) = self.options {
                    if !options.is_empty() && options.find(value).is_none() {
                        return Some(Violation::Format);
                    }
                }
                return None;
            }
            FieldKind::Email if !is_email(value) => return Some(Violation::Email),
            FieldKind::Tel if !is_phone(value) => return Some(Violation::Format),
            _ => {}
        }

        if self.min_length.map(|min| length < min).unwrap_or(false) {
            return Some(Violation::MinLength);
        }
        if self.max_length.map(|max| length > max).unwrap_or(false) {
            return Some(Violation::MaxLength);
        }
        None
    }

    /// Message shown for a violation: the field's override, else the default
    pub fn message_for(&self, violation: Violation) -> String {
        if let Some(message) = self.messages.get(&violation) {
            return message.clone();
        }
        match violation {
            Violation::Required => "This field is required".to_string(),
            Violation::Email => "Enter a valid email address".to_string(),
            Violation::Min => format!("Must be at least {}", self.min.unwrap_or_default()),
            Violation::Max => format!("Must be at most {}", self.max.unwrap_or_default()),
            Violation::MinLength => {
                format!("Must be at least {} characters", self.min_length.unwrap_or_default())
            }
            Violation::MaxLength => {
                format!("Must be at most {} characters", self.max_length.unwrap_or_default())
            }
            Violation::Format => match self.kind {
                FieldKind::Number => "Enter a number".to_string(),
                FieldKind::Date => "Invalid date format (YYYY-MM-DD)".to_string(),
                FieldKind::Tel => "Enter a valid phone number".to_string(),
                FieldKind::Select => "Choose one of the listed options".to_string(),
                _ => "Invalid value".to_string(),
            },
        }
    }

    /// JSON value submitted for a valid raw value
    pub fn to_json(&self, raw: &str) -> Value {
        let value = raw.trim();
        match self.kind {
            FieldKind::Checkbox => Value::Bool(value == "true"),
            _ if value.is_empty() => Value::Null,
            FieldKind::Number => {
                if let Ok(int) = value.parse::<i64>() {
                    Value::from(int)
                } else {
                    value.parse::<f64>().map(Value::from).unwrap_or(Value::Null)
                }
            }
            FieldKind::Select => {
                if let Some(option) = self.options.as_ref().and_then(|o| o.find(value)) {
                    return option.value;
                }
                value
                    .parse::<i64>()
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::String(value.to_string()))
            }
            FieldKind::TextArea => Value::String(raw.to_string()),
            _ => Value::String(value.to_string()),
        }
    }

    /// Raw control value for a bound record value
    pub fn raw_from_json(&self, value: &Value) -> String {
        match (self.kind, value) {
            (FieldKind::Checkbox, Value::Bool(b)) => b.to_string(),
            (FieldKind::Checkbox, _) => "false".to_string(),
            _ => display_value(value),
        }
    }
}

fn is_email(value: &str) -> bool {
    let mut parts = value.splitn(2, '@');
    let (local, domain) = match (parts.next(), parts.next()) {
        (Some(local), Some(domain)) => (local, domain),
        _ => return false,
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.contains(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn is_phone(value: &str) -> bool {
    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    digits >= 6
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')' | '.'))
}

/// Editable control bound to one [`FieldDescriptor`]
#[derive(Debug, Clone)]
pub struct FieldControl {
    pub descriptor: FieldDescriptor,
    pub value: String,
    pub is_focused: bool,
    pub cursor_position: usize,
    pub touched: bool,
    pub dropdown_state: ListState,
}

impl FieldControl {
    pub fn new(descriptor: FieldDescriptor) -> Self {
        let value = if descriptor.kind == FieldKind::Checkbox {
            "false".to_string()
        } else {
            String::new()
        };
        Self {
            descriptor,
            value,
            is_focused: false,
            cursor_position: 0,
            touched: false,
            dropdown_state: ListState::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn set_value(&mut self, value: &str) {
        self.value = value.to_string();
        self.cursor_position = self.value.chars().count();
    }

    pub fn set_focus(&mut self, focused: bool) {
        self.is_focused = focused;
        if !focused {
            self.touched = true;
        } else if self.descriptor.kind == FieldKind::Select {
            self.highlight_current_option();
        }
    }

    fn accepts_text(&self) -> bool {
        !matches!(self.descriptor.kind, FieldKind::Select | FieldKind::Checkbox)
    }

    fn byte_index(&self) -> usize {
        self.value
            .char_indices()
            .nth(self.cursor_position)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    pub fn insert_char(&mut self, c: char) {
        if !self.accepts_text() {
            if c == ' ' && self.descriptor.kind == FieldKind::Checkbox {
                self.toggle();
            }
            return;
        }
        let at = self.byte_index();
        self.value.insert(at, c);
        self.cursor_position += 1;
        self.touched = true;
    }

    pub fn delete_char(&mut self) {
        if self.accepts_text() && self.cursor_position > 0 {
            self.cursor_position -= 1;
            let at = self.byte_index();
            self.value.remove(at);
            self.touched = true;
        }
    }

    pub fn delete_char_forward(&mut self) {
        if self.accepts_text() && self.cursor_position < self.value.chars().count() {
            let at = self.byte_index();
            self.value.remove(at);
            self.touched = true;
        }
    }

    pub fn move_cursor_left(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
        }
    }

    pub fn move_cursor_right(&mut self) {
        if self.cursor_position < self.value.chars().count() {
            self.cursor_position += 1;
        }
    }

    pub fn move_cursor_to_start(&mut self) {
        self.cursor_position = 0;
    }

    pub fn move_cursor_to_end(&mut self) {
        self.cursor_position = self.value.chars().count();
    }

    pub fn toggle(&mut self) {
        if self.descriptor.kind == FieldKind::Checkbox {
            self.value = if self.value == "true" { "false" } else { "true" }.to_string();
            self.touched = true;
        }
    }

    /// "Choose an option" followed by the current options
    pub fn dropdown_entries(&self) -> Vec<SelectOption> {
        let mut entries = vec![SelectOption::new("Choose an option", Value::Null)];
        if let Some(ref options) = self.descriptor.options {
            entries.extend(options.current());
        }
        entries
    }

    fn highlight_current_option(&mut self) {
        let entries = self.dropdown_entries();
        let index = entries
            .iter()
            .skip(1)
            .position(|o| o.raw_value() == self.value)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.dropdown_state.select(Some(index));
    }

    /// Move the dropdown highlight up
    pub fn dropdown_up(&mut self) {
        let count = self.dropdown_entries().len();
        let selected = self.dropdown_state.selected().unwrap_or(0);
        let new_selected = if selected == 0 { count - 1 } else { selected - 1 };
        self.dropdown_state.select(Some(new_selected));
    }

    /// Move the dropdown highlight down
    pub fn dropdown_down(&mut self) {
        let count = self.dropdown_entries().len();
        let selected = self.dropdown_state.selected().unwrap_or(0);
        self.dropdown_state.select(Some((selected + 1) % count));
    }

    /// Take the highlighted dropdown entry as the value
    pub fn select_dropdown_value(&mut self) {
        let entries = self.dropdown_entries();
        if let Some(entry) = self.dropdown_state.selected().and_then(|i| entries.get(i)) {
            self.value = if entry.value.is_null() {
                String::new()
            } else {
                entry.raw_value()
            };
            self.cursor_position = self.value.chars().count();
            self.touched = true;
        }
    }

    /// Drop a selection that the latest options no longer offer
    pub fn sync_options(&mut self) {
        let options = match self.descriptor.options {
            Some(ref options) if self.descriptor.kind == FieldKind::Select => options,
            _ => return,
        };
        if !self.value.is_empty() && !options.is_empty() && options.find(&self.value).is_none() {
            debug!(field = %self.descriptor.name, value = %self.value, "selection no longer offered");
            self.value.clear();
            self.cursor_position = 0;
        }
    }

    pub fn violation(&self) -> Option<Violation> {
        self.descriptor.validate(&self.value)
    }

    /// Message to display: only for touched, invalid fields
    pub fn error_message(&self) -> Option<String> {
        if !self.touched {
            return None;
        }
        self.violation().map(|v| self.descriptor.message_for(v))
    }

    fn display_text(&self) -> String {
        match self.descriptor.kind {
            FieldKind::Checkbox => {
                if self.value == "true" { "[x]" } else { "[ ]" }.to_string()
            }
            FieldKind::Select => {
                if self.value.is_empty() {
                    return "Choose an option".to_string();
                }
                self.descriptor
                    .options
                    .as_ref()
                    .and_then(|o| o.find(&self.value))
                    .map(|o| o.label)
                    .unwrap_or_else(|| self.value.clone())
            }
            _ if self.value.is_empty() => self.descriptor.placeholder.clone(),
            _ => self.value.clone(),
        }
    }

    /// Rows the control needs, borders included
    pub fn height(&self) -> u16 {
        match self.descriptor.kind {
            FieldKind::TextArea => 5,
            _ => 3,
        }
    }

    /// Render the form field
    pub fn render(&self, f: &mut Frame, area: Rect) {
        let error = self.error_message();

        let border_style = if self.is_focused {
            Styles::active_border()
        } else if error.is_some() {
            Styles::error()
        } else {
            Styles::inactive_border()
        };

        let marker = if self.descriptor.required { " *" } else { "" };
        let title = match error {
            Some(ref error) => format!("{}{} - {}", self.descriptor.label, marker, error),
            None => format!("{}{}", self.descriptor.label, marker),
        };

        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(border_style);

        let placeholder_shown = self.value.is_empty() && self.accepts_text();
        let text_style = if placeholder_shown || (self.value.is_empty() && self.descriptor.kind == FieldKind::Select) {
            Styles::inactive()
        } else {
            Styles::default()
        };

        let paragraph = Paragraph::new(self.display_text())
            .style(text_style)
            .wrap(Wrap { trim: false })
            .block(block);

        f.render_widget(paragraph, area);

        // Render cursor if focused on a text input
        if self.is_focused && self.accepts_text() && self.descriptor.kind != FieldKind::TextArea {
            let cursor_x = area.x + 1 + self.cursor_position as u16;
            let cursor_y = area.y + 1;
            if cursor_x < area.x + area.width.saturating_sub(1) {
                f.set_cursor(cursor_x, cursor_y);
            }
        }
    }

    /// Render the option list under a focused select
    pub fn render_dropdown(&mut self, f: &mut Frame, area: Rect) {
        if !self.is_focused || self.descriptor.kind != FieldKind::Select {
            return;
        }

        let items: Vec<ListItem> = self
            .dropdown_entries()
            .into_iter()
            .enumerate()
            .map(|(i, option)| {
                let style = if Some(i) == self.dropdown_state.selected() {
                    Styles::selected()
                } else if i == 0 {
                    Styles::inactive()
                } else {
                    Style::default()
                };
                ListItem::new(option.label).style(style)
            })
            .collect();

        let block = Block::default()
            .title("Options")
            .borders(Borders::ALL)
            .border_style(Styles::active_border());

        let list = List::new(items).block(block);

        f.render_stateful_widget(list, area, &mut self.dropdown_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_and_optional_empty_values() {
        let name = FieldDescriptor::text("name", "Name").required();
        assert_eq!(name.validate("  "), Some(Violation::Required));
        assert_eq!(name.validate("North"), None);

        let phone = FieldDescriptor::new("phone", "Phone", FieldKind::Tel);
        assert_eq!(phone.validate(""), None);
        assert_eq!(phone.to_json(""), Value::Null);
    }

    #[test]
    fn test_kind_specific_validation() {
        let email = FieldDescriptor::new("email", "Email", FieldKind::Email);
        assert_eq!(email.validate("ana@example.org"), None);
        assert_eq!(email.validate("ana@example"), Some(Violation::Email));
        assert_eq!(email.validate("ana example@x.org"), Some(Violation::Email));

        let income = FieldDescriptor::new("monthly_income", "Income", FieldKind::Number)
            .with_range(Some(0.0), Some(100000.0));
        assert_eq!(income.validate("-5"), Some(Violation::Min));
        assert_eq!(income.validate("250000"), Some(Violation::Max));
        assert_eq!(income.validate("abc"), Some(Violation::Format));
        assert_eq!(income.validate("1200.50"), None);

        let born = FieldDescriptor::new("birth_date", "Birth date", FieldKind::Date);
        assert_eq!(born.validate("2024-13-01"), Some(Violation::Format));
        assert_eq!(born.validate("2024-02-29"), None);

        let code = FieldDescriptor::text("code", "Code").with_length(Some(2), Some(4));
        assert_eq!(code.validate("A"), Some(Violation::MinLength));
        assert_eq!(code.validate("ABCDE"), Some(Violation::MaxLength));

        let phone = FieldDescriptor::new("phone", "Phone", FieldKind::Tel);
        assert_eq!(phone.validate("+54 (11) 5555-0101"), None);
        assert_eq!(phone.validate("call me"), Some(Violation::Format));
    }

    #[test]
    fn test_message_override_wins_over_default() {
        let field = FieldDescriptor::text("document_number", "Document")
            .required()
            .with_length(None, Some(12))
            .with_message(Violation::Required, "Document number is mandatory");
        assert_eq!(field.message_for(Violation::Required), "Document number is mandatory");
        assert_eq!(field.message_for(Violation::MaxLength), "Must be at most 12 characters");

        let email = FieldDescriptor::new("email", "Email", FieldKind::Email);
        assert_eq!(email.message_for(Violation::Email), "Enter a valid email address");
    }

    #[test]
    fn test_json_conversion_by_kind() {
        let count = FieldDescriptor::new("unit_id", "Unit", FieldKind::Number);
        assert_eq!(count.to_json("7"), json!(7));
        assert_eq!(count.to_json("7.5"), json!(7.5));

        let active = FieldDescriptor::new("active", "Active", FieldKind::Checkbox);
        assert_eq!(active.to_json("true"), json!(true));
        assert_eq!(active.to_json("false"), json!(false));
        assert_eq!(active.raw_from_json(&json!(true)), "true");

        let unit = FieldDescriptor::select(
            "unit_id",
            "Unit",
            OptionsHandle::fixed(vec![SelectOption::new("North Office", 3)]),
        );
        assert_eq!(unit.to_json("3"), json!(3));
        assert_eq!(unit.raw_from_json(&json!(3)), "3");
    }

    #[test]
    fn test_select_options_arrive_after_render() {
        let (publisher, options) = options_channel(Vec::new());
        let mut control = FieldControl::new(FieldDescriptor::select("unit_id", "Unit", options));
        assert_eq!(control.dropdown_entries().len(), 1);

        publisher.send_replace(vec![SelectOption::new("A", 1)]);

        let entries = control.dropdown_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].label, "A");

        control.set_focus(true);
        control.dropdown_down();
        control.select_dropdown_value();
        assert_eq!(control.value, "1");
        assert_eq!(control.display_text(), "A");
    }

    #[test]
    fn test_selection_survives_until_invalidated() {
        let (publisher, options) = options_channel(Vec::new());
        let mut control = FieldControl::new(FieldDescriptor::select("unit_id", "Unit", options));
        control.set_value("2");

        // Not yet loaded: keep the bound value
        control.sync_options();
        assert_eq!(control.value, "2");

        publisher.send_replace(vec![SelectOption::new("A", 1), SelectOption::new("B", 2)]);
        control.sync_options();
        assert_eq!(control.value, "2");

        publisher.send_replace(vec![SelectOption::new("A", 1)]);
        control.sync_options();
        assert_eq!(control.value, "");
    }

    #[test]
    fn test_unknown_select_value_is_a_format_error() {
        let unit = FieldDescriptor::select(
            "unit_id",
            "Unit",
            OptionsHandle::fixed(vec![SelectOption::new("North Office", 3)]),
        )
        .required();
        assert_eq!(unit.validate("3"), None);
        assert_eq!(unit.validate(""), Some(Violation::Required));
        assert_eq!(unit.validate("8"), Some(Violation::Format));
        assert_eq!(unit.message_for(Violation::Format), "Choose one of the listed options");
    }

    #[test]
    fn test_errors_only_for_touched_fields() {
        let mut control = FieldControl::new(FieldDescriptor::text("name", "Name").required());
        assert!(control.error_message().is_none());
        control.set_focus(true);
        control.set_focus(false);
        assert_eq!(control.error_message().as_deref(), Some("This field is required"));
    }

    #[test]
    fn test_text_editing_handles_multibyte_input() {
        let mut control = FieldControl::new(FieldDescriptor::text("last_name", "Last name"));
        for c in "Muñoz".chars() {
            control.insert_char(c);
        }
        control.move_cursor_left();
        control.delete_char();
        assert_eq!(control.value, "Muñz");
        control.move_cursor_to_start();
        control.delete_char_forward();
        assert_eq!(control.value, "uñz");
    }

    #[test]
    fn test_checkbox_toggles_with_space() {
        let mut control = FieldControl::new(
            FieldDescriptor::new("active", "Active", FieldKind::Checkbox).required(),
        );
        assert_eq!(control.violation(), Some(Violation::Required));
        control.insert_char(' ');
        assert_eq!(control.value, "true");
        assert_eq!(control.violation(), None);
    }
}
