//! Column and row-action descriptors for list views

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use ratatui::style::Style;
use serde_json::Value;
use unicode_width::UnicodeWidthStr;

use crate::models::Record;
use crate::tui::components::form_field::OptionsHandle;
use crate::tui::components::list_view::ListIntent;
use crate::tui::ui::Styles;

/// Raw record value as display text
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Cut `text` to `width` terminal columns, marking the cut with an ellipsis
pub fn truncate(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    for c in text.chars() {
        let next = format!("{}{}", out, c);
        if next.width() + 1 > width {
            break;
        }
        out = next;
    }
    out.push('…');
    out
}

pub type Formatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Declarative description of one table column
#[derive(Clone)]
pub struct ColumnDescriptor {
    pub key: String,
    pub label: String,
    pub formatter: Option<Formatter>,
    /// Offered as a server-side sort key
    pub sortable: bool,
    pub width: u16,
}

impl fmt::Debug for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("formatter", &self.formatter.is_some())
            .field("sortable", &self.sortable)
            .field("width", &self.width)
            .finish()
    }
}

impl ColumnDescriptor {
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            formatter: None,
            sortable: false,
            width: 16,
        }
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn with_width(mut self, width: u16) -> Self {
        self.width = width;
        self
    }

    pub fn with_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    /// Cell text for one record projection
    pub fn cell(&self, record: &Value) -> String {
        let value = record.get(&self.key).unwrap_or(&Value::Null);
        match self.formatter {
            Some(ref formatter) => formatter(value),
            None => display_value(value),
        }
    }
}

/// Reusable cell formatters
pub mod formatters {
    use super::*;

    pub fn yes_no(value: &Value) -> String {
        match value {
            Value::Bool(true) => "Yes".to_string(),
            Value::Bool(false) => "No".to_string(),
            other => display_value(other),
        }
    }

    /// ISO dates shown as DD/MM/YYYY
    pub fn date(value: &Value) -> String {
        let raw = display_value(value);
        NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map(|d| d.format("%d/%m/%Y").to_string())
            .unwrap_or(raw)
    }

    pub fn currency(value: &Value) -> String {
        match value.as_f64() {
            Some(amount) => format!("$ {:.2}", amount),
            None => display_value(value),
        }
    }

    /// Show the option label for a stored lookup value
    pub fn lookup(options: OptionsHandle) -> impl Fn(&Value) -> String + Send + Sync + 'static {
        move |value: &Value| options.label_for(value).unwrap_or_else(|| display_value(value))
    }
}

/// Visual weight of a row action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStyle {
    Primary,
    Danger,
    Neutral,
}

impl ActionStyle {
    pub fn style(&self) -> Style {
        match self {
            ActionStyle::Primary => Styles::info(),
            ActionStyle::Danger => Styles::error(),
            ActionStyle::Neutral => Styles::default(),
        }
    }
}

pub type ActionCallback<R> = Arc<dyn Fn(&R) -> ListIntent<<R as Record>::Key> + Send + Sync>;

/// Button offered on every row
pub struct ActionDescriptor<R: Record> {
    pub label: String,
    pub icon: Option<String>,
    pub style: ActionStyle,
    pub hotkey: char,
    /// Prompt that must be accepted before the callback runs
    pub confirm: Option<String>,
    pub callback: ActionCallback<R>,
}

impl<R: Record> Clone for ActionDescriptor<R> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            icon: self.icon.clone(),
            style: self.style,
            hotkey: self.hotkey,
            confirm: self.confirm.clone(),
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<R: Record> ActionDescriptor<R> {
    pub fn new<F>(label: &str, hotkey: char, callback: F) -> Self
    where
        F: Fn(&R) -> ListIntent<R::Key> + Send + Sync + 'static,
    {
        Self {
            label: label.to_string(),
            icon: None,
            style: ActionStyle::Neutral,
            hotkey,
            confirm: None,
            callback: Arc::new(callback),
        }
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    pub fn with_style(mut self, style: ActionStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_confirm(mut self, prompt: &str) -> Self {
        self.confirm = Some(prompt.to_string());
        self
    }

    pub fn edit() -> Self {
        Self::new("Edit", 'e', |record: &R| ListIntent::Edit(record.key()))
            .with_icon("✎")
            .with_style(ActionStyle::Primary)
    }

    pub fn delete() -> Self {
        Self::new("Delete", 'd', |record: &R| ListIntent::DeleteRequested(record.key()))
            .with_icon("✗")
            .with_style(ActionStyle::Danger)
            .with_confirm("Delete this record?")
    }

    pub fn invoke(&self, record: &R) -> ListIntent<R::Key> {
        (self.callback)(record)
    }

    /// "[e] ✎ Edit" footer hint
    pub fn hint(&self) -> String {
        match self.icon {
            Some(ref icon) => format!("[{}] {} {}", self.hotkey, icon, self.label),
            None => format!("[{}] {}", self.hotkey, self.label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Unit;
    use crate::tui::components::form_field::SelectOption;
    use serde_json::json;

    #[test]
    fn test_cell_uses_formatter_or_raw_value() {
        let record = json!({"name": "North", "active": true, "opened": "2021-03-05", "phone": null});
        assert_eq!(ColumnDescriptor::new("name", "Name").cell(&record), "North");
        assert_eq!(ColumnDescriptor::new("active", "Active").cell(&record), "true");
        assert_eq!(
            ColumnDescriptor::new("active", "Active")
                .with_formatter(formatters::yes_no)
                .cell(&record),
            "Yes"
        );
        assert_eq!(
            ColumnDescriptor::new("opened", "Opened")
                .with_formatter(formatters::date)
                .cell(&record),
            "05/03/2021"
        );
        assert_eq!(ColumnDescriptor::new("phone", "Phone").cell(&record), "");
        assert_eq!(ColumnDescriptor::new("missing", "Missing").cell(&record), "");
    }

    #[test]
    fn test_lookup_formatter_follows_options() {
        let options = OptionsHandle::fixed(vec![SelectOption::new("North Office", 3)]);
        let column = ColumnDescriptor::new("unit_id", "Unit")
            .with_formatter(formatters::lookup(options));
        assert_eq!(column.cell(&json!({"unit_id": 3})), "North Office");
        assert_eq!(column.cell(&json!({"unit_id": 9})), "9");
    }

    #[test]
    fn test_truncate_respects_display_width() {
        assert_eq!(truncate("Office", 10), "Office");
        assert_eq!(truncate("Community Centre", 8), "Communi…");
        assert_eq!(truncate("Peñalolén", 5), "Peña…");
    }

    #[test]
    fn test_standard_actions() {
        let unit = crate::crud::testing::unit(42);
        let delete = ActionDescriptor::<Unit>::delete();
        assert!(delete.confirm.is_some());
        assert_eq!(delete.invoke(&unit), ListIntent::DeleteRequested(42));
        assert_eq!(ActionDescriptor::<Unit>::edit().invoke(&unit), ListIntent::Edit(42));
        assert_eq!(ActionDescriptor::<Unit>::edit().hint(), "[e] ✎ Edit");
    }
}
