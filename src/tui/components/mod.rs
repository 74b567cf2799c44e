//! Reusable UI components
//!
//! Descriptor-driven list and form renderers plus the small widgets they are
//! built from. None of them talk to a data source.

pub mod column;
pub mod form;
pub mod form_field;
pub mod list_view;
pub mod menu;
pub mod search_box;
pub mod status_display;

pub use column::{ActionDescriptor, ColumnDescriptor};
pub use form::{FormEvent, FormPhase, FormRenderer};
pub use form_field::{FieldDescriptor, FieldKind, OptionsHandle, SelectOption};
pub use list_view::{ListIntent, ListRenderer, ListViewConfig};
pub use status_display::StatusDisplay;
