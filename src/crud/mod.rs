//! Generic paginated CRUD state
//!
//! One [`Collection`] per entity type tracks a page of records, pagination
//! metadata, request status and the record bound to an edit form. Views read
//! it through `watch` receivers and request changes by dispatching operations.

pub mod action;
pub mod collection;
pub mod source;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use action::{LoadParams, Operation, Page, SortDirection, Transition};
pub use collection::{Collection, DispatchOutcome};
pub use source::DataSource;
pub use state::CollectionState;
