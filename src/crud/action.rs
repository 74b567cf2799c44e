//! Action dispatch protocol
//!
//! The finite set of collection operations, their parameters, and the pure
//! state transitions each request/success/failure produces.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crud::state::{total_pages, CollectionState};
use crate::errors::{RegistryError, RegistryResult};
use crate::models::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Parameters of a `Load` dispatch, serialized as the list query string
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadParams {
    pub page: u32,
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_direction: Option<SortDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl LoadParams {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            sort_by: None,
            sort_direction: None,
            search: None,
        }
    }

    pub fn with_sort(mut self, sort_by: &str, direction: SortDirection) -> Self {
        self.sort_by = Some(sort_by.to_string());
        self.sort_direction = Some(direction);
        self
    }

    pub fn with_search(mut self, search: &str) -> Self {
        let term = search.trim();
        self.search = if term.is_empty() {
            None
        } else {
            Some(term.to_string())
        };
        self
    }

    /// Same query moved to another page
    pub fn at_page(&self, page: u32) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> RegistryResult<()> {
        if self.page == 0 {
            return Err(RegistryError::InvalidParams("page is 1-indexed".to_string()));
        }
        if self.page_size == 0 {
            return Err(RegistryError::InvalidParams(
                "page size must be greater than zero".to_string(),
            ));
        }
        if let Some(ref field) = self.sort_by {
            if !is_field_name(field) {
                return Err(RegistryError::InvalidParams(format!(
                    "cannot sort by '{}'",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// Property names usable as sort keys and column keys: no dots, no quoting.
pub fn is_field_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Paginated envelope returned by a data source for `Load`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<R> {
    pub data: Vec<R>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    #[serde(default)]
    pub total_pages: u32,
}

/// Collection operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    LoadOne,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &str {
        match self {
            Operation::Load => "load",
            Operation::LoadOne => "load one",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// A single request, success or failure event applied to a collection
#[derive(Debug, Clone)]
pub enum Transition<R: Record> {
    LoadRequested { seq: u64, params: LoadParams },
    Loaded { seq: u64, page: Page<R> },
    LoadFailed { seq: u64, message: String },
    Requested(Operation),
    LoadedOne(R),
    Created(R),
    Updated(R::Key, R),
    Deleted(R::Key),
    Failed(Operation, String),
    ClearSelected,
}

/// Whether a transition changed the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Yes,
    /// A load response older than one already shown
    Stale,
}

impl<R: Record> CollectionState<R> {
    /// Apply one transition. Load responses, successful or failed, older than
    /// the newest resolved load are discarded.
    pub fn apply(&mut self, transition: Transition<R>) -> Applied {
        let applied = match transition {
            Transition::LoadRequested { seq, params } => {
                self.load_dispatched = self.load_dispatched.max(seq);
                self.query = params;
                self.error = None;
                Applied::Yes
            }
            Transition::Loaded { seq, page } => {
                if seq < self.load_resolved {
                    debug!(seq, resolved = self.load_resolved, "discarding stale page");
                    Applied::Stale
                } else {
                    self.load_resolved = self.load_resolved.max(seq);
                    self.load_applied = seq;
                    self.total = page.total;
                    self.page = page.page;
                    self.page_size = page.page_size;
                    self.total_pages = total_pages(page.total, page.page_size);
                    self.items = page.data;
                    self.error = None;
                    Applied::Yes
                }
            }
            Transition::LoadFailed { seq, message } => {
                if seq < self.load_resolved {
                    debug!(seq, resolved = self.load_resolved, "discarding stale failure");
                    Applied::Stale
                } else {
                    self.load_resolved = self.load_resolved.max(seq);
                    self.error = Some(message);
                    Applied::Yes
                }
            }
            Transition::Requested(_) => {
                self.pending_mutations += 1;
                self.error = None;
                Applied::Yes
            }
            Transition::LoadedOne(record) => {
                self.pending_mutations = self.pending_mutations.saturating_sub(1);
                self.selected = Some(record);
                Applied::Yes
            }
            Transition::Created(record) => {
                self.pending_mutations = self.pending_mutations.saturating_sub(1);
                // Later pages keep their server order until the next load.
                if self.page <= 1 {
                    self.items.push(record);
                }
                Applied::Yes
            }
            Transition::Updated(key, record) => {
                self.pending_mutations = self.pending_mutations.saturating_sub(1);
                if let Some(item) = self.items.iter_mut().find(|item| item.key() == key) {
                    *item = record.clone();
                }
                if self.selected.as_ref().map(|s| s.key() == key).unwrap_or(false) {
                    self.selected = Some(record);
                }
                Applied::Yes
            }
            Transition::Deleted(key) => {
                self.pending_mutations = self.pending_mutations.saturating_sub(1);
                self.items.retain(|item| item.key() != key);
                Applied::Yes
            }
            Transition::Failed(_, message) => {
                self.pending_mutations = self.pending_mutations.saturating_sub(1);
                self.error = Some(message);
                Applied::Yes
            }
            Transition::ClearSelected => {
                self.selected = None;
                Applied::Yes
            }
        };
        self.refresh_loading();
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Unit;

    fn unit(id: i64, name: &str) -> Unit {
        Unit {
            id,
            code: format!("U{:03}", id),
            name: name.to_string(),
            address: None,
            phone: None,
            active: true,
        }
    }

    fn page_of(ids: std::ops::Range<i64>, total: u64, page: u32) -> Page<Unit> {
        Page {
            data: ids.map(|id| unit(id, "Office")).collect(),
            total,
            page,
            page_size: 10,
            total_pages: 0,
        }
    }

    fn loaded_state() -> CollectionState<Unit> {
        let mut state = CollectionState::new(10);
        state.apply(Transition::LoadRequested { seq: 1, params: LoadParams::new(1, 10) });
        state.apply(Transition::Loaded { seq: 1, page: page_of(1..11, 25, 1) });
        state
    }

    #[test]
    fn test_load_recomputes_total_pages() {
        let state = loaded_state();
        assert_eq!(state.items().len(), 10);
        assert_eq!(state.total(), 25);
        assert_eq!(state.total_pages(), 3);
        assert_eq!(state.page_start(), 1);
        assert_eq!(state.page_end(), 10);
        assert!(!state.is_loading());
        assert!(state.error().is_none());
    }

    #[test]
    fn test_load_request_sets_loading_and_clears_error() {
        let mut state = loaded_state();
        state.apply(Transition::Requested(Operation::Delete));
        state.apply(Transition::Failed(Operation::Delete, "boom".to_string()));
        assert_eq!(state.error(), Some("boom"));

        state.apply(Transition::LoadRequested { seq: 2, params: LoadParams::new(2, 10) });
        assert!(state.is_loading());
        assert!(state.error().is_none());
        assert_eq!(state.query().page, 2);
    }

    #[test]
    fn test_failed_load_leaves_page_untouched() {
        let mut state = loaded_state();
        let before_items = state.items().to_vec();

        state.apply(Transition::LoadRequested { seq: 2, params: LoadParams::new(2, 10) });
        state.apply(Transition::LoadFailed { seq: 2, message: "HTTP 503".to_string() });

        assert_eq!(state.items(), before_items.as_slice());
        assert_eq!(state.total(), 25);
        assert_eq!(state.page(), 1);
        assert_eq!(state.page_size(), 10);
        assert_eq!(state.total_pages(), 3);
        assert_eq!(state.error(), Some("HTTP 503"));
        assert!(!state.is_loading());
    }

    #[test]
    fn test_stale_load_is_discarded() {
        let mut state = CollectionState::new(10);
        state.apply(Transition::LoadRequested { seq: 1, params: LoadParams::new(1, 10) });
        state.apply(Transition::LoadRequested { seq: 2, params: LoadParams::new(2, 10) });

        let newer = state.apply(Transition::Loaded { seq: 2, page: page_of(11..21, 25, 2) });
        let older = state.apply(Transition::Loaded { seq: 1, page: page_of(1..11, 25, 1) });

        assert_eq!(newer, Applied::Yes);
        assert_eq!(older, Applied::Stale);
        assert_eq!(state.page(), 2);
        assert_eq!(state.items()[0].id, 11);
        assert!(!state.is_loading());
    }

    #[test]
    fn test_older_success_after_newer_failure_is_discarded() {
        let mut state = CollectionState::new(10);
        state.apply(Transition::LoadRequested { seq: 1, params: LoadParams::new(1, 10) });
        state.apply(Transition::LoadRequested { seq: 2, params: LoadParams::new(2, 10) });

        let failed = state.apply(Transition::LoadFailed { seq: 2, message: "HTTP 503".into() });
        let older = state.apply(Transition::Loaded { seq: 1, page: page_of(1..11, 25, 1) });

        assert_eq!(failed, Applied::Yes);
        assert_eq!(older, Applied::Stale);
        assert_eq!(state.error(), Some("HTTP 503"));
        assert!(state.items().is_empty());
        assert_eq!(state.query().page, 2);
        assert!(!state.is_loading());
    }

    #[test]
    fn test_older_failure_after_newer_success_is_discarded() {
        let mut state = CollectionState::new(10);
        state.apply(Transition::LoadRequested { seq: 1, params: LoadParams::new(1, 10) });
        state.apply(Transition::LoadRequested { seq: 2, params: LoadParams::new(2, 10) });

        state.apply(Transition::Loaded { seq: 2, page: page_of(11..21, 25, 2) });
        let older = state.apply(Transition::LoadFailed { seq: 1, message: "timeout".into() });

        assert_eq!(older, Applied::Stale);
        assert_eq!(state.error(), None);
        assert_eq!(state.page(), 2);
    }

    #[test]
    fn test_older_response_first_keeps_loading_until_newest_resolves() {
        let mut state = CollectionState::new(10);
        state.apply(Transition::LoadRequested { seq: 1, params: LoadParams::new(1, 10) });
        state.apply(Transition::LoadRequested { seq: 2, params: LoadParams::new(2, 10) });

        state.apply(Transition::Loaded { seq: 1, page: page_of(1..11, 25, 1) });
        assert!(state.is_loading());
        assert_eq!(state.page(), 1);

        state.apply(Transition::Loaded { seq: 2, page: page_of(11..21, 25, 2) });
        assert!(!state.is_loading());
        assert_eq!(state.page(), 2);
    }

    #[test]
    fn test_create_appends_authoritative_record() {
        let mut state = CollectionState::new(10);
        state.apply(Transition::LoadRequested { seq: 1, params: LoadParams::new(1, 10) });
        state.apply(Transition::Loaded { seq: 1, page: page_of(1..4, 3, 1) });

        state.apply(Transition::Requested(Operation::Create));
        assert!(state.is_loading());
        state.apply(Transition::Created(unit(99, "Unit X")));

        assert_eq!(state.items().len(), 4);
        assert_eq!(state.items().last(), Some(&unit(99, "Unit X")));
        assert!(!state.is_loading());
    }

    #[test]
    fn test_create_on_later_page_leaves_items() {
        let mut state = CollectionState::new(10);
        state.apply(Transition::LoadRequested { seq: 1, params: LoadParams::new(3, 10) });
        state.apply(Transition::Loaded { seq: 1, page: page_of(21..26, 25, 3) });
        state.apply(Transition::Requested(Operation::Create));
        state.apply(Transition::Created(unit(99, "Unit X")));
        assert_eq!(state.items().len(), 5);
    }

    #[test]
    fn test_update_replaces_only_matching_item() {
        let mut state = loaded_state();
        state.apply(Transition::Requested(Operation::LoadOne));
        state.apply(Transition::LoadedOne(unit(4, "Office")));
        let before = state.items().to_vec();

        state.apply(Transition::Requested(Operation::Update));
        state.apply(Transition::Updated(4, unit(4, "Renamed")));

        let changed: Vec<_> = state
            .items()
            .iter()
            .zip(before.iter())
            .filter(|(after, before)| after != before)
            .collect();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].0.name, "Renamed");
        assert_eq!(state.selected().map(|u| u.name.as_str()), Some("Renamed"));
    }

    #[test]
    fn test_update_leaves_unrelated_selection() {
        let mut state = loaded_state();
        state.apply(Transition::Requested(Operation::LoadOne));
        state.apply(Transition::LoadedOne(unit(7, "Office")));
        state.apply(Transition::Requested(Operation::Update));
        state.apply(Transition::Updated(4, unit(4, "Renamed")));
        assert_eq!(state.selected().map(|u| u.name.as_str()), Some("Office"));
    }

    #[test]
    fn test_delete_keeps_total_until_next_load() {
        let mut state = CollectionState::new(10);
        state.apply(Transition::LoadRequested { seq: 1, params: LoadParams::new(1, 10) });
        state.apply(Transition::Loaded { seq: 1, page: page_of(38..48, 25, 1) });

        state.apply(Transition::Requested(Operation::Delete));
        state.apply(Transition::Deleted(42));

        assert_eq!(state.items().len(), 9);
        assert!(state.find(&42).is_none());
        assert_eq!(state.total(), 25);
        assert_eq!(state.total_pages(), 3);
    }

    #[test]
    fn test_load_one_does_not_touch_items() {
        let mut state = loaded_state();
        let before = state.items().to_vec();
        state.apply(Transition::Requested(Operation::LoadOne));
        state.apply(Transition::LoadedOne(unit(500, "Elsewhere")));
        assert_eq!(state.items(), before.as_slice());
        assert_eq!(state.selected().map(|u| u.id), Some(500));

        state.apply(Transition::ClearSelected);
        assert!(state.selected().is_none());
    }

    #[test]
    fn test_load_params_validation() {
        assert!(LoadParams::new(1, 10).validate().is_ok());
        assert!(LoadParams::new(0, 10).validate().is_err());
        assert!(LoadParams::new(1, 0).validate().is_err());
        assert!(LoadParams::new(1, 10)
            .with_sort("name; DROP", SortDirection::Asc)
            .validate()
            .is_err());
        assert_eq!(LoadParams::new(1, 10).with_search("   ").search, None);
    }

    #[test]
    fn test_load_params_query_shape() {
        let params = LoadParams::new(2, 25)
            .with_sort("last_name", SortDirection::Desc)
            .with_search("garcia");
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "page": 2,
                "pageSize": 25,
                "sortBy": "last_name",
                "sortDirection": "desc",
                "search": "garcia"
            })
        );
    }
}
