//! Paginated collection state
//!
//! Holds "page N of entity E" as last reported by the data source. Views only
//! ever see snapshots of this value; every mutation goes through
//! [`CollectionState::apply`] driven by [`crate::crud::Collection`].

use crate::crud::action::LoadParams;
use crate::models::Record;

/// `ceil(total / page_size)`, zero when the page size is unknown.
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total.div_ceil(page_size as u64);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// One entity type's page of records plus request status
#[derive(Debug, Clone)]
pub struct CollectionState<R: Record> {
    pub(super) items: Vec<R>,
    pub(super) total: u64,
    pub(super) page: u32,
    pub(super) page_size: u32,
    pub(super) total_pages: u32,
    pub(super) loading: bool,
    pub(super) error: Option<String>,
    pub(super) selected: Option<R>,
    /// Parameters of the most recently dispatched load
    pub(super) query: LoadParams,
    pub(super) load_dispatched: u64,
    pub(super) load_resolved: u64,
    pub(super) load_applied: u64,
    pub(super) pending_mutations: u32,
}

impl<R: Record> CollectionState<R> {
    pub fn new(page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: 1,
            page_size,
            total_pages: 0,
            loading: false,
            error: None,
            selected: None,
            query: LoadParams::new(1, page_size),
            load_dispatched: 0,
            load_resolved: 0,
            load_applied: 0,
            pending_mutations: 0,
        }
    }

    pub fn items(&self) -> &[R] {
        &self.items
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn selected(&self) -> Option<&R> {
        self.selected.as_ref()
    }

    /// Parameters of the last load dispatched against this collection
    pub fn query(&self) -> &LoadParams {
        &self.query
    }

    /// Whether at least one load has been applied
    pub fn is_loaded(&self) -> bool {
        self.load_applied > 0
    }

    /// 1-based index of the first record on the current page
    pub fn page_start(&self) -> u64 {
        (self.page.max(1) as u64 - 1) * self.page_size as u64 + 1
    }

    /// 1-based index of the last record on the current page
    pub fn page_end(&self) -> u64 {
        std::cmp::min(self.page as u64 * self.page_size as u64, self.total)
    }

    /// "Showing X–Y of Z" caption for list footers
    pub fn caption(&self) -> String {
        if self.total == 0 {
            "No records".to_string()
        } else {
            format!(
                "Showing {}–{} of {}",
                self.page_start(),
                self.page_end(),
                self.total
            )
        }
    }

    pub fn find(&self, key: &R::Key) -> Option<&R> {
        self.items.iter().find(|item| &item.key() == key)
    }

    pub(super) fn refresh_loading(&mut self) {
        self.loading = self.load_resolved < self.load_dispatched || self.pending_mutations > 0;
    }
}

impl<R: Record> Default for CollectionState<R> {
    fn default() -> Self {
        Self::new(10)
    }
}
