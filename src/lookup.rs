//! Select options fed from other collections
//!
//! A [`LookupFeed`] owns its own [`Collection`] over a lookup entity (units,
//! classifications, persons) and republishes the loaded records as
//! [`SelectOption`]s whenever that collection changes. Forms only hold the
//! receiving [`OptionsHandle`](crate::tui::components::OptionsHandle).

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::crud::{Collection, CollectionState, DataSource, DispatchOutcome, LoadParams, SortDirection};
use crate::models::Record;
use crate::tui::components::form_field::{OptionsPublisher, SelectOption};

/// Records fetched for a lookup; lookups are small reference lists
pub const LOOKUP_PAGE_SIZE: u32 = 100;

type Filter<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;
type ToOption<R> = Arc<dyn Fn(&R) -> SelectOption + Send + Sync>;

struct LookupTarget<R> {
    filter: Filter<R>,
    to_option: ToOption<R>,
    publisher: OptionsPublisher,
}

impl<R> Clone for LookupTarget<R> {
    fn clone(&self) -> Self {
        Self {
            filter: Arc::clone(&self.filter),
            to_option: Arc::clone(&self.to_option),
            publisher: self.publisher.clone(),
        }
    }
}

/// Publishes one lookup collection to any number of select fields
pub struct LookupFeed<R: Record> {
    collection: Arc<Collection<R>>,
    params: LoadParams,
    targets: Vec<LookupTarget<R>>,
}

impl<R: Record> Clone for LookupFeed<R> {
    fn clone(&self) -> Self {
        Self {
            collection: Arc::clone(&self.collection),
            params: self.params.clone(),
            targets: self.targets.clone(),
        }
    }
}

impl<R: Record> LookupFeed<R> {
    pub fn new(source: Arc<dyn DataSource<R>>) -> Self {
        Self {
            collection: Arc::new(Collection::new(source, LOOKUP_PAGE_SIZE)),
            params: LoadParams::new(1, LOOKUP_PAGE_SIZE),
            targets: Vec::new(),
        }
    }

    pub fn sorted_by(mut self, field: &str) -> Self {
        self.params = self.params.with_sort(field, SortDirection::Asc);
        self
    }

    pub fn publish_to<M>(self, publisher: OptionsPublisher, to_option: M) -> Self
    where
        M: Fn(&R) -> SelectOption + Send + Sync + 'static,
    {
        self.publish_filtered(publisher, |_: &R| true, to_option)
    }

    pub fn publish_filtered<F, M>(mut self, publisher: OptionsPublisher, filter: F, to_option: M) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
        M: Fn(&R) -> SelectOption + Send + Sync + 'static,
    {
        self.targets.push(LookupTarget {
            filter: Arc::new(filter),
            to_option: Arc::new(to_option),
            publisher,
        });
        self
    }

    /// Push the options derived from `state` to every target
    pub fn publish(&self, state: &CollectionState<R>) {
        if !state.is_loaded() {
            return;
        }
        for target in &self.targets {
            let options: Vec<SelectOption> = state
                .items()
                .iter()
                .filter(|record| (target.filter)(record))
                .map(|record| (target.to_option)(record))
                .collect();
            target.publisher.send_replace(options);
        }
    }

    /// Reload the lookup collection and republish
    pub async fn refresh(&self) -> DispatchOutcome {
        let outcome = self.collection.load(self.params.clone()).await;
        match outcome {
            DispatchOutcome::Applied => {
                let state = self.collection.snapshot();
                debug!(resource = R::RESOURCE, count = state.items().len(), "lookup refreshed");
                self.publish(&state);
            }
            DispatchOutcome::Failed(ref message) => {
                warn!(resource = R::RESOURCE, "lookup load failed: {}", message);
            }
            _ => {}
        }
        outcome
    }

    /// Load in the background; options appear whenever the load lands
    pub fn spawn(&self) -> JoinHandle<DispatchOutcome> {
        let feed = self.clone();
        tokio::spawn(async move { feed.refresh().await })
    }
}
