//! Collection dispatcher
//!
//! Owns one entity type's [`CollectionState`] behind a `watch` channel and is
//! the only place that state is mutated. Data-source failures are folded into
//! the state's `error`; nothing is returned to views as an `Err`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::crud::action::{Applied, LoadParams, Operation, Transition};
use crate::crud::source::DataSource;
use crate::crud::state::CollectionState;
use crate::models::Record;

/// Result of one dispatch, for logging and navigation decisions
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Applied,
    /// Response superseded by a newer load
    Stale,
    Failed(String),
    /// Payload rejected before reaching the data source
    Ignored,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Applied)
    }
}

/// Shared handle to one entity type's paginated state and its data source
pub struct Collection<R: Record> {
    source: Arc<dyn DataSource<R>>,
    state: watch::Sender<CollectionState<R>>,
    next_seq: AtomicU64,
}

impl<R: Record> Collection<R> {
    pub fn new(source: Arc<dyn DataSource<R>>, page_size: u32) -> Self {
        let (state, _) = watch::channel(CollectionState::new(page_size));
        Self {
            source,
            state,
            next_seq: AtomicU64::new(1),
        }
    }

    /// Live view of the state for renderers
    pub fn subscribe(&self) -> watch::Receiver<CollectionState<R>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> CollectionState<R> {
        self.state.borrow().clone()
    }

    fn apply(&self, transition: Transition<R>) -> Applied {
        let mut applied = Applied::Yes;
        self.state.send_modify(|state| applied = state.apply(transition));
        applied
    }

    pub async fn load(&self, params: LoadParams) -> DispatchOutcome {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        debug!(resource = R::RESOURCE, seq, page = params.page, "load dispatched");
        self.apply(Transition::LoadRequested {
            seq,
            params: params.clone(),
        });

        let result = match params.validate() {
            Ok(()) => self.source.load(&params).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(page) => {
                let count = page.data.len();
                match self.apply(Transition::Loaded { seq, page }) {
                    Applied::Yes => {
                        debug!(resource = R::RESOURCE, seq, count, "page applied");
                        DispatchOutcome::Applied
                    }
                    Applied::Stale => DispatchOutcome::Stale,
                }
            }
            Err(e) => {
                let message = e.to_string();
                warn!(resource = R::RESOURCE, seq, "load failed: {}", message);
                match self.apply(Transition::LoadFailed {
                    seq,
                    message: message.clone(),
                }) {
                    Applied::Yes => DispatchOutcome::Failed(message),
                    Applied::Stale => DispatchOutcome::Stale,
                }
            }
        }
    }

    /// Re-issue the last dispatched load
    pub async fn reload(&self) -> DispatchOutcome {
        let params = self.state.borrow().query().clone();
        self.load(params).await
    }

    pub async fn load_one(&self, key: &R::Key) -> DispatchOutcome {
        self.apply(Transition::Requested(Operation::LoadOne));
        match self.source.load_one(key).await {
            Ok(record) => {
                self.apply(Transition::LoadedOne(record));
                DispatchOutcome::Applied
            }
            Err(e) => self.fail(Operation::LoadOne, e.to_string()),
        }
    }

    pub async fn create(&self, payload: Value) -> DispatchOutcome {
        if !payload.is_object() {
            warn!(resource = R::RESOURCE, "ignoring create with non-object payload");
            return DispatchOutcome::Ignored;
        }
        self.apply(Transition::Requested(Operation::Create));
        match self.source.create(payload).await {
            Ok(record) => {
                info!(resource = R::RESOURCE, key = %record.key(), "record created");
                self.apply(Transition::Created(record));
                DispatchOutcome::Applied
            }
            Err(e) => self.fail(Operation::Create, e.to_string()),
        }
    }

    pub async fn update(&self, key: &R::Key, payload: Value) -> DispatchOutcome {
        if !payload.is_object() {
            warn!(resource = R::RESOURCE, key = %key, "ignoring update with non-object payload");
            return DispatchOutcome::Ignored;
        }
        self.apply(Transition::Requested(Operation::Update));
        match self.source.update(key, payload).await {
            Ok(record) => {
                info!(resource = R::RESOURCE, key = %key, "record updated");
                self.apply(Transition::Updated(key.clone(), record));
                DispatchOutcome::Applied
            }
            Err(e) => self.fail(Operation::Update, e.to_string()),
        }
    }

    pub async fn delete(&self, key: &R::Key) -> DispatchOutcome {
        self.apply(Transition::Requested(Operation::Delete));
        match self.source.delete(key).await {
            Ok(()) => {
                info!(resource = R::RESOURCE, key = %key, "record deleted");
                self.apply(Transition::Deleted(key.clone()));
                DispatchOutcome::Applied
            }
            Err(e) => self.fail(Operation::Delete, e.to_string()),
        }
    }

    /// Leave the edit view
    pub fn clear_selected(&self) {
        self.apply(Transition::ClearSelected);
    }

    fn fail(&self, operation: Operation, message: String) -> DispatchOutcome {
        warn!(resource = R::RESOURCE, "{} failed: {}", operation.as_str(), message);
        self.apply(Transition::Failed(operation, message.clone()));
        DispatchOutcome::Failed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crud::testing::{unit, StubSource};
    use crate::models::Unit;
    use serde_json::json;

    fn collection(source: Arc<StubSource>) -> Collection<Unit> {
        Collection::new(source, 10)
    }

    #[tokio::test]
    async fn test_load_populates_state() {
        let source = Arc::new(StubSource::with_units(25));
        let units = collection(source);

        let outcome = units.load(LoadParams::new(1, 10)).await;

        assert_eq!(outcome, DispatchOutcome::Applied);
        let state = units.snapshot();
        assert_eq!(state.items().len(), 10);
        assert_eq!(state.total_pages(), 3);
        assert_eq!((state.page_start(), state.page_end()), (1, 10));

        units.load(LoadParams::new(3, 10)).await;
        let state = units.snapshot();
        assert_eq!(state.items().len(), 5);
        assert_eq!(state.page_end(), 25);
    }

    #[tokio::test]
    async fn test_failed_load_is_folded_into_state() {
        let source = Arc::new(StubSource::with_units(25));
        let units = collection(source.clone());
        units.load(LoadParams::new(1, 10)).await;
        let before = units.snapshot();

        source.fail_next("connection refused");
        let outcome = units.load(LoadParams::new(2, 10)).await;

        assert!(matches!(outcome, DispatchOutcome::Failed(_)));
        let after = units.snapshot();
        assert_eq!(after.items(), before.items());
        assert_eq!(after.page(), before.page());
        assert_eq!(after.total(), before.total());
        assert_eq!(after.total_pages(), before.total_pages());
        assert!(after.error().unwrap().contains("connection refused"));
        assert!(!after.is_loading());
    }

    #[tokio::test]
    async fn test_invalid_params_never_reach_source() {
        let source = Arc::new(StubSource::with_units(5));
        let units = collection(source.clone());
        let outcome = units.load(LoadParams::new(0, 10)).await;
        assert!(matches!(outcome, DispatchOutcome::Failed(_)));
        assert_eq!(source.load_calls(), 0);
        assert!(!units.snapshot().is_loading());
    }

    #[tokio::test]
    async fn test_overlapping_loads_keep_newest_page() {
        let source = Arc::new(StubSource::with_units(25));
        let first_gate = source.gate_page(1);
        let second_gate = source.gate_page(2);
        let units = collection(source);

        let release = async {
            tokio::task::yield_now().await;
            second_gate.send(()).ok();
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
            first_gate.send(()).ok();
        };
        let (first, second, _) = tokio::join!(
            units.load(LoadParams::new(1, 10)),
            units.load(LoadParams::new(2, 10)),
            release
        );

        assert_eq!(second, DispatchOutcome::Applied);
        assert_eq!(first, DispatchOutcome::Stale);
        let state = units.snapshot();
        assert_eq!(state.page(), 2);
        assert_eq!(state.items()[0].id, 11);
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_create_appends_response() {
        let source = Arc::new(StubSource::with_units(3));
        let units = collection(source);
        units.load(LoadParams::new(1, 10)).await;

        let outcome = units.create(json!({"code": "X", "name": "Unit X"})).await;

        assert!(outcome.is_success());
        let state = units.snapshot();
        assert_eq!(state.items().len(), 4);
        assert_eq!(state.items()[3].name, "Unit X");
        assert_eq!(state.items()[3].id, 99);
    }

    #[tokio::test]
    async fn test_non_object_payload_is_ignored() {
        let source = Arc::new(StubSource::with_units(3));
        let units = collection(source.clone());
        units.load(LoadParams::new(1, 10)).await;

        assert_eq!(units.create(json!("submit")).await, DispatchOutcome::Ignored);
        assert_eq!(units.update(&1, json!([1, 2])).await, DispatchOutcome::Ignored);
        assert_eq!(units.snapshot().items().len(), 3);
        assert_eq!(source.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let source = Arc::new(StubSource::with_units(10));
        let units = collection(source);
        units.load(LoadParams::new(1, 10)).await;
        units.load_one(&4).await;

        units.update(&4, json!({"name": "Renamed"})).await;
        let state = units.snapshot();
        assert_eq!(state.find(&4).map(|u| u.name.as_str()), Some("Renamed"));
        assert_eq!(state.selected().map(|u| u.name.as_str()), Some("Renamed"));
        assert_eq!(state.find(&5), Some(&unit(5)));

        units.delete(&4).await;
        let state = units.snapshot();
        assert_eq!(state.items().len(), 9);
        assert!(state.find(&4).is_none());
        assert_eq!(state.total(), 10);

        units.clear_selected();
        assert!(units.snapshot().selected().is_none());
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_items() {
        let source = Arc::new(StubSource::with_units(10));
        let units = collection(source.clone());
        units.load(LoadParams::new(1, 10)).await;

        source.fail_next("403 forbidden");
        let outcome = units.delete(&4).await;

        assert!(matches!(outcome, DispatchOutcome::Failed(_)));
        let state = units.snapshot();
        assert_eq!(state.items().len(), 10);
        assert!(state.error().is_some());
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_subscribers_observe_changes() {
        let source = Arc::new(StubSource::with_units(3));
        let units = collection(source);
        let mut rx = units.subscribe();

        units.load(LoadParams::new(1, 10)).await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().items().len(), 3);
    }
}
