//! List/edit screen for one registry entity
//!
//! Wires a [`ListRenderer`] and a [`FormRenderer`] to an entity's
//! [`Collection`]: list intents and form submissions become dispatches, and
//! dispatch outcomes become status messages and navigation.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{layout::Rect, Frame};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::catalog::{Entity, Lookups};
use crate::config::Config;
use crate::crud::{Collection, CollectionState, DispatchOutcome, LoadParams};
use crate::tui::{
    components::{
        column::ActionDescriptor,
        form::{FormEvent, FormRenderer},
        list_view::{ListIntent, ListRenderer, ListViewConfig},
    },
    traits::{Screen, ScreenAction, ScreenId},
};

#[derive(Debug, Clone, PartialEq)]
enum Mode<K> {
    List,
    /// `editing` is the key of the record bound to the form, `None` when creating
    Form { editing: Option<K> },
}

/// Result of a dispatch that ran on its own task
#[derive(Debug)]
enum Completion<K> {
    Loaded(DispatchOutcome),
    Opened(K, DispatchOutcome),
    Saved(Option<K>, DispatchOutcome),
    Deleted(K, DispatchOutcome),
}

pub struct EntityScreen<R: Entity> {
    collection: Arc<Collection<R>>,
    view: watch::Receiver<CollectionState<R>>,
    list: ListRenderer<R>,
    form: FormRenderer,
    mode: Mode<R::Key>,
    completions_tx: mpsc::UnboundedSender<Completion<R::Key>>,
    completions: mpsc::UnboundedReceiver<Completion<R::Key>>,
    /// Dispatches whose completion has not been drained yet
    in_flight: usize,
}

impl<R: Entity> EntityScreen<R> {
    pub fn new(collection: Arc<Collection<R>>, lookups: &Lookups, config: &Config) -> Self {
        let noun = R::TITLE.to_lowercase();

        let mut page_sizes = vec![config.ui.page_size, 10, 25, 50];
        page_sizes.sort_unstable();
        page_sizes.dedup();

        let mut list_config = ListViewConfig::new(R::TITLE)
            .with_empty_message(&format!("No {} registered", noun))
            .with_search_placeholder(&format!("Search {}", noun))
            .with_search_debounce(config.search_debounce());
        list_config.page_sizes = page_sizes;

        let list = ListRenderer::new(list_config, R::columns(lookups))
            .with_actions(vec![ActionDescriptor::edit(), ActionDescriptor::delete()])
            .with_searchable(R::SEARCHABLE);

        let form = FormRenderer::new(&format!("New {}", R::SINGULAR), R::fields(lookups))
            .with_submit_guard(config.submit_guard());

        let (completions_tx, completions) = mpsc::unbounded_channel();

        Self {
            view: collection.subscribe(),
            collection,
            list,
            form,
            mode: Mode::List,
            completions_tx,
            completions,
            in_flight: 0,
        }
    }

    fn snapshot(&self) -> CollectionState<R> {
        self.view.borrow().clone()
    }

    fn first_page(&self) -> LoadParams {
        let page_size = self.view.borrow().page_size();
        LoadParams::new(1, page_size)
    }

    /// Run a collection dispatch on its own task; the result comes back
    /// through `completions` and is handled on a later tick
    fn spawn<F, Fut>(&mut self, task: F)
    where
        F: FnOnce(Arc<Collection<R>>) -> Fut,
        Fut: Future<Output = Completion<R::Key>> + Send + 'static,
    {
        let work = task(Arc::clone(&self.collection));
        let tx = self.completions_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            // the screen may be gone by the time the dispatch resolves
            let _ = tx.send(work.await);
        });
    }

    fn spawn_load(&mut self, params: LoadParams) {
        self.spawn(move |collection| async move {
            Completion::Loaded(collection.load(params).await)
        });
    }

    fn dispatch(&mut self, intent: ListIntent<R::Key>) -> ScreenAction {
        debug!(resource = R::RESOURCE, ?intent, "list intent");
        let query = self.snapshot().query().clone();

        match intent {
            ListIntent::PageChanged { page, page_size } => {
                self.spawn_load(LoadParams {
                    page,
                    page_size,
                    ..query
                });
                ScreenAction::None
            }
            ListIntent::Search { term, fields } => {
                debug!(resource = R::RESOURCE, ?fields, "searching");
                self.spawn_load(query.with_search(&term).at_page(1));
                ScreenAction::None
            }
            ListIntent::Sort { field, direction } => {
                self.spawn_load(LoadParams {
                    page: 1,
                    sort_direction: field.as_ref().map(|_| direction),
                    sort_by: field,
                    ..query
                });
                ScreenAction::None
            }
            ListIntent::Refresh => {
                self.spawn(|collection| async move { Completion::Loaded(collection.reload().await) });
                ScreenAction::None
            }
            ListIntent::Create => {
                self.form.reset();
                self.form.title = format!("New {}", R::SINGULAR);
                self.mode = Mode::Form { editing: None };
                ScreenAction::ClearMessages
            }
            ListIntent::Edit(key) => self.edit(key),
            ListIntent::DeleteRequested(key) => {
                self.spawn(move |collection| async move {
                    let outcome = collection.delete(&key).await;
                    Completion::Deleted(key, outcome)
                });
                ScreenAction::SetProgress(format!("Deleting {}…", R::SINGULAR.to_lowercase()))
            }
        }
    }

    /// Open the form on `key`; it shows a loading placeholder until the record arrives
    fn edit(&mut self, key: R::Key) -> ScreenAction {
        self.form.reset();
        self.form.title = format!("Edit {} {}", R::SINGULAR, key);
        self.form.set_loading(true);
        self.mode = Mode::Form {
            editing: Some(key.clone()),
        };

        self.spawn(move |collection| async move {
            let outcome = collection.load_one(&key).await;
            Completion::Opened(key, outcome)
        });
        ScreenAction::ClearMessages
    }

    fn save(&mut self, payload: Value) -> ScreenAction {
        let editing = match self.mode {
            Mode::Form { ref editing } => editing.clone(),
            Mode::List => return ScreenAction::None,
        };

        self.spawn(move |collection| async move {
            let outcome = match editing {
                Some(ref key) => collection.update(key, payload).await,
                None => collection.create(payload).await,
            };
            Completion::Saved(editing, outcome)
        });
        ScreenAction::SetProgress(format!("Saving {}…", R::SINGULAR.to_lowercase()))
    }

    fn is_editing(&self, key: &Option<R::Key>) -> bool {
        matches!(self.mode, Mode::Form { ref editing } if editing == key)
    }

    fn finish(&mut self, completion: Completion<R::Key>) -> ScreenAction {
        match completion {
            Completion::Loaded(outcome) => outcome_action(outcome),
            Completion::Opened(key, outcome) => {
                if !self.is_editing(&Some(key.clone())) {
                    debug!(resource = R::RESOURCE, %key, "form closed before record arrived");
                    if self.mode == Mode::List {
                        self.collection.clear_selected();
                    }
                    return ScreenAction::None;
                }
                let selected = self.snapshot().selected().cloned();
                match (outcome, selected) {
                    (DispatchOutcome::Applied, Some(record)) => {
                        self.form.bind(&serde_json::to_value(&record).unwrap_or(Value::Null));
                        ScreenAction::None
                    }
                    (outcome, _) => {
                        self.leave_form();
                        match outcome {
                            DispatchOutcome::Failed(message) => ScreenAction::SetError(message),
                            _ => ScreenAction::SetError(format!(
                                "{} {} could not be loaded",
                                R::SINGULAR,
                                key
                            )),
                        }
                    }
                }
            }
            Completion::Saved(editing, outcome) => {
                let open = self.is_editing(&editing);
                match outcome {
                    DispatchOutcome::Applied => {
                        info!(resource = R::RESOURCE, "form saved");
                        if open {
                            self.form.complete(Ok(()));
                            self.leave_form();
                        }
                        ScreenAction::SetStatus(format!("{} saved", R::SINGULAR))
                    }
                    DispatchOutcome::Failed(message) if open => {
                        self.form.complete(Err(message));
                        ScreenAction::ClearMessages
                    }
                    DispatchOutcome::Failed(message) => ScreenAction::SetError(message),
                    DispatchOutcome::Ignored | DispatchOutcome::Stale => {
                        warn!(resource = R::RESOURCE, "save was not applied");
                        if open {
                            self.form.complete(Err("Nothing was saved".to_string()));
                        }
                        ScreenAction::ClearMessages
                    }
                }
            }
            Completion::Deleted(key, outcome) => match outcome {
                DispatchOutcome::Applied => {
                    ScreenAction::SetStatus(format!("{} {} deleted", R::SINGULAR, key))
                }
                other => outcome_action(other),
            },
        }
    }

    /// Handle every completion that has arrived, keeping the last action that matters
    fn drain(&mut self) -> ScreenAction {
        let mut action = ScreenAction::None;
        while let Ok(completion) = self.completions.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            let next = self.finish(completion);
            if next != ScreenAction::None {
                action = next;
            }
        }
        action
    }

    fn leave_form(&mut self) {
        self.mode = Mode::List;
        self.collection.clear_selected();
        self.form.reset();
    }
}

fn outcome_action(outcome: DispatchOutcome) -> ScreenAction {
    match outcome {
        DispatchOutcome::Failed(message) => ScreenAction::SetError(message),
        _ => ScreenAction::None,
    }
}

#[async_trait]
impl<R: Entity> Screen for EntityScreen<R> {
    fn draw(&mut self, f: &mut Frame, area: Rect) {
        match self.mode {
            Mode::List => {
                let view = self.snapshot();
                self.list.render(f, area, &view);
            }
            Mode::Form { .. } => {
                self.form.sync_options();
                self.form.render(f, area);
            }
        }
    }

    async fn handle_key_event(&mut self, key: KeyEvent, now: Instant) -> Result<ScreenAction> {
        match self.mode {
            Mode::List => {
                if key.code == KeyCode::Esc && !self.list.is_capturing_input() {
                    return Ok(ScreenAction::NavigateBack);
                }
                let view = self.snapshot();
                Ok(match self.list.handle_key(key, &view, now) {
                    Some(intent) => self.dispatch(intent),
                    None => ScreenAction::None,
                })
            }
            Mode::Form { .. } => {
                self.form.sync_options();
                Ok(match self.form.handle_key(key, now) {
                    FormEvent::Submit(payload) => self.save(payload),
                    FormEvent::Cancel => {
                        self.leave_form();
                        ScreenAction::ClearMessages
                    }
                    FormEvent::None => ScreenAction::None,
                })
            }
        }
    }

    fn screen_id(&self) -> ScreenId {
        R::SCREEN
    }

    fn is_capturing_input(&self) -> bool {
        match self.mode {
            Mode::List => self.list.is_capturing_input(),
            Mode::Form { .. } => true,
        }
    }

    fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    async fn on_enter(&mut self) -> Result<()> {
        if !self.view.borrow().is_loaded() && self.in_flight == 0 {
            let params = self.first_page();
            self.spawn_load(params);
        }
        Ok(())
    }

    async fn tick(&mut self, now: Instant) -> Result<ScreenAction> {
        let finished = self.drain();
        if self.mode != Mode::List {
            return Ok(finished);
        }
        Ok(match self.list.tick(now).map(|intent| self.dispatch(intent)) {
            Some(action) if action != ScreenAction::None => action,
            _ => finished,
        })
    }

    fn help_hint(&self) -> &'static str {
        match self.mode {
            Mode::List => "/: Search | a: Add | e: Edit | d: Delete | ←/→: Page | Esc: Back",
            Mode::Form { .. } => "Tab: Next field | Enter: Save | Esc: Cancel",
        }
    }
}
