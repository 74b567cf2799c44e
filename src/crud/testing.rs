//! In-memory data source for collection and screen tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::crud::action::{LoadParams, Page};
use crate::crud::source::DataSource;
use crate::errors::{RegistryError, RegistryResult};
use crate::models::Unit;

pub(crate) fn unit(id: i64) -> Unit {
    Unit {
        id,
        code: format!("U{:03}", id),
        name: format!("Unit {}", id),
        address: None,
        phone: None,
        active: true,
    }
}

pub(crate) struct StubSource {
    units: Mutex<Vec<Unit>>,
    failure: Mutex<Option<String>>,
    gates: Mutex<HashMap<u32, oneshot::Receiver<()>>>,
    loads: AtomicUsize,
    writes: AtomicUsize,
}

impl StubSource {
    pub(crate) fn with_units(count: i64) -> Self {
        Self {
            units: Mutex::new((1..=count).map(unit).collect()),
            failure: Mutex::new(None),
            gates: Mutex::new(HashMap::new()),
            loads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Make the next call fail with an API error carrying `message`
    pub(crate) fn fail_next(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    /// Hold loads of `page` until the returned sender fires
    pub(crate) fn gate_page(&self, page: u32) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(page, rx);
        tx
    }

    pub(crate) fn load_calls(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub(crate) fn write_calls(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> RegistryResult<()> {
        match self.failure.lock().unwrap().take() {
            Some(message) => Err(RegistryError::Api {
                status_code: 503,
                message,
            }),
            None => Ok(()),
        }
    }

    fn not_found(key: &i64) -> RegistryError {
        RegistryError::NotFound {
            resource: "units".to_string(),
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl DataSource<Unit> for StubSource {
    async fn load(&self, params: &LoadParams) -> RegistryResult<Page<Unit>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().unwrap().remove(&params.page);
        if let Some(gate) = gate {
            gate.await.ok();
        }
        self.take_failure()?;

        let units = self.units.lock().unwrap();
        let start = ((params.page - 1) * params.page_size) as usize;
        let data: Vec<Unit> = units
            .iter()
            .skip(start)
            .take(params.page_size as usize)
            .cloned()
            .collect();
        Ok(Page {
            data,
            total: units.len() as u64,
            page: params.page,
            page_size: params.page_size,
            total_pages: 0,
        })
    }

    async fn load_one(&self, key: &i64) -> RegistryResult<Unit> {
        self.take_failure()?;
        self.units
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == *key)
            .cloned()
            .ok_or_else(|| Self::not_found(key))
    }

    async fn create(&self, payload: Value) -> RegistryResult<Unit> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        let mut body = json!({"id": 99, "active": true});
        if let (Some(body), Some(fields)) = (body.as_object_mut(), payload.as_object()) {
            body.extend(fields.clone());
        }
        let created: Unit = serde_json::from_value(body)?;
        self.units.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update(&self, key: &i64, payload: Value) -> RegistryResult<Unit> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        let mut units = self.units.lock().unwrap();
        let existing = units
            .iter_mut()
            .find(|u| u.id == *key)
            .ok_or_else(|| Self::not_found(key))?;
        let mut body = serde_json::to_value(&*existing)?;
        if let (Some(body), Some(fields)) = (body.as_object_mut(), payload.as_object()) {
            body.extend(fields.clone());
        }
        *existing = serde_json::from_value(body)?;
        Ok(existing.clone())
    }

    async fn delete(&self, key: &i64) -> RegistryResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        let mut units = self.units.lock().unwrap();
        let before = units.len();
        units.retain(|u| u.id != *key);
        if units.len() == before {
            return Err(Self::not_found(key));
        }
        Ok(())
    }
}
