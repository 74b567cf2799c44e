//! Data source capability consumed by collections

use async_trait::async_trait;
use serde_json::Value;

use crate::crud::action::{LoadParams, Page};
use crate::errors::RegistryResult;
use crate::models::Record;

/// Remote or local backing store for one entity type.
///
/// Payloads are JSON objects keyed by field name, as produced by the form
/// renderer; every successful write returns the authoritative record.
#[async_trait]
pub trait DataSource<R: Record>: Send + Sync {
    async fn load(&self, params: &LoadParams) -> RegistryResult<Page<R>>;

    async fn load_one(&self, key: &R::Key) -> RegistryResult<R>;

    async fn create(&self, payload: Value) -> RegistryResult<R>;

    async fn update(&self, key: &R::Key, payload: Value) -> RegistryResult<R>;

    async fn delete(&self, key: &R::Key) -> RegistryResult<()>;
}
