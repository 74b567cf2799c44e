//! REST data source for the remote registry API
//!
//! A thin wrapper: one resource path per entity, the paginated envelope for
//! list requests, bare records for everything else.

use std::marker::PhantomData;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::crud::{DataSource, LoadParams, Page};
use crate::errors::{RegistryError, RegistryResult};
use crate::models::Record;

/// Shared HTTP client configured from [`Config`]
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl RestClient {
    pub fn new(base_url: &str, config: &Config) -> RegistryResult<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .user_agent(config.http.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
        })
    }

    /// Data source for one entity type sharing this client
    pub fn source<R: Record>(&self) -> RestSource<R> {
        RestSource {
            http: self.clone(),
            _record: PhantomData,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }
}

pub struct RestSource<R> {
    http: RestClient,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> RestSource<R> {
    pub fn collection_url(&self) -> String {
        format!("{}/{}", self.http.base_url, R::RESOURCE)
    }

    pub fn record_url(&self, key: &R::Key) -> String {
        format!("{}/{}/{}", self.http.base_url, R::RESOURCE, key)
    }

    async fn send(&self, request: RequestBuilder, key: Option<&R::Key>) -> RegistryResult<Response> {
        let response = self.http.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            if let Some(key) = key {
                return Err(RegistryError::NotFound {
                    resource: R::RESOURCE.to_string(),
                    key: key.to_string(),
                });
            }
        }

        let body = response.text().await.unwrap_or_default();
        Err(RegistryError::Api {
            status_code: status.as_u16(),
            message: error_message(status, &body),
        })
    }
}

/// Prefer the API's `message` field, fall back to the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(Value::String(message)) = map.get("message").or_else(|| map.get("error")) {
            return message.clone();
        }
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() <= 200 {
        return trimmed.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("unexpected response")
        .to_string()
}

#[async_trait]
impl<R: Record> DataSource<R> for RestSource<R> {
    async fn load(&self, params: &LoadParams) -> RegistryResult<Page<R>> {
        let url = self.collection_url();
        debug!("GET {} page={} size={}", url, params.page, params.page_size);
        let request = self.http.client.get(&url).query(params);
        let page = self.send(request, None).await?.json::<Page<R>>().await?;
        Ok(page)
    }

    async fn load_one(&self, key: &R::Key) -> RegistryResult<R> {
        let request = self.http.client.get(self.record_url(key));
        Ok(self.send(request, Some(key)).await?.json::<R>().await?)
    }

    async fn create(&self, payload: Value) -> RegistryResult<R> {
        let request = self.http.client.post(self.collection_url()).json(&payload);
        Ok(self.send(request, None).await?.json::<R>().await?)
    }

    async fn update(&self, key: &R::Key, payload: Value) -> RegistryResult<R> {
        let request = self.http.client.put(self.record_url(key)).json(&payload);
        Ok(self.send(request, Some(key)).await?.json::<R>().await?)
    }

    async fn delete(&self, key: &R::Key) -> RegistryResult<()> {
        let request = self.http.client.delete(self.record_url(key));
        self.send(request, Some(key)).await?;
        Ok(())
    }
}
