//! REST binding of the list, column and dropdown services

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::{ColumnService, FilterOptionsService, ListService};
use crate::config::Config;
use crate::errors::ListError;
use crate::models::{ColumnDescriptor, ColumnSet, FilterOptions, ListPage, QueryRequest};
use crate::screens::ScreenDefinition;

const SUCCESS: &str = "SUCCESS";

/// Response envelope used by every endpoint of the backend
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    status: String,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    fn into_data(self, status_code: u16) -> Result<Option<T>, ListError> {
        if self.status != SUCCESS {
            return Err(ListError::server(
                Some(status_code),
                self.message.unwrap_or_else(|| format!("Request failed with status {}", self.status)),
            ));
        }
        Ok(self.data)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DropdownPayload {
    #[serde(default)]
    dropdown_data: FilterOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ColumnUpdate<'a> {
    is_reset: bool,
    column_for: &'a str,
    columns: Vec<&'a str>,
}

/// Shared HTTP client for the credit management API
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.api_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .context("API token contains invalid header characters")?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .user_agent(config.http.user_agent.clone())
            .timeout(config.http_timeout())
            .default_headers(headers)
            .build()?;

        // A trailing slash makes relative endpoint paths join under the base
        let mut base = config.api_base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .with_context(|| format!("Invalid API base URL: {}", config.api_base_url))?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ListError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ListError::Config(format!("Invalid endpoint '{}': {}", path, e)))
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<Option<T>, ListError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        let envelope: ApiEnvelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                return Err(ListError::server(
                    Some(status.as_u16()),
                    format!("Unexpected response body: {}", e),
                ));
            }
            Err(_) => {
                return Err(ListError::server(
                    Some(status.as_u16()),
                    status.canonical_reason().unwrap_or("Internal server error"),
                ));
            }
        };

        envelope.into_data(status.as_u16())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(String, String)]) -> Result<Option<T>, ListError> {
        let url = self.endpoint(path)?;
        debug!("GET {} {:?}", url, query);
        self.send(self.http.get(url).query(query)).await
    }

    async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ListError> {
        let url = self.endpoint(path)?;
        debug!("PUT {}", url);
        self.send::<serde_json::Value>(self.http.put(url).json(body)).await?;
        Ok(())
    }
}

/// The three list-screen services bound to one screen's endpoints
#[derive(Debug, Clone)]
pub struct ScreenApi {
    client: Arc<ApiClient>,
    screen: ScreenDefinition,
}

impl ScreenApi {
    pub fn new(client: Arc<ApiClient>, screen: ScreenDefinition) -> Self {
        Self { client, screen }
    }
}

/// Query pairs sent with a list fetch
pub fn list_query(request: &QueryRequest) -> Vec<(String, String)> {
    request.to_params().into_iter().collect()
}

#[async_trait]
impl ListService for ScreenApi {
    async fn fetch(&self, request: &QueryRequest) -> Result<ListPage, ListError> {
        let page: Option<ListPage> = self
            .client
            .get(&self.screen.endpoints.list, &list_query(request))
            .await?;
        let page = page.unwrap_or_default();
        info!(
            "Fetched {} {} record(s) (page {} of {}, total {})",
            page.docs.len(),
            self.screen.key,
            page.page,
            page.pages,
            page.total
        );
        Ok(page)
    }
}

#[async_trait]
impl ColumnService for ScreenApi {
    async fn get(&self) -> Result<ColumnSet, ListError> {
        let query = [("columnFor".to_string(), self.screen.column_for.clone())];
        let set: Option<ColumnSet> = self.client.get(&self.screen.endpoints.columns, &query).await?;
        Ok(set.unwrap_or_default())
    }

    async fn save(&self, fields: &[ColumnDescriptor]) -> Result<(), ListError> {
        let update = ColumnUpdate {
            is_reset: false,
            column_for: &self.screen.column_for,
            columns: fields
                .iter()
                .filter(|column| column.visible)
                .map(|column| column.name.as_str())
                .collect(),
        };
        self.client.put(&self.screen.endpoints.columns, &update).await
    }

    async fn reset_to_default(&self) -> Result<(), ListError> {
        let update = ColumnUpdate {
            is_reset: true,
            column_for: &self.screen.column_for,
            columns: Vec::new(),
        };
        self.client.put(&self.screen.endpoints.columns, &update).await
    }
}

#[async_trait]
impl FilterOptionsService for ScreenApi {
    async fn get(&self) -> Result<FilterOptions, ListError> {
        let payload: Option<DropdownPayload> =
            self.client.get(&self.screen.endpoints.dropdowns, &[]).await?;
        Ok(payload.map(|p| p.dropdown_data).unwrap_or_default())
    }
}
