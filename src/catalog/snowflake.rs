use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::CatalogSource;
use crate::error::ApiError;
use crate::validation::validate_table_name;

/// Connection settings for the Snowflake SQL REST API.
#[derive(Debug, Clone)]
pub struct SnowflakeConfig {
    pub account: String,
    pub token: String,
    pub token_type: String,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    pub timeout: Duration,
    /// Overrides `https://{account}.snowflakecomputing.com`.
    pub base_url: Option<String>,
}

impl SnowflakeConfig {
    pub fn new(account: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            token: token.into(),
            token_type: "OAUTH".to_string(),
            database: None,
            schema: None,
            warehouse: None,
            role: None,
            timeout: Duration::from_secs(60),
            base_url: None,
        }
    }

    fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.snowflakecomputing.com", self.account),
        }
    }
}

/// Loads catalog tables through `POST /api/v2/statements`.
pub struct SnowflakeSource {
    inner: reqwest::Client,
    base_url: String,
    config: SnowflakeConfig,
}

impl SnowflakeSource {
    pub fn new(config: SnowflakeConfig) -> Result<Self, ApiError> {
        if config.account.trim().is_empty() && config.base_url.is_none() {
            return Err(ApiError::ConfigurationError("Snowflake account is required".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token.trim()))
            .map_err(|e| ApiError::ConfigurationError(format!("Invalid Snowflake token: {}", e)))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let token_type = HeaderValue::from_str(&config.token_type)
            .map_err(|e| ApiError::ConfigurationError(format!("Invalid Snowflake token type: {}", e)))?;
        headers.insert("x-snowflake-authorization-token-type", token_type);

        let inner = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::ConfigurationError(format!("Failed to build Snowflake client: {}", e)))?;

        Ok(Self {
            inner,
            base_url: config.base_url(),
            config,
        })
    }

    fn statement_request<'a>(&'a self, statement: &'a str) -> StatementRequest<'a> {
        StatementRequest {
            statement,
            timeout: self.config.timeout.as_secs(),
            database: self.config.database.as_deref(),
            schema: self.config.schema.as_deref(),
            warehouse: self.config.warehouse.as_deref(),
            role: self.config.role.as_deref(),
        }
    }

    async fn fetch_partition(&self, handle: &str, partition: usize) -> Result<Vec<Vec<Value>>, ApiError> {
        let url = format!("{}/api/v2/statements/{}", self.base_url, handle);
        let response = self
            .inner
            .get(&url)
            .query(&[("partition", partition)])
            .send()
            .await
            .map_err(unavailable)?;
        let page: StatementResponse = read_response(response).await?;
        Ok(page.data)
    }
}

#[async_trait]
impl CatalogSource for SnowflakeSource {
    async fn load_column(&self, table: &str) -> Result<Vec<String>, ApiError> {
        validate_table_name(table)?;

        let statement = format!("SELECT * FROM {}", table);
        let url = format!("{}/api/v2/statements", self.base_url);
        tracing::debug!(url = %url, statement = %statement, "Snowflake statement");

        let response = self
            .inner
            .post(&url)
            .json(&self.statement_request(&statement))
            .send()
            .await
            .map_err(unavailable)?;

        let first: StatementResponse = read_response(response).await?;
        let partitions = first
            .result_set_meta_data
            .as_ref()
            .map(|meta| meta.partition_info.len())
            .unwrap_or(1);

        let mut rows = first.data;
        if partitions > 1 {
            let handle = first.statement_handle.as_deref().ok_or_else(|| {
                ApiError::CatalogUnavailable("Snowflake response has partitions but no statement handle".to_string())
            })?;
            for partition in 1..partitions {
                rows.extend(self.fetch_partition(handle, partition).await?);
            }
        }

        Ok(first_column(rows))
    }
}

/// First cell of every row, skipping SQL NULLs.
fn first_column(rows: Vec<Vec<Value>>) -> Vec<String> {
    rows.into_iter()
        .filter_map(|row| match row.into_iter().next()? {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .collect()
}

async fn read_response(response: reqwest::Response) -> Result<StatementResponse, ApiError> {
    let status = response.status();
    if status == StatusCode::ACCEPTED {
        return Err(ApiError::CatalogUnavailable(
            "Snowflake statement did not finish within the timeout".to_string(),
        ));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<StatementResponse>(&body)
            .ok()
            .and_then(|r| r.message)
            .unwrap_or(body);
        return Err(ApiError::CatalogUnavailable(format!("Snowflake returned {}: {}", status, message)));
    }
    response.json::<StatementResponse>().await.map_err(unavailable)
}

fn unavailable(err: reqwest::Error) -> ApiError {
    ApiError::CatalogUnavailable(err.to_string())
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Value>>,
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    partition_info: Vec<Value>,
}
