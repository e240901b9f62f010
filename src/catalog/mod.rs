pub mod snowflake;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::ApiError;

pub use snowflake::{SnowflakeConfig, SnowflakeSource};

/// Something that can return the first column of every row of a table.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load_column(&self, table: &str) -> Result<Vec<String>, ApiError>;
}

/// Memoizing wrapper around a [`CatalogSource`]. Each table is queried once
/// per process; failed loads are not cached.
#[derive(Clone)]
pub struct Catalog {
    source: Arc<dyn CatalogSource>,
    cache: Arc<Mutex<HashMap<String, Arc<Vec<String>>>>>,
    topics_table: String,
    styles_table: String,
}

impl Catalog {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        topics_table: impl Into<String>,
        styles_table: impl Into<String>,
    ) -> Self {
        Self {
            source,
            cache: Arc::new(Mutex::new(HashMap::new())),
            topics_table: topics_table.into(),
            styles_table: styles_table.into(),
        }
    }

    pub async fn load_column(&self, table: &str) -> Result<Arc<Vec<String>>, ApiError> {
        // Held across the query so concurrent first loads hit the source once.
        let mut cache = self.cache.lock().await;
        if let Some(rows) = cache.get(table) {
            return Ok(Arc::clone(rows));
        }

        tracing::info!(table = %table, "Loading catalog table");
        let rows = Arc::new(self.source.load_column(table).await?);
        tracing::info!(table = %table, rows = rows.len(), "Catalog table loaded");
        cache.insert(table.to_string(), Arc::clone(&rows));
        Ok(rows)
    }

    pub async fn topics(&self) -> Result<Arc<Vec<String>>, ApiError> {
        self.load_column(&self.topics_table).await
    }

    pub async fn styles(&self) -> Result<Arc<Vec<String>>, ApiError> {
        self.load_column(&self.styles_table).await
    }

    /// Number of tables currently cached.
    pub async fn cached_tables(&self) -> usize {
        self.cache.lock().await.len()
    }
}
