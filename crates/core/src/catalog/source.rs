use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::Category;
use crate::config::AppConfig;

/// Provider of raw catalog documents, one per category.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the raw document for `category`.
    async fn fetch(&self, category: Category) -> Result<Value>;
}

/// Fetches catalog documents over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCatalogSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalogSource {
    /// Build a source rooted at `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tradeup/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build catalog HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Build a source from the application configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.catalog_base_url.clone(),
            config.catalog_fetch_timeout(),
        )
    }

    /// URL the document for `category` is fetched from.
    pub fn document_url(&self, category: Category) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            category.document()
        )
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch(&self, category: Category) -> Result<Value> {
        let url = self.document_url(category);
        self.client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("failed to request {url}"))?
            .error_for_status()
            .with_context(|| format!("catalog provider rejected {url}"))?
            .json::<Value>()
            .await
            .with_context(|| format!("failed to decode {url}"))
    }
}
