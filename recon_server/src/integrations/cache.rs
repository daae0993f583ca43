use std::{sync::Arc, time::Duration};

use log::*;
use recon_engine::traits::{CatalogCache, DownstreamError};
use reqwest::Client;
use serde_json::json;

/// Invalidates catalog cache keys by posting them to the cache service.
///
/// With no endpoint configured there is nothing to invalidate, and every call succeeds.
#[derive(Clone)]
pub struct HttpCatalogCache {
    url: Option<String>,
    client: Arc<Client>,
}

impl HttpCatalogCache {
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self, DownstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DownstreamError::Unavailable(format!("Could not build the cache client. {e}")))?;
        Ok(Self { url, client: Arc::new(client) })
    }
}

impl CatalogCache for HttpCatalogCache {
    async fn invalidate(&self, keys: Vec<String>) -> Result<(), DownstreamError> {
        let Some(url) = &self.url else {
            return Ok(());
        };
        if keys.is_empty() {
            return Ok(());
        }
        trace!("🗂️ Invalidating {} cache keys", keys.len());
        let response = self.client.post(url).json(&json!({ "keys": keys })).send().await.map_err(|e| {
            if e.is_timeout() {
                DownstreamError::Timeout
            } else {
                DownstreamError::Unavailable(e.to_string())
            }
        })?;
        if response.status().is_success() {
            debug!("🗂️ Invalidated {}", keys.join(", "));
            Ok(())
        } else {
            Err(DownstreamError::Rejected(format!("Cache service returned {}", response.status())))
        }
    }
}
