//! Miniflux API client used to write the merged content back to an entry.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{Publisher, join_url};
use crate::{Error, Result};

/// Header carrying the Miniflux API token.
const AUTH_HEADER: &str = "X-Auth-Token";

#[derive(Debug, Serialize)]
struct UpdateEntryRequest<'a> {
    content: &'a str,
}

pub struct MinifluxClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl MinifluxClient {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Publisher for MinifluxClient {
    async fn save_entry_content(&self, entry_id: &str, content: &str) -> Result<()> {
        let url = join_url(&self.base_url, &format!("/v1/entries/{}", entry_id));

        let response = self
            .client
            .put(&url)
            .header(AUTH_HEADER, &self.api_key)
            .json(&UpdateEntryRequest { content })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(format!(
                "Failed to update entry {}: {} {}",
                entry_id,
                status.as_u16(),
                body
            )));
        }

        debug!(entry_id = %entry_id, "Entry content updated");
        Ok(())
    }
}
