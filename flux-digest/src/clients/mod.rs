//! Outbound collaborators: the text-generation service that writes summaries
//! and the feed reader that receives the merged content.

pub mod miniflux;
pub mod ollama;

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

pub use miniflux::MinifluxClient;
pub use ollama::OllamaClient;

use crate::Result;

/// Produces a summary for a prompt.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Return the generated text. Must fail rather than return an empty summary.
    async fn summarize(&self, prompt: &str) -> Result<String>;
}

/// Writes merged content back to the source system.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn save_entry_content(&self, entry_id: &str, content: &str) -> Result<()>;
}

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the shared HTTP client used by every collaborator.
pub fn build_http_client(request_timeout: Duration) -> Result<reqwest::Client> {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("flux-digest/", env!("CARGO_PKG_VERSION")));

    if request_timeout > Duration::ZERO {
        builder = builder.timeout(request_timeout);
    }

    Ok(builder.build()?)
}

/// Join a base URL and an absolute path without doubling the slash.
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
