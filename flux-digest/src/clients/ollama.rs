//! Ollama text-generation client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Summarizer, join_url};
use crate::{Error, Result};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Client for Ollama's non-streaming `/api/generate` endpoint.
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(client: Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Summarizer for OllamaClient {
    async fn summarize(&self, prompt: &str) -> Result<String> {
        let url = join_url(&self.base_url, "/api/generate");

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(format!(
                "ollama request failed: {} {}",
                status.as_u16(),
                body
            )));
        }

        let data: GenerateResponse = response.json().await?;
        match data.response {
            Some(text) if !text.is_empty() => {
                debug!(model = %self.model, chars = text.chars().count(), "Summary generated");
                Ok(text)
            }
            _ => Err(Error::upstream("ollama response missing 'response' field")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::time::Duration;

    use crate::clients::build_http_client;

    fn test_client() -> Client {
        build_http_client(Duration::from_secs(5)).unwrap()
    }

    fn client_for(server: &Server) -> OllamaClient {
        OllamaClient::new(test_client(), server.url(), "llama3")
    }

    #[tokio::test]
    async fn test_summarize_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(Matcher::Json(json!({
                "model": "llama3",
                "prompt": "summarize this",
                "stream": false
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"model":"llama3","response":"  a summary  ","done":true}"#)
            .expect(1)
            .create_async()
            .await;

        let summary = client_for(&server).summarize("summarize this").await.unwrap();

        mock.assert_async().await;
        // Trimming is the pipeline's job.
        assert_eq!(summary, "  a summary  ");
    }

    #[tokio::test]
    async fn test_summarize_non_success_status() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(500)
            .with_body("model not loaded")
            .create_async()
            .await;

        let err = client_for(&server).summarize("p").await.unwrap_err();
        assert_eq!(err.to_string(), "ollama request failed: 500 model not loaded");
    }

    #[tokio::test]
    async fn test_summarize_missing_response_field() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"done":true}"#)
            .create_async()
            .await;

        let err = client_for(&server).summarize("p").await.unwrap_err();
        assert_eq!(err.to_string(), "ollama response missing 'response' field");
    }

    #[tokio::test]
    async fn test_summarize_empty_response_field() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response":""}"#)
            .create_async()
            .await;

        assert!(matches!(
            client_for(&server).summarize("p").await,
            Err(Error::Upstream(_))
        ));
    }
}
