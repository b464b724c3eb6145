//! Text-generation client for a messages-style completion endpoint

use super::text::{GenerationParams, TextGenerator};
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

const API_VERSION: &str = "2023-06-01";

/// Configuration for [`MessagesClient`]
#[derive(Debug, Clone)]
pub struct MessagesConfig {
    /// Base URL of the provider, e.g. `https://api.anthropic.com/`
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// Upper bound on one completion
    pub request_timeout: Duration,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/".to_string(),
            api_key: String::new(),
            model: "claude-3-5-sonnet-latest".to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Client for a messages-compatible completion API
pub struct MessagesClient {
    client: Client,
    url: Url,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl MessagesClient {
    pub fn new(config: &MessagesConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        let mut endpoint = config.endpoint.clone();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let url = Url::parse(&endpoint)
            .and_then(|base| base.join("v1/messages"))
            .map_err(|e| anyhow::anyhow!("Invalid text-generation URL {}: {}", endpoint, e))?;

        Ok(Self {
            client,
            url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout: config.request_timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl TextGenerator for MessagesClient {
    async fn complete(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, BackendError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %self.model, max_tokens = params.max_tokens, "Requesting completion");

        let response = self
            .client
            .post(self.url.clone())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => BackendError::Throttled(body),
                StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                    BackendError::Unavailable(body)
                }
                _ => BackendError::Status {
                    code: status.as_u16(),
                    message: body,
                },
            });
        }

        let reply: MessagesResponse = response.json().await?;
        reply
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .ok_or_else(|| BackendError::Decode("completion had no text content".to_string()))
    }

    fn call_timeout(&self) -> Duration {
        self.timeout
    }
}
