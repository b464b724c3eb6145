//! Text-generation boundary shared by the query translator and the advisor

use crate::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Generation parameters for one completion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationParams {
    /// Structured-extraction mode: deterministic, short
    pub const EXTRACTION: GenerationParams = GenerationParams {
        max_tokens: 500,
        temperature: 0.0,
    };

    /// Free-form explanatory mode
    pub fn narrative(max_tokens: u32, temperature: f32) -> Self {
        Self {
            max_tokens,
            temperature,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::narrative(1000, 0.7)
    }
}

/// A stateless prompt-in, text-out service
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Request one completion
    async fn complete(&self, prompt: &str, params: GenerationParams)
        -> Result<String, BackendError>;

    /// Upper bound applied by [`generate`](Self::generate)
    fn call_timeout(&self) -> Duration {
        Duration::from_secs(60)
    }

    /// Narrow interface used by every caller: text, or `None` on any failure
    async fn generate(&self, prompt: &str, params: GenerationParams) -> Option<String> {
        let start = Instant::now();
        let result = super::bounded(self.call_timeout(), self.complete(prompt, params)).await;
        crate::observability::InventoryMetrics::new()
            .observe_generation_latency(start.elapsed().as_secs_f64());

        match result {
            Ok(text) => {
                debug!(
                    chars = text.len(),
                    elapsed_ms = start.elapsed().as_millis(),
                    "Text generation complete"
                );
                Some(text)
            }
            Err(e) => {
                warn!(error = %e, "Text generation failed");
                None
            }
        }
    }
}
