//! Narrative cost insights, recommendation strategy and expert chat
//!
//! Uses the free-form generation mode. Every call returns text: a fixed
//! fallback sentence replaces the reply when generation fails.

use crate::analysis::{CostAnalysis, Recommendation};
use crate::backend::{GenerationParams, TextGenerator};
use serde::Serialize;
use std::sync::Arc;

pub const INSIGHTS_FALLBACK: &str = "Cost analysis is not available right now.";
pub const STRATEGY_FALLBACK: &str = "Recommendations are not available right now.";
pub const CHAT_FALLBACK: &str = "Unable to process your question at this time.";

const INSIGHTS_PARAMS: GenerationParams = GenerationParams {
    max_tokens: 1500,
    temperature: 0.3,
};
const STRATEGY_PARAMS: GenerationParams = GenerationParams {
    max_tokens: 1000,
    temperature: 0.7,
};
const CHAT_PARAMS: GenerationParams = GenerationParams {
    max_tokens: 2000,
    temperature: 0.7,
};

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

pub fn insights_prompt(analysis: &CostAnalysis) -> String {
    format!(
        r#"Analyze the following cloud cost data and provide detailed insights:
{data}

Cover these points:
1. Main cost drivers
2. Abnormal patterns or sudden cost increases
3. Areas where cost can be optimized
4. Overall cost trend and outlook

Format the answer as:

### Main cost drivers
- [specific analysis]

### Anomalies
- [unusual cost patterns]

### Optimization opportunities
- [concrete actions]

### Cost trend
- [trend analysis and forecast]"#,
        data = to_json(analysis)
    )
}

pub fn strategy_prompt(recommendations: &[Recommendation]) -> String {
    format!(
        r#"Provide a detailed optimization strategy for the following cloud resources:
{data}

Write in natural prose and include:

1. The current situation and its problems
2. Concrete optimization steps and their expected effect
3. Expected cost savings
4. Implementation considerations and caveats
5. Recommendations based on provider best practices

Include technical detail but keep it easy to follow. Avoid step lists; write
paragraphs. Always mention each resource id, and use tags or other
attributes when present."#,
        data = to_json(recommendations)
    )
}

pub fn chat_prompt(question: &str, context: Option<&serde_json::Value>) -> String {
    let context = context
        .map(|c| c.to_string())
        .unwrap_or_else(|| "No additional context provided".to_string());
    format!(
        r#"You are a cloud infrastructure expert. Answer this question about cloud resources:
Question: {question}

Context (if available):
{context}

Provide a detailed, technical, yet easy to understand response."#
    )
}

/// Free-form advisor over the shared text-generation boundary
#[derive(Clone)]
pub struct Advisor {
    generator: Arc<dyn TextGenerator>,
}

impl Advisor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn cost_insights(&self, analysis: &CostAnalysis) -> String {
        self.generator
            .generate(&insights_prompt(analysis), INSIGHTS_PARAMS)
            .await
            .unwrap_or_else(|| INSIGHTS_FALLBACK.to_string())
    }

    pub async fn recommendation_strategy(&self, recommendations: &[Recommendation]) -> String {
        self.generator
            .generate(&strategy_prompt(recommendations), STRATEGY_PARAMS)
            .await
            .unwrap_or_else(|| STRATEGY_FALLBACK.to_string())
    }

    pub async fn chat(&self, question: &str, context: Option<&serde_json::Value>) -> String {
        self.generator
            .generate(&chat_prompt(question, context), CHAT_PARAMS)
            .await
            .unwrap_or_else(|| CHAT_FALLBACK.to_string())
    }
}
