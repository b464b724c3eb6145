//! Free text to [`QueryPredicate`] through a text-generation service

use crate::backend::{GenerationParams, TextGenerator};
use crate::models::QueryPredicate;
use crate::observability::{InventoryMetrics, StructuredLogger};
use std::sync::Arc;
use tracing::debug;

/// Result of one translation, kept apart for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    /// The response contained a valid predicate
    Parsed(QueryPredicate),
    /// The service answered but no predicate could be parsed
    Unparsed,
    /// The service call itself failed
    Unavailable,
}

impl TranslationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TranslationOutcome::Parsed(_) => "parsed",
            TranslationOutcome::Unparsed => "unparsed",
            TranslationOutcome::Unavailable => "unavailable",
        }
    }

    /// Collapse into the caller-facing shape
    ///
    /// `Unparsed` becomes an all-null predicate; `Unavailable` becomes `None`.
    pub fn into_predicate(self) -> Option<QueryPredicate> {
        match self {
            TranslationOutcome::Parsed(predicate) => Some(predicate),
            TranslationOutcome::Unparsed => Some(QueryPredicate::default()),
            TranslationOutcome::Unavailable => None,
        }
    }
}

/// Instruction sent to the text-generation service
pub fn build_prompt(question: &str) -> String {
    format!(
        r#"Convert this natural language query to cloud resource filter parameters.
Query: {question}

Return only a JSON object with these exact fields:
{{
    "service_type": "EC2" or "RDS" or "Lambda" or "S3", or null if not specified,
    "region": "region name if specified, otherwise null",
    "status": "status if specified, otherwise null"
}}"#
    )
}

/// Candidate payload: the span from the first `{` to the last `}`
///
/// Falls back to the trimmed response when no such span exists.
pub fn extract_payload(raw: &str) -> &str {
    let trimmed = raw.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start <= end => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Parse a raw response into a predicate, if it carries one
pub fn parse_predicate(raw: &str) -> Option<QueryPredicate> {
    let payload = extract_payload(raw);
    match serde_json::from_str::<QueryPredicate>(payload) {
        Ok(predicate) => Some(predicate),
        Err(e) => {
            debug!(error = %e, payload = %payload, "Response is not a predicate");
            None
        }
    }
}

/// Translates questions into predicates
#[derive(Clone)]
pub struct QueryTranslator {
    generator: Arc<dyn TextGenerator>,
    logger: StructuredLogger,
    metrics: InventoryMetrics,
}

impl QueryTranslator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            logger: StructuredLogger::new("translator"),
            metrics: InventoryMetrics::new(),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Translate and report which path was taken
    pub async fn translate_detailed(&self, question: &str) -> TranslationOutcome {
        let outcome = match self
            .generator
            .generate(&build_prompt(question), GenerationParams::EXTRACTION)
            .await
        {
            None => TranslationOutcome::Unavailable,
            Some(raw) => match parse_predicate(&raw) {
                Some(predicate) => TranslationOutcome::Parsed(predicate),
                None => TranslationOutcome::Unparsed,
            },
        };

        self.metrics.inc_translation(outcome.label());
        let rendered = match &outcome {
            TranslationOutcome::Parsed(p) => serde_json::to_string(p).ok(),
            _ => None,
        };
        self.logger
            .log_query_translated(outcome.label(), rendered.as_deref());

        outcome
    }

    /// Predicate for `question`, or `None` when the service is unavailable
    pub async fn translate(&self, question: &str) -> Option<QueryPredicate> {
        self.translate_detailed(question).await.into_predicate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::models::{KindConstraint, ServiceType};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays a canned reply and records the prompt
    struct ScriptedGenerator {
        reply: Option<String>,
        last_prompt: Mutex<Option<(String, GenerationParams)>>,
    }

    impl ScriptedGenerator {
        fn new(reply: Option<&str>) -> Self {
            Self {
                reply: reply.map(str::to_string),
                last_prompt: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn complete(
            &self,
            prompt: &str,
            params: GenerationParams,
        ) -> Result<String, BackendError> {
            *self.last_prompt.lock().unwrap() = Some((prompt.to_string(), params));
            self.reply
                .clone()
                .ok_or_else(|| BackendError::Status {
                    code: 403,
                    message: "quota exceeded".into(),
                })
        }
    }

    #[test]
    fn test_extracts_payload_from_prose() {
        let raw = "Here you go:\n{\"service_type\": \"EC2\", \"region\": null, \"status\": \"running\"}\nHope that helps!";
        assert_eq!(
            extract_payload(raw),
            r#"{"service_type": "EC2", "region": null, "status": "running"}"#
        );
    }

    #[test]
    fn test_extracts_payload_from_code_fence() {
        let raw = "```json\n{\"region\": \"us-west-2\"}\n```";
        assert_eq!(extract_payload(raw), r#"{"region": "us-west-2"}"#);
        assert_eq!(extract_payload("  no braces here "), "no braces here");
        assert_eq!(extract_payload("} backwards {"), "} backwards {");
    }

    #[test]
    fn test_parse_predicate() {
        let predicate = parse_predicate(
            r#"Sure! {"service_type": "RDS", "region": "us-east-1", "status": null}"#,
        )
        .unwrap();
        assert_eq!(predicate.service_type, Some(ServiceType::ManagedDb.into()));
        assert_eq!(predicate.region.as_deref(), Some("us-east-1"));
        assert_eq!(predicate.status, None);

        assert!(parse_predicate("I cannot help with that").is_none());
        // Labels are case-sensitive; an unknown one is still a constraint
        let predicate = parse_predicate(r#"{"service_type": "ec2", "status": "running"}"#).unwrap();
        assert_eq!(
            predicate.service_type,
            Some(KindConstraint::Unknown("ec2".to_string()))
        );
        assert_eq!(predicate.status.as_deref(), Some("running"));
    }

    #[test]
    fn test_prompt_embeds_question() {
        let prompt = build_prompt("show running EC2 instances");
        assert!(prompt.contains("Query: show running EC2 instances"));
        assert!(prompt.contains("\"service_type\""));
    }

    #[tokio::test]
    async fn test_translate_parsed() {
        let generator = Arc::new(ScriptedGenerator::new(Some(
            "Here you go:\n{\"service_type\": \"EC2\", \"region\": null, \"status\": \"running\"}\nHope that helps!",
        )));
        let translator = QueryTranslator::new(generator.clone());

        let outcome = translator.translate_detailed("running ec2").await;
        assert_eq!(
            outcome,
            TranslationOutcome::Parsed(QueryPredicate {
                service_type: Some(ServiceType::Compute.into()),
                region: None,
                status: Some("running".to_string()),
            })
        );

        let (_, params) = generator.last_prompt.lock().unwrap().clone().unwrap();
        assert_eq!(params, GenerationParams::EXTRACTION);
    }

    #[tokio::test]
    async fn test_translate_unparsed_is_all_null() {
        let translator = QueryTranslator::new(Arc::new(ScriptedGenerator::new(Some(
            "I'm not sure what you mean.",
        ))));

        assert_eq!(translator.translate_detailed("??").await, TranslationOutcome::Unparsed);
        assert_eq!(translator.translate("??").await, Some(QueryPredicate::default()));
    }

    #[tokio::test]
    async fn test_translate_unavailable_is_none() {
        let translator = QueryTranslator::new(Arc::new(ScriptedGenerator::new(None)));

        assert_eq!(
            translator.translate_detailed("anything").await,
            TranslationOutcome::Unavailable
        );
        assert_eq!(translator.translate("anything").await, None);
    }
}
