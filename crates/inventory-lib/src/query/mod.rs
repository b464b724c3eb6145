//! Natural-language query surface
//!
//! [`InventoryQuery::query`] is the single caller-facing entry point: it
//! translates free text into a predicate and filters the unified table with
//! it. Every failure degrades to the unfiltered table.

mod engine;
mod translator;

pub use engine::{apply, try_apply};
pub use translator::{
    build_prompt, extract_payload, parse_predicate, QueryTranslator, TranslationOutcome,
};

use crate::backend::TextGenerator;
use crate::models::{QueryPredicate, ResourceTable};
use crate::observability::StructuredLogger;
use serde::Serialize;
use std::sync::Arc;

/// A filtered table together with how it was produced
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    /// Predicate applied, `None` when translation was unavailable
    pub predicate: Option<QueryPredicate>,
    /// `parsed`, `unparsed` or `unavailable`
    pub translation: &'static str,
    pub resources: ResourceTable,
}

/// Translator and engine wired together
#[derive(Clone)]
pub struct InventoryQuery {
    translator: QueryTranslator,
    logger: StructuredLogger,
}

impl InventoryQuery {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self::from_translator(QueryTranslator::new(generator))
    }

    pub fn from_translator(translator: QueryTranslator) -> Self {
        Self {
            translator,
            logger: StructuredLogger::new("query"),
        }
    }

    pub fn translator(&self) -> &QueryTranslator {
        &self.translator
    }

    /// Rows of `table` matching `text`
    pub async fn query(&self, table: &ResourceTable, text: &str) -> ResourceTable {
        self.answer(table, text).await.resources
    }

    /// Like [`query`](Self::query) but keeps the predicate and translation outcome
    pub async fn answer(&self, table: &ResourceTable, text: &str) -> QueryAnswer {
        let outcome = self.translator.translate_detailed(text).await;
        let translation = outcome.label();
        let predicate = outcome.into_predicate();

        let resources = match &predicate {
            None => {
                self.logger.log_query_fallback("translation unavailable");
                table.clone()
            }
            Some(predicate) => apply(table, Some(predicate)),
        };

        QueryAnswer {
            predicate,
            translation,
            resources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GenerationParams;
    use crate::error::BackendError;
    use crate::models::{KindConstraint, KindDetails, ResourceDetails, ResourceRecord, ServiceType};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::time::Duration;

    struct FixedGenerator(Result<&'static str, ()>);

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn complete(
            &self,
            _prompt: &str,
            _params: GenerationParams,
        ) -> Result<String, BackendError> {
            self.0
                .map(str::to_string)
                .map_err(|_| BackendError::Unavailable("connection reset".into()))
        }
    }

    /// Never answers within the call timeout
    struct HangingGenerator;

    #[async_trait]
    impl TextGenerator for HangingGenerator {
        async fn complete(
            &self,
            _prompt: &str,
            _params: GenerationParams,
        ) -> Result<String, BackendError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("{}".to_string())
        }

        fn call_timeout(&self) -> Duration {
            Duration::from_millis(20)
        }
    }

    fn record(id: &str, kind: ServiceType, region: &str, status: &str, cost: f64) -> ResourceRecord {
        ResourceRecord {
            resource_id: id.to_string(),
            service_type: kind,
            region: region.to_string(),
            status: status.to_string(),
            creation_date: Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
            last_modified: Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
            tags: BTreeMap::new(),
            cost,
            details: ResourceDetails::new(
                KindDetails::Compute {
                    instance_type: "t3.micro".to_string(),
                    private_ip: String::new(),
                    public_ip: String::new(),
                    vpc_id: String::new(),
                    subnet_id: String::new(),
                },
                BTreeMap::new(),
            ),
        }
    }

    fn table() -> ResourceTable {
        ResourceTable::new(vec![
            record("i-1", ServiceType::Compute, "us-east-1", "running", 10.0),
            record("i-2", ServiceType::Compute, "us-west-2", "stopped", 5.0),
            record("db-1", ServiceType::ManagedDb, "us-east-1", "available", 20.0),
        ])
    }

    #[tokio::test]
    async fn test_running_instances_in_region() {
        let query = InventoryQuery::new(Arc::new(FixedGenerator(Ok(
            r#"{"service_type": "EC2", "region": "us-east-1", "status": "running"}"#,
        ))));

        let answer = query
            .answer(&table(), "show running EC2 instances in us-east-1")
            .await;

        assert_eq!(answer.translation, "parsed");
        assert_eq!(
            answer.predicate,
            Some(QueryPredicate {
                service_type: Some(ServiceType::Compute.into()),
                region: Some("us-east-1".to_string()),
                status: Some("running".to_string()),
            })
        );
        let ids: Vec<&str> = answer.resources.iter().map(|r| r.resource_id.as_str()).collect();
        assert_eq!(ids, vec!["i-1"]);
    }

    #[tokio::test]
    async fn test_lowercase_label_keeps_other_constraints() {
        let query = InventoryQuery::new(Arc::new(FixedGenerator(Ok(
            r#"{"service_type": "ec2", "region": "us-east-1", "status": "running"}"#,
        ))));

        let answer = query.answer(&table(), "running ec2 in us-east-1").await;

        assert_eq!(answer.translation, "parsed");
        assert_eq!(
            answer.predicate,
            Some(QueryPredicate {
                service_type: Some(KindConstraint::Unknown("ec2".to_string())),
                region: Some("us-east-1".to_string()),
                status: Some("running".to_string()),
            })
        );
        assert!(answer.resources.is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_returns_full_table() {
        let query = InventoryQuery::new(Arc::new(FixedGenerator(Err(()))));

        let table = table();
        let answer = query.answer(&table, "show running EC2 instances").await;
        assert_eq!(answer.translation, "unavailable");
        assert!(answer.predicate.is_none());
        assert_eq!(answer.resources, table);
    }

    #[tokio::test]
    async fn test_generation_timeout_returns_full_table() {
        let query = InventoryQuery::new(Arc::new(HangingGenerator));
        let table = table();
        assert_eq!(query.query(&table, "anything").await, table);
    }

    #[tokio::test]
    async fn test_unparsed_reply_returns_full_table() {
        let query = InventoryQuery::new(Arc::new(FixedGenerator(Ok("Sorry, I can't do that."))));

        let table = table();
        let answer = query.answer(&table, "gibberish").await;
        assert_eq!(answer.translation, "unparsed");
        assert_eq!(answer.predicate, Some(QueryPredicate::default()));
        assert_eq!(answer.resources, table);
    }
}
