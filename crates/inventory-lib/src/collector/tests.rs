//! Collection scenarios against the in-memory backend
//!
//! Each test builds a snapshot, wires the fetchers and collectors the way the
//! agent does, and checks the records that come out.

#[cfg(test)]
mod fixture_collection_tests {
    use crate::backend::{
        Bucket, CostEntry, Datapoint, DbEndpoint, DbInstance, FixtureBackend,
        FunctionConfiguration, Instance, InstanceState, MetricSeries, Reservation, Tag,
    };
    use crate::collector::{
        create_collectors, discover_regions, parse_timestamp, Aggregator, BucketCollector,
        CollectionConfig, CollectorContext, ComputeCollector, DatabaseCollector,
        FunctionCollector, ResourceCollector, DEFAULT_REGIONS,
    };
    use crate::fetcher::{CostFetcher, MetricFetcher};
    use crate::models::{KindDetails, ResourceRecord, ServiceType, GLOBAL_REGION};
    use async_trait::async_trait;
    use chrono::{Days, Utc};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn instance(id: &str, state: &str, launch_time: &str) -> Instance {
        Instance {
            instance_id: id.to_string(),
            instance_type: "t3.micro".to_string(),
            state: InstanceState {
                name: state.to_string(),
            },
            launch_time: launch_time.to_string(),
            tags: vec![Tag::new("Name", id)],
            private_ip_address: Some("10.0.0.5".to_string()),
            public_ip_address: None,
            vpc_id: None,
            subnet_id: None,
        }
    }

    fn database(id: &str) -> DbInstance {
        DbInstance {
            db_instance_identifier: id.to_string(),
            db_instance_status: "available".to_string(),
            instance_create_time: Some("2023-06-01T08:00:00Z".to_string()),
            engine: "postgres".to_string(),
            engine_version: "15.4".to_string(),
            db_instance_class: "db.t3.medium".to_string(),
            allocated_storage: 100,
            endpoint: Some(DbEndpoint {
                address: Some(format!("{}.example.internal", id)),
            }),
            tag_list: vec![],
        }
    }

    fn function(name: &str) -> FunctionConfiguration {
        FunctionConfiguration {
            function_name: name.to_string(),
            function_arn: format!("arn:aws:lambda:us-east-1:123456789012:function:{}", name),
            runtime: Some("python3.12".to_string()),
            memory_size: Some(256),
            timeout: None,
            handler: Some("app.handler".to_string()),
            last_modified: Some("2024-02-10T09:30:00.000+0000".to_string()),
        }
    }

    fn bucket(name: &str) -> Bucket {
        Bucket {
            name: name.to_string(),
            creation_date: "2022-11-05T00:00:00Z".to_string(),
        }
    }

    fn regions() -> Vec<String> {
        vec!["us-east-1".to_string(), "us-west-2".to_string()]
    }

    fn context(backend: FixtureBackend, config: CollectionConfig) -> CollectorContext {
        let backend = Arc::new(backend);
        CollectorContext::new(
            backend.clone(),
            MetricFetcher::new(backend.clone()),
            CostFetcher::new(backend.clone(), backend),
            regions(),
            config,
        )
    }

    fn snapshot() -> FixtureBackend {
        let yesterday = Utc::now().date_naive() - Days::new(1);
        FixtureBackend {
            instances: BTreeMap::from([
                (
                    "us-east-1".to_string(),
                    vec![Reservation {
                        instances: vec![
                            instance("i-1", "running", "2024-01-15T10:00:00Z"),
                            instance("i-2", "Stopped", "2024-01-16T10:00:00Z"),
                        ],
                    }],
                ),
                (
                    "us-west-2".to_string(),
                    vec![Reservation {
                        instances: vec![instance("i-3", "running", "2024-01-17T10:00:00Z")],
                    }],
                ),
            ]),
            db_instances: BTreeMap::from([
                ("us-east-1".to_string(), vec![database("db-1")]),
                ("us-west-2".to_string(), vec![database("db-2")]),
            ]),
            functions: BTreeMap::from([(
                "us-east-1".to_string(),
                vec![function("ingest"), function("report")],
            )]),
            buckets: vec![bucket("logs"), bucket("assets")],
            bucket_locations: BTreeMap::from([("assets".to_string(), "eu-west-1".to_string())]),
            bucket_tags: BTreeMap::from([("logs".to_string(), vec![Tag::new("team", "platform")])]),
            metrics: vec![MetricSeries {
                resource_id: "i-1".to_string(),
                metric_name: "CPUUtilization".to_string(),
                datapoints: vec![Datapoint {
                    timestamp: Utc::now() - chrono::Duration::minutes(5),
                    average: Some(12.3456),
                    unit: Some("Percent".to_string()),
                }],
            }],
            costs: vec![CostEntry {
                date: yesterday,
                service: ServiceType::Compute.billing_category().to_string(),
                region: "us-east-1".to_string(),
                resource_id: None,
                tags: BTreeMap::new(),
                amount: 10.0,
            }],
            ..Default::default()
        }
    }

    fn ids(records: &[ResourceRecord]) -> Vec<&str> {
        records.iter().map(|r| r.resource_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_compute_collector_normalizes_instances() {
        let collector = ComputeCollector::new(context(snapshot(), CollectionConfig::default()));
        let records = collector.collect().await.unwrap();

        assert_eq!(ids(&records), vec!["i-1", "i-2", "i-3"]);

        let first = &records[0];
        assert_eq!(first.service_type, ServiceType::Compute);
        assert_eq!(first.region, "us-east-1");
        assert_eq!(first.status, "running");
        assert_eq!(first.tags["Name"], "i-1");
        assert_eq!(first.cost, 10.0);
        assert_eq!(first.details.metric("CPUUtilization"), Some(12.35));
        match &first.details.attributes {
            KindDetails::Compute {
                private_ip,
                public_ip,
                ..
            } => {
                assert_eq!(private_ip, "10.0.0.5");
                assert_eq!(public_ip, "");
            }
            other => panic!("unexpected details {:?}", other),
        }

        assert_eq!(records[1].status, "stopped");
        // No billing data for us-west-2
        assert_eq!(records[2].cost, 0.0);
    }

    #[tokio::test]
    async fn test_database_region_failure_is_isolated() {
        let backend = snapshot().fail("rds", "us-west-2");
        let collector = DatabaseCollector::new(context(backend, CollectionConfig::default()));

        let records = collector.collect().await.unwrap();
        assert_eq!(ids(&records), vec!["db-1"]);
        assert_eq!(records[0].region, "us-east-1");
    }

    #[tokio::test]
    async fn test_malformed_resource_is_skipped() {
        let mut backend = snapshot();
        backend.instances.insert(
            "us-east-1".to_string(),
            vec![Reservation {
                instances: vec![
                    instance("i-bad", "running", "yesterday-ish"),
                    instance("i-good", "running", "2024-01-15T10:00:00Z"),
                ],
            }],
        );

        let collector = ComputeCollector::new(context(backend, CollectionConfig::default()));
        let records = collector.collect().await.unwrap();
        assert_eq!(ids(&records), vec!["i-good", "i-3"]);
    }

    #[tokio::test]
    async fn test_functions_follow_pagination_and_skip_untaggable() {
        let mut backend = snapshot();
        backend.functions.insert(
            "us-east-1".to_string(),
            vec![function("a"), function("b"), function("c")],
        );
        backend.page_size = 1;
        backend.function_tags.insert(
            function("b").function_arn,
            BTreeMap::from([("stage".to_string(), "prod".to_string())]),
        );

        let collector = FunctionCollector::new(context(backend.clone(), CollectionConfig::default()));
        let records = collector.collect().await.unwrap();
        assert_eq!(ids(&records), vec!["a", "b", "c"]);
        assert_eq!(records[1].tags["stage"], "prod");
        assert_eq!(records[0].status, "active");
        assert_eq!(records[0].creation_date, records[0].last_modified);
        assert_eq!(
            records[0].creation_date,
            parse_timestamp("2024-02-10T09:30:00Z").unwrap()
        );

        let backend = backend.fail("lambda-tags", "us-east-1");
        let collector = FunctionCollector::new(context(backend, CollectionConfig::default()));
        assert!(collector.collect().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bucket_regions_and_tags() {
        let backend = snapshot().fail("s3-location", "logs");
        let collector = BucketCollector::new(context(backend, CollectionConfig::default()));

        let records = collector.collect().await.unwrap();
        assert_eq!(ids(&records), vec!["logs", "assets"]);

        assert_eq!(records[0].region, GLOBAL_REGION);
        assert_eq!(records[0].tags["team"], "platform");
        assert_eq!(records[1].region, "eu-west-1");
        assert!(records[1].tags.is_empty());
        assert!(records[1].details.metrics.is_empty());

        let collector = BucketCollector::new(context(snapshot(), CollectionConfig::default()));
        let records = collector.collect().await.unwrap();
        assert_eq!(records[0].region, "us-east-1");
    }

    #[tokio::test]
    async fn test_failed_top_level_enumeration_yields_empty() {
        let backend = snapshot().fail("s3", "list");
        let collector = BucketCollector::new(context(backend, CollectionConfig::default()));
        assert!(collector.collect().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_assembly_keeps_enumeration_order() {
        let mut backend = snapshot();
        let many: Vec<Instance> = (0..12)
            .map(|n| instance(&format!("i-{:02}", n), "running", "2024-01-15T10:00:00Z"))
            .collect();
        backend.instances = BTreeMap::from([(
            "us-east-1".to_string(),
            vec![Reservation { instances: many }],
        )]);

        let config = CollectionConfig {
            per_resource_concurrency: 4,
            ..Default::default()
        };
        let records = ComputeCollector::new(context(backend, config)).collect().await.unwrap();
        let expected: Vec<String> = (0..12).map(|n| format!("i-{:02}", n)).collect();
        assert_eq!(ids(&records), expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_aggregator_concatenates_in_declaration_order() {
        let aggregator = Aggregator::new(create_collectors(&context(
            snapshot(),
            CollectionConfig::default(),
        )));
        assert_eq!(aggregator.kinds(), ServiceType::ALL.to_vec());

        let report = aggregator.run_pass().await;
        assert!(report.failed.is_empty());
        assert_eq!(report.kinds_total(), 4);

        let kinds: Vec<ServiceType> = report.table.iter().map(|r| r.service_type).collect();
        let mut sorted = kinds.clone();
        sorted.sort();
        assert_eq!(kinds, sorted);
        assert_eq!(report.table.len(), 3 + 2 + 2 + 2);
        assert!(report.table.iter().all(|r| r.cost.is_finite() && r.cost >= 0.0));
    }

    #[tokio::test]
    async fn test_empty_kinds_do_not_affect_table() {
        let mut backend = snapshot();
        backend.db_instances.clear();
        backend.buckets.clear();

        let aggregator = Aggregator::new(create_collectors(&context(
            backend,
            CollectionConfig::default(),
        )));
        let report = aggregator.run_pass().await;

        assert!(report.failed.is_empty());
        assert_eq!(report.table.count_by_kind().get(&ServiceType::ManagedDb), None);
        assert_eq!(report.table.len(), 3 + 2);
    }

    /// Collector that fails or panics instead of returning records
    struct BrokenCollector {
        kind: ServiceType,
        panic: bool,
    }

    #[async_trait]
    impl ResourceCollector for BrokenCollector {
        fn service_type(&self) -> ServiceType {
            self.kind
        }

        async fn collect(&self) -> anyhow::Result<Vec<ResourceRecord>> {
            if self.panic {
                panic!("collector blew up");
            }
            anyhow::bail!("backend credentials expired")
        }
    }

    #[tokio::test]
    async fn test_aggregator_isolates_failing_collectors() {
        let ctx = context(snapshot(), CollectionConfig::default());
        let collectors: Vec<Arc<dyn ResourceCollector>> = vec![
            Arc::new(ComputeCollector::new(ctx.clone())),
            Arc::new(BrokenCollector {
                kind: ServiceType::ManagedDb,
                panic: false,
            }),
            Arc::new(BrokenCollector {
                kind: ServiceType::Function,
                panic: true,
            }),
            Arc::new(BucketCollector::new(ctx)),
        ];

        let report = Aggregator::new(collectors).run_pass().await;
        assert_eq!(report.failed, vec![ServiceType::ManagedDb, ServiceType::Function]);
        assert_eq!(report.succeeded, vec![ServiceType::Compute, ServiceType::ObjectStore]);
        assert_eq!(ids(report.table.rows()), vec!["i-1", "i-2", "i-3", "logs", "assets"]);
    }

    #[tokio::test]
    async fn test_aggregator_all_failed_is_empty() {
        let collectors: Vec<Arc<dyn ResourceCollector>> = ServiceType::ALL
            .iter()
            .map(|&kind| Arc::new(BrokenCollector { kind, panic: false }) as Arc<dyn ResourceCollector>)
            .collect();

        let table = Aggregator::new(collectors).collect_all().await;
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_discover_regions_falls_back_to_defaults() {
        let backend = FixtureBackend {
            regions: vec!["eu-central-1".to_string()],
            ..Default::default()
        };
        assert_eq!(
            discover_regions(&backend, Duration::from_secs(1)).await,
            vec!["eu-central-1".to_string()]
        );

        let backend = backend.fail("regions", "list");
        let regions = discover_regions(&backend, Duration::from_secs(1)).await;
        assert_eq!(regions, DEFAULT_REGIONS.map(String::from).to_vec());

        let regions = discover_regions(&FixtureBackend::default(), Duration::from_secs(1)).await;
        assert_eq!(regions.len(), 3);
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        let expected = parse_timestamp("2024-02-10T09:30:00Z").unwrap();
        assert_eq!(parse_timestamp("2024-02-10T09:30:00.000+0000"), Some(expected));
        assert_eq!(parse_timestamp("2024-02-10 09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-02-10T18:30:00+09:00"), Some(expected));
        assert!(parse_timestamp("last tuesday").is_none());
    }
}
