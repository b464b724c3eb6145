//! Resource listing, natural-language query and refresh commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, QueryAnswer, QueryRequest, RefreshSummary, Resource};
use crate::output::{
    color_status, format_currency, format_tags, print_info, print_json, print_success,
    print_table, print_warning, truncate, OutputFormat,
};

/// Row for resources table
#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Resource")]
    resource_id: String,
    #[tabled(rename = "Type")]
    service_type: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Created")]
    creation_date: String,
    #[tabled(rename = "Cost (30d)")]
    cost: String,
    #[tabled(rename = "Tags")]
    tags: String,
}

impl From<&Resource> for ResourceRow {
    fn from(r: &Resource) -> Self {
        Self {
            resource_id: truncate(&r.resource_id, 40),
            service_type: r.service_type.clone(),
            region: r.region.clone(),
            status: color_status(&r.status),
            creation_date: r.creation_date.clone(),
            cost: format_currency(r.cost),
            tags: truncate(&format_tags(&r.tags), 40),
        }
    }
}

fn print_resources(resources: &[Resource]) {
    print_table(
        resources.iter().map(ResourceRow::from).collect(),
        "No resources found",
    );
    if !resources.is_empty() {
        let total: f64 = resources.iter().map(|r| r.cost).sum();
        println!(
            "\nTotal: {} resources, {}",
            resources.len(),
            format_currency(total).bold()
        );
    }
}

/// List resources with optional explicit filters
pub async fn list_resources(
    client: &ApiClient,
    service: Option<String>,
    region: Option<String>,
    status: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let query: Vec<(&str, String)> = [
        ("service_type", service),
        ("region", region),
        ("status", status),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.map(|v| (key, v)))
    .collect();

    let resources: Vec<Resource> = client.get("api/v1/resources", &query).await?;

    match format {
        OutputFormat::Json => print_json(&resources)?,
        OutputFormat::Table => print_resources(&resources),
    }

    Ok(())
}

/// Translate a question into a filter and show the matching resources
pub async fn query_resources(client: &ApiClient, text: &str, format: OutputFormat) -> Result<()> {
    let request = QueryRequest {
        query: text.to_string(),
    };
    let answer: QueryAnswer = client.post("api/v1/query", &request).await?;

    match format {
        OutputFormat::Json => print_json(&answer)?,
        OutputFormat::Table => {
            match (&answer.predicate, answer.translation.as_str()) {
                (Some(p), "parsed") => print_info(&format!(
                    "Filter: service_type={} region={} status={}",
                    p.service_type.as_deref().unwrap_or("*"),
                    p.region.as_deref().unwrap_or("*"),
                    p.status.as_deref().unwrap_or("*"),
                )),
                (_, "unavailable") => {
                    print_warning("Query translation unavailable, showing all resources")
                }
                _ => print_warning("Question not understood, showing all resources"),
            }
            println!();
            print_resources(&answer.resources);
        }
    }

    Ok(())
}

/// Force a collection pass
pub async fn refresh(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let summary: RefreshSummary = client.post("api/v1/refresh", &serde_json::json!({})).await?;

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => {
            print_success(&format!(
                "Collected {} resources in {} ms",
                summary.resources, summary.elapsed_ms
            ));
            if !summary.failed.is_empty() {
                print_warning(&format!("Failed kinds: {}", summary.failed.join(", ")));
            }
        }
    }

    Ok(())
}
