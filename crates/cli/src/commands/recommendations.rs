//! Recommendation-related CLI commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, RecommendationReport};
use crate::output::{
    format_currency, print_heading, print_json, print_table, truncate, OutputFormat,
};

/// Row for recommendations table
#[derive(Tabled)]
struct RecommendationRow {
    #[tabled(rename = "Resource")]
    resource_id: String,
    #[tabled(rename = "Type")]
    service_type: String,
    #[tabled(rename = "Action")]
    recommendation_type: String,
    #[tabled(rename = "Reason")]
    reason: String,
    #[tabled(rename = "Savings")]
    savings: String,
}

fn color_recommendation(kind: &str) -> String {
    match kind {
        "Termination" => kind.red().to_string(),
        "Downsizing" => kind.yellow().to_string(),
        _ => kind.to_string(),
    }
}

/// Show recommendations, optionally with the narrative strategy
pub async fn show_recommendations(
    client: &ApiClient,
    explain: bool,
    format: OutputFormat,
) -> Result<()> {
    let query = if explain {
        vec![("explain", "true".to_string())]
    } else {
        Vec::new()
    };
    let report: RecommendationReport = client.get("api/v1/recommendations", &query).await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            print_table(
                report
                    .recommendations
                    .iter()
                    .map(|r| RecommendationRow {
                        resource_id: truncate(&r.resource_id, 40),
                        service_type: r.service_type.clone(),
                        recommendation_type: color_recommendation(&r.recommendation_type),
                        reason: r.reason.clone(),
                        savings: format_currency(r.potential_savings),
                    })
                    .collect(),
                "No recommendations found",
            );

            if !report.recommendations.is_empty() {
                println!(
                    "\n{} {} across {} recommendations",
                    "Potential savings:".bold(),
                    format_currency(report.total_potential_savings).green().bold(),
                    report.recommendations.len()
                );
            }

            if let Some(strategy) = &report.strategy {
                println!();
                print_heading("Strategy", '-');
                println!("{}", strategy);
            }
        }
    }

    Ok(())
}
