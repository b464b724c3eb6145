//! Cost-related CLI commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, CostAnalysis, CostPredictions};
use crate::output::{
    color_trend, format_currency, print_heading, print_json, print_table, print_warning,
    OutputFormat,
};

/// Row for service and region breakdown tables
#[derive(Tabled)]
struct BreakdownRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Cost")]
    cost: String,
    #[tabled(rename = "Share")]
    share: String,
}

/// Row for daily costs table
#[derive(Tabled)]
struct DailyRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Cost")]
    cost: String,
}

/// Row for predictions table
#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Daily Avg")]
    current: String,
    #[tabled(rename = "Predicted Daily")]
    predicted: String,
    #[tabled(rename = "Trend")]
    trend: String,
    #[tabled(rename = "Next Month")]
    next_month: String,
}

fn share(cost: f64, total: f64) -> String {
    if total > 0.0 {
        format!("{:.1}%", cost / total * 100.0)
    } else {
        "-".to_string()
    }
}

/// Show cost analysis
pub async fn show_costs(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: CostAnalysis = client.get("api/v1/costs", &[]).await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            if result.service_costs.is_empty() && result.region_costs.is_empty() {
                print_warning("No cost data available");
                return Ok(());
            }

            print_heading("Cost Analysis (last 30 days)", '=');
            println!(
                "{}  {}",
                "Total:".bold(),
                format_currency(result.total_cost).green().bold()
            );
            println!();

            print_heading("By Service", '-');
            print_table(
                result
                    .service_costs
                    .iter()
                    .map(|s| BreakdownRow {
                        name: s.service.clone(),
                        cost: format_currency(s.cost),
                        share: share(s.cost, result.total_cost),
                    })
                    .collect(),
                "No service costs",
            );
            println!();

            print_heading("By Region", '-');
            print_table(
                result
                    .region_costs
                    .iter()
                    .map(|r| BreakdownRow {
                        name: r.region.clone(),
                        cost: format_currency(r.cost),
                        share: share(r.cost, result.total_cost),
                    })
                    .collect(),
                "No region costs",
            );

            if !result.daily_costs.is_empty() {
                println!();
                print_heading("Daily", '-');
                print_table(
                    result
                        .daily_costs
                        .iter()
                        .map(|d| DailyRow {
                            date: d.date.clone(),
                            service: d.service.clone(),
                            cost: format_currency(d.cost),
                        })
                        .collect(),
                    "No daily costs",
                );
            }
        }
    }

    Ok(())
}

/// Show per-service cost forecasts
pub async fn show_predictions(client: &ApiClient, days: u64, format: OutputFormat) -> Result<()> {
    let result: CostPredictions = client
        .get("api/v1/costs/predictions", &[("days", days.to_string())])
        .await?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            print_heading(&format!("Cost Forecast (from last {} days)", days), '=');
            print_table(
                result
                    .iter()
                    .map(|(service, p)| PredictionRow {
                        service: service.clone(),
                        current: format_currency(p.current_daily_avg),
                        predicted: format_currency(p.predicted_daily_avg),
                        trend: color_trend(&p.trend),
                        next_month: format_currency(p.predicted_next_month),
                    })
                    .collect(),
                "No cost history to forecast from",
            );

            let total: f64 = result.values().map(|p| p.predicted_next_month).sum();
            if total > 0.0 {
                println!(
                    "\n{} {}",
                    "Predicted next month:".bold(),
                    format_currency(total).bold()
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share() {
        assert_eq!(share(25.0, 100.0), "25.0%");
        assert_eq!(share(5.0, 0.0), "-");
    }
}
