//! Cloud Inventory CLI
//!
//! A command-line client for the inventory agent: list and query resources,
//! view costs and forecasts, and read optimization advice.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{advisor, costs, recommendations, resources};

/// Cloud Inventory CLI
#[derive(Parser)]
#[command(name = "cinv")]
#[command(author, version, about = "CLI for the Cloud Inventory agent", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via CINV_API_URL env var)
    #[arg(long, env = "CINV_API_URL")]
    pub api_url: Option<String>,

    /// Output format [default: table]
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List collected resources
    Resources {
        /// Filter by service type (EC2, RDS, Lambda, S3)
        #[arg(long, short)]
        service: Option<String>,

        /// Filter by region
        #[arg(long, short)]
        region: Option<String>,

        /// Filter by status (case-insensitive)
        #[arg(long)]
        status: Option<String>,
    },

    /// Ask a question about resources in plain language
    Query {
        /// Question, e.g. "running EC2 instances in us-east-1"
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// View cost analysis and forecasts
    #[command(subcommand)]
    Costs(CostsCommands),

    /// Show optimization recommendations
    Recommendations {
        /// Include a narrative optimization strategy
        #[arg(long)]
        explain: bool,
    },

    /// Show narrative cost insights
    Insights,

    /// Ask the cloud infrastructure expert a question
    Chat {
        #[arg(required = true)]
        question: Vec<String>,
    },

    /// Force a new collection pass
    Refresh,
}

#[derive(Subcommand)]
pub enum CostsCommands {
    /// Show spend by service, region and day over the last 30 days
    Show,

    /// Forecast next month's spend per service
    Predict {
        /// Days of history to forecast from
        #[arg(long, default_value_t = 30)]
        days: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::Config::load()?;
    let format = config.resolve_format(cli.format);
    let client = client::ApiClient::new(&config.resolve_api_url(cli.api_url))?;

    match cli.command {
        Commands::Resources {
            service,
            region,
            status,
        } => {
            resources::list_resources(&client, service, region, status, format).await?;
        }
        Commands::Query { text } => {
            resources::query_resources(&client, &text.join(" "), format).await?;
        }
        Commands::Costs(costs_cmd) => match costs_cmd {
            CostsCommands::Show => {
                costs::show_costs(&client, format).await?;
            }
            CostsCommands::Predict { days } => {
                costs::show_predictions(&client, days, format).await?;
            }
        },
        Commands::Recommendations { explain } => {
            recommendations::show_recommendations(&client, explain, format).await?;
        }
        Commands::Insights => {
            advisor::show_insights(&client, format).await?;
        }
        Commands::Chat { question } => {
            advisor::chat(&client, &question.join(" "), format).await?;
        }
        Commands::Refresh => {
            resources::refresh(&client, format).await?;
        }
    }

    Ok(())
}
