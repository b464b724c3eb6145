//! Narrative insights and expert chat

use anyhow::Result;

use crate::client::{ApiClient, ChatRequest, TextReply};
use crate::output::{print_heading, print_json, OutputFormat};

pub async fn show_insights(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let reply: TextReply = client.get("api/v1/insights", &[]).await?;

    match format {
        OutputFormat::Json => print_json(&reply)?,
        OutputFormat::Table => {
            print_heading("Cost Insights", '=');
            println!("{}", reply.text);
        }
    }

    Ok(())
}

pub async fn chat(client: &ApiClient, question: &str, format: OutputFormat) -> Result<()> {
    let request = ChatRequest {
        question: question.to_string(),
    };
    let reply: TextReply = client.post("api/v1/chat", &request).await?;

    match format {
        OutputFormat::Json => print_json(&reply)?,
        OutputFormat::Table => println!("{}", reply.text),
    }

    Ok(())
}
