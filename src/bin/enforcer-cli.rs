use std::collections::HashMap;
use std::path::PathBuf;

use api_enforcer::config::load_descriptors;
use api_enforcer::RequestDescription;
use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "enforcer-cli")]
#[command(about = "Client for the API Enforcer decision service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:9095")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service health
    Health,
    /// List published APIs
    Apis,
    /// Ask for a decision on one request
    Enforce {
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        /// Request path, without query string
        path: String,
        #[arg(long, default_value = "localhost")]
        vhost: String,
        /// Header as `name: value`; repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// Query parameter as `name=value`; repeatable
        #[arg(short, long = "query")]
        query: Vec<String>,
        /// Request body
        #[arg(short, long)]
        body: Option<String>,
    },
    /// Compile API descriptors locally and report errors
    Validate {
        #[arg(default_value = "apis")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Apis => {
            let res = client.get(format!("{}/apis", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Enforce {
            method,
            path,
            vhost,
            headers,
            query,
            body,
        } => {
            let request = RequestDescription {
                method,
                path,
                vhost,
                headers: parse_pairs(&headers, ':')?,
                query_params: parse_pairs(&query, '=')?,
                body,
                ..Default::default()
            };
            let res = client
                .post(format!("{}/enforce", cli.url))
                .json(&request)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Validate { dir } => {
            let mut failed = 0;
            for load in load_descriptors(&dir)? {
                match load.result {
                    Ok(api) => println!("ok     {} ({})", load.path.display(), api.display_name()),
                    Err(e) => {
                        failed += 1;
                        println!("error  {}: {}", load.path.display(), e);
                    }
                }
            }
            if failed > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn parse_pairs(items: &[String], separator: char) -> Result<HashMap<String, String>, String> {
    items
        .iter()
        .map(|item| {
            item.split_once(separator)
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| format!("expected `name{}value`, got `{}`", separator, item))
        })
        .collect()
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: enforcer returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
