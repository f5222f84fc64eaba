//! Hubcast CLI
//!
//! Command-line interface for operating a running Hubcast server:
//! - Broadcast or push messages
//! - List and disconnect clients
//! - Check status
//! - Generate a config file

use clap::{Parser, Subcommand};
use hubcast::websocket::HubStats;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hubcast-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operate a Hubcast WebSocket broadcast hub")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8090", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a message to every connected client
    Broadcast {
        /// Message content
        content: String,
        /// Sender label
        #[arg(short, long, default_value = "")]
        sender: String,
    },

    /// Send a message to the clients of one user
    Push {
        /// Target user id
        user_id: i64,
        /// Message content
        content: String,
        /// Sender label
        #[arg(short, long, default_value = "")]
        sender: String,
    },

    /// List connected clients
    Clients,

    /// Close one client connection
    Disconnect {
        /// Client id
        id: String,
    },

    /// Show server status
    Status,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Broadcast { content, sender } => {
            let body = serde_json::json!({
                "content": content,
                "sender": sender,
            });

            let response = client
                .post(format!("{}/api/v1/broadcast", cli.api_url))
                .json(&body)
                .send()
                .await?;

            exit_on_error(response, "Broadcast failed").await;
            println!("Broadcast accepted");
        }

        Commands::Push {
            user_id,
            content,
            sender,
        } => {
            let body = serde_json::json!({
                "user_id": user_id,
                "content": content,
                "sender": sender,
            });

            let response = client
                .post(format!("{}/api/v1/push", cli.api_url))
                .json(&body)
                .send()
                .await?;

            exit_on_error(response, "Push failed").await;
            println!("Push to user {} accepted", user_id);
        }

        Commands::Clients => {
            let response = client
                .get(format!("{}/api/v1/clients", cli.api_url))
                .send()
                .await?;

            if !response.status().is_success() {
                eprintln!("Failed to fetch clients: {}", response.status());
                std::process::exit(1);
            }

            let stats: HubStats = response.json().await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else if stats.clients.is_empty() {
                println!("No clients connected.");
            } else {
                println!(
                    "{:<38} {:<10} {:<22} {}",
                    "ID", "User", "Connected", "Queued"
                );
                println!("{}", "-".repeat(80));

                for info in &stats.clients {
                    println!(
                        "{:<38} {:<10} {:<22} {}",
                        info.id,
                        info.user_id,
                        info.connected_at.format("%Y-%m-%d %H:%M:%S"),
                        info.queued
                    );
                }
                println!();
                println!("{} client(s)", stats.client_count);
            }
        }

        Commands::Disconnect { id } => {
            let response = client
                .delete(format!("{}/api/v1/clients/{}", cli.api_url, id))
                .send()
                .await?;

            exit_on_error(response, "Disconnect failed").await;
            println!("Disconnect requested for {}", id);
        }

        Commands::Status => {
            let response = client
                .get(format!("{}/health", cli.api_url))
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let health: serde_json::Value = resp.json().await?;

                    println!("Hubcast v{}", env!("CARGO_PKG_VERSION"));
                    println!();
                    println!(
                        "Server status: {}",
                        health["status"].as_str().unwrap_or("unknown")
                    );
                    println!("Hub loop: {}", health["hub"].as_str().unwrap_or("unknown"));
                    if let Some(clients) = health["clients"].as_u64() {
                        println!("Connected clients: {}", clients);
                    }

                    if let Some(uptime) = health["uptime_seconds"].as_u64() {
                        println!();
                        println!("Uptime: {}", format_duration(uptime));
                    }
                }
                Ok(resp) => {
                    eprintln!("API returned error: {}", resp.status());
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Cannot connect to Hubcast at {}", cli.api_url);
                    eprintln!("Error: {}", e);
                    eprintln!();
                    eprintln!("Start the server with: hubcast --config config.toml");
                    std::process::exit(1);
                }
            }
        }

        Commands::Config { output } => {
            let config = hubcast::config::generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

/// Print the server's error body and exit when the request failed
async fn exit_on_error(response: reqwest::Response, context: &str) {
    if response.status().is_success() {
        return;
    }

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    eprintln!("{} ({}): {}", context, status, text);
    std::process::exit(1);
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
