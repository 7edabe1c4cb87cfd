use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use forgemate_gateway::config::load_config_file;
use forgemate_gateway::gateway::{decode_frame, validate_connect_first};

#[derive(Parser)]
#[command(name = "forgemate-cli")]
#[command(about = "Management CLI for the ForgeMate gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:18789")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show gateway and sidecar supervisor health
    Health,
    /// Check gateway readiness
    Ready,
    /// Submit a connect frame (JSON file) for validation
    Validate {
        frame: PathBuf,
        /// Validate locally instead of calling the gateway
        #[arg(long)]
        offline: bool,
    },
    /// Validate a gateway config file without starting anything
    CheckConfig { path: PathBuf },
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
        Commands::Ready => {
            let res = client.get(format!("{}/ready", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Validate { frame, offline } => {
            let raw = std::fs::read(&frame)?;
            if offline {
                let frame = decode_frame(&raw)?;
                let params = validate_connect_first(&frame)?;
                println!(
                    "connect accepted: client {} as {} (protocol {})",
                    params.client.id,
                    params.role.trim(),
                    params.protocol
                );
            } else {
                let res = client
                    .post(format!("{}/v1/connect/validate", cli.url))
                    .header("content-type", "application/json")
                    .body(raw)
                    .send()
                    .await?;
                print_response(res).await?;
            }
        }
        Commands::CheckConfig { path } => match load_config_file(&path) {
            Ok(config) => {
                println!("{} is valid", path.display());
                println!("{}", toml::to_string_pretty(&config)?);
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        eprintln!("Response: {}", text.trim());
        std::process::exit(1);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
