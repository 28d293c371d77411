use std::process::ExitCode;

use agent_monitor_core::{
    AgentClient, MonitorConfig, RunRequest, SessionStatus, init_observability,
};
use clap::{Parser, Subcommand};

mod render;
mod run;

#[derive(Parser)]
#[command(name = "agent-monitor")]
#[command(about = "Follow a running trading agent live from the terminal")]
#[command(version)]
struct Cli {
    /// Base URL of the agent server (overrides AGENT_MONITOR_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Enable verbose logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an agent run and follow it until it ends
    Run {
        /// Coin symbol to trade (for example BTC)
        #[arg(short, long, default_value = "BTC")]
        coin: String,

        /// Maximum number of attempts (defaults to AGENT_MONITOR_MAX_RETRIES or 3)
        #[arg(short, long)]
        max_retries: Option<u32>,

        /// Print raw records as JSON lines instead of the live view
        #[arg(long)]
        json: bool,
    },

    /// List the coins the agent supports
    Coins,

    /// Check that the agent server is up
    Health,
}

fn exit_code(status: SessionStatus) -> ExitCode {
    match status {
        SessionStatus::Completed => ExitCode::SUCCESS,
        SessionStatus::Cancelled => ExitCode::from(130),
        SessionStatus::Errored | SessionStatus::Idle | SessionStatus::Running => ExitCode::FAILURE,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_observability(if cli.verbose { "debug" } else { "warn" });

    let mut config = MonitorConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config = config.base_url(base_url);
    }
    let client = AgentClient::new(config)?;

    match cli.command {
        Commands::Run {
            coin,
            max_retries,
            json,
        } => {
            let max_retries = max_retries.unwrap_or(client.config().default_max_retries);
            let request = RunRequest::new(coin, max_retries)?;
            let snapshot = run::run_command(client, request, json).await?;
            Ok(exit_code(snapshot.status))
        }
        Commands::Coins => {
            let coins = client.coins().await?;
            if coins.is_empty() {
                println!("No coins available.");
            }
            for coin in coins {
                println!("  {:<6} {}", coin.symbol, coin.name);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Health => {
            let health = client.health().await?;
            println!("{}", health.status);
            Ok(if health.is_healthy() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
