// dvroute: distance-vector routing node CLI
//
// `run` drives one node from an external harness: events in as JSON lines
// on stdin, actions out as JSON lines on stdout. Logs go to stderr so the
// action stream stays machine-readable.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dvroute_core::{spawn_node, Action, Event, NodeId, RouterConfig};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "dvroute")]
#[command(about = "DVRoute: Distance-Vector Routing Node", long_about = None)]
#[command(version)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one routing node over JSON lines on stdin/stdout
    Run(RunArgs),
    /// Manage persisted defaults
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Identity of this node
    #[arg(long)]
    id: String,
    /// Poisoned reverse and route poisoning instead of split horizon
    #[arg(long)]
    poison: bool,
    /// Seconds between periodic advertisements
    #[arg(long)]
    timer_interval: Option<u64>,
    /// Seconds before a silent route expires
    #[arg(long)]
    route_timeout: Option<u64>,
    /// Config file to use instead of the persisted defaults
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show every setting
    #[command(alias = "list")]
    Show,
    Get { key: String },
    Set { key: String, value: String },
    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Config { action } => cmd_config(action),
    }
}

/// Merge persisted defaults with command-line overrides
fn resolve_router_config(args: &RunArgs) -> Result<RouterConfig> {
    let config = match &args.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load_existing()?,
    };

    let mut router = config.router;
    if args.poison {
        router.poison_mode = true;
    }
    if let Some(secs) = args.timer_interval {
        router.timer_interval_secs = secs;
    }
    if let Some(secs) = args.route_timeout {
        router.route_timeout_secs = secs;
    }

    router.validate().context("Invalid routing options")?;
    Ok(router)
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    let router = resolve_router_config(&args)?;
    tracing::info!(
        "Starting node {} (poison: {}, interval: {}s, timeout: {}s)",
        args.id,
        router.poison_mode,
        router.timer_interval_secs,
        router.route_timeout_secs
    );

    let (node, actions) =
        spawn_node(NodeId::new(args.id.as_str()), router).context("Failed to start node")?;

    let output_task = tokio::spawn(write_actions(actions));

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Event>(line) {
            Ok(event) => node.send_event(event).await?,
            Err(e) => tracing::warn!("Ignoring malformed event: {}", e),
        }
    }

    tracing::info!("Input closed, stopping node {}", node.id());
    node.shutdown().await?;

    output_task.await.context("Output task failed")?
}

/// Write every action as one JSON line until the node stops
async fn write_actions(mut actions: mpsc::Receiver<Action>) -> Result<()> {
    let mut stdout = tokio::io::stdout();

    while let Some(action) = actions.recv().await {
        let mut line = serde_json::to_string(&action).context("Failed to serialize action")?;
        line.push('\n');
        stdout
            .write_all(line.as_bytes())
            .await
            .context("Failed to write action")?;
        stdout.flush().await.context("Failed to flush stdout")?;
    }

    Ok(())
}

fn cmd_config(action: ConfigAction) -> Result<()> {
    let mut config = config::Config::load()?;

    match action {
        ConfigAction::Show => {
            println!("{}", "Configuration".bold());
            println!();

            for (key, value) in config.list() {
                println!("  {:<20} {}", key.bright_cyan(), value);
            }
        }

        ConfigAction::Get { key } => {
            if let Some(value) = config.get(&key) {
                println!("{} = {}", key.bright_cyan(), value);
            } else {
                anyhow::bail!("Unknown config key: {}", key);
            }
        }

        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save()?;
            println!("{} Set {} = {}", "✓".green(), key.bright_cyan(), value);
        }

        ConfigAction::Path => {
            println!("{}", config::Config::config_file()?.display());
        }
    }

    Ok(())
}
