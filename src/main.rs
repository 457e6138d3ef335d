//! AMCP CLI — drives the mesh through a scripted demo goal so the six
//! end-to-end scenarios in the test suite can also be exercised by hand.

use amcp::adapters::demo_agents::{chat_agent, stock_agent, weather_agent};
use amcp::infrastructure::config::ConfigLoader;
use amcp::infrastructure::logging::LoggerHandle;
use amcp::mesh::MeshBuilder;
use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "amcp-cli", about = "Agent Mesh Communication Protocol demo runner")]
struct Cli {
    /// Goal to submit to the orchestrator.
    #[arg(default_value = "what's the weather and ACME's stock price, then summarize it")]
    goal: String,

    /// Path to a YAML config file. Falls back to defaults + environment
    /// variables when omitted.
    #[arg(long)]
    config: Option<String>,

    /// Emit the final session as JSON instead of a human summary.
    #[arg(long)]
    json: bool,

    /// Print accumulated orchestrator counters and phase latencies after
    /// the run.
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path).context("failed to load config file")?,
        None => ConfigLoader::load().context("failed to load configuration")?,
    };
    let _logger = LoggerHandle::init(&config.logging).context("failed to initialize logging")?;

    let mesh = MeshBuilder::new(config).build();

    weather_agent().install(mesh.context(), mesh.registry()).await?;
    stock_agent().install(mesh.context(), mesh.registry()).await?;
    chat_agent().install(mesh.context(), mesh.registry()).await?;

    let session = mesh.run(cli.goal).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else {
        println!("session {} -> {:?}", session.session_id, session.state);
        if let Some(synthesis) = &session.synthesis {
            println!("\n{synthesis}");
        }
        if let Some(reason) = &session.failure_reason {
            println!("\nfailure: {reason}");
        }
    }

    if cli.stats {
        let stats = mesh.orchestrator().stats().await;
        println!("\n{}", serde_json::to_string_pretty(&stats)?);
    }

    Ok(())
}
