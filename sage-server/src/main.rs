use anyhow::Result;
use clap::Parser;

use sage_server::{AppState, SageServer, ServerConfig};

#[derive(Parser)]
#[command(name = "sage", about = "Adaptive assessment server")]
#[command(version)]
struct Cli {
    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 7433)]
    port: u16,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // In-memory repository seeded with the demo UK-Geography bank; swap in a
    // relational Repository implementation for real deployments.
    let state = AppState::demo().await?;
    tracing::info!(
        kcs = state.engine.catalogue().len(),
        "seeded demo question bank"
    );

    let server = SageServer::new(ServerConfig::new(cli.host, cli.port), state);
    server.run().await?;
    Ok(())
}
