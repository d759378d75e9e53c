use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::{error::Result, run::RunArgs, send::SendArgs};

mod error;
mod run;
mod send;

#[derive(Parser)]
#[command(name = "hopper")]
#[command(about = "Hopper event collector CLI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the collector service
    Run {
        #[clap(flatten)]
        inner: RunArgs,
    },
    /// Send events to a running collector
    Send {
        #[clap(flatten)]
        inner: SendArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    hopper_observability::init_observability(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();

    let ct = CancellationToken::new();

    let ct_clone = ct.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        ct_clone.cancel();
    });

    match cli.command {
        Commands::Run { inner } => inner.run(ct).await,
        Commands::Send { inner } => inner.run(ct).await,
    }
}
