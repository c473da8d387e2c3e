//! CLI for the courier delivery queue.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use courier_core::config::{self, CourierConfig};
use courier_core::impls::{FileStore, ReqwestSender};
use courier_core::{Connectivity, Courier, CourierBuilder};

use commands::{
    EnqueueArgs, run_clear_failed, run_enqueue, run_process, run_retry, run_status, run_watch,
};

#[derive(Debug, Parser)]
#[command(name = "courier")]
#[command(about = "Durable queue for side-effecting HTTP requests", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Config file (default: $XDG_CONFIG_HOME/courier/config.toml, created if missing).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding the persisted queue (default: $XDG_STATE_HOME/courier).
    #[arg(long, global = true, value_name = "DIR")]
    pub store_dir: Option<PathBuf>,

    /// Treat the network as unavailable: nothing is dispatched.
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue a request for delivery.
    Enqueue(EnqueueArgs),

    /// Deliver pending requests now.
    Process,

    /// Show queue counts, pending requests and failures.
    Status {
        /// Print the raw snapshot as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Move a failed request back to the queue and deliver it.
    Retry {
        /// Operation id (`op-...` or bare ULID).
        id: String,
    },

    /// Drop all failed requests.
    ClearFailed,

    /// Print every queue change until interrupted.
    Watch {
        /// Also deliver pending requests while watching.
        #[arg(long)]
        process: bool,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = match &cli.global.config {
            Some(path) => CourierConfig::load(path)?,
            None => config::load_or_init()?,
        };
        tracing::debug!("loaded config: {:?}", cfg);
        let courier = open_courier(&cli.global, cfg).await?;

        let result = match cli.command {
            CliCommand::Enqueue(args) => run_enqueue(&courier, args).await,
            CliCommand::Process => run_process(&courier).await,
            CliCommand::Status { json } => run_status(&courier, json).await,
            CliCommand::Retry { id } => run_retry(&courier, &id).await,
            CliCommand::ClearFailed => run_clear_failed(&courier).await,
            CliCommand::Watch { process } => run_watch(&courier, process).await,
        };

        courier.shutdown().await;
        result
    }
}

async fn open_courier(global: &GlobalArgs, cfg: CourierConfig) -> Result<Courier> {
    let store = match &global.store_dir {
        Some(dir) => FileStore::new(dir),
        None => FileStore::open_default().context("open queue store")?,
    };
    tracing::debug!(dir = %store.dir().display(), "queue store");
    let sender = ReqwestSender::new(&cfg.transport.base_url);

    let courier = CourierBuilder::new(cfg, Arc::new(sender), Arc::new(store))
        .connectivity(Connectivity::new(!global.offline))
        .build()
        .await?;
    Ok(courier)
}
