//! Parses the command line arguments and starts the router.
//!
//! Basic usage, logging JSON to `./logs`:
//!
//! ```text
//! cargo run -p ripd -- --config ripd/configs/r1.toml --log
//! ```

use std::{
    fs::{create_dir_all, OpenOptions},
    path::PathBuf,
    sync::Arc,
};

use anyhow::Context;
use clap::Parser;
use ripd_core::{shutdown::ExitStatus, Router, Shutdown};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::{config::Config, udp_link::UdpHal};

/// A RIP version 2 router over UDP tunnels
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the router's TOML configuration
    #[arg(short, long)]
    pub config: PathBuf,
    /// Write JSON logs to ./logs instead of the terminal
    #[arg(short, long)]
    pub log: bool,
    /// Milliseconds between periodic updates, overriding the configuration
    #[arg(long)]
    pub update_interval_ms: Option<u64>,
}

/// Parses the process arguments and runs the router until Ctrl-C.
pub async fn initialize_from_arguments() -> anyhow::Result<ExitStatus> {
    let args = Args::parse();
    initialize_logging(args.log)?;
    run(args).await
}

/// Runs the router described by `args` until Ctrl-C or until its links
/// close.
pub async fn run(args: Args) -> anyhow::Result<ExitStatus> {
    let mut config = Config::load(&args.config)?;
    if let Some(update_interval_ms) = args.update_interval_ms {
        config.update_interval_ms = update_interval_ms;
        config.validate()?;
    }

    let hal = UdpHal::bind(&config.interfaces)
        .await
        .context("Failed to bind the interface sockets")?;
    let mut router =
        Router::new(hal, config.table_capacity)?.with_update_interval(config.update_interval());

    let shutdown = Shutdown::new();
    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => interrupt.shut_down(),
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    Ok(router.run(shutdown).await?)
}

/// Installs the global subscriber. Only should be called once.
///
/// Events go to stderr, or with `to_file` as JSON to a timestamped file in
/// `./logs`. `RUST_LOG` picks what is recorded and defaults to `info`.
pub fn initialize_logging(to_file: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if to_file {
        let main_path = "./logs";
        create_dir_all(main_path)?;
        let file_path = format!(
            "{}/debug-{}.log",
            main_path,
            chrono::offset::Local::now().format("%y-%m-%d_%H-%M-%S")
        );
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&file_path)
            .with_context(|| format!("Failed to open {}", file_path))?;
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(Arc::new(file))
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}
