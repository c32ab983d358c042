//! Rtether CLI
//!
//! A command-line interface for USB reverse tethering.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rtether_engine::{
    Config, RelayEngine, SessionController, SystemConfigurator,
};
use tether_usb::{AccessoryDescriptor, CharDevHost};

/// Rtether - reverse tethering over a USB accessory link
#[derive(Parser)]
#[command(name = "rtether")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "rtether.toml")]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a tethering session and run until interrupted
    Run {
        /// Model reported by the attached accessory
        #[arg(long, default_value = "accessory")]
        model: String,

        /// Serial reported by the attached accessory (carries the
        /// tunnel address to assign to the interface)
        #[arg(long)]
        serial: Option<String>,
    },

    /// Generate a sample configuration file
    GenConfig {
        /// Output path for the configuration file
        #[arg(short, long, default_value = "rtether.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    match cli.command {
        Commands::Run { model, serial } => run(cli.config, model, serial).await,
        Commands::GenConfig { output } => generate_config(output),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(config_path: PathBuf, model: String, serial: Option<String>) -> Result<()> {
    let config = load_config(&config_path)?;

    let host = Arc::new(CharDevHost::new(
        &config.accessory.device,
        Duration::from_millis(config.accessory.poll_interval_ms),
    ));
    let controller = SessionController::new(
        config.session.clone(),
        host.clone(),
        host,
        Arc::new(SystemConfigurator),
        Arc::new(RelayEngine::new()),
    );

    let accessory = serial.map(|serial| AccessoryDescriptor::new(model, serial));

    controller
        .start(accessory)
        .await
        .context("Failed to start tethering session")?;

    info!("Tethering session running; press Ctrl+C to stop");

    wait_for_shutdown().await;

    info!("Shutting down...");
    controller.stop().await;

    Ok(())
}

fn load_config(path: &PathBuf) -> Result<Config> {
    if path.exists() {
        let config = Config::load(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?;
        info!("Configuration loaded from {:?}", path);
        Ok(config)
    } else {
        info!("No configuration at {:?}, using defaults", path);
        Ok(Config::default())
    }
}

fn generate_config(output: PathBuf) -> Result<()> {
    let sample = Config::sample();

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write configuration to {:?}", output))?;

    println!("Sample configuration written to {:?}", output);
    println!("\nEdit the configuration file to match your accessory device node.");

    Ok(())
}

async fn wait_for_shutdown() {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("Failed to register SIGTERM handler");
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("Failed to register SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }
}
