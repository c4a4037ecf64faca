use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use statewatch::monitoring::build_prober;
use statewatch::{
    Config, EndpointMonitor, EventBus, MonitorClock, ProbeKind, Registry, Scheduler,
};

/// Periodically probe a set of endpoints and keep a compacted reachability history
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/statewatch/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// The number of seconds between server state pings
    #[arg(short = 'f', long)]
    update_frequency: Option<f64>,

    /// Directory for segment tables and down-event logs
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Endpoint registry (JSON object of name -> address)
    #[arg(long)]
    registry: Option<PathBuf>,

    #[arg(long, value_enum)]
    probe: Option<ProbeKind>,

    /// Probe every endpoint once and exit
    #[arg(long)]
    once: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(seconds) = self.update_frequency {
            config.monitor.update_interval_seconds = seconds;
        }
        if let Some(directory) = &self.storage_dir {
            config.storage.directory = Some(directory.clone());
        }
        if let Some(registry) = &self.registry {
            config.storage.registry = Some(registry.clone());
        }
        if let Some(probe) = self.probe {
            config.monitor.probe = probe;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_config(cli.config.as_ref()).context("Failed to load config")?;
    cli.apply(&mut config);
    config.validate()?;

    if cli.print_config {
        println!("{config}");
        return Ok(());
    }

    logger::init(config.log_level()?, config.logging.format);

    let storage_dir = config.storage_dir()?;
    let registry = Registry::load_or_create(&config.registry_path(&storage_dir))?;
    info!(
        endpoints = registry.len(),
        storage = %storage_dir.display(),
        probe = %config.monitor.probe,
        "Starting statewatch"
    );

    let clock = Arc::new(MonitorClock::load_or_start(&storage_dir));
    let prober = build_prober(config.monitor.probe, config.probe_timeout())?;
    let events = EventBus::default();

    let monitors = EndpointMonitor::open_all(
        &storage_dir,
        registry.endpoints(),
        prober,
        clock,
        events.clone(),
    );
    if monitors.is_empty() {
        bail!("No endpoint could be started, check {}", storage_dir.display());
    }

    let scheduler = Scheduler::spawn(config.update_interval(), monitors, events);

    if cli.once {
        scheduler.run_once().await;
        for snapshot in scheduler.snapshots() {
            let snapshot = snapshot.borrow();
            println!("{}: {}", snapshot.name, snapshot.status);
        }
        scheduler.shutdown().await;
    } else {
        scheduler
            .run_until(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl+C: {}", e);
                    std::future::pending::<()>().await;
                }
                info!("Ctrl+C received, shutting down.");
            })
            .await;
    }

    Ok(())
}
