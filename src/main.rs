//! MIDI Relay
//!
//! Sits between a MIDI controller and the software it drives: hardware
//! messages are translated per input and forwarded to a client port, while
//! backlight feedback is sent back to the device.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use midi_relay::config::AppConfig;
use midi_relay::driver::DriverCatalog;
use midi_relay::midi::MidiEvent;
use midi_relay::persistence::ProjectSnapshot;
use midi_relay::router::{Routed, Router};
use midi_relay::transport::{self, MidiSink, PortSink, ThrottledSink};

/// MIDI Relay - translate controller events and drive controller backlights
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// List devices of the driver catalog (embedded unless the config names one)
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting MIDI Relay v{}...", env!("CARGO_PKG_VERSION"));

    if args.list_ports {
        let (inputs, outputs) = transport::list_ports()?;
        println!("Input ports:");
        for name in inputs {
            println!("  {}", name);
        }
        println!("Output ports:");
        for name in outputs {
            println!("  {}", name);
        }
        return Ok(());
    }

    if args.list_devices {
        let catalog = match AppConfig::load(&args.config).await {
            Ok(config) => load_catalog(&config).await?,
            Err(_) => DriverCatalog::embedded()?,
        };
        for device in &catalog.devices {
            println!("{} ({} inputs)", device.name, device.inputs.len());
        }
        return Ok(());
    }

    info!("Configuration file: {}", args.config);
    let config = AppConfig::load(&args.config).await?;
    let catalog = load_catalog(&config).await?;
    let router = build_router(&config, &catalog).await?;
    info!("Router initialized for '{}'", router.device());

    run_app(router, config, shutdown_signal()).await?;

    info!("MIDI Relay shutdown complete");
    Ok(())
}

async fn load_catalog(config: &AppConfig) -> Result<DriverCatalog> {
    match &config.catalog {
        Some(path) => DriverCatalog::load(path).await,
        None => DriverCatalog::embedded(),
    }
}

/// Router from the saved project when there is one, else from catalog defaults
async fn build_router(config: &AppConfig, catalog: &DriverCatalog) -> Result<Router> {
    if let Some(path) = config.project.as_deref().filter(|p| p.exists()) {
        let snapshot = ProjectSnapshot::load_from_file(path).await?;
        if snapshot.device == config.midi.device {
            return snapshot.into_router(catalog);
        }
        warn!(
            "Project {} is for device '{}', not '{}'; starting from defaults",
            path.display(),
            snapshot.device,
            config.midi.device
        );
    }

    let device = catalog
        .device(&config.midi.device)
        .with_context(|| format!("Device '{}' is not in the driver catalog", config.midi.device))?;
    Router::new(device)
}

async fn run_app(
    mut router: Router,
    config: AppConfig,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _input = transport::open_input(&config.midi.input_port, tx)?;

    let client: Arc<dyn MidiSink> = Arc::new(PortSink::open(&config.midi.client_output_port)?);
    let device_port: Arc<dyn MidiSink> = Arc::new(PortSink::open(&config.midi.device_output_port)?);
    let device: Arc<dyn MidiSink> = match config.midi.min_device_interval_ms {
        0 => device_port,
        ms => Arc::new(ThrottledSink::spawn(device_port, Duration::from_millis(ms))),
    };

    // Bring the lights in line with the current states
    for event in router.sync_device() {
        send_event(device.as_ref(), &event);
    }

    info!("Relay running, press Ctrl+C to stop");

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            Some(bytes) = rx.recv() => {
                dispatch(&mut router, &bytes, device.as_ref(), client.as_ref());
            }
            _ = &mut shutdown => break,
        }
    }

    if let Some(path) = &config.project {
        ProjectSnapshot::from_router(&router)
            .save_to_file(path)
            .await
            .with_context(|| format!("Failed to save project to {}", path.display()))?;
    }

    Ok(())
}

/// Route one hardware message; device feedback goes out before the client message
fn dispatch(router: &mut Router, bytes: &[u8], device: &dyn MidiSink, client: &dyn MidiSink) {
    match router.route(bytes) {
        Routed::Translated(result) => {
            if let Some(event) = result.to_device {
                send_event(device, &event);
            }
            if let Some(event) = result.to_client {
                send_event(client, &event);
            }
        }
        Routed::Raw(bytes) => {
            if let Err(e) = client.send(&bytes) {
                warn!("Failed to forward system message: {:#}", e);
            }
        }
        Routed::Dropped => {}
    }
}

fn send_event(sink: &dyn MidiSink, event: &MidiEvent) {
    debug!("Sending {}", event);
    if let Err(e) = sink.send(&event.to_bytes()) {
        warn!("Send failed: {:#}", e);
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
