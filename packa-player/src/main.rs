//! Packa Player (packa-player) - Main entry point
//!
//! Runs one group session end-to-end against the simulated provider and
//! catalog resolver, logging every session event as JSON and the rendered
//! queue view. Exits when the session is destroyed or on Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use packa_common::config::TomlConfig;
use packa_common::events::SessionEvent;
use packa_common::{DestinationId, GroupId};
use packa_player::playback::EnqueueOutcome;
use packa_player::provider::provider_channel;
use packa_player::queue_view::{
    now_playing_card, Controls, QueueViewSurface, RenderedPage, CONTROL_FORWARD,
};
use packa_player::simulation::{CatalogResolver, SimulatedProvider, MIN_TIME_SCALE};
use packa_player::{LoopMode, PlaybackService};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LoopArg {
    Off,
    Single,
    Queue,
}

impl From<LoopArg> for LoopMode {
    fn from(arg: LoopArg) -> Self {
        match arg {
            LoopArg::Off => LoopMode::Off,
            LoopArg::Single => LoopMode::Single,
            LoopArg::Queue => LoopMode::Queue,
        }
    }
}

/// Command-line arguments for packa-player
#[derive(Parser, Debug)]
#[command(name = "packa-player")]
#[command(about = "Playback-session engine for Packa, driven by a simulated voice connection")]
#[command(version)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Group id for the session
    #[arg(short, long, default_value = "1", env = "PACKA_GROUP")]
    group: u64,

    /// Reply destination id for notices and the queue view
    #[arg(short, long, default_value = "1")]
    destination: u64,

    /// Track seconds played per wall-clock second
    #[arg(short, long, default_value = "30.0", value_parser = parse_time_scale)]
    time_scale: f64,

    /// Loop mode
    #[arg(short, long, value_enum, default_value = "off")]
    loop_mode: LoopArg,

    /// Shuffle after enqueueing
    #[arg(short, long)]
    shuffle: bool,

    /// Stay connected after the queue is exhausted (until the inactivity timer fires)
    #[arg(long)]
    stay: bool,

    /// Locators to enqueue (`title=secs`, `a=1,b=2`, `missing:x`, `fail:reason`)
    locators: Vec<String>,
}

fn parse_time_scale(value: &str) -> Result<f64, String> {
    let scale: f64 = value.parse().map_err(|e| format!("{}", e))?;
    if scale.is_finite() && scale >= MIN_TIME_SCALE {
        Ok(scale)
    } else {
        Err(format!("must be a number of at least {}", MIN_TIME_SCALE))
    }
}

/// Logs each shown page of a queue view
struct LogSurface;

impl QueueViewSurface for LogSurface {
    fn show(&self, destination: DestinationId, page: &RenderedPage, controls: Controls) {
        info!(
            "Queue view for destination {} (backward: {}, forward: {}):\n{}",
            destination, controls.backward_enabled, controls.forward_enabled, page
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let group_id = GroupId(args.group);
    let destination = DestinationId(args.destination);
    info!("Starting Packa Player for group {}", group_id);

    let resolver = Arc::new(CatalogResolver::new().requested_by("console"));
    let surface: Arc<dyn QueueViewSurface> = Arc::new(LogSurface);
    let service = PlaybackService::new(&config, resolver, Some(surface));

    let mut events = service.subscribe();
    let (tx, rx) = provider_channel();
    let provider = SimulatedProvider::auto_finishing(tx, args.time_scale);

    let session = service
        .join(group_id, provider, rx, destination)
        .await
        .context("Failed to create session")?;
    session.set_loop(args.loop_mode.into()).await?;

    let locators = if args.locators.is_empty() {
        vec!["Opening=20".to_string(), "Interlude=15,Theme=25,Reprise=10".to_string()]
    } else {
        args.locators.clone()
    };
    for locator in &locators {
        match session.load_and_enqueue(locator).await? {
            EnqueueOutcome::Started(track) => info!("Now playing '{}'", track.title()),
            EnqueueOutcome::Enqueued { track, position } => {
                info!("Queued '{}' at position {}", track.title(), position + 1)
            }
            EnqueueOutcome::PlaylistEnqueued { name, count, .. } => {
                info!("Queued {} ({} tracks)", name, count)
            }
            EnqueueOutcome::NoMatch => warn!("Nothing found for '{}'", locator),
            EnqueueOutcome::Failed(reason) => warn!("Could not load '{}': {}", locator, reason),
        }
    }
    if args.shuffle {
        session.shuffle().await?;
    }

    let view = service.show_queue(group_id, destination).await;
    for _ in 1..view.page_count {
        service.page_queue(destination, CONTROL_FORWARD).await;
    }
    if let Some(now_playing) = session.now_playing().await {
        info!("Now playing:\n{}", now_playing_card(&now_playing));
    }

    // Run until the session goes away or a signal arrives
    tokio::select! {
        _ = shutdown_signal() => {}
        _ = async {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        match serde_json::to_string(&event) {
                            Ok(json) => info!(target: "packa::events", "{}", json),
                            Err(e) => warn!("Failed to serialize event: {}", e),
                        }
                        match event {
                            SessionEvent::QueueExhausted { group_id: g, .. } if g == group_id && !args.stay => {
                                info!("Queue finished, leaving");
                                service.leave(group_id).await;
                            }
                            SessionEvent::SessionDestroyed { group_id: g, .. } if g == group_id => break,
                            _ => {}
                        }
                    }
                    Err(RecvError::Lagged(n)) => warn!("Event log lagged, {} events dropped", n),
                    Err(RecvError::Closed) => break,
                }
            }
        } => {}
    }

    service.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_scale_rejects_non_positive() {
        assert_eq!(parse_time_scale("30"), Ok(30.0));
        assert_eq!(parse_time_scale("0.5"), Ok(0.5));
        assert!(parse_time_scale("0").is_err());
        assert!(parse_time_scale("-2").is_err());
        assert!(parse_time_scale("NaN").is_err());
        assert!(parse_time_scale("fast").is_err());
    }
}
