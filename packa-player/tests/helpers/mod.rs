//! Test helpers for packa-player integration tests
//!
//! Provides:
//! - TestSession: a joined session driven by the simulated provider
//! - eventually: poll an async condition until it holds
//! - drain_events: collect buffered session events

#![allow(dead_code)]

use packa_common::config::TomlConfig;
use packa_common::events::SessionEvent;
use packa_common::{DestinationId, GroupId};
use packa_player::playback::Session;
use packa_player::provider::provider_channel;
use packa_player::simulation::{CatalogResolver, SimulatedProvider};
use packa_player::PlaybackService;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub const GROUP: GroupId = GroupId(42);
pub const DESTINATION: DestinationId = DestinationId(7);

/// A running service with one joined session
pub struct TestSession {
    pub service: PlaybackService,
    pub session: Arc<Session>,
    pub provider: Arc<SimulatedProvider>,
    pub events: broadcast::Receiver<SessionEvent>,
}

impl TestSession {
    /// Titles of every track the provider was told to start, in order
    pub fn started_titles(&self) -> Vec<String> {
        self.provider
            .started_tracks()
            .iter()
            .map(|t| t.title().to_string())
            .collect()
    }

    /// Titles of the pending queue, in play order
    pub async fn queue_titles(&self) -> Vec<String> {
        self.session
            .queue()
            .await
            .iter()
            .map(|t| t.title().to_string())
            .collect()
    }

    /// Wait until the provider plays `title` and the session has seen it start
    pub async fn wait_playing(&self, title: &str) {
        let provider = Arc::clone(&self.provider);
        let session = Arc::clone(&self.session);
        eventually(&format!("'{}' playing", title), || {
            let provider = Arc::clone(&provider);
            let session = Arc::clone(&session);
            let title = title.to_string();
            async move {
                let playing = provider.playing().is_some_and(|t| t.title() == title);
                let head_consumed = match session.current_track().await {
                    Some(current) => !session.queue().await.contains(&current),
                    None => false,
                };
                playing && head_consumed
            }
        })
        .await;
    }

    /// Wait until the session reports nothing playing
    pub async fn wait_idle(&self) {
        let session = Arc::clone(&self.session);
        eventually("session idle", || {
            let session = Arc::clone(&session);
            async move { !session.is_playing().await }
        })
        .await;
    }
}

/// Default config (3 h grace timers, 10-entry pages)
pub fn test_config() -> TomlConfig {
    TomlConfig::default()
}

pub async fn start_session() -> TestSession {
    start_session_with(test_config()).await
}

pub async fn start_session_with(config: TomlConfig) -> TestSession {
    let resolver = Arc::new(CatalogResolver::new().requested_by("tester"));
    let service = PlaybackService::new(&config, resolver, None);
    let events = service.subscribe();

    let (tx, rx) = provider_channel();
    let provider = SimulatedProvider::new(tx);
    let session = service
        .join(GROUP, provider.clone(), rx, DESTINATION)
        .await
        .expect("join should succeed");

    TestSession {
        service,
        session,
        provider,
        events,
    }
}

/// Poll `condition` every 10ms until it returns true; panic after 2s
pub async fn eventually<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

/// Collect every event currently buffered
pub fn drain_events(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}

/// Let spawned tasks (provider pump, timers) run
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
