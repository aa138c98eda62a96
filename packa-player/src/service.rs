//! Playback service
//!
//! Entry point for the command layer. Owns both registries, the event bus
//! and the queue view sweep job.

use crate::error::Result;
use crate::playback::registry::SessionRegistry;
use crate::playback::session::Session;
use crate::provider::{AudioProvider, ProviderEventReceiver, SourceResolver};
use crate::queue_view::registry::{QueueViewRegistry, ViewState};
use crate::queue_view::view::{Direction, QueueViewSurface};
use packa_common::config::TomlConfig;
use packa_common::events::{EventBus, SessionEvent};
use packa_common::{DestinationId, GroupId};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct PlaybackService {
    sessions: Arc<SessionRegistry>,
    views: Arc<QueueViewRegistry>,
    events: EventBus,
    shutdown: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackService {
    /// Build the service and start the queue view sweep.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: &TomlConfig,
        resolver: Arc<dyn SourceResolver>,
        surface: Option<Arc<dyn QueueViewSurface>>,
    ) -> Self {
        let events = EventBus::new(config.session.event_capacity);
        let sessions = SessionRegistry::new(resolver, config.session.clone(), events.clone());
        let views = Arc::new(QueueViewRegistry::new(
            config.queue_view.clone(),
            events.clone(),
            surface,
        ));

        let shutdown = CancellationToken::new();
        let sweeper = Arc::clone(&views).spawn_sweeper(shutdown.clone());

        Self {
            sessions,
            views,
            events,
            shutdown,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn views(&self) -> &Arc<QueueViewRegistry> {
        &self.views
    }

    /// Create the group's session and start pumping provider events into it
    pub async fn join(
        &self,
        group_id: GroupId,
        provider: Arc<dyn AudioProvider>,
        provider_events: ProviderEventReceiver,
        reply_to: DestinationId,
    ) -> Result<Arc<Session>> {
        let session = self.sessions.create(group_id, provider, reply_to).await?;
        session.attach_provider_events(provider_events);
        Ok(session)
    }

    pub async fn session(&self, group_id: GroupId) -> Option<Arc<Session>> {
        self.sessions.get(group_id).await
    }

    /// Destroy the group's session
    pub async fn leave(&self, group_id: GroupId) -> bool {
        self.sessions.destroy(group_id).await
    }

    /// Show the group's queue at `destination`, replacing any earlier view there
    pub async fn show_queue(&self, group_id: GroupId, destination: DestinationId) -> ViewState {
        let session = self.sessions.get(group_id).await;
        self.views
            .add_queue_view(session.as_deref(), destination)
            .await
    }

    /// Handle a paging control activation.
    ///
    /// `None` for unknown control ids and for missing or expired views.
    pub async fn page_queue(&self, destination: DestinationId, control_id: &str) -> Option<ViewState> {
        let Some(direction) = Direction::from_control_id(control_id) else {
            debug!("Ignoring unknown control '{}'", control_id);
            return None;
        };
        self.views.update_queue_view(destination, direction).await
    }

    pub async fn has_active_queue_view(&self, destination: DestinationId) -> bool {
        self.views.has_active_queue_view(destination).await
    }

    /// Stop the sweep and destroy every session
    pub async fn shutdown(&self) -> usize {
        self.shutdown.cancel();
        if let Some(sweeper) = self.sweeper.lock().await.take() {
            let _ = sweeper.await;
        }

        let destroyed = self.sessions.destroy_all().await;
        info!("Playback service shut down ({} session(s) destroyed)", destroyed);
        destroyed
    }
}

impl Drop for PlaybackService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
