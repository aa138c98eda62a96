//! Queue view registry
//!
//! Keeps at most one queue view per reply destination and sweeps expired
//! views on a fixed interval. The sweep runs concurrently with registry
//! mutations; both go through the same lock, so replacing a destination's
//! view (destroy old + install new) is one atomic step.

use crate::playback::session::Session;
use crate::queue_view::render::RenderedPage;
use crate::queue_view::view::{Controls, Direction, QueueView, QueueViewSurface};
use packa_common::config::QueueViewConfig;
use packa_common::events::{EventBus, SessionEvent};
use packa_common::DestinationId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// What a view currently shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub destination: DestinationId,
    pub page_index: usize,
    pub page_count: usize,
    pub page: RenderedPage,
    pub controls: Controls,
    pub active: bool,
}

impl ViewState {
    fn of(view: &QueueView) -> Self {
        Self {
            destination: view.destination(),
            page_index: view.current_page_index(),
            page_count: view.page_count(),
            page: view.current_page().clone(),
            controls: view.controls(),
            active: view.is_active(),
        }
    }
}

/// Destination → queue view
pub struct QueueViewRegistry {
    views: Mutex<HashMap<DestinationId, QueueView>>,
    config: QueueViewConfig,
    events: EventBus,
    surface: Option<Arc<dyn QueueViewSurface>>,
}

impl QueueViewRegistry {
    pub fn new(
        config: QueueViewConfig,
        events: EventBus,
        surface: Option<Arc<dyn QueueViewSurface>>,
    ) -> Self {
        Self {
            views: Mutex::new(HashMap::new()),
            config,
            events,
            surface,
        }
    }

    /// Build a view of `session`'s queue for `destination` and install it.
    ///
    /// `None` for the session renders the not-active view. Any view already
    /// installed for the destination is destroyed first, in the same critical
    /// section that shows and installs the new one.
    pub async fn add_queue_view(
        &self,
        session: Option<&Session>,
        destination: DestinationId,
    ) -> ViewState {
        // Snapshot outside the registry lock
        let snapshot = match session {
            Some(session) => Some(session.snapshot().await),
            None => None,
        };

        let mut view = QueueView::new(destination, snapshot.as_ref(), self.config.page_size);

        let mut views = self.views.lock().await;
        if let Some(mut old) = views.remove(&destination) {
            old.destroy();
            debug!("Queue view {}: replaced previous view", destination);
        }

        // The new view is shown only after the old one went dark
        if let Some(surface) = &self.surface {
            view = view.with_surface(Arc::clone(surface));
        }
        let state = ViewState::of(&view);
        views.insert(destination, view);

        state
    }

    /// Page the destination's view.
    ///
    /// `None` means not found: no view, or the view is inactive.
    pub async fn update_queue_view(
        &self,
        destination: DestinationId,
        direction: Direction,
    ) -> Option<ViewState> {
        let mut views = self.views.lock().await;
        let view = views.get_mut(&destination).filter(|v| v.is_active())?;
        view.update(direction);
        Some(ViewState::of(view))
    }

    /// Whether the destination has a view that still accepts paging
    pub async fn has_active_queue_view(&self, destination: DestinationId) -> bool {
        self.views
            .lock()
            .await
            .get(&destination)
            .is_some_and(QueueView::is_active)
    }

    /// Destroy and remove the destination's view
    pub async fn remove_queue_view(&self, destination: DestinationId) -> bool {
        match self.views.lock().await.remove(&destination) {
            Some(mut view) => {
                view.destroy();
                true
            }
            None => false,
        }
    }

    /// Destroy and remove every view with `created_at + lifetime <= now`
    pub async fn sweep_expired_at(&self, now: Instant) -> Vec<DestinationId> {
        let lifetime = self.config.lifetime();
        let mut views = self.views.lock().await;

        let expired: Vec<DestinationId> = views
            .iter()
            .filter(|(_, view)| view.is_expired_at(now, lifetime))
            .map(|(destination, _)| *destination)
            .collect();

        for destination in &expired {
            if let Some(mut view) = views.remove(destination) {
                view.destroy();
            }
            self.events.emit_lossy(SessionEvent::QueueViewExpired {
                destination_id: *destination,
                timestamp: chrono::Utc::now(),
            });
        }

        if !expired.is_empty() {
            debug!("Queue view sweep removed {} view(s)", expired.len());
        }
        expired
    }

    pub async fn sweep_expired(&self) -> Vec<DestinationId> {
        self.sweep_expired_at(Instant::now()).await
    }

    /// Spawn the periodic sweep; it runs until `shutdown` is cancelled
    pub fn spawn_sweeper(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let period = self.config.sweep_interval();
        info!(
            "Starting queue view sweep (interval: {}s, lifetime: {}s)",
            self.config.sweep_interval_secs, self.config.lifetime_secs
        );

        tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick completes immediately
            timer.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Queue view sweep stopped");
                        break;
                    }
                    _ = timer.tick() => {
                        self.sweep_expired().await;
                    }
                }
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.views.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.views.lock().await.is_empty()
    }
}
