//! Queue view
//!
//! A paginated projection of one session's queue. Pages are rendered once,
//! at construction, from a [`QueueSnapshot`]; paging only moves the page
//! index, so concurrent queue changes never make the view jump.

use crate::playback::session::QueueSnapshot;
use crate::queue_view::render::{self, RenderedPage};
use packa_common::{DestinationId, GroupId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Control id of the forward button
pub const CONTROL_FORWARD: &str = "button_forward";

/// Control id of the backward button
pub const CONTROL_BACKWARD: &str = "button_backward";

/// Paging direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Map a control activation id to a direction
    pub fn from_control_id(id: &str) -> Option<Self> {
        match id {
            CONTROL_FORWARD => Some(Direction::Forward),
            CONTROL_BACKWARD => Some(Direction::Backward),
            _ => None,
        }
    }

    pub fn control_id(self) -> &'static str {
        match self {
            Direction::Forward => CONTROL_FORWARD,
            Direction::Backward => CONTROL_BACKWARD,
        }
    }
}

/// Enablement of the paging controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Controls {
    pub backward_enabled: bool,
    pub forward_enabled: bool,
}

/// Where a view's pages are shown (e.g. an editable chat message)
///
/// Called with the page and controls every time either changes.
pub trait QueueViewSurface: Send + Sync {
    fn show(&self, destination: DestinationId, page: &RenderedPage, controls: Controls);
}

pub struct QueueView {
    destination: DestinationId,
    group_id: Option<GroupId>,
    pages: Vec<RenderedPage>,
    current: usize,
    created_at: Instant,
    active: bool,
    controls: Controls,
    surface: Option<Arc<dyn QueueViewSurface>>,
}

impl QueueView {
    /// Build a view from a snapshot; `None` means the group has no session.
    ///
    /// Only a view listing at least one queued track is active. The
    /// not-active and empty views are single static pages.
    pub fn new(destination: DestinationId, snapshot: Option<&QueueSnapshot>, page_size: usize) -> Self {
        let pages = match snapshot {
            Some(snapshot) => render::render_pages(snapshot, page_size),
            None => vec![render::not_active_page()],
        };
        let active = snapshot
            .map(|s| s.now_playing.is_some() && !s.queue.is_empty())
            .unwrap_or(false);

        let mut view = Self {
            destination,
            group_id: snapshot.map(|s| s.group_id),
            pages,
            current: 0,
            created_at: Instant::now(),
            active,
            controls: Controls::default(),
            surface: None,
        };
        view.recompute_controls();
        view
    }

    /// Attach the surface and show the first page on it
    pub fn with_surface(mut self, surface: Arc<dyn QueueViewSurface>) -> Self {
        self.surface = Some(surface);
        self.show();
        self
    }

    /// Move one page in `direction` and re-render in place.
    ///
    /// Returns whether the page changed. No-op on an inactive view.
    pub fn update(&mut self, direction: Direction) -> bool {
        if !self.active {
            return false;
        }

        let moved = match direction {
            Direction::Forward if self.current + 1 < self.pages.len() => {
                self.current += 1;
                true
            }
            Direction::Backward if self.current > 0 => {
                self.current -= 1;
                true
            }
            _ => false,
        };

        self.recompute_controls();
        if moved {
            debug!(
                "Queue view {}: page {}/{}",
                self.destination,
                self.current + 1,
                self.pages.len()
            );
            self.show();
        }
        moved
    }

    /// Disable both controls and mark the view inactive.
    ///
    /// Returns false if it was already inactive.
    pub fn destroy(&mut self) -> bool {
        let was_active = self.active;
        self.active = false;
        self.recompute_controls();
        if was_active {
            self.show();
        }
        was_active
    }

    fn recompute_controls(&mut self) {
        self.controls = if self.active {
            Controls {
                backward_enabled: self.current > 0,
                forward_enabled: self.current + 1 < self.pages.len(),
            }
        } else {
            Controls::default()
        };
    }

    fn show(&self) {
        if let Some(surface) = &self.surface {
            surface.show(self.destination, self.current_page(), self.controls);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether `created_at + lifetime <= now`
    pub fn is_expired_at(&self, now: Instant, lifetime: Duration) -> bool {
        self.created_at + lifetime <= now
    }

    pub fn destination(&self) -> DestinationId {
        self.destination
    }

    /// Group whose queue this view shows
    pub fn group_id(&self) -> Option<GroupId> {
        self.group_id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn current_page_index(&self) -> usize {
        self.current
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[RenderedPage] {
        &self.pages
    }

    pub fn current_page(&self) -> &RenderedPage {
        &self.pages[self.current]
    }

    pub fn controls(&self) -> Controls {
        self.controls
    }
}

impl std::fmt::Debug for QueueView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueView")
            .field("destination", &self.destination)
            .field("group_id", &self.group_id)
            .field("current", &self.current)
            .field("pages", &self.pages.len())
            .field("active", &self.active)
            .finish()
    }
}
