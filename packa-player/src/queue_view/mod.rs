//! Paginated, auto-expiring queue views

pub mod registry;
pub mod render;
pub mod view;

pub use registry::{QueueViewRegistry, ViewState};
pub use render::{now_playing_card, NowPlayingCard, RenderedPage};
pub use view::{Controls, Direction, QueueView, QueueViewSurface, CONTROL_BACKWARD, CONTROL_FORWARD};
