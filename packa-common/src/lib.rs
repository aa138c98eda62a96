//! # Packa Common Library
//!
//! Shared code for the Packa playback engine including:
//! - Error types
//! - Group and destination identifiers
//! - Event types (SessionEvent enum) and the EventBus
//! - TOML bootstrap configuration
//! - Track time formatting

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod ids;

pub use error::{Error, Result};
pub use ids::{DestinationId, GroupId};
