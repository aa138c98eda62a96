//! Track handles
//!
//! A [`TrackRef`] is an opaque handle to one playable instance owned by the
//! audio provider. Cloning the handle keeps its identity; the scheduler
//! compares handles by instance id only and never looks inside them.
//! [`TrackRef::fresh_instance`] makes a new playable instance of the same
//! item (used for looping and restart).

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Metadata the resolver attaches to a playable item
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackInfo {
    pub title: String,
    pub author: String,
    pub uri: String,
    /// Track length; zero for live streams
    pub length: Duration,
    pub is_stream: bool,
    /// Display name of whoever requested the track
    pub requested_by: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl TrackInfo {
    pub fn new(title: impl Into<String>, length: Duration) -> Self {
        Self {
            title: title.into(),
            length,
            ..Default::default()
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn requested_by(mut self, user: impl Into<String>) -> Self {
        self.requested_by = Some(user.into());
        self
    }

    pub fn stream(mut self) -> Self {
        self.is_stream = true;
        self.length = Duration::ZERO;
        self
    }
}

/// Handle to one playable track instance
#[derive(Debug, Clone)]
pub struct TrackRef {
    instance: Uuid,
    info: Arc<TrackInfo>,
}

impl TrackRef {
    pub fn new(info: TrackInfo) -> Self {
        Self {
            instance: Uuid::new_v4(),
            info: Arc::new(info),
        }
    }

    /// Instance identity
    pub fn id(&self) -> Uuid {
        self.instance
    }

    pub fn info(&self) -> &TrackInfo {
        &self.info
    }

    pub fn title(&self) -> &str {
        &self.info.title
    }

    /// Length counted towards queue duration (zero for streams)
    pub fn length(&self) -> Duration {
        if self.info.is_stream {
            Duration::ZERO
        } else {
            self.info.length
        }
    }

    /// New instance of the same item, with its own identity
    pub fn fresh_instance(&self) -> Self {
        Self {
            instance: Uuid::new_v4(),
            info: Arc::clone(&self.info),
        }
    }

    /// Whether two handles refer to the same item, regardless of instance
    pub fn same_item(&self, other: &TrackRef) -> bool {
        Arc::ptr_eq(&self.info, &other.info) || *self.info == *other.info
    }
}

impl PartialEq for TrackRef {
    fn eq(&self, other: &Self) -> bool {
        self.instance == other.instance
    }
}

impl Eq for TrackRef {}

impl std::hash::Hash for TrackRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.instance.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_keeps_identity() {
        let track = TrackRef::new(TrackInfo::new("a", Duration::from_secs(10)));
        let copy = track.clone();
        assert_eq!(track, copy);
        assert_eq!(track.id(), copy.id());
    }

    #[test]
    fn test_fresh_instance_is_a_new_entry_of_the_same_item() {
        let track = TrackRef::new(TrackInfo::new("a", Duration::from_secs(10)));
        let again = track.fresh_instance();
        assert_ne!(track, again);
        assert!(track.same_item(&again));
        assert_eq!(again.title(), "a");
    }

    #[test]
    fn test_stream_length_is_zero() {
        let live = TrackRef::new(TrackInfo::new("radio", Duration::from_secs(99)).stream());
        assert_eq!(live.length(), Duration::ZERO);
    }
}
