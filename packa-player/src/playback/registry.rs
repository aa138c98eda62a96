//! Session registry
//!
//! Map of group → live session. Guarantees at most one session per group
//! and lets a session remove itself on destruction without evicting a
//! newer session registered under the same group.

use crate::error::{Error, Result};
use crate::playback::session::Session;
use crate::provider::{AudioProvider, SourceResolver};
use packa_common::config::SessionConfig;
use packa_common::events::{DestroyReason, EventBus, SessionEvent};
use packa_common::{DestinationId, GroupId};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Live sessions keyed by group
pub struct SessionRegistry {
    sessions: RwLock<HashMap<GroupId, Arc<Session>>>,
    resolver: Arc<dyn SourceResolver>,
    settings: SessionConfig,
    events: EventBus,
    me: Weak<SessionRegistry>,
}

impl SessionRegistry {
    pub fn new(
        resolver: Arc<dyn SourceResolver>,
        settings: SessionConfig,
        events: EventBus,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            sessions: RwLock::new(HashMap::new()),
            resolver,
            settings,
            events,
            me: me.clone(),
        })
    }

    /// Create and register a session for `group_id`.
    ///
    /// Fails with [`Error::SessionExists`] if the group already has one; the
    /// existing session is left untouched. The join-grace timer is armed on
    /// the new session.
    pub async fn create(
        &self,
        group_id: GroupId,
        provider: Arc<dyn AudioProvider>,
        reply_to: DestinationId,
    ) -> Result<Arc<Session>> {
        let session = {
            let mut sessions = self.sessions.write().await;
            if sessions.contains_key(&group_id) {
                warn!("Group {}: session already exists", group_id);
                return Err(Error::SessionExists(group_id));
            }

            let session = Session::new(
                group_id,
                provider,
                Arc::clone(&self.resolver),
                reply_to,
                self.settings.clone(),
                self.events.clone(),
                self.me.clone(),
            );
            sessions.insert(group_id, Arc::clone(&session));
            session
        };

        session.arm_join_grace().await;

        info!("Group {}: session created (reply to {})", group_id, reply_to);
        self.events.emit_lossy(SessionEvent::SessionCreated {
            group_id,
            destination_id: reply_to,
            timestamp: chrono::Utc::now(),
        });
        Ok(session)
    }

    pub async fn get(&self, group_id: GroupId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&group_id).cloned()
    }

    /// Like [`get`](Self::get), but a missing session is an error
    pub async fn require(&self, group_id: GroupId) -> Result<Arc<Session>> {
        self.get(group_id)
            .await
            .ok_or(Error::SessionNotFound(group_id))
    }

    /// Destroy the group's session, if any
    pub async fn destroy(&self, group_id: GroupId) -> bool {
        match self.get(group_id).await {
            Some(session) => session.destroy().await,
            None => false,
        }
    }

    /// Destroy every session; returns how many were destroyed
    pub async fn destroy_all(&self) -> usize {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();

        let mut destroyed = 0;
        for session in sessions {
            if session.destroy_with(DestroyReason::Shutdown).await {
                destroyed += 1;
            }
        }
        destroyed
    }

    /// Remove `session` if it is still the one registered for `group_id`
    pub(crate) async fn deregister(&self, group_id: GroupId, session: &Session) {
        let mut sessions = self.sessions.write().await;
        let is_same = sessions
            .get(&group_id)
            .is_some_and(|registered| std::ptr::eq(Arc::as_ptr(registered), session));

        if is_same {
            sessions.remove(&group_id);
            debug!("Group {}: session deregistered", group_id);
        } else {
            debug!("Group {}: newer session registered, keeping it", group_id);
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn group_ids(&self) -> Vec<GroupId> {
        self.sessions.read().await.keys().copied().collect()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}
