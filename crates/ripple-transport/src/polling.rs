//! Long-polling fallback transport.
//!
//! For clients that cannot hold a WebSocket open. A session passes the same
//! authentication gate and occupies the same router-side connection as a
//! WebSocket would; outbound events queue in the session until the next
//! poll drains them. Sessions that stop polling are pruned by a periodic
//! sweep.
//!
//! Session ids are validated against the caller's credentials on every
//! request, so a guessed id without the matching identity gets nothing.

use crate::auth::Credentials;
use dashmap::DashMap;
use ripple_core::{ConnectionId, EventRouter};
use ripple_protocol::{unix_millis, ClientEvent, ServerEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Errors surfaced to polling clients.
#[derive(Debug, Error)]
pub enum PollingError {
    /// No such session for these credentials.
    #[error("Unknown polling session")]
    UnknownSession,

    /// The session's connection was closed server-side (eviction).
    #[error("Polling session closed")]
    SessionClosed,
}

/// One live polling session.
struct PollSession {
    connection: ConnectionId,
    user_id: String,
    /// Drained by at most one poll at a time.
    receiver: Mutex<mpsc::UnboundedReceiver<ServerEvent>>,
    /// Last request time in unix milliseconds, for idle pruning.
    last_seen: AtomicU64,
}

impl PollSession {
    fn touch(&self) {
        self.last_seen.store(unix_millis(), Ordering::Relaxed);
    }

    fn idle_for(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_seen.load(Ordering::Relaxed))
    }
}

/// All polling sessions for one server instance.
pub struct PollingSessions {
    router: Arc<EventRouter>,
    sessions: DashMap<u64, Arc<PollSession>>,
}

impl PollingSessions {
    /// Create an empty session table.
    #[must_use]
    pub fn new(router: Arc<EventRouter>) -> Self {
        Self {
            router,
            sessions: DashMap::new(),
        }
    }

    /// Open a session for authenticated credentials.
    ///
    /// Connects the identity to the router exactly as a WebSocket would,
    /// including the `user:online` broadcast. Returns the session id.
    pub fn open(&self, credentials: &Credentials) -> u64 {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = self.router.connect(credentials.user_id(), tx);

        let session = Arc::new(PollSession {
            connection,
            user_id: credentials.user_id().to_string(),
            receiver: Mutex::new(rx),
            last_seen: AtomicU64::new(unix_millis()),
        });

        let id = connection.as_u64();
        self.sessions.insert(id, session);

        info!(session = id, user = %credentials.user_id(), "Polling session opened");
        id
    }

    /// Wait up to `wait` for events, then drain everything queued.
    ///
    /// An empty vec means the wait elapsed with nothing to deliver; the
    /// client should poll again.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is unknown, belongs to a different
    /// identity, or was closed server-side.
    pub async fn poll(
        &self,
        id: u64,
        credentials: &Credentials,
        wait: Duration,
    ) -> Result<Vec<ServerEvent>, PollingError> {
        let session = self.get(id, credentials)?;
        session.touch();

        let mut receiver = session.receiver.lock().await;
        let mut events = Vec::new();

        match tokio::time::timeout(wait, receiver.recv()).await {
            Ok(Some(event)) => {
                events.push(event);
                while let Ok(event) = receiver.try_recv() {
                    events.push(event);
                }
            }
            // Sender dropped: the connection was evicted by a newer login.
            Ok(None) => {
                drop(receiver);
                self.sessions.remove(&id);
                debug!(session = id, "Polling session closed by eviction");
                return Err(PollingError::SessionClosed);
            }
            Err(_elapsed) => {}
        }

        Ok(events)
    }

    /// Submit one inbound event on a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is unknown or belongs to a
    /// different identity.
    pub fn submit(
        &self,
        id: u64,
        credentials: &Credentials,
        event: ClientEvent,
    ) -> Result<(), PollingError> {
        let session = self.get(id, credentials)?;
        session.touch();
        self.router
            .dispatch(session.connection, &session.user_id, event);
        Ok(())
    }

    /// Close a session, running normal disconnect cleanup.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is unknown or belongs to a
    /// different identity.
    pub fn close(&self, id: u64, credentials: &Credentials) -> Result<(), PollingError> {
        let session = self.get(id, credentials)?;
        self.sessions.remove(&id);
        self.router
            .disconnect(session.connection, &session.user_id);

        info!(session = id, user = %session.user_id, "Polling session closed");
        Ok(())
    }

    /// Disconnect sessions with no request activity for `idle_timeout`.
    ///
    /// Returns the number of sessions pruned. Intended to run on a timer.
    pub fn prune_idle(&self, idle_timeout: Duration) -> usize {
        let now = unix_millis();
        let timeout_ms = idle_timeout.as_millis() as u64;

        let stale: Vec<(u64, Arc<PollSession>)> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().idle_for(now) > timeout_ms)
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        for (id, session) in &stale {
            self.sessions.remove(id);
            self.router.disconnect(session.connection, &session.user_id);
            warn!(session = id, user = %session.user_id, "Pruned idle polling session");
        }

        stale.len()
    }

    /// Number of open sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn get(&self, id: u64, credentials: &Credentials) -> Result<Arc<PollSession>, PollingError> {
        let session = self
            .sessions
            .get(&id)
            .map(|s| s.value().clone())
            .ok_or(PollingError::UnknownSession)?;

        if session.user_id != credentials.user_id() {
            return Err(PollingError::UnknownSession);
        }

        Ok(session)
    }
}
