//! Session Descriptor
//!
//! State shared between the connection manager and the two event consumers
//! (dispatcher and reconnect policy). The transport handle is only replaced
//! by the manager; consumers clone it out under the lock and never hold the
//! lock across an await point.

use super::traits::{ConversationId, Transport};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Initialized,
    Authenticating,
    Connected,
    Disconnected,
    Terminated,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::Initialized => "initialized",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Operator-facing session settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub credential_path: PathBuf,
    /// Token a message must start with to be treated as a command
    pub tag: String,
    /// Only answer in the operator's own conversation
    pub test_mode: bool,
    pub reconnect_delay: Duration,
}

impl SessionSettings {
    pub fn new(credential_path: impl AsRef<Path>, tag: impl Into<String>) -> Self {
        Self {
            credential_path: credential_path.as_ref().to_path_buf(),
            tag: tag.into(),
            test_mode: false,
            reconnect_delay: Duration::from_secs(10),
        }
    }
}

/// Current wall-clock time in epoch seconds
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Shared session state
pub struct Session<T: Transport> {
    settings: SessionSettings,
    transport: Mutex<Option<T>>,
    own_id: Mutex<Option<ConversationId>>,
    state: Mutex<ConnectionState>,
    started_at: AtomicU64,
}

impl<T: Transport> Session<T> {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            transport: Mutex::new(None),
            own_id: Mutex::new(None),
            state: Mutex::new(ConnectionState::Uninitialized),
            started_at: AtomicU64::new(now_secs()),
        }
    }

    /// Start the watermark at `at` instead of now (replaying a known backlog)
    pub fn starting_at(self, at: u64) -> Self {
        self.started_at.store(at, Ordering::SeqCst);
        self
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Clone of the transport handle, if one exists
    pub fn transport(&self) -> Option<T> {
        lock(&self.transport).clone()
    }

    pub(crate) fn set_transport(&self, transport: Option<T>) {
        *lock(&self.transport) = transport;
    }

    pub fn own_id(&self) -> Option<ConversationId> {
        lock(&self.own_id).clone()
    }

    pub(crate) fn set_own_id(&self, id: Option<ConversationId>) {
        *lock(&self.own_id) = id;
    }

    pub fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *lock(&self.state) = state;
    }

    /// Messages older than this (epoch seconds) are treated as backlog
    pub fn started_at(&self) -> u64 {
        self.started_at.load(Ordering::SeqCst)
    }

    /// Move the session-start watermark forward to `at`.
    ///
    /// Never moves it backwards. Returns the resulting watermark.
    pub fn mark_started(&self, at: u64) -> u64 {
        let previous = self.started_at.fetch_max(at, Ordering::SeqCst);
        previous.max(at)
    }
}

// A panic in one consumer must not wedge the other, so poisoning is ignored.
fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
