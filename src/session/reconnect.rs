//! Reconnect policy for transport errors.
//!
//! - `ConnectionFailed`: if a credential file exists and a handle is held,
//!   move the session-start watermark to now, wait the configured delay, and
//!   restore the connection in place. One attempt per error event, no
//!   backoff. A failed attempt is logged and the session stays disconnected
//!   until the next error event.
//!   Events arriving while the session is not live (still authenticating, or
//!   already terminated) are skipped.
//! - `RemoteClosed`: normal shutdown from the remote side, ignored silently.
//! - Anything else: logged, no action.

use super::context::{now_secs, ConnectionState, Session};
use super::credentials;
use super::traits::*;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// What the policy did with an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// Restore succeeded
    Reconnected,
    /// Restore was attempted and failed
    Failed(TransportError),
    /// Nothing to reconnect with (no credential file or no handle)
    Abandoned,
    /// Session was neither connected nor disconnected
    Inactive,
    Ignored,
    Logged,
}

pub struct ReconnectPolicy<T: Transport> {
    session: Arc<Session<T>>,
}

impl<T: Transport> ReconnectPolicy<T> {
    pub fn new(session: Arc<Session<T>>) -> Self {
        Self { session }
    }

    /// React to one error from the transport's error stream.
    pub async fn handle(&self, err: TransportError) -> ReconnectOutcome {
        match err {
            TransportError::ConnectionFailed(reason) => self.reconnect(&reason).await,
            TransportError::RemoteClosed(_) => ReconnectOutcome::Ignored,
            other => {
                error!("transport error: {}", other);
                ReconnectOutcome::Logged
            }
        }
    }

    async fn reconnect(&self, reason: &str) -> ReconnectOutcome {
        let state = self.session.state();
        if !matches!(
            state,
            ConnectionState::Connected | ConnectionState::Disconnected
        ) {
            warn!(reason, %state, "connection failure outside a live session, skipping");
            return ReconnectOutcome::Inactive;
        }
        self.session.set_state(ConnectionState::Disconnected);

        let settings = self.session.settings();
        let transport = match self.session.transport() {
            Some(transport) if credentials::exists(&settings.credential_path) => transport,
            _ => {
                error!(reason, "connection closed unexpectedly");
                return ReconnectOutcome::Abandoned;
            }
        };

        warn!(
            reason,
            delay = ?settings.reconnect_delay,
            "connection closed unexpectedly, reconnecting"
        );

        self.session.mark_started(now_secs());
        sleep(settings.reconnect_delay).await;

        match transport.restore().await {
            Ok(()) => {
                self.session.set_state(ConnectionState::Connected);
                info!("reconnected");
                ReconnectOutcome::Reconnected
            }
            Err(e) => {
                error!("reconnect failed: {}", e);
                ReconnectOutcome::Failed(e)
            }
        }
    }
}
