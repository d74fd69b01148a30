//! Connection Manager
//!
//! Owns the transport handle and drives the session lifecycle:
//!
//! ```text
//! Uninitialized → Initialized → Authenticating → Connected → Terminated
//!                                     │               │
//!                                     └→ Disconnected ←┘ (failure / dropped link)
//! ```
//!
//! Every failing login/restore path disconnects the handle before the error
//! is returned. Cleanup failures are logged and never replace the original
//! error.

use super::context::{ConnectionState, Session, SessionSettings};
use super::credentials::{self, CredentialError};
use super::dispatcher::Dispatcher;
use super::pairing;
use super::reconnect::ReconnectPolicy;
use super::traits::*;
use crate::commands::CommandRegistry;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result type for session lifecycle operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Session lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to initialize connection: {0}")]
    Init(#[source] TransportError),

    #[error("session file {} already exists, please logout first", .0.display())]
    SessionAlreadyExists(PathBuf),

    #[error("session file {} doesn't exist, please login first", .0.display())]
    SessionNotFound(PathBuf),

    #[error("session file {} is not valid and was removed, please login again", .0.display())]
    SessionCorrupt(PathBuf),

    #[error("something went wrong while trying to ping, please check phone connectivity")]
    PingFailed,

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },
}

/// Connection manager for one account
pub struct SessionManager<C: Connector> {
    connector: C,
    session: Arc<Session<C::Transport>>,
}

impl<C: Connector> SessionManager<C> {
    pub fn new(connector: C, settings: SessionSettings) -> Self {
        Self {
            connector,
            session: Arc::new(Session::new(settings)),
        }
    }

    /// Shared session descriptor
    pub fn session(&self) -> Arc<Session<C::Transport>> {
        Arc::clone(&self.session)
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Create the transport handle.
    pub async fn init(&self, timeout: Duration) -> SessionResult<()> {
        self.expect_state("init", ConnectionState::Uninitialized)?;

        let transport = self
            .connector
            .connect(timeout)
            .await
            .map_err(SessionError::Init)?;
        info!(version = %transport.version(), "transport initialized");

        self.session.set_transport(Some(transport));
        self.session.set_state(ConnectionState::Initialized);
        Ok(())
    }

    /// Pair a new session, showing the pairing code through `display`.
    ///
    /// Refuses to run when a credential file already exists, without
    /// touching the transport.
    pub async fn login<F>(&self, display: F) -> SessionResult<()>
    where
        F: FnOnce(String) + Send,
    {
        self.expect_state("login", ConnectionState::Initialized)?;

        let path = &self.session.settings().credential_path;
        if credentials::exists(path) {
            return Err(SessionError::SessionAlreadyExists(path.clone()));
        }

        let transport = self.transport()?;
        self.session.set_state(ConnectionState::Authenticating);

        let result = async {
            let bundle = pairing::pair(&transport, display).await?;
            credentials::save(path, &bundle)?;
            info!(
                fingerprint = %bundle.fingerprint(),
                path = %path.display(),
                "paired, session saved"
            );
            check_alive(&transport).await
        }
        .await;

        self.settle(&transport, result).await
    }

    /// Resume the session stored in the credential file.
    pub async fn restore(&self) -> SessionResult<()> {
        self.expect_state("restore", ConnectionState::Initialized)?;

        let transport = self.transport()?;
        self.session.set_state(ConnectionState::Authenticating);

        let path = &self.session.settings().credential_path;
        if !credentials::exists(path) {
            self.release(&transport).await;
            return Err(SessionError::SessionNotFound(path.clone()));
        }

        let bundle = match credentials::load(path) {
            Ok(bundle) => bundle,
            Err(CredentialError::CorruptData(reason)) => {
                warn!(path = %path.display(), reason, "removing invalid session file");
                if let Err(e) = credentials::remove(path) {
                    warn!("failed to remove session file: {}", e);
                }
                self.release(&transport).await;
                return Err(SessionError::SessionCorrupt(path.clone()));
            }
            Err(CredentialError::NotFound(_)) => {
                self.release(&transport).await;
                return Err(SessionError::SessionNotFound(path.clone()));
            }
            Err(e) => {
                self.release(&transport).await;
                return Err(e.into());
            }
        };

        // Transport failures here may be transient, so the file is kept
        let result = async {
            let refreshed = transport.restore_with_bundle(bundle).await?;
            credentials::save(path, &refreshed)?;
            info!(fingerprint = %refreshed.fingerprint(), "session restored");
            check_alive(&transport).await
        }
        .await;

        self.settle(&transport, result).await
    }

    /// Revoke the session and delete the credential file.
    ///
    /// The handle is disconnected whether or not the logout succeeded.
    pub async fn logout(&self) -> SessionResult<()> {
        self.expect_state("logout", ConnectionState::Connected)?;
        let transport = self.transport()?;

        let result = match transport.logout().await {
            Ok(()) => {
                let path = &self.session.settings().credential_path;
                info!(path = %path.display(), "logged out, removing session file");
                credentials::remove(path).map_err(SessionError::from)
            }
            Err(e) => Err(e.into()),
        };

        self.release(&transport).await;
        self.terminate();
        result
    }

    /// Liveness check on a connected session
    pub async fn ping(&self) -> SessionResult<()> {
        self.expect_state("ping", ConnectionState::Connected)?;
        check_alive(&self.transport()?).await
    }

    /// Disconnect without logging out; the credential file stays valid.
    pub async fn close(&self) -> SessionResult<()> {
        if let Some(transport) = self.session.transport() {
            self.release(&transport).await;
        }
        self.terminate();
        Ok(())
    }

    /// Serve commands until `shutdown` resolves, then disconnect.
    ///
    /// Inbound messages and transport errors are consumed by two independent
    /// tasks; each handles its own stream strictly in arrival order.
    pub async fn run_until<S>(&self, registry: CommandRegistry, shutdown: S) -> SessionResult<()>
    where
        S: Future<Output = ()>,
    {
        self.expect_state("run", ConnectionState::Connected)?;
        let transport = self.transport()?;

        let TransportEvents {
            mut messages,
            mut errors,
        } = transport.take_events().ok_or_else(|| {
            TransportError::Protocol("event streams were already taken".to_string())
        })?;

        let dispatcher = Dispatcher::new(self.session(), Arc::new(registry));
        let message_task = tokio::spawn(async move {
            while let Some(message) = messages.recv().await {
                dispatcher.handle(message).await;
            }
            debug!("message stream closed");
        });

        let policy = ReconnectPolicy::new(self.session());
        let error_task = tokio::spawn(async move {
            while let Some(err) = errors.recv().await {
                let outcome = policy.handle(err).await;
                debug!(?outcome, "transport error handled");
            }
            debug!("error stream closed");
        });

        let settings = self.session.settings();
        info!(
            tag = %settings.tag,
            test_mode = settings.test_mode,
            own_id = ?self.session.own_id(),
            "listening for commands"
        );

        shutdown.await;
        info!("shutting down");

        message_task.abort();
        error_task.abort();
        let _ = message_task.await;
        let _ = error_task.await;

        self.release(&transport).await;
        self.terminate();
        Ok(())
    }

    fn expect_state(&self, operation: &'static str, expected: ConnectionState) -> SessionResult<()> {
        let state = self.session.state();
        if state != expected {
            return Err(SessionError::InvalidState { operation, state });
        }
        Ok(())
    }

    fn transport(&self) -> SessionResult<C::Transport> {
        self.session
            .transport()
            .ok_or(SessionError::Transport(TransportError::NotConnected))
    }

    /// Finish an authentication attempt: connected on success, released on failure
    async fn settle(&self, transport: &C::Transport, result: SessionResult<()>) -> SessionResult<()> {
        match result {
            Ok(()) => {
                self.session.set_own_id(transport.own_id());
                self.session.set_state(ConnectionState::Connected);
                Ok(())
            }
            Err(e) => {
                self.release(transport).await;
                Err(e)
            }
        }
    }

    /// Best-effort disconnect
    async fn release(&self, transport: &C::Transport) {
        if let Err(e) = transport.disconnect().await {
            warn!("disconnect failed: {}", e);
        }
        self.session.set_state(ConnectionState::Disconnected);
    }

    fn terminate(&self) {
        self.session.set_transport(None);
        self.session.set_own_id(None);
        self.session.set_state(ConnectionState::Terminated);
    }
}

async fn check_alive<T: Transport>(transport: &T) -> SessionResult<()> {
    if transport.admin_test().await? {
        Ok(())
    } else {
        Err(SessionError::PingFailed)
    }
}
