//! Chat Session Module
//!
//! Keeps one paired chat session alive:
//! - Credential bundle persisted to a single file, nothing else on disk
//! - Connection lifecycle driven by `SessionManager`
//! - Inbound commands dispatched, transport errors fed to the reconnect policy

pub mod context;
pub mod credentials;
pub mod dispatcher;
pub mod loopback;
pub mod manager;
pub mod mock;
pub mod pairing;
pub mod reconnect;
pub mod traits;

pub use context::{ConnectionState, Session, SessionSettings};
pub use credentials::CredentialError;
pub use dispatcher::Dispatcher;
pub use loopback::{LoopbackConnector, LoopbackTransport};
pub use manager::{SessionError, SessionManager, SessionResult};
pub use mock::{MockConnector, MockTransport};
pub use reconnect::{ReconnectOutcome, ReconnectPolicy};
pub use traits::{
    Connector, ConversationId, CredentialBundle, InboundMessage, OutboundReply, Transport,
    TransportError, TransportResult,
};
