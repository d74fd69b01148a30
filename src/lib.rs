//! Tether - chat session relay agent
//!
//! Keeps one account's chat session alive and turns trigger-tagged messages
//! into command executions whose output is sent back to the conversation.
//!
//! Key principles:
//! - One session per process, owned by `SessionManager`
//! - Credential bundle is the only durable state
//! - Steady-state failures degrade to logs, never to process exit

pub mod commands;
pub mod serialization;
pub mod session;
