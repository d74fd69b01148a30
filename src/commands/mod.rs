//! Command registry and executor
//!
//! Maps a verb and its arguments to reply lines. Commands are either
//! built in, operator-configured shell programs, or groups of nested
//! subcommands:
//!
//! - `help` → list of commands
//! - `disk usage /var` → group `disk`, subcommand `usage`, args `["/var"]`

pub mod builtin;
pub mod shell;

pub use builtin::Builtin;
pub use shell::ShellCommand;

use futures::future::{BoxFuture, FutureExt};
use std::time::Duration;

/// What a command does when invoked
#[derive(Debug, Clone)]
pub enum Action {
    Builtin(Builtin),
    Shell(ShellCommand),
    /// Dispatches to one of its subcommands
    Group(Vec<CommandSpec>),
}

/// Named command
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    pub action: Action,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into().to_lowercase(),
            description: description.into(),
            action,
        }
    }
}

/// Command execution errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("no command given")]
    Missing,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("command exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("command timed out after {0:?}")]
    TimedOut(Duration),

    #[error("failed to start command: {0}")]
    Spawn(String),

    #[error("duplicate command name: {0}")]
    Duplicate(String),
}

/// Reply lines produced by a command, plus the error if it failed.
///
/// A failed command may still have produced output worth sending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    pub lines: Vec<String>,
    pub error: Option<CommandError>,
}

impl Execution {
    pub fn ok(lines: Vec<String>) -> Self {
        Self { lines, error: None }
    }

    pub fn line(line: impl Into<String>) -> Self {
        Self::ok(vec![line.into()])
    }

    pub fn failed(lines: Vec<String>, error: CommandError) -> Self {
        Self {
            lines,
            error: Some(error),
        }
    }
}

/// Top-level command table
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: Vec<CommandSpec>,
}

impl CommandRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every built-in command
    pub fn with_builtins() -> Self {
        Self {
            commands: Builtin::ALL.iter().map(|b| b.spec()).collect(),
        }
    }

    /// Add a command. Names are unique, case-insensitively.
    pub fn register(&mut self, spec: CommandSpec) -> Result<(), CommandError> {
        if self.commands.iter().any(|c| c.name == spec.name) {
            return Err(CommandError::Duplicate(spec.name));
        }
        self.commands.push(spec);
        Ok(())
    }

    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }
}

/// Execute `args[offset..]` against `registry`.
pub async fn execute(registry: &CommandRegistry, args: &[String], offset: usize) -> Execution {
    resolve(&registry.commands, args, offset).await
}

fn resolve<'a>(
    commands: &'a [CommandSpec],
    args: &'a [String],
    offset: usize,
) -> BoxFuture<'a, Execution> {
    async move {
        let Some(verb) = args.get(offset).map(|a| a.to_lowercase()) else {
            return Execution::failed(vec![usage(commands)], CommandError::Missing);
        };

        let Some(spec) = commands.iter().find(|c| c.name == verb) else {
            return Execution::failed(
                vec![format!("Unknown command '{}'. Send 'help' to see what I can do.", verb)],
                CommandError::Unknown(verb),
            );
        };

        let rest = &args[offset + 1..];
        match &spec.action {
            Action::Builtin(builtin) => builtin.run(commands, rest),
            Action::Shell(shell) => shell.run(rest).await,
            Action::Group(subcommands) if rest.is_empty() => Execution::line(usage(subcommands)),
            Action::Group(subcommands) => resolve(subcommands, args, offset + 1).await,
        }
    }
    .boxed()
}

/// One-line-per-command listing
pub(crate) fn usage(commands: &[CommandSpec]) -> String {
    let mut text = String::from("Available commands:");
    for command in commands {
        text.push_str(&format!("\n• {} - {}", command.name, command.description));
    }
    text
}
