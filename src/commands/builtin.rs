//! Built-in commands

use super::{usage, Action, CommandError, CommandSpec, Execution};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Help,
    Ping,
    Echo,
    Time,
    Version,
}

impl Builtin {
    pub const ALL: [Builtin; 5] = [
        Builtin::Help,
        Builtin::Ping,
        Builtin::Echo,
        Builtin::Time,
        Builtin::Version,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Help => "help",
            Builtin::Ping => "ping",
            Builtin::Echo => "echo",
            Builtin::Time => "time",
            Builtin::Version => "version",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Builtin::Help => "Show this list",
            Builtin::Ping => "Check that I'm alive",
            Builtin::Echo => "Repeat the given text",
            Builtin::Time => "Current time on the host (UTC)",
            Builtin::Version => "Agent version",
        }
    }

    pub fn spec(&self) -> CommandSpec {
        CommandSpec::new(self.name(), self.description(), Action::Builtin(*self))
    }

    /// `siblings` is the command table this builtin was resolved from
    pub(crate) fn run(&self, siblings: &[CommandSpec], args: &[String]) -> Execution {
        match self {
            Builtin::Help => Execution::line(usage(siblings)),
            Builtin::Ping => Execution::line("pong"),
            Builtin::Echo => {
                if args.is_empty() {
                    return Execution::failed(
                        vec![],
                        CommandError::InvalidArguments("echo needs some text".to_string()),
                    );
                }
                Execution::line(args.join(" "))
            }
            Builtin::Time => {
                Execution::line(humantime::format_rfc3339_seconds(SystemTime::now()).to_string())
            }
            Builtin::Version => Execution::line(format!("tether {}", env!("CARGO_PKG_VERSION"))),
        }
    }
}
