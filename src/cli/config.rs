//! Tether configuration file handling
//!
//! Provides default configuration generation and loading for the agent.
//! Configuration files are TOML and live next to the session file under the
//! platform data directory.
//!
//! Durations are humantime strings ("10s", "1m 30s").

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tether::commands::{Action, CommandRegistry, CommandSpec, ShellCommand};
use tether::session::SessionSettings;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_TAG: &str = "!bot";
const DEFAULT_RECONNECT_DELAY: &str = "10s";
const DEFAULT_CONNECT_TIMEOUT: &str = "30s";
const DEFAULT_COMMAND_TIMEOUT: &str = "30s";
const DEFAULT_CLIENT_NAME: &str = "Tether";

/// Tether configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TetherConfig {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Operator-defined commands, registered after the built-ins
    #[serde(default)]
    pub commands: Vec<CommandConfig>,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Path to the credential bundle written on login
    #[serde(default = "default_credential_path")]
    pub credential_path: PathBuf,

    /// Token a message must start with to be treated as a command
    #[serde(default = "default_tag")]
    pub tag: String,

    /// Only answer in the operator's own conversation
    #[serde(default)]
    pub test_mode: bool,

    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: String,

    /// Name shown in the phone's linked devices list
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// One `[[commands]]` entry: a shell program, or a group of subcommands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub program: Option<String>,

    /// Fixed leading arguments; arguments from the chat message follow them
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "default_command_timeout")]
    pub timeout: String,

    #[serde(default)]
    pub subcommands: Vec<CommandConfig>,
}

/// Values given on the command line, taking precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub session_file: Option<String>,
    pub tag: Option<String>,
    pub test_mode: bool,
    pub reconnect: Option<String>,
    pub timeout: Option<String>,
}

fn default_credential_path() -> PathBuf {
    data_dir().join("session.cbor")
}

fn default_tag() -> String {
    DEFAULT_TAG.to_string()
}

fn default_reconnect_delay() -> String {
    DEFAULT_RECONNECT_DELAY.to_string()
}

fn default_connect_timeout() -> String {
    DEFAULT_CONNECT_TIMEOUT.to_string()
}

fn default_command_timeout() -> String {
    DEFAULT_COMMAND_TIMEOUT.to_string()
}

fn default_client_name() -> String {
    DEFAULT_CLIENT_NAME.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credential_path: default_credential_path(),
            tag: default_tag(),
            test_mode: false,
            reconnect_delay: default_reconnect_delay(),
            connect_timeout: default_connect_timeout(),
            client_name: default_client_name(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TetherConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: TetherConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        Ok(config)
    }

    /// Load `path` if given, else the default file if present, else defaults.
    ///
    /// An explicitly named file must exist.
    pub fn resolve(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        match path {
            Some(path) => Self::load(Path::new(path)),
            None => {
                let default = default_config_path();
                if default.exists() {
                    Self::load(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Fold command-line values into the file values
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(path) = &overrides.session_file {
            self.session.credential_path = PathBuf::from(path);
        }
        if let Some(tag) = &overrides.tag {
            self.session.tag = tag.clone();
        }
        if overrides.test_mode {
            self.session.test_mode = true;
        }
        if let Some(delay) = &overrides.reconnect {
            self.session.reconnect_delay = delay.clone();
        }
        if let Some(timeout) = &overrides.timeout {
            self.session.connect_timeout = timeout.clone();
        }
    }

    pub fn connect_timeout(&self) -> Result<Duration, Box<dyn std::error::Error>> {
        parse_duration("connect_timeout", &self.session.connect_timeout)
    }

    /// Settings handed to the session manager
    pub fn session_settings(&self) -> Result<SessionSettings, Box<dyn std::error::Error>> {
        let mut settings = SessionSettings::new(&self.session.credential_path, &self.session.tag);
        settings.test_mode = self.session.test_mode;
        settings.reconnect_delay =
            parse_duration("reconnect_delay", &self.session.reconnect_delay)?;
        Ok(settings)
    }

    /// Built-in commands plus every configured `[[commands]]` entry
    pub fn registry(&self) -> Result<CommandRegistry, Box<dyn std::error::Error>> {
        let mut registry = CommandRegistry::with_builtins();
        for command in &self.commands {
            registry
                .register(command.to_spec()?)
                .map_err(|e| format!("Invalid command '{}': {}", command.name, e))?;
        }
        Ok(registry)
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml(credential_path: &Path) -> String {
        format!(
            r#"# Tether Configuration
#
# Command-line flags (--session-file, --tag, --test, --reconnect, --timeout)
# take precedence over the values below.

[session]
# Credential bundle written by `tether login` and removed by `tether logout`
credential_path = {credential_path}

# Messages must start with this token to be treated as a command
tag = "{tag}"

# Only answer in your own conversation
test_mode = false

# Wait before restoring a dropped connection
reconnect_delay = "{reconnect}"

# Connection timeout for the chat service
connect_timeout = "{timeout}"

# Name shown in the phone's linked devices list
client_name = "{client_name}"

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG takes precedence)
level = "info"

# Shell commands, run without a shell. Arguments from the message are
# appended to `args`.
#
# [[commands]]
# name = "uptime"
# description = "Show host uptime"
# program = "uptime"
# timeout = "10s"
#
# Groups nest subcommands:
#
# [[commands]]
# name = "disk"
# description = "Disk usage"
#
# [[commands.subcommands]]
# name = "root"
# description = "Usage of /"
# program = "df"
# args = ["-h", "/"]
"#,
            credential_path = toml::Value::String(credential_path.display().to_string()),
            tag = DEFAULT_TAG,
            reconnect = DEFAULT_RECONNECT_DELAY,
            timeout = DEFAULT_CONNECT_TIMEOUT,
            client_name = DEFAULT_CLIENT_NAME,
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(
        config_path: &Path,
        credential_path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let contents = Self::generate_default_toml(credential_path);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(config_path, contents).map_err(|e| {
            format!(
                "Failed to write config file '{}': {}",
                config_path.display(),
                e
            )
        })?;

        Ok(())
    }
}

impl CommandConfig {
    fn to_spec(&self) -> Result<CommandSpec, Box<dyn std::error::Error>> {
        let action = match (&self.program, self.subcommands.is_empty()) {
            (Some(_), false) => {
                return Err(format!(
                    "command '{}' sets both program and subcommands",
                    self.name
                )
                .into())
            }
            (None, true) => {
                return Err(format!("command '{}' needs a program or subcommands", self.name).into())
            }
            (None, false) => Action::Group(
                self.subcommands
                    .iter()
                    .map(CommandConfig::to_spec)
                    .collect::<Result<_, _>>()?,
            ),
            (Some(program), true) => Action::Shell(ShellCommand::new(
                program.clone(),
                self.args.clone(),
                parse_duration("timeout", &self.timeout)?,
            )),
        };

        Ok(CommandSpec::new(&self.name, &self.description, action))
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    humantime::parse_duration(value)
        .map_err(|e| format!("Invalid {} '{}': {}", field, value, e).into())
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tether")
}

/// Default config file location
pub fn default_config_path() -> PathBuf {
    data_dir().join("config.toml")
}
