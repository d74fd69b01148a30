use clap::{Args, Parser, Subcommand};

pub mod config;
pub mod daemon;
pub mod logging;
pub mod login;
pub mod logout;
pub mod version;

use config::Overrides;

#[derive(Parser)]
#[command(name = "tether")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Chat session relay agent", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that opens a session
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Path to config file (default: ~/.local/share/tether/config.toml)
    #[arg(long)]
    pub config: Option<String>,

    /// Path to the session file (overrides config)
    #[arg(long)]
    pub session_file: Option<String>,

    /// Connection timeout, e.g. "30s" (overrides config)
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pair a new session by scanning a code with your phone
    Login {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Restore the saved session and answer commands until interrupted
    #[command(alias = "run")]
    Daemon {
        #[command(flatten)]
        session: SessionArgs,

        /// Token a message must start with to be treated as a command
        #[arg(long)]
        tag: Option<String>,

        /// Only answer in your own conversation
        #[arg(long)]
        test: bool,

        /// Delay before restoring a dropped connection, e.g. "10s"
        #[arg(long)]
        reconnect: Option<String>,
    },

    /// Revoke the saved session and delete the session file
    Logout {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Display version information
    Version,
}

impl SessionArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            session_file: self.session_file.clone(),
            timeout: self.timeout.clone(),
            ..Overrides::default()
        }
    }
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Login { session } => {
            let overrides = session.overrides();
            login::execute(session.config, overrides).await
        }
        Commands::Daemon {
            session,
            tag,
            test,
            reconnect,
        } => {
            let overrides = Overrides {
                tag,
                test_mode: test,
                reconnect,
                ..session.overrides()
            };
            daemon::execute(session.config, overrides).await
        }
        Commands::Logout { session } => {
            let overrides = session.overrides();
            logout::execute(session.config, overrides).await
        }
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_login() {
        let cli = Cli::parse_from(["tether", "login", "--session-file", "/tmp/s.cbor"]);

        match cli.command {
            Commands::Login { session } => {
                assert_eq!(session.session_file, Some("/tmp/s.cbor".to_string()));
                assert_eq!(session.config, None);
                assert_eq!(session.timeout, None);
            }
            _ => panic!("Expected Login command"),
        }
    }

    #[test]
    fn test_cli_parse_daemon_defaults() {
        let cli = Cli::parse_from(["tether", "daemon"]);

        match cli.command {
            Commands::Daemon {
                session,
                tag,
                test,
                reconnect,
            } => {
                assert_eq!(session.config, None);
                assert_eq!(tag, None);
                assert!(!test);
                assert_eq!(reconnect, None);
            }
            _ => panic!("Expected Daemon command"),
        }
    }

    #[test]
    fn test_cli_parse_run_alias_with_all_options() {
        let cli = Cli::parse_from([
            "tether",
            "run",
            "--config",
            "/etc/tether/config.toml",
            "--session-file",
            "/var/lib/tether/session.cbor",
            "--timeout",
            "45s",
            "--tag",
            "!ops",
            "--test",
            "--reconnect",
            "3s",
        ]);

        match cli.command {
            Commands::Daemon {
                session,
                tag,
                test,
                reconnect,
            } => {
                assert_eq!(session.config, Some("/etc/tether/config.toml".to_string()));
                assert_eq!(
                    session.session_file,
                    Some("/var/lib/tether/session.cbor".to_string())
                );
                assert_eq!(session.timeout, Some("45s".to_string()));
                assert_eq!(tag, Some("!ops".to_string()));
                assert!(test);
                assert_eq!(reconnect, Some("3s".to_string()));
            }
            _ => panic!("Expected Daemon command"),
        }
    }

    #[test]
    fn test_cli_parse_logout() {
        let cli = Cli::parse_from(["tether", "logout"]);
        assert!(matches!(cli.command, Commands::Logout { .. }));
    }

    #[test]
    fn test_cli_parse_version() {
        let cli = Cli::parse_from(["tether", "version"]);
        assert!(matches!(cli.command, Commands::Version));
    }

    #[test]
    fn test_daemon_only_flags_rejected_elsewhere() {
        assert!(Cli::try_parse_from(["tether", "login", "--tag", "!ops"]).is_err());
        assert!(Cli::try_parse_from(["tether", "logout", "--test"]).is_err());
    }

    #[test]
    fn test_session_args_overrides() {
        let args = SessionArgs {
            config: None,
            session_file: Some("/tmp/s.cbor".to_string()),
            timeout: Some("5s".to_string()),
        };

        let overrides = args.overrides();
        assert_eq!(overrides.session_file, Some("/tmp/s.cbor".to_string()));
        assert_eq!(overrides.timeout, Some("5s".to_string()));
        assert!(overrides.tag.is_none());
        assert!(!overrides.test_mode);
    }
}
