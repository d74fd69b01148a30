use super::config::{default_config_path, Overrides, TetherConfig};
use super::logging;
use std::path::PathBuf;
use tether::session::{LoopbackConnector, SessionManager};
use tracing::{error, info};

/// Run the agent
///
/// Restores the saved session and answers trigger-tagged messages until
/// Ctrl-C. Steady-state failures (bad commands, dropped connections) are
/// logged and never end the process.
///
/// ## Configuration Loading
///
/// 1. `--config` flag if provided (must exist)
/// 2. Default config at `~/.local/share/tether/config.toml`
///
/// If the default config doesn't exist, a commented one is generated.
pub async fn execute(
    config_path: Option<String>,
    overrides: Overrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match config_path {
        Some(path) => TetherConfig::load(&PathBuf::from(path))?,
        None => {
            let path = default_config_path();
            if !path.exists() {
                let credential_path = TetherConfig::default().session.credential_path;
                TetherConfig::create_default(&path, &credential_path)?;
                println!("📝 Created default configuration: {}", path.display());
            }
            TetherConfig::load(&path)?
        }
    };
    config.apply(&overrides);
    logging::init(&config.logging.level);

    let settings = config.session_settings()?;
    let registry = config.registry()?;

    println!("🚀 Starting tether...");
    println!("Session file: {}", settings.credential_path.display());
    println!("Trigger tag: {}", settings.tag);
    if settings.test_mode {
        println!("Test mode: answering only in your own conversation");
    }
    println!();

    let manager = SessionManager::new(
        LoopbackConnector::new(&config.session.client_name),
        settings,
    );
    manager.init(config.connect_timeout()?).await?;
    manager.restore().await?;
    info!(commands = registry.commands().len(), "session restored");

    println!("✅ Connected. Press Ctrl-C to stop.");

    manager
        .run_until(registry, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for Ctrl-C: {}", e);
            }
        })
        .await?;

    println!("👋 Stopped");
    Ok(())
}
