use super::config::{Overrides, TetherConfig};
use super::logging;
use tether::session::{LoopbackConnector, SessionManager};

/// Revoke the saved session and delete the session file
pub async fn execute(
    config_path: Option<String>,
    overrides: Overrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = TetherConfig::resolve(config_path.as_deref())?;
    config.apply(&overrides);
    logging::init(&config.logging.level);

    let settings = config.session_settings()?;
    let credential_path = settings.credential_path.clone();

    let manager = SessionManager::new(
        LoopbackConnector::new(&config.session.client_name),
        settings,
    );
    manager.init(config.connect_timeout()?).await?;
    manager.restore().await?;
    manager.logout().await?;

    println!("✅ Logged out");
    println!("   Removed {}", credential_path.display());
    Ok(())
}
