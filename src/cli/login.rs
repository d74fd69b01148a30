use super::config::{Overrides, TetherConfig};
use super::logging;
use tether::session::pairing::render_pairing_code;
use tether::session::{LoopbackConnector, SessionManager};

/// Pair a new session
///
/// Refuses to run if the session file already exists, so a live session is
/// never overwritten. After pairing, the connection is closed and the session
/// file is left for `tether daemon` to restore.
pub async fn execute(
    config_path: Option<String>,
    overrides: Overrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = TetherConfig::resolve(config_path.as_deref())?;
    config.apply(&overrides);
    logging::init(&config.logging.level);

    let settings = config.session_settings()?;
    let credential_path = settings.credential_path.clone();

    println!("🔗 Pairing new session...");
    println!("Session file: {}", credential_path.display());
    println!();

    let manager = SessionManager::new(
        LoopbackConnector::new(&config.session.client_name),
        settings,
    );
    manager.init(config.connect_timeout()?).await?;
    manager.login(|code| render_pairing_code(&code)).await?;

    println!();
    println!("✅ Paired successfully!");
    if let Some(own_id) = manager.session().own_id() {
        println!("   Account: {}", own_id);
    }
    println!("   Session saved to {}", credential_path.display());
    println!();
    println!("Start answering commands with: tether daemon");

    manager.close().await?;
    Ok(())
}
