//! Pairing-code handoff
//!
//! Pairs a new session via a scannable code. The transport emits the code on
//! a oneshot channel once the service issues it; a display future waits on
//! the other end and renders it while `login` keeps waiting for the scan.
//!
//! # Flow
//! 1. Create oneshot channel for the pairing code
//! 2. Run `Transport::login` and the display future concurrently
//! 3. Display renders the code when it arrives
//! 4. Login resolves with the credential bundle after the scan

use super::traits::*;
use futures::channel::oneshot;
use tracing::debug;

/// Run the pairing handshake, handing the code to `display`.
///
/// `display` is called at most once, and only after the transport produced
/// a code. If login fails before a code is issued it is never called.
pub async fn pair<T, F>(transport: &T, display: F) -> TransportResult<CredentialBundle>
where
    T: Transport,
    F: FnOnce(String) + Send,
{
    let (code_tx, code_rx) = oneshot::channel();

    let (result, ()) = tokio::join!(
        // Login task: blocks until the code has been scanned
        transport.login(code_tx),
        // Display task: waits for the code and renders it
        async {
            match code_rx.await {
                Ok(code) => display(code),
                Err(_) => debug!("pairing cancelled before a code was issued"),
            }
        },
    );

    result
}

/// Render a pairing code on the terminal as a QR code.
pub fn render_pairing_code(code: &str) {
    println!("📱 Please scan this code with the app on your phone:");
    println!("   Settings → Linked Devices → Link a Device");
    println!();

    if let Err(e) = qr2term::print_qr(code) {
        eprintln!("⚠️  Failed to render QR code: {}", e);
    }

    println!();
    println!("Or enter this code: {}", code);
    println!();
    println!("⏳ Waiting for you to scan the code...");
}
