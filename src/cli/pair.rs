use super::config::LotusConfig;
use super::open_session;
use lotus::socket::{ConnectionUpdate, Event};
use std::time::Duration;
use tracing::warn;

/// Pair this device
///
/// Connects without credentials, renders the pairing code as a QR code in
/// the terminal and waits until the phone app scans it. On success the
/// identity is written to the auth folder and later commands resume from it.
pub async fn execute(
    config: &LotusConfig,
    timeout_secs: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = config.clone();
    // Scanning by hand takes longer than a resume
    config.connection.connect_timeout_ms = timeout_secs.saturating_mul(1000);

    let session = open_session(&config).await?;
    if let Some(me) = session.me().await {
        println!("Already paired as {} ({})", me.name, me.id);
        println!("Run `lotus logout` first to pair again.");
        return Ok(());
    }

    println!("📱 Open the app on your phone, go to Linked Devices and scan:");
    println!();

    let mut events = session.subscribe();
    let renderer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Event::ConnectionUpdate(ConnectionUpdate { qr: Some(code), .. }) = event {
                render_qr(&code);
            }
        }
    });

    let result = session.connect().await;
    renderer.abort();

    let me = result.map_err(|e| {
        if matches!(e, lotus::SessionError::ConnectTimeout) {
            format!(
                "QR code was not scanned within {:?}",
                Duration::from_secs(timeout_secs)
            )
        } else {
            format!("Pairing failed: {}", e)
        }
    })?;

    println!();
    println!("✅ Paired as {} ({})", me.name, me.id);
    println!("   Credentials: {}", config.auth.folder.display());
    session.end().await;
    Ok(())
}

fn render_qr(code: &str) {
    if let Err(e) = qr2term::print_qr(code) {
        warn!(error = %e, "could not render QR code, printing it raw");
        println!("{}", code);
    }
}
