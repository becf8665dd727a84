use super::config::LotusConfig;
use super::open_session;
use tracing::warn;

/// Unpair this device
///
/// Connects when possible so the server learns about the logout, then
/// forgets the stored identity. Without connectivity the local credentials
/// are still cleared.
pub async fn execute(config: &LotusConfig) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(config).await?;
    let Some(me) = session.me().await else {
        println!("Not paired, nothing to do.");
        return Ok(());
    };

    if let Err(e) = session.connect().await {
        warn!(error = %e, "logging out offline");
    }
    session.logout().await;

    println!("👋 Logged out {} ({})", me.name, me.id);
    Ok(())
}
