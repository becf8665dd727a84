use super::config::LotusConfig;
use super::open_session;
use lotus::codec::MessageContent;
use lotus::jid::resolve_recipient;
use lotus::socket::Event;
use lotus::MessageStatus;
use std::time::Duration;

/// How long to wait for the server receipt before returning
const ACK_WAIT: Duration = Duration::from_secs(10);

/// Send one text message
///
/// `to` may be a full identity or a phone number in any formatting. The
/// command resumes the stored session, sends, waits briefly for the server
/// receipt and disconnects.
pub async fn execute(
    config: &LotusConfig,
    to: &str,
    text: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let recipient = resolve_recipient(to)?;

    let session = open_session(config).await?;
    if session.me().await.is_none() {
        return Err("Not paired. Run `lotus pair` first.".into());
    }

    let mut events = session.subscribe();
    session.connect().await?;
    let message = session
        .send_to(recipient, MessageContent::Text(text.to_string()))
        .await?;
    println!("📤 Sent {} to {}", message.key.id, message.key.remote_jid);

    let acked = tokio::time::timeout(ACK_WAIT, async {
        while let Some(event) = events.recv().await {
            if let Event::MessagesUpdate(updates) = event {
                if let Some(update) = updates.iter().find(|u| u.key.id == message.key.id) {
                    return Some(update.status);
                }
            }
        }
        None
    })
    .await;

    match acked {
        Ok(Some(MessageStatus::Error)) => {
            session.end().await;
            return Err(format!("Message {} was rejected", message.key.id).into());
        }
        Ok(Some(status)) => println!("   Status: {}", status),
        _ => println!("   Status: {} (no receipt yet)", MessageStatus::Pending),
    }

    session.end().await;
    Ok(())
}
