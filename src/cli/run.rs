use super::config::LotusConfig;
use super::{open_session, Session};
use lotus::codec::MessageContent;
use lotus::socket::retry::RetryPolicy;
use lotus::socket::{ConnectionState, ConnectionUpdate, Event, Subscription, UpsertKind};
use lotus::{Message, SessionError};
use tracing::{info, warn};

/// Stay connected until Ctrl-C
///
/// Resumes the stored session and prints every incoming message and every
/// delivery status change. A connection lost to a transport failure or a
/// timeout is re-established with exponential backoff; a logout or a
/// rejected resume ends the command.
pub async fn execute(config: &LotusConfig, echo: bool) -> Result<(), Box<dyn std::error::Error>> {
    let session = open_session(config).await?;
    let Some(me) = session.me().await else {
        return Err("Not paired. Run `lotus pair` first.".into());
    };

    println!("🚀 Running as {} ({})", me.name, me.id);
    if echo {
        println!("   Echoing incoming text messages");
    }
    println!("   Press Ctrl-C to stop");
    println!();

    let policy = RetryPolicy::new(
        session.config().retry_request_delay,
        session.config().max_retries,
    );
    let mut events = session.subscribe();

    let result = tokio::select! {
        result = serve(&session, &mut events, policy, echo) => result,
        _ = tokio::signal::ctrl_c() => {
            println!();
            println!("Stopping...");
            Ok(())
        }
    };

    session.end().await;
    result
}

async fn serve(
    session: &Session,
    events: &mut Subscription,
    policy: RetryPolicy,
    echo: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut attempt = 0;
    loop {
        // Updates from an earlier connection are stale now
        events.drain();

        match session.connect().await {
            Ok(_) => {
                info!("session open");
                attempt = 0;
            }
            Err(e) if should_reconnect(&e) && attempt < policy.max_retries => {
                let delay = policy.backoff(attempt);
                attempt += 1;
                warn!(error = %e, attempt, delay_ms = delay.as_millis() as u64, "connect failed, retrying");
                tokio::time::sleep(delay).await;
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        match pump(session, events, echo).await {
            Some(e) if should_reconnect(&e) => {
                warn!(error = %e, "connection lost, reconnecting");
            }
            Some(e) => return Err(e.into()),
            None => return Ok(()),
        }
    }
}

/// Whether a close reason is worth a new connection attempt
fn should_reconnect(err: &SessionError) -> bool {
    matches!(err, SessionError::Transport(_) | SessionError::ConnectTimeout)
}

/// Print events until the connection closes; returns the close reason
async fn pump(session: &Session, events: &mut Subscription, echo: bool) -> Option<SessionError> {
    while let Some(event) = events.recv().await {
        match event {
            Event::ConnectionUpdate(ConnectionUpdate {
                connection: Some(ConnectionState::Closed),
                last_disconnect,
                ..
            }) => return last_disconnect.and_then(|d| d.error),
            Event::MessagesUpsert {
                messages,
                kind: UpsertKind::Notify,
            } => {
                for message in messages {
                    println!("📩 {}", describe_incoming(&message));
                    if echo {
                        echo_back(session, &message).await;
                    }
                }
            }
            Event::MessagesUpdate(updates) => {
                for update in updates {
                    println!("   {} → {}", update.key.id, update.status);
                }
            }
            Event::CredsUpdate(update) if update.me.is_none() => {
                println!("👋 Logged out");
            }
            _ => {}
        }
    }
    None
}

fn describe_incoming(message: &Message) -> String {
    let from = message
        .key
        .participant
        .as_ref()
        .unwrap_or(&message.key.remote_jid);
    match message.content.text() {
        Some(text) => format!("{}: {}", from, text),
        None => format!("{}: [{}]", from, message.content.kind()),
    }
}

async fn echo_back(session: &Session, message: &Message) {
    if message.key.from_me {
        return;
    }
    let Some(text) = message.content.text() else {
        return;
    };
    let reply = MessageContent::Text(text.to_string());
    if let Err(e) = session.send_to(message.key.remote_jid.clone(), reply).await {
        warn!(to = %message.key.remote_jid, error = %e, "echo failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotus::codec::build_payload;
    use lotus::message::{MessageKey, MessageStatus};

    fn incoming(content: MessageContent) -> Message {
        Message {
            key: MessageKey {
                remote_jid: "120363000000000000@g.us".parse().unwrap(),
                from_me: false,
                id: "3EB0AAAAAAAAAAAAAAAA".into(),
                participant: Some("15550100001@s.whatsapp.net".parse().unwrap()),
            },
            content: build_payload(content).unwrap(),
            timestamp: 1_700_000_000,
            status: MessageStatus::ServerAck,
        }
    }

    #[test]
    fn test_should_reconnect() {
        assert!(should_reconnect(&SessionError::Transport("reset".into())));
        assert!(should_reconnect(&SessionError::ConnectTimeout));
        assert!(!should_reconnect(&SessionError::ConnectionClosed));
        assert!(!should_reconnect(&SessionError::NotConnected));
    }

    #[test]
    fn test_describe_incoming_prefers_participant() {
        let message = incoming(MessageContent::Text("hi".into()));
        assert_eq!(
            describe_incoming(&message),
            "15550100001@s.whatsapp.net: hi"
        );
    }

    #[test]
    fn test_describe_incoming_without_text() {
        let message = incoming(MessageContent::Location {
            latitude: 52.37,
            longitude: 4.89,
            name: None,
            address: None,
        });
        assert_eq!(
            describe_incoming(&message),
            "15550100001@s.whatsapp.net: [locationMessage]"
        );
    }
}
