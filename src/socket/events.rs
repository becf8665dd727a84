//! Event Bus
//!
//! Ordered fan-out of session notifications. Every subscriber owns an
//! unbounded queue, so a slow consumer never blocks the session and never
//! observes events out of emission order. Subscribers whose receiver was
//! dropped are pruned on the next emit.

use super::pairing::{ConnectionState, LastDisconnect};
use crate::auth::CredentialsUpdate;
use crate::message::{Message, MessageKey, MessageStatus};
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt as _;

/// `connection.update`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectionUpdate {
    pub connection: Option<ConnectionState>,
    pub last_disconnect: Option<LastDisconnect>,
    /// Pairing code to render
    pub qr: Option<String>,
}

/// `messages.upsert` type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    /// New inbound message
    Notify,
    /// Message this session sent
    Append,
}

/// One entry of `messages.update`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageUpdate {
    pub key: MessageKey,
    pub status: MessageStatus,
}

/// Session notification
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ConnectionUpdate(ConnectionUpdate),
    CredsUpdate(CredentialsUpdate),
    MessagesUpsert {
        messages: Vec<Message>,
        kind: UpsertKind,
    },
    MessagesUpdate(Vec<MessageUpdate>),
}

impl Event {
    /// Event name as seen by callers
    pub fn name(&self) -> &'static str {
        match self {
            Event::ConnectionUpdate(_) => "connection.update",
            Event::CredsUpdate(_) => "creds.update",
            Event::MessagesUpsert { .. } => "messages.upsert",
            Event::MessagesUpdate(_) => "messages.update",
        }
    }
}

type SubscriberMap = HashMap<u64, UnboundedSender<Event>>;

/// Publish/subscribe hub owned by one session
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<SubscriberMap>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber; it sees every event emitted from now on
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = unbounded_channel();
        self.lock().insert(id, tx);
        Subscription {
            id,
            inner: UnboundedReceiverStream::new(rx),
        }
    }

    /// Stop delivering to a subscriber. Events already queued remain readable.
    pub fn unsubscribe(&self, id: u64) {
        self.lock().remove(&id);
    }

    /// Deliver an event to every live subscriber
    pub fn emit(&self, event: Event) {
        let mut subscribers = self.lock();
        subscribers.retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SubscriberMap> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Receiving end of one subscription
pub struct Subscription {
    id: u64,
    inner: UnboundedReceiverStream<Event>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event, or `None` once the bus is gone or unsubscribed and drained
    pub async fn recv(&mut self) -> Option<Event> {
        self.inner.next().await
    }

    /// Events already queued, without waiting
    pub fn drain(&mut self) -> Vec<Event> {
        let receiver: &mut UnboundedReceiver<Event> = self.inner.as_mut();
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Stream for Subscription {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
