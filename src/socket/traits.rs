//! Transport Channel Abstraction
//!
//! The session never touches sockets directly. It drives a
//! [`TransportChannel`], which stands in for the wire encoding and encryption
//! layer, and consumes what the channel observes as a [`TransportEvents`]
//! stream. Tests plug in `MockTransport`; the binary uses `WebSocketTransport`.

use super::frame::Frame;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("transport is not writable")]
    NotWritable,

    #[error("transport is closed")]
    Closed,
}

/// Something the channel observed on the wire
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The channel is open and writable
    Opened,
    /// A decoded inbound frame
    Frame(Frame),
    /// The channel failed; no further events follow
    Error(String),
    /// The remote end closed; no further events follow
    Closed,
}

/// Inbound event stream for one connection
pub struct TransportEvents {
    receiver: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TransportEvents {
    /// Create a connected stream/sender pair
    pub fn channel() -> (Self, TransportEventSender) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { receiver }, TransportEventSender { sender })
    }
}

impl Stream for TransportEvents {
    type Item = TransportEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Producer side of [`TransportEvents`], held by the transport
#[derive(Clone)]
pub struct TransportEventSender {
    sender: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportEventSender {
    /// Push an event; returns `false` once the consumer is gone
    pub fn send(&self, event: TransportEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Bidirectional frame channel to the remote endpoint
#[async_trait]
pub trait TransportChannel: Send + Sync + 'static {
    /// Open a connection; `Opened` arrives on the returned stream once the
    /// channel is usable
    async fn connect(&self) -> TransportResult<TransportEvents>;

    /// Hand one frame to the channel
    async fn send(&self, frame: &Frame) -> TransportResult<()>;

    /// Close the current connection, if any
    async fn close(&self);

    /// Whether a `send` right now would be accepted
    fn is_writable(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (mut events, sender) = TransportEvents::channel();

        assert!(sender.send(TransportEvent::Opened));
        assert!(sender.send(TransportEvent::Frame(Frame::ResumeSuccess)));
        assert!(sender.send(TransportEvent::Closed));
        drop(sender);

        assert_eq!(events.next().await, Some(TransportEvent::Opened));
        assert_eq!(
            events.next().await,
            Some(TransportEvent::Frame(Frame::ResumeSuccess))
        );
        assert_eq!(events.next().await, Some(TransportEvent::Closed));
        assert_eq!(events.next().await, None);
    }

    #[tokio::test]
    async fn test_sender_reports_dropped_consumer() {
        let (events, sender) = TransportEvents::channel();
        drop(events);

        assert!(sender.is_closed());
        assert!(!sender.send(TransportEvent::Opened));
    }
}
