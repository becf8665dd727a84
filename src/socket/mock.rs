//! Mock Transport for Testing
//!
//! Drives the session without a network: tests script what the remote end
//! says and inspect every frame the session sent.

use super::frame::{Frame, Query, QueryResult};
use super::traits::*;
use crate::message::Message;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

/// Computes the remote answer to a query frame
pub type QueryResponder = Arc<dyn Fn(&Query) -> QueryResult + Send + Sync>;

/// Mock transport; clones share state
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

struct MockState {
    sent: Vec<Frame>,
    sender: Option<TransportEventSender>,
    /// Delivered right after `Opened` on the next connect
    scripted: Vec<TransportEvent>,
    auto_open: bool,
    /// `connect` never resolves, like a network that drops every packet
    hang_connect: bool,
    writable: bool,
    connect_error: Option<String>,
    send_error: Option<String>,
    responder: Option<QueryResponder>,
    connects: usize,
    closes: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            sent: Vec::new(),
            sender: None,
            scripted: Vec::new(),
            auto_open: true,
            hang_connect: false,
            writable: true,
            connect_error: None,
            send_error: None,
            responder: None,
            connects: 0,
            closes: 0,
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `connect` emits `Opened` by itself (default: yes)
    pub fn set_auto_open(&self, auto_open: bool) {
        self.lock().auto_open = auto_open;
    }

    /// Queue an event to follow `Opened` on the next connect
    pub fn script(&self, event: TransportEvent) {
        self.lock().scripted.push(event);
    }

    /// Push an event into the live connection; `false` if there is none
    pub fn inject(&self, event: TransportEvent) -> bool {
        match &self.lock().sender {
            Some(sender) => sender.send(event),
            None => false,
        }
    }

    /// Push an inbound frame into the live connection
    pub fn inject_frame(&self, frame: Frame) -> bool {
        self.inject(TransportEvent::Frame(frame))
    }

    pub fn hang_connect(&self, hang: bool) {
        self.lock().hang_connect = hang;
    }

    pub fn set_writable(&self, writable: bool) {
        self.lock().writable = writable;
    }

    /// Make `connect` fail with the given reason (`None` to heal)
    pub fn fail_connect(&self, reason: Option<&str>) {
        self.lock().connect_error = reason.map(str::to_string);
    }

    /// Make `send` fail with the given reason (`None` to heal)
    pub fn fail_sends(&self, reason: Option<&str>) {
        self.lock().send_error = reason.map(str::to_string);
    }

    /// Answer every query frame with `responder`
    pub fn on_query<F>(&self, responder: F)
    where
        F: Fn(&Query) -> QueryResult + Send + Sync + 'static,
    {
        self.lock().responder = Some(Arc::new(responder));
    }

    /// Every frame accepted so far
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.lock().sent.clone()
    }

    /// Messages accepted so far
    pub fn sent_messages(&self) -> Vec<Message> {
        self.lock()
            .sent
            .iter()
            .filter_map(|frame| match frame {
                Frame::Message { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Queries accepted so far
    pub fn sent_queries(&self) -> Vec<Query> {
        self.lock()
            .sent
            .iter()
            .filter_map(|frame| match frame {
                Frame::Query { query, .. } => Some(query.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    pub fn is_connected(&self) -> bool {
        self.lock().sender.is_some()
    }
}

#[async_trait]
impl TransportChannel for MockTransport {
    async fn connect(&self) -> TransportResult<TransportEvents> {
        let hang = self.lock().hang_connect;
        if hang {
            std::future::pending::<()>().await;
        }

        let mut state = self.lock();
        if let Some(reason) = &state.connect_error {
            return Err(TransportError::Connect(reason.clone()));
        }

        let (events, sender) = TransportEvents::channel();
        state.connects += 1;
        if state.auto_open {
            sender.send(TransportEvent::Opened);
            for event in state.scripted.drain(..) {
                sender.send(event);
            }
        }
        state.sender = Some(sender);
        Ok(events)
    }

    async fn send(&self, frame: &Frame) -> TransportResult<()> {
        let mut state = self.lock();
        if state.sender.is_none() {
            return Err(TransportError::Closed);
        }
        if !state.writable {
            return Err(TransportError::NotWritable);
        }
        if let Some(reason) = &state.send_error {
            return Err(TransportError::Send(reason.clone()));
        }

        state.sent.push(frame.clone());

        if let (Frame::Query { tag, query }, Some(responder)) = (frame, state.responder.clone()) {
            let result = responder(query);
            if let Some(sender) = &state.sender {
                sender.send(TransportEvent::Frame(Frame::QueryResult {
                    tag: tag.clone(),
                    result,
                }));
            }
        }
        Ok(())
    }

    async fn close(&self) {
        let mut state = self.lock();
        state.sender = None;
        state.closes += 1;
    }

    fn is_writable(&self) -> bool {
        let state = self.lock();
        state.sender.is_some() && state.writable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_connect_opens_and_replays_script() {
        let transport = MockTransport::new();
        transport.script(TransportEvent::Frame(Frame::ResumeSuccess));

        let mut events = transport.connect().await.unwrap();

        assert_eq!(events.next().await, Some(TransportEvent::Opened));
        assert_eq!(
            events.next().await,
            Some(TransportEvent::Frame(Frame::ResumeSuccess))
        );
        assert_eq!(transport.connect_count(), 1);
        assert!(transport.is_writable());
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let transport = MockTransport::new();
        transport.fail_connect(Some("refused"));

        let result = transport.connect().await;
        assert!(matches!(result, Err(TransportError::Connect(ref r)) if r == "refused"));
        assert!(!transport.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_connect_never_resolves() {
        let transport = MockTransport::new();
        transport.hang_connect(true);

        let result = tokio::time::timeout(Duration::from_secs(30), transport.connect()).await;
        assert!(result.is_err());
        assert!(!transport.is_connected());

        transport.hang_connect(false);
        let _events = transport.connect().await.unwrap();
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn test_send_requires_open_writable_channel() {
        let transport = MockTransport::new();
        assert_eq!(
            transport.send(&Frame::KeepAlive).await,
            Err(TransportError::Closed)
        );

        let _events = transport.connect().await.unwrap();
        transport.set_writable(false);
        assert_eq!(
            transport.send(&Frame::KeepAlive).await,
            Err(TransportError::NotWritable)
        );
        assert!(!transport.is_writable());

        transport.set_writable(true);
        transport.send(&Frame::KeepAlive).await.unwrap();
        assert_eq!(transport.sent_frames(), vec![Frame::KeepAlive]);
    }

    #[tokio::test]
    async fn test_query_responder_answers_on_stream() {
        let transport = MockTransport::new();
        transport.on_query(|_| QueryResult::Ok);
        let mut events = transport.connect().await.unwrap();
        let _opened = events.next().await;

        let query = Query::UpdateStatus {
            status: "busy".into(),
        };
        transport
            .send(&Frame::Query {
                tag: "t1".into(),
                query: query.clone(),
            })
            .await
            .unwrap();

        assert_eq!(
            events.next().await,
            Some(TransportEvent::Frame(Frame::QueryResult {
                tag: "t1".into(),
                result: QueryResult::Ok,
            }))
        );
        assert_eq!(transport.sent_queries(), vec![query]);
    }

    #[tokio::test]
    async fn test_close_ends_stream() {
        let transport = MockTransport::new();
        let mut events = transport.connect().await.unwrap();
        let _opened = events.next().await;

        transport.close().await;

        assert_eq!(events.next().await, None);
        assert!(!transport.inject(TransportEvent::Closed));
        assert_eq!(transport.close_count(), 1);
    }
}
