//! Session Controller
//!
//! Owns the connection lifecycle of one session:
//!
//! ```text
//! closed --connect()--> connecting --pair/resume ok--> open
//!    ^                      |                            |
//!    +---- error/timeout ---+------ error/end/logout ----+
//! ```
//!
//! All mutable session state (connection, pairing, credentials, delivery
//! statuses, pending requests) lives in one [`SessionState`] behind a single
//! async mutex. Caller operations and the transport reader task take that
//! lock for every transition, so pairing completion, keep-alive and acks
//! never interleave half-way through a transition. Events are emitted while
//! the lock is held, which keeps their order identical to transition order.

use super::config::SessionConfig;
use super::delivery::DeliveryTracker;
use super::error::{SessionError, SessionResult};
use super::events::{ConnectionUpdate, Event, EventBus, MessageUpdate, Subscription, UpsertKind};
use super::frame::{Frame, Query, QueryResult};
use super::keep_alive::KeepAlive;
use super::pairing::{pairing_code, ConnectionState, LastDisconnect, PairingState};
use super::retry::{retry_with_backoff, RetryPolicy};
use super::traits::{TransportChannel, TransportEvent, TransportEvents};
use crate::auth::{Contact, CredentialStore, Credentials, CredentialsUpdate};
use crate::codec::{build_payload, ContactCard, MediaSource, MessageContent};
use crate::jid::Jid;
use crate::message::{generate_message_id, unix_timestamp, Message, MessageKey, MessageStatus};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

type ConnectWaiter = oneshot::Sender<SessionResult<Contact>>;

/// Handle to one chat session; clones share the session
pub struct SessionController<T: TransportChannel, S: CredentialStore> {
    inner: Arc<Inner<T, S>>,
}

impl<T: TransportChannel, S: CredentialStore> Clone for SessionController<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T, S> {
    config: SessionConfig,
    transport: Arc<T>,
    store: S,
    events: EventBus,
    state: Mutex<SessionState>,
    next_query_tag: AtomicU64,
}

struct SessionState {
    connection: ConnectionState,
    pairing: PairingState,
    last_disconnect: Option<LastDisconnect>,
    creds: Credentials,
    tracker: DeliveryTracker,
    /// Bumped on every connect and teardown; reader events from an older
    /// connection are dropped
    epoch: u64,
    connect_waiter: Option<ConnectWaiter>,
    reader: Option<JoinHandle<()>>,
    keep_alive: Option<KeepAlive>,
    pending_queries: HashMap<String, oneshot::Sender<QueryResult>>,
}

impl<T: TransportChannel, S: CredentialStore> SessionController<T, S> {
    /// Create a session over `transport`, loading credentials from `store`
    pub async fn new(config: SessionConfig, transport: T, store: S) -> Self {
        let creds = store.load().await;
        let pairing = PairingState::resting(creds.is_paired());
        debug!(paired = creds.is_paired(), "credentials loaded");

        Self {
            inner: Arc::new(Inner {
                config,
                transport: Arc::new(transport),
                store,
                events: EventBus::new(),
                state: Mutex::new(SessionState {
                    connection: ConnectionState::Closed,
                    pairing,
                    last_disconnect: None,
                    creds,
                    tracker: DeliveryTracker::new(),
                    epoch: 0,
                    connect_waiter: None,
                    reader: None,
                    keep_alive: None,
                    pending_queries: HashMap::new(),
                }),
                next_query_tag: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&self) -> Subscription {
        self.inner.events.subscribe()
    }

    pub fn unsubscribe(&self, id: u64) {
        self.inner.events.unsubscribe(id);
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.inner.state.lock().await.connection
    }

    pub async fn pairing_state(&self) -> PairingState {
        self.inner.state.lock().await.pairing
    }

    /// Why the session last closed; only reported while closed
    pub async fn last_disconnect(&self) -> Option<LastDisconnect> {
        let state = self.inner.state.lock().await;
        match state.connection {
            ConnectionState::Closed => state.last_disconnect.clone(),
            _ => None,
        }
    }

    pub async fn credentials(&self) -> Credentials {
        self.inner.state.lock().await.creds.clone()
    }

    /// Paired identity, if any
    pub async fn me(&self) -> Option<Contact> {
        self.inner.state.lock().await.creds.me.clone()
    }

    /// Delivery status of a message sent in this session
    pub async fn message_status(&self, id: &str) -> Option<MessageStatus> {
        self.inner.state.lock().await.tracker.status(id)
    }

    /// Connect, then pair or resume.
    ///
    /// Resolves with the paired identity once the session is `open`. Fails
    /// with `ConnectTimeout` when that takes longer than the configured
    /// connect timeout, with `Transport` when the channel fails first, and
    /// with `ConnectionClosed` when `end()`/`logout()` interrupts it.
    pub async fn connect(&self) -> SessionResult<Contact> {
        let deadline = Instant::now() + self.inner.config.connect_timeout;

        let (mut waiter, epoch) = {
            let mut state = self.inner.state.lock().await;
            match state.connection {
                ConnectionState::Open => {
                    return state.creds.me.clone().ok_or(SessionError::NotConnected);
                }
                ConnectionState::Connecting => return Err(SessionError::AlreadyConnecting),
                ConnectionState::Closed => {}
            }

            state.last_disconnect = None;
            self.set_connection(&mut state, ConnectionState::Connecting);
            state.epoch += 1;
            let (tx, rx) = oneshot::channel();
            state.connect_waiter = Some(tx);
            (rx, state.epoch)
        };

        // The lock is free while the transport opens so end()/logout() can
        // interrupt it
        let opened = tokio::select! {
            opened = tokio::time::timeout_at(deadline, self.inner.transport.connect()) => opened,
            settled = &mut waiter => {
                return settled.unwrap_or(Err(SessionError::ConnectionClosed));
            }
        };

        {
            let mut state = self.inner.state.lock().await;
            if state.epoch != epoch || state.connection != ConnectionState::Connecting {
                if opened.as_ref().is_ok_and(Result::is_ok)
                    && state.connection == ConnectionState::Closed
                {
                    self.inner.transport.close().await;
                }
                return waiter
                    .try_recv()
                    .unwrap_or(Err(SessionError::ConnectionClosed));
            }

            match opened {
                Ok(Ok(events)) => state.reader = Some(self.spawn_reader(epoch, events)),
                Ok(Err(e)) => {
                    let err = SessionError::from(e);
                    warn!(error = %err, "transport connect failed");
                    state.connect_waiter = None;
                    self.mark_closed(&mut state, Some(err.clone()));
                    return Err(err);
                }
                Err(_) => return self.time_out_connect(&mut state).await,
            }
        }

        match tokio::time::timeout_at(deadline, &mut waiter).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SessionError::ConnectionClosed),
            Err(_) => self.connect_timed_out(epoch, waiter).await,
        }
    }

    async fn connect_timed_out(
        &self,
        epoch: u64,
        mut waiter: oneshot::Receiver<SessionResult<Contact>>,
    ) -> SessionResult<Contact> {
        let mut state = self.inner.state.lock().await;

        // Settled while we were waiting for the lock
        if let Ok(result) = waiter.try_recv() {
            return result;
        }
        if state.epoch != epoch || state.connection != ConnectionState::Connecting {
            return Err(SessionError::ConnectionClosed);
        }
        self.time_out_connect(&mut state).await
    }

    async fn time_out_connect(&self, state: &mut SessionState) -> SessionResult<Contact> {
        warn!(
            timeout_ms = self.inner.config.connect_timeout.as_millis() as u64,
            pairing = ?state.pairing,
            "connect timed out"
        );
        state.connect_waiter = None;
        self.teardown(state, false).await;
        state.pairing = PairingState::resting(state.creds.is_paired());
        self.mark_closed(state, Some(SessionError::ConnectTimeout));
        Err(SessionError::ConnectTimeout)
    }

    /// Close the transport without touching credentials; the next
    /// `connect()` resumes
    pub async fn end(&self) {
        let mut state = self.inner.state.lock().await;
        if state.connection == ConnectionState::Closed {
            debug!("end: already closed");
            return;
        }

        info!("ending session");
        self.teardown(&mut state, false).await;
        state.pairing = PairingState::resting(state.creds.is_paired());
        self.mark_closed(&mut state, None);
        Self::settle_waiter(&mut state, Err(SessionError::ConnectionClosed));
    }

    /// Forget the paired identity and close. Calling it again is a no-op.
    pub async fn logout(&self) {
        let mut state = self.inner.state.lock().await;
        let paired = state.creds.is_paired();
        if !paired && state.connection == ConnectionState::Closed {
            debug!("logout: nothing to do");
            return;
        }

        info!("logging out");
        if self.inner.transport.is_writable() {
            if let Err(e) = self.inner.transport.send(&Frame::Logout).await {
                warn!(error = %e, "logout frame not delivered");
            }
        }

        if paired {
            state.creds.me = None;
            self.persist(&state.creds).await;
            self.inner
                .events
                .emit(Event::CredsUpdate(CredentialsUpdate { me: None }));
        }
        state.pairing = PairingState::Unpaired;

        if state.connection != ConnectionState::Closed {
            self.teardown(&mut state, false).await;
            self.mark_closed(&mut state, None);
            Self::settle_waiter(&mut state, Err(SessionError::ConnectionClosed));
        }
    }

    /// Send content to a raw identity string
    ///
    /// Resolves once the transport accepted the frame, with the message in
    /// `PENDING`; later progress arrives as `messages.update` events.
    pub async fn send(&self, jid: &str, content: MessageContent) -> SessionResult<Message> {
        let jid: Jid = jid.parse()?;
        self.send_to(jid, content).await
    }

    /// Send content to an already parsed identity
    pub async fn send_to(&self, jid: Jid, content: MessageContent) -> SessionResult<Message> {
        let payload = build_payload(content)?;

        let mut state = self.inner.state.lock().await;
        if state.connection != ConnectionState::Open {
            return Err(SessionError::NotConnected);
        }

        let id = loop {
            let id = generate_message_id();
            if !state.tracker.contains(&id) {
                break id;
            }
        };
        let message = Message {
            key: MessageKey::outgoing(jid, id),
            content: payload,
            timestamp: unix_timestamp(),
            status: MessageStatus::Pending,
        };

        let frame = Frame::Message {
            message: message.clone(),
        };
        if let Err(e) = self.inner.transport.send(&frame).await {
            warn!(id = %message.key.id, error = %e, "message send failed");
            return Err(e.into());
        }

        state.tracker.track(message.key.clone());
        debug!(
            id = %message.key.id,
            to = %message.key.remote_jid,
            kind = message.content.kind(),
            "message sent"
        );
        self.inner.events.emit(Event::MessagesUpsert {
            messages: vec![message.clone()],
            kind: UpsertKind::Append,
        });
        Ok(message)
    }

    pub async fn send_text(&self, jid: &str, text: impl Into<String>) -> SessionResult<Message> {
        self.send(jid, MessageContent::Text(text.into())).await
    }

    pub async fn send_image(
        &self,
        jid: &str,
        image: impl Into<MediaSource>,
        caption: Option<String>,
    ) -> SessionResult<Message> {
        let content = MessageContent::Image {
            media: image.into(),
            caption,
        };
        self.send(jid, content).await
    }

    pub async fn send_video(
        &self,
        jid: &str,
        video: impl Into<MediaSource>,
        caption: Option<String>,
    ) -> SessionResult<Message> {
        let content = MessageContent::Video {
            media: video.into(),
            caption,
        };
        self.send(jid, content).await
    }

    /// `ptt` marks a voice note
    pub async fn send_audio(
        &self,
        jid: &str,
        audio: impl Into<MediaSource>,
        ptt: bool,
    ) -> SessionResult<Message> {
        let content = MessageContent::Audio {
            media: audio.into(),
            ptt,
        };
        self.send(jid, content).await
    }

    pub async fn send_document(
        &self,
        jid: &str,
        document: impl Into<MediaSource>,
        mimetype: impl Into<String>,
        file_name: impl Into<String>,
    ) -> SessionResult<Message> {
        let content = MessageContent::Document {
            media: document.into(),
            mimetype: mimetype.into(),
            file_name: file_name.into(),
        };
        self.send(jid, content).await
    }

    pub async fn send_contacts(
        &self,
        jid: &str,
        contacts: Vec<ContactCard>,
    ) -> SessionResult<Message> {
        self.send(jid, MessageContent::Contacts(contacts)).await
    }

    pub async fn send_location(
        &self,
        jid: &str,
        latitude: f64,
        longitude: f64,
        name: Option<String>,
        address: Option<String>,
    ) -> SessionResult<Message> {
        let content = MessageContent::Location {
            latitude,
            longitude,
            name,
            address,
        };
        self.send(jid, content).await
    }

    /// Run a request/response command, retrying transport failures
    pub(crate) async fn query(&self, query: Query) -> SessionResult<QueryResult> {
        let policy = RetryPolicy::new(
            self.inner.config.retry_request_delay,
            self.inner.config.max_retries,
        );
        let this = self;
        let result = retry_with_backoff(
            policy,
            move || this.query_once(query.clone()),
            SessionError::is_transient,
        )
        .await?;

        match result {
            QueryResult::Error { code, text } => Err(SessionError::Server { code, text }),
            other => Ok(other),
        }
    }

    async fn query_once(&self, query: Query) -> SessionResult<QueryResult> {
        let tag = format!(
            "lotus.{}",
            self.inner.next_query_tag.fetch_add(1, Ordering::Relaxed)
        );

        let response = {
            let mut state = self.inner.state.lock().await;
            if state.connection != ConnectionState::Open {
                return Err(SessionError::NotConnected);
            }

            let (tx, rx) = oneshot::channel();
            state.pending_queries.insert(tag.clone(), tx);
            let frame = Frame::Query {
                tag: tag.clone(),
                query,
            };
            if let Err(e) = self.inner.transport.send(&frame).await {
                state.pending_queries.remove(&tag);
                return Err(e.into());
            }
            rx
        };

        match tokio::time::timeout(self.inner.config.query_timeout, response).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(SessionError::ConnectionClosed),
            Err(_) => {
                self.inner.state.lock().await.pending_queries.remove(&tag);
                warn!(tag = %tag, "query timed out");
                Err(SessionError::QueryTimeout)
            }
        }
    }

    fn spawn_reader(&self, epoch: u64, mut events: TransportEvents) -> JoinHandle<()> {
        let session: Weak<Inner<T, S>> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            loop {
                let event = events.next().await.unwrap_or(TransportEvent::Closed);
                let Some(inner) = session.upgrade() else {
                    break;
                };
                let controller = SessionController { inner };
                if !controller.handle_transport_event(epoch, event).await {
                    break;
                }
            }
        })
    }

    /// Returns `false` once this connection is finished
    async fn handle_transport_event(&self, epoch: u64, event: TransportEvent) -> bool {
        let mut state = self.inner.state.lock().await;
        if state.epoch != epoch {
            debug!(epoch, current = state.epoch, "event from stale connection dropped");
            return false;
        }

        match event {
            TransportEvent::Opened => self.on_opened(&mut state).await,
            TransportEvent::Frame(frame) => self.on_frame(&mut state, frame).await,
            TransportEvent::Error(reason) => {
                self.on_transport_lost(&mut state, SessionError::Transport(reason))
                    .await;
                false
            }
            TransportEvent::Closed => {
                let err = SessionError::Transport("connection closed by remote".to_string());
                self.on_transport_lost(&mut state, err).await;
                false
            }
        }
    }

    async fn on_opened(&self, state: &mut SessionState) -> bool {
        if state.connection != ConnectionState::Connecting {
            debug!(connection = %state.connection, "unexpected transport open ignored");
            return true;
        }

        match state.creds.me.clone() {
            Some(me) => {
                state.pairing = PairingState::Resuming;
                info!(jid = %me.id, "transport open, resuming session");
                if let Err(e) = self.inner.transport.send(&Frame::Resume { me: me.id }).await {
                    self.on_transport_lost(state, e.into()).await;
                    return false;
                }
            }
            None => {
                state.pairing = PairingState::AwaitingScan;
                let noise_public = state.creds.noise_key.as_ref().map(|k| k.public.as_slice());
                let qr = pairing_code(noise_public);
                info!("transport open, pairing code issued");
                self.inner.events.emit(Event::ConnectionUpdate(ConnectionUpdate {
                    qr: Some(qr),
                    ..Default::default()
                }));
            }
        }
        true
    }

    async fn on_frame(&self, state: &mut SessionState, frame: Frame) -> bool {
        match frame {
            Frame::PairSuccess { me } => {
                if state.pairing != PairingState::AwaitingScan {
                    warn!(pairing = ?state.pairing, "unexpected pair_success ignored");
                    return true;
                }
                info!(jid = %me.id, name = %me.name, "pairing completed");
                state.creds.me = Some(me.clone());
                state.pairing = PairingState::Paired;
                self.persist(&state.creds).await;
                self.inner
                    .events
                    .emit(Event::CredsUpdate(CredentialsUpdate { me: Some(me) }));
                self.go_open(state);
            }
            Frame::ResumeSuccess => {
                if state.pairing != PairingState::Resuming {
                    warn!(pairing = ?state.pairing, "unexpected resume_success ignored");
                    return true;
                }
                info!("session resumed");
                state.pairing = PairingState::Paired;
                self.go_open(state);
            }
            Frame::Failure { reason } => {
                self.on_transport_lost(state, SessionError::Transport(reason))
                    .await;
                return false;
            }
            Frame::Ack { id, status } => {
                if let Some(update) = state.tracker.apply(&id, status) {
                    self.emit_status(update);
                }
            }
            Frame::Message { message } => {
                debug!(
                    id = %message.key.id,
                    from = %message.key.remote_jid,
                    kind = message.content.kind(),
                    "message received"
                );
                self.inner.events.emit(Event::MessagesUpsert {
                    messages: vec![message],
                    kind: UpsertKind::Notify,
                });
            }
            Frame::QueryResult { tag, result } => match state.pending_queries.remove(&tag) {
                Some(tx) => {
                    let _ = tx.send(result);
                }
                None => warn!(tag = %tag, "result for unknown query ignored"),
            },
            other => debug!(kind = other.kind(), "outbound-only frame received, ignored"),
        }
        true
    }

    fn go_open(&self, state: &mut SessionState) {
        self.set_connection(state, ConnectionState::Open);
        state.keep_alive = Some(KeepAlive::start(
            Arc::clone(&self.inner.transport),
            self.inner.config.keep_alive_interval,
        ));
        if let Some(me) = state.creds.me.clone() {
            Self::settle_waiter(state, Ok(me));
        }
    }

    async fn on_transport_lost(&self, state: &mut SessionState, err: SessionError) {
        if state.connection == ConnectionState::Closed {
            return;
        }

        warn!(error = %err, pairing = ?state.pairing, "transport lost");
        self.teardown(state, true).await;
        state.pairing = PairingState::resting(state.creds.is_paired());
        self.mark_closed(state, Some(err.clone()));
        Self::settle_waiter(state, Err(err));
    }

    /// Stop keep-alive, drop the reader and close the transport.
    ///
    /// `from_reader` is set when the reader task itself is tearing down; it
    /// must not abort itself half-way through.
    async fn teardown(&self, state: &mut SessionState, from_reader: bool) {
        if let Some(keep_alive) = state.keep_alive.take() {
            keep_alive.stop();
        }
        if let Some(reader) = state.reader.take() {
            if !from_reader {
                reader.abort();
            }
        }
        state.epoch += 1;
        state.pending_queries.clear();
        self.inner.transport.close().await;
    }

    fn set_connection(&self, state: &mut SessionState, next: ConnectionState) {
        if state.connection == next {
            return;
        }
        info!(from = %state.connection, to = %next, "connection state changed");
        state.connection = next;

        let last_disconnect = match next {
            ConnectionState::Closed => state.last_disconnect.clone(),
            _ => None,
        };
        self.inner.events.emit(Event::ConnectionUpdate(ConnectionUpdate {
            connection: Some(next),
            last_disconnect,
            qr: None,
        }));
    }

    fn mark_closed(&self, state: &mut SessionState, error: Option<SessionError>) {
        state.last_disconnect = Some(LastDisconnect::now(error));
        self.set_connection(state, ConnectionState::Closed);
    }

    fn settle_waiter(state: &mut SessionState, result: SessionResult<Contact>) {
        if let Some(waiter) = state.connect_waiter.take() {
            let _ = waiter.send(result);
        }
    }

    fn emit_status(&self, update: MessageUpdate) {
        self.inner.events.emit(Event::MessagesUpdate(vec![update]));
    }

    /// Save credentials; failures are logged and never propagated
    async fn persist(&self, creds: &Credentials) {
        if let Err(e) = self.inner.store.save(creds).await {
            let err = SessionError::from(e);
            error!(error = %err, "credential save failed, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;
    use crate::socket::mock::MockTransport;

    type TestSession = SessionController<MockTransport, MemoryCredentialStore>;

    fn contact() -> Contact {
        Contact {
            id: "15550100000@s.whatsapp.net".parse().unwrap(),
            name: "Ada".to_string(),
        }
    }

    async fn session(transport: &MockTransport, store: &MemoryCredentialStore) -> TestSession {
        SessionController::new(SessionConfig::default(), transport.clone(), store.clone()).await
    }

    async fn open_resumed(transport: &MockTransport) -> TestSession {
        let store = MemoryCredentialStore::with_credentials(Credentials {
            me: Some(contact()),
            ..Default::default()
        });
        transport.script(TransportEvent::Frame(Frame::ResumeSuccess));
        let session = session(transport, &store).await;
        session.connect().await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_new_session_is_closed() {
        let session = session(&MockTransport::new(), &MemoryCredentialStore::new()).await;
        assert_eq!(session.connection_state().await, ConnectionState::Closed);
        assert_eq!(session.pairing_state().await, PairingState::Unpaired);
        assert!(session.last_disconnect().await.is_none());
    }

    #[tokio::test]
    async fn test_connect_while_open_returns_identity() {
        let transport = MockTransport::new();
        let session = open_resumed(&transport).await;

        assert_eq!(session.connect().await.unwrap(), contact());
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_second_connect_while_connecting_is_rejected() {
        let transport = MockTransport::new();
        let store = MemoryCredentialStore::new();
        let session = session(&transport, &store).await;

        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.connect().await }
        });
        while session.pairing_state().await != PairingState::AwaitingScan {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            session.connect().await,
            Err(SessionError::AlreadyConnecting)
        );

        session.end().await;
        assert_eq!(pending.await.unwrap(), Err(SessionError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_connect_failure_closes_with_transport_error() {
        let transport = MockTransport::new();
        transport.fail_connect(Some("refused"));
        let session = session(&transport, &MemoryCredentialStore::new()).await;

        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
        assert_eq!(session.connection_state().await, ConnectionState::Closed);
        assert_eq!(
            session.last_disconnect().await.unwrap().error,
            Some(err)
        );
    }

    #[tokio::test]
    async fn test_resume_sends_resume_frame() {
        let transport = MockTransport::new();
        let _session = open_resumed(&transport).await;

        assert_eq!(
            transport.sent_frames().first(),
            Some(&Frame::Resume { me: contact().id })
        );
    }

    #[tokio::test]
    async fn test_send_failure_is_not_tracked() {
        let transport = MockTransport::new();
        let session = open_resumed(&transport).await;
        transport.fail_sends(Some("broken pipe"));

        let err = session
            .send_text("15550100001@s.whatsapp.net", "hi")
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Transport(_)));
        assert!(transport.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_message_ids_are_unique() {
        let transport = MockTransport::new();
        let session = open_resumed(&transport).await;

        let mut ids = std::collections::HashSet::new();
        for _ in 0..50 {
            let message = session
                .send_text("15550100001@s.whatsapp.net", "hi")
                .await
                .unwrap();
            assert!(ids.insert(message.key.id));
        }
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_credentials() {
        let transport = MockTransport::new();
        transport.script(TransportEvent::Frame(Frame::Failure {
            reason: "session revoked".into(),
        }));
        let store = MemoryCredentialStore::with_credentials(Credentials {
            me: Some(contact()),
            ..Default::default()
        });
        let session = session(&transport, &store).await;

        let err = session.connect().await.unwrap_err();

        assert_eq!(err, SessionError::Transport("session revoked".into()));
        assert_eq!(session.me().await, Some(contact()));
        assert_eq!(session.pairing_state().await, PairingState::Paired);
    }

    #[tokio::test]
    async fn test_remote_close_while_open() {
        let transport = MockTransport::new();
        let session = open_resumed(&transport).await;
        let mut events = session.subscribe();

        transport.inject(TransportEvent::Closed);

        match events.recv().await {
            Some(Event::ConnectionUpdate(update)) => {
                assert_eq!(update.connection, Some(ConnectionState::Closed));
                let error = update.last_disconnect.and_then(|d| d.error);
                assert!(matches!(error, Some(SessionError::Transport(_))));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(session.connection_state().await, ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_end_keeps_credentials_and_resumes() {
        let transport = MockTransport::new();
        let session = open_resumed(&transport).await;

        session.end().await;
        assert_eq!(session.connection_state().await, ConnectionState::Closed);
        assert_eq!(session.last_disconnect().await.unwrap().error, None);
        assert_eq!(transport.close_count(), 1);

        transport.script(TransportEvent::Frame(Frame::ResumeSuccess));
        assert_eq!(session.connect().await.unwrap(), contact());
    }

    #[tokio::test]
    async fn test_unknown_query_result_is_ignored() {
        let transport = MockTransport::new();
        let session = open_resumed(&transport).await;

        transport.inject_frame(Frame::QueryResult {
            tag: "nobody".into(),
            result: QueryResult::Ok,
        });
        tokio::task::yield_now().await;

        assert_eq!(session.connection_state().await, ConnectionState::Open);
    }
}
