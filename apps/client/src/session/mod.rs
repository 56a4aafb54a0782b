//! WebSocket session manager
//!
//! Owns a single socket to the game server and everything attached to it:
//! connection lifecycle, reconnection with backoff, the heartbeat, request
//! correlation and push routing.
//!
//! Each physical socket gets a generation number. Tasks spawned for a socket
//! carry its generation and become inert once the session has moved on, so a
//! late close event from a replaced or manually closed socket never triggers
//! a reconnect.

use futures_util::{
    FutureExt, SinkExt, StreamExt,
    future::BoxFuture,
    stream::{SplitSink, SplitStream},
};
use hamlet_link_common::{
    ClientMessage, GameAction, LinkError, PendingRequest, PendingRequests, ProcessedMessageSet,
    Push, PushKind, Reply, Result, ServerMessage,
    constants::{EVENT_CHANNEL_CAPACITY, OUTGOING_QUEUE_SIZE, PING_TIMEOUT_MS, REQUEST_ID_FIELD},
    normalize_url_with, validate_chat_message, validate_credentials,
};
use serde_json::Value;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot},
    task::JoinHandle,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message as WsMessage,
};
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::handlers::HandlerRegistry;
use crate::state::{ConnectionState, SessionEvent};


type WebSocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Mutable session state, guarded by one lock
struct Shared {
    state: ConnectionState,
    url: Option<String>,
    reconnect_attempts: u32,
    session_active: bool,
    current_user: Option<String>,
    generation: u64,
    outgoing: Option<mpsc::Sender<WsMessage>>,
    reader: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    reconnect_task: Option<JoinHandle<()>>,
    pending: PendingRequests<Result<Reply>>,
    processed: ProcessedMessageSet,
    pong_waiters: Vec<oneshot::Sender<()>>,
}

struct Inner {
    config: SessionConfig,
    shared: Mutex<Shared>,
    handlers: HandlerRegistry,
    events: broadcast::Sender<SessionEvent>,
}

/// Handle to a session with the game server
///
/// Cloning is cheap; all clones drive the same connection.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Shared {
            state: ConnectionState::Disconnected,
            url: None,
            reconnect_attempts: 0,
            session_active: false,
            current_user: None,
            generation: 0,
            outgoing: None,
            reader: None,
            heartbeat: None,
            reconnect_task: None,
            pending: PendingRequests::new(),
            processed: ProcessedMessageSet::new(config.processed_capacity, config.processed_retain),
            pong_waiters: Vec::new(),
        };

        Self {
            inner: Arc::new(Inner {
                config,
                shared: Mutex::new(shared),
                handlers: HandlerRegistry::new(),
                events,
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Connect to `server`, a bare host or a full `ws://`/`wss://` URL.
    ///
    /// Returns once the WebSocket handshake has completed. Fails with
    /// `AlreadyConnecting` if another connect is in flight; any other existing
    /// socket is torn down first.
    pub async fn connect(&self, server: &str) -> Result<()> {
        let url = normalize_url_with(server, self.inner.config.default_scheme)?;

        let generation = {
            let mut shared = self.inner.shared.lock().await;
            if shared.state == ConnectionState::Connecting {
                return Err(LinkError::AlreadyConnecting);
            }

            self.inner.teardown(&mut shared);
            shared.generation += 1;
            shared.url = Some(url.clone());
            self.inner.set_state(&mut shared, ConnectionState::Connecting);
            shared.generation
        };

        info!("Connecting to {}", url);

        match self.inner.open_socket(&url).await {
            Ok(ws_stream) => {
                let mut shared = self.inner.shared.lock().await;
                if shared.generation != generation {
                    debug!("Connect to {} superseded, dropping socket", url);
                    return Err(LinkError::ConnectionClosed);
                }

                shared.reconnect_attempts = 0;
                self.inner.install(&mut shared, ws_stream, generation);
                self.inner.set_state(&mut shared, ConnectionState::Connected);
                info!("Connected to {}", url);
                Ok(())
            }
            Err(e) => {
                error!("Failed to connect to {}: {}", url, e);
                let mut shared = self.inner.shared.lock().await;
                if shared.generation == generation {
                    self.inner.set_state(&mut shared, ConnectionState::Failed);
                }
                Err(e)
            }
        }
    }

    /// Close the session. Terminal until the next `connect()`.
    ///
    /// Cancels any scheduled reconnect, stops the heartbeat, closes the
    /// socket and rejects outstanding requests with `ConnectionClosed`.
    pub async fn disconnect(&self) {
        let mut shared = self.inner.shared.lock().await;
        self.inner.teardown(&mut shared);
        shared.generation += 1;
        shared.reconnect_attempts = 0;
        shared.session_active = false;
        shared.current_user = None;
        self.inner
            .set_state(&mut shared, ConnectionState::Disconnected);
        info!("Disconnected");
    }

    /// Send a request and wait for its reply, using the configured timeout
    pub async fn send(&self, message: &ClientMessage) -> Result<Reply> {
        self.send_with_timeout(message, self.inner.config.request_timeout)
            .await
    }

    /// Send a request and wait at most `timeout` for its reply
    pub async fn send_with_timeout(
        &self,
        message: &ClientMessage,
        timeout: Option<Duration>,
    ) -> Result<Reply> {
        let payload = serde_json::to_value(message)?;
        self.send_value(payload, timeout).await
    }

    /// Send an opaque game action through the correlated path
    pub async fn send_action(&self, action: &GameAction) -> Result<Reply> {
        let payload = serde_json::to_value(action)?;
        self.send_value(payload, self.inner.config.request_timeout)
            .await
    }

    /// Send a JSON object tagged with a fresh `requestId` and await the reply
    ///
    /// With `timeout` set to `None` the call waits until a reply arrives or
    /// the connection goes away.
    pub async fn send_value(&self, payload: Value, timeout: Option<Duration>) -> Result<Reply> {
        let Value::Object(mut fields) = payload else {
            return Err(LinkError::SendFailed(
                "payload must be a JSON object".to_string(),
            ));
        };

        let (request_id, reply_rx, outgoing) = {
            let mut shared = self.inner.shared.lock().await;
            let outgoing = Inner::sender(&shared)?;
            let (request_id, reply_rx) = shared.pending.register();
            (request_id, reply_rx, outgoing)
        };
        let mut guard = PendingGuard::new(Arc::clone(&self.inner), request_id);

        fields.insert(REQUEST_ID_FIELD.to_string(), Value::from(request_id));
        let text = Value::Object(fields).to_string();

        if let Err(e) = outgoing.send(WsMessage::Text(text.into())).await {
            guard.release().await;
            return Err(LinkError::SendFailed(e.to_string()));
        }

        debug!("Sent request {}", request_id);

        let reply = match timeout {
            Some(limit) => match tokio::time::timeout(limit, reply_rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    if let Some(request) = guard.release().await {
                        warn!(
                            "Request {} timed out after {:?}",
                            request_id,
                            request.age()
                        );
                    }
                    return Err(LinkError::RequestTimeout {
                        request_id,
                        timeout: limit,
                    });
                }
            },
            None => reply_rx.await,
        };

        // Settled by a reply or a teardown, both of which removed the entry
        guard.disarm();
        reply.map_err(|_| LinkError::ConnectionClosed)?
    }

    /// Send a message without waiting for any reply
    pub async fn notify(&self, message: &ClientMessage) -> Result<()> {
        let text = serde_json::to_string(message)?;
        let outgoing = {
            let shared = self.inner.shared.lock().await;
            Inner::sender(&shared)?
        };

        outgoing
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| LinkError::SendFailed(e.to_string()))?;

        debug!("Sent {}", message.action());
        Ok(())
    }

    /// Submit credentials. A successful reply starts the user session, which
    /// enables automatic reconnection.
    pub async fn login(&self, user: &str, password: &str) -> Result<Reply> {
        let user = validate_credentials(user, password)?;
        let reply = self
            .send(&ClientMessage::Login {
                user: user.clone(),
                pw: password.to_string(),
            })
            .await?;

        if reply.is_success() {
            let mut shared = self.inner.shared.lock().await;
            shared.session_active = true;
            shared.current_user = Some(user.clone());
            info!("Logged in as {}", user);
        } else {
            warn!(
                "Login rejected: {}",
                reply.error().or(reply.message()).unwrap_or("no reason given")
            );
        }

        Ok(reply)
    }

    /// Create an account. Does not start a user session.
    pub async fn register(&self, user: &str, password: &str) -> Result<Reply> {
        let user = validate_credentials(user, password)?;
        self.send(&ClientMessage::Register {
            user,
            pw: password.to_string(),
        })
        .await
    }

    /// Validate, obfuscate and send a chat line
    pub async fn send_chat(&self, text: &str) -> Result<()> {
        let text = validate_chat_message(text)?;
        self.notify(&ClientMessage::chat(&text, self.inner.config.obfuscation_key))
            .await
    }

    /// Ask the server for buffered messages; they arrive as a poll response
    pub async fn poll(&self) -> Result<()> {
        self.notify(&ClientMessage::Poll).await
    }

    /// Round-trip time of a ping
    pub async fn measure_latency(&self) -> Result<Duration> {
        let (pong_tx, pong_rx) = oneshot::channel();
        self.inner.shared.lock().await.pong_waiters.push(pong_tx);

        let started = Instant::now();
        self.notify(&ClientMessage::Ping).await?;

        let limit = Duration::from_millis(PING_TIMEOUT_MS);
        match tokio::time::timeout(limit, pong_rx).await {
            Ok(Ok(())) => Ok(started.elapsed()),
            Ok(Err(_)) => Err(LinkError::ConnectionClosed),
            Err(_) => Err(LinkError::PingTimeout(limit)),
        }
    }

    /// Feed a message obtained out of band (HTTP polling) through the same
    /// routing and duplicate suppression as socket traffic
    pub async fn ingest(&self, message: Value) {
        self.inner
            .dispatch(ServerMessage::classify(message))
            .await;
    }

    /// Register the handler for a push kind
    pub async fn on_push<F>(&self, kind: PushKind, handler: F)
    where
        F: Fn(&Push) + Send + Sync + 'static,
    {
        self.inner.handlers.set_push(kind, Arc::new(handler)).await;
    }

    /// Register the handler for a named event
    pub async fn on_event<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner
            .handlers
            .set_event(name.into(), Arc::new(handler))
            .await;
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.shared.lock().await.state
    }

    pub async fn url(&self) -> Option<String> {
        self.inner.shared.lock().await.url.clone()
    }

    pub async fn reconnect_attempts(&self) -> u32 {
        self.inner.shared.lock().await.reconnect_attempts
    }

    pub async fn pending_requests(&self) -> usize {
        self.inner.shared.lock().await.pending.len()
    }

    pub async fn current_user(&self) -> Option<String> {
        self.inner.shared.lock().await.current_user.clone()
    }

    /// Mark whether a user session is active. Socket loss during an active
    /// session triggers reconnection; otherwise the session just goes
    /// `Disconnected`.
    pub async fn set_session_active(&self, active: bool) {
        self.inner.shared.lock().await.session_active = active;
    }
}

/// Removes a pending entry if its caller stops waiting before it settles
struct PendingGuard {
    inner: Arc<Inner>,
    request_id: u64,
    armed: bool,
}

impl PendingGuard {
    fn new(inner: Arc<Inner>, request_id: u64) -> Self {
        Self {
            inner,
            request_id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    /// Remove the entry now and disarm
    async fn release(&mut self) -> Option<PendingRequest<Result<Reply>>> {
        let request = self.inner.shared.lock().await.pending.remove(self.request_id);
        self.armed = false;
        request
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let request_id = self.request_id;
        if let Ok(mut shared) = self.inner.shared.try_lock() {
            shared.pending.remove(request_id);
        } else if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let inner = Arc::clone(&self.inner);
            runtime.spawn(async move {
                inner.shared.lock().await.pending.remove(request_id);
            });
        }
        debug!("Request {} abandoned by its caller", request_id);
    }
}

impl Inner {
    fn set_state(&self, shared: &mut Shared, state: ConnectionState) {
        let previous = shared.state;
        shared.state = state;

        if previous != state {
            debug!("State {} -> {}", previous, state);
            // No subscribers is fine
            let _ = self.events.send(SessionEvent::StateChanged {
                from: previous,
                to: state,
            });
        }
    }

    /// Outgoing queue of the live socket
    fn sender(shared: &Shared) -> Result<mpsc::Sender<WsMessage>> {
        match (&shared.state, &shared.outgoing) {
            (ConnectionState::Connected, Some(outgoing)) => Ok(outgoing.clone()),
            (ConnectionState::Failed, _) if shared.reconnect_attempts > 0 => {
                Err(LinkError::MaxReconnectExceeded(shared.reconnect_attempts))
            }
            _ => Err(LinkError::SendFailed("not connected".to_string())),
        }
    }

    async fn open_socket(&self, url: &str) -> Result<WebSocket> {
        let limit = self.config.connect_timeout;
        let (ws_stream, _) = tokio::time::timeout(limit, connect_async(url))
            .await
            .map_err(|_| LinkError::ConnectionTimeout(limit))?
            .map_err(|e| LinkError::SocketError(e.to_string()))?;

        Ok(ws_stream)
    }

    /// Spawn the writer, reader and heartbeat tasks for a fresh socket
    fn install(self: &Arc<Self>, shared: &mut Shared, ws_stream: WebSocket, generation: u64) {
        let (write, read) = ws_stream.split();
        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_QUEUE_SIZE);

        // The writer ends on its own once every sender is gone
        tokio::spawn(write_task(
            Arc::clone(self),
            write,
            outgoing_rx,
            generation,
        ));

        shared.reader = Some(tokio::spawn(read_task(
            Arc::clone(self),
            read,
            outgoing_tx.clone(),
            generation,
        )));
        let interval = self.config.heartbeat_interval;
        shared.heartbeat = if interval.is_zero() {
            debug!("Heartbeat disabled");
            None
        } else {
            Some(tokio::spawn(heartbeat_task(outgoing_tx.clone(), interval)))
        };
        shared.outgoing = Some(outgoing_tx);
    }

    /// Stop everything attached to the current socket
    fn teardown(&self, shared: &mut Shared) {
        if let Some(task) = shared.reconnect_task.take() {
            task.abort();
        }
        if let Some(task) = shared.reader.take() {
            task.abort();
        }
        if let Some(task) = shared.heartbeat.take() {
            task.abort();
        }
        if let Some(outgoing) = shared.outgoing.take() {
            // Best effort; the writer closes the sink when the queue drains
            let _ = outgoing.try_send(WsMessage::Close(None));
        }
        Self::fail_pending(shared, || LinkError::ConnectionClosed);
    }

    fn fail_pending(shared: &mut Shared, reason: impl Fn() -> LinkError) {
        for request in shared.pending.drain() {
            debug!(
                "Rejecting request {} after {:?}",
                request.request_id,
                request.age()
            );
            request.respond(Err(reason()));
        }
        shared.pong_waiters.clear();
    }

    /// Called by the writer when the transport rejects a frame. Requests
    /// already queued on this socket can no longer be answered.
    async fn handle_write_error(&self, generation: u64, reason: String) {
        let mut shared = self.shared.lock().await;
        if shared.generation != generation {
            return;
        }

        shared.outgoing = None;
        if let Some(task) = shared.heartbeat.take() {
            task.abort();
        }
        Self::fail_pending(&mut shared, || LinkError::SendFailed(reason.clone()));
    }

    /// Called by the reader when its socket ends
    async fn handle_close(self: &Arc<Self>, generation: u64) {
        let mut shared = self.shared.lock().await;
        if shared.generation != generation {
            debug!("Ignoring close of a replaced socket");
            return;
        }

        // This runs on the reader task itself, so detach rather than abort it
        shared.reader = None;
        if let Some(task) = shared.heartbeat.take() {
            task.abort();
        }
        shared.outgoing = None;
        Self::fail_pending(&mut shared, || LinkError::ConnectionClosed);

        if shared.state.is_connected() && shared.session_active {
            warn!("Connection lost, scheduling reconnect");
            let task = tokio::spawn(Arc::clone(self).reconnect_loop(generation));
            shared.reconnect_task = Some(task);
        } else {
            info!("Connection closed");
            self.set_state(&mut shared, ConnectionState::Disconnected);
        }
    }

    /// Retry until connected or out of attempts
    ///
    /// Boxed so the spawn cycle reader -> close -> reconnect -> reader has a
    /// nameable `Send` future type.
    fn reconnect_loop(self: Arc<Self>, generation: u64) -> BoxFuture<'static, ()> {
        async move {
            let max_attempts = self.config.reconnect.max_attempts;

            loop {
                let (url, attempt, delay) = {
                    let mut shared = self.shared.lock().await;
                    if shared.generation != generation {
                        return;
                    }

                    let url = match shared.url.clone() {
                        Some(url) if shared.reconnect_attempts < max_attempts => url,
                        _ => {
                            let attempts = shared.reconnect_attempts;
                            error!("{}", LinkError::MaxReconnectExceeded(attempts));
                            shared.reconnect_task = None;
                            self.set_state(&mut shared, ConnectionState::Failed);
                            let _ = self
                                .events
                                .send(SessionEvent::ReconnectExhausted { attempts });
                            return;
                        }
                    };

                    shared.reconnect_attempts += 1;
                    let attempt = shared.reconnect_attempts;
                    let delay = self.config.reconnect.delay_for(attempt);
                    self.set_state(
                        &mut shared,
                        ConnectionState::Reconnecting { attempt, delay },
                    );
                    (url, attempt, delay)
                };

                info!(
                    "Reconnecting in {:?} (attempt {}/{})",
                    delay, attempt, max_attempts
                );
                tokio::time::sleep(delay).await;

                {
                    let mut shared = self.shared.lock().await;
                    if shared.generation != generation {
                        return;
                    }
                    self.set_state(&mut shared, ConnectionState::Connecting);
                }

                match self.open_socket(&url).await {
                    Ok(ws_stream) => {
                        let mut shared = self.shared.lock().await;
                        if shared.generation != generation {
                            return;
                        }

                        shared.reconnect_attempts = 0;
                        shared.reconnect_task = None;
                        self.install(&mut shared, ws_stream, generation);
                        self.set_state(&mut shared, ConnectionState::Connected);
                        info!("Reconnected to {}", url);
                        return;
                    }
                    Err(e) => {
                        warn!("Reconnect attempt {} failed: {}", attempt, e);
                    }
                }
            }
        }
        .boxed()
    }

    async fn handle_text(&self, text: &str) {
        match ServerMessage::parse(text) {
            Ok(message) => self.dispatch(message).await,
            Err(e) => warn!("Dropping unparseable message: {}", e),
        }
    }

    /// Route a classified message. Handlers run after the state lock is
    /// released.
    async fn dispatch(&self, message: ServerMessage) {
        match message {
            ServerMessage::Push(push) => self.deliver_push(push).await,

            ServerMessage::Pong => {
                let waiters: Vec<_> = self.shared.lock().await.pong_waiters.drain(..).collect();
                for waiter in waiters {
                    let _ = waiter.send(());
                }
                debug!("Received pong");
            }

            ServerMessage::PollResponse { messages } => {
                debug!("Poll returned {} messages", messages.len());
                for entry in messages {
                    match ServerMessage::classify(entry) {
                        ServerMessage::Push(push) => self.deliver_push(push).await,
                        other => debug!("Ignoring non-push poll entry: {:?}", other),
                    }
                }
            }

            ServerMessage::Reply(reply) => {
                let request_id = reply.request_id;
                let resolved = self
                    .shared
                    .lock()
                    .await
                    .pending
                    .resolve(request_id, Ok(reply));
                if resolved {
                    debug!("Resolved request {}", request_id);
                } else {
                    warn!("Unexpected reply for request {}", request_id);
                }
            }

            ServerMessage::Event { name, body } => match self.handlers.event(&name).await {
                Some(handler) => handler(&body),
                None => warn!("Dropping unroutable event '{}'", name),
            },

            ServerMessage::Unrecognized(value) => {
                warn!("Dropping unroutable message: {}", value);
            }
        }
    }

    async fn deliver_push(&self, push: Push) {
        if let Some(id) = push.id() {
            let mut shared = self.shared.lock().await;
            if !shared.processed.insert(id.clone()) {
                debug!("Skipping already processed message {}", id);
                return;
            }
        }

        match self.handlers.push(push.kind()).await {
            Some(handler) => handler(&push),
            None => debug!("No handler for {:?} push", push.kind()),
        }
    }
}

/// Write task sends outgoing messages through WebSocket
async fn write_task(
    inner: Arc<Inner>,
    mut write: SplitSink<WebSocket, WsMessage>,
    mut outgoing_rx: mpsc::Receiver<WsMessage>,
    generation: u64,
) {
    while let Some(message) = outgoing_rx.recv().await {
        let closing = matches!(message, WsMessage::Close(_));
        if let Err(e) = write.send(message).await {
            error!("Failed to send message: {}", e);
            inner.handle_write_error(generation, e.to_string()).await;
            break;
        }
        if closing {
            break;
        }
    }

    let _ = write.close().await;
    debug!("Write task exiting");
}

/// Read task receives incoming messages and dispatches them
async fn read_task(
    inner: Arc<Inner>,
    mut read: SplitStream<WebSocket>,
    outgoing_tx: mpsc::Sender<WsMessage>,
    generation: u64,
) {
    while let Some(message) = read.next().await {
        match message {
            Ok(WsMessage::Text(text)) => inner.handle_text(&text).await,
            Ok(WsMessage::Binary(_)) => {
                warn!("Received unexpected binary message");
            }
            Ok(WsMessage::Ping(data)) => {
                debug!("Received WebSocket ping");
                if let Err(e) = outgoing_tx.send(WsMessage::Pong(data)).await {
                    error!("Failed to send pong: {}", e);
                    break;
                }
            }
            Ok(WsMessage::Pong(_)) => {
                debug!("Received WebSocket pong");
            }
            Ok(WsMessage::Close(_)) => {
                info!("Server closed connection");
                break;
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    drop(outgoing_tx);
    debug!("Read task exiting");
    inner.handle_close(generation).await;
}

/// Heartbeat task sends periodic ping messages
///
/// A failed send ends the heartbeat; reconnection is driven by the reader.
async fn heartbeat_task(outgoing_tx: mpsc::Sender<WsMessage>, interval: Duration) {
    let start = tokio::time::Instant::now() + interval;
    let mut ticker = tokio::time::interval_at(start, interval);

    loop {
        ticker.tick().await;

        let ping_json = match serde_json::to_string(&ClientMessage::Ping) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to encode heartbeat: {}", e);
                break;
            }
        };

        if let Err(e) = outgoing_tx.send(WsMessage::Text(ping_json.into())).await {
            error!("Failed to send heartbeat: {}", e);
            break;
        }

        debug!("Sent heartbeat");
    }

    debug!("Heartbeat task exiting");
}
