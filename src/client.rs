use crate::error::SendError;
use crate::types;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

mod config;
mod consts;
mod stats;
mod utils;

pub use config::{Config, ConfigBuilder};
pub use stats::Stats;

pub type ClientTx = mpsc::Sender<types::ClientEvent>;
type ClientRx = mpsc::Receiver<types::ClientEvent>;
type ServerTx = broadcast::Sender<types::ServerEvent>;
pub type ServerRx = broadcast::Receiver<types::ServerEvent>;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The outbound half of a duplex channel, as seen by the dispatch pipeline.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    fn is_connected(&self) -> bool;

    /// Queues an event. Fails locally, without touching the wire, when the
    /// channel is down.
    fn send(&self, event: types::ClientEvent) -> Result<(), SendError>;

    /// Tears the channel down. No events are delivered afterwards.
    fn close(&self);
}

/// Connection manager: owns the websocket, reconnects on a fixed schedule and
/// turns the socket lifecycle into [`types::ServerEvent`]s.
pub struct Client {
    config: Arc<Config>,
    c_tx: Option<ClientTx>,
    s_tx: ServerTx,
    connected: Arc<AtomicBool>,
    stats: Arc<Mutex<Stats>>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Client {
    pub fn new(config: Config) -> Self {
        let (s_tx, _) = broadcast::channel(config.capacity());
        Self {
            config: Arc::new(config),
            c_tx: None,
            s_tx,
            connected: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(Mutex::new(Stats::new())),
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    /// Subscribe before calling [`Client::connect`] to observe the first
    /// `Connected` event.
    pub fn server_events(&self) -> ServerRx {
        self.s_tx.subscribe()
    }

    /// Spawns the connection loop. Returns immediately; progress is reported
    /// through [`Client::server_events`].
    pub fn connect(&mut self) -> anyhow::Result<()> {
        if self.c_tx.is_some() {
            return Err(anyhow::anyhow!("already connected"));
        }
        if self.cancel.is_cancelled() {
            return Err(anyhow::anyhow!("client has been closed"));
        }
        if self.config.endpoints().is_empty() {
            return Err(anyhow::anyhow!("no endpoint configured"));
        }

        let (c_tx, c_rx) = mpsc::channel(self.config.capacity());
        self.c_tx = Some(c_tx);

        let connection = ConnectionLoop {
            config: self.config.clone(),
            s_tx: self.s_tx.clone(),
            connected: self.connected.clone(),
            stats: self.stats.clone(),
            cancel: self.cancel.clone(),
        };
        self.handle = Some(tokio::spawn(connection.run(c_rx)));
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> anyhow::Result<Stats> {
        if let Ok(stats_guard) = self.stats.lock() {
            Ok(stats_guard.clone())
        } else {
            Err(anyhow::anyhow!("failed to get stats"))
        }
    }

    /// Closes the channel and waits for the connection loop to finish.
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!("connection task failed: {}", e);
            }
        }
    }
}

impl Transport for Client {
    fn is_connected(&self) -> bool {
        Client::is_connected(self)
    }

    fn send(&self, event: types::ClientEvent) -> Result<(), SendError> {
        if !self.is_connected() {
            return Err(SendError::NotConnected);
        }
        match self.c_tx {
            Some(ref tx) => tx.try_send(event).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SendError::Full,
                mpsc::error::TrySendError::Closed(_) => SendError::Closed,
            }),
            None => Err(SendError::NotConnected),
        }
    }

    fn close(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("closing connection");
        }
        self.cancel.cancel();
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// How a live session on one socket ended.
enum Ended {
    Cancelled,
    Lost(Option<String>),
}

struct ConnectionLoop {
    config: Arc<Config>,
    s_tx: ServerTx,
    connected: Arc<AtomicBool>,
    stats: Arc<Mutex<Stats>>,
    cancel: CancellationToken,
}

impl ConnectionLoop {
    async fn run(self, mut c_rx: ClientRx) {
        let mut failures: u32 = 0;

        while !self.cancel.is_cancelled() {
            let ws_stream = match self.open().await {
                Ok(ws_stream) => ws_stream,
                Err(message) => {
                    failures += 1;
                    self.update_stats(Stats::record_connect_error);
                    tracing::warn!("connection attempt {} failed: {}", failures, message);
                    self.emit(types::ServerEvent::ConnectError { message });

                    if failures > self.config.reconnect_attempts() {
                        tracing::warn!(
                            "giving up after {} failed attempts; connection stays down",
                            failures
                        );
                        break;
                    }
                    if !self.pause().await {
                        break;
                    }
                    continue;
                }
            };

            failures = 0;
            self.connected.store(true, Ordering::SeqCst);
            self.update_stats(Stats::record_connect);
            tracing::info!("connected");
            self.emit(types::ServerEvent::Connected);

            let ended = self.pump(ws_stream, &mut c_rx).await;
            self.connected.store(false, Ordering::SeqCst);

            match ended {
                Ended::Cancelled => break,
                Ended::Lost(reason) => {
                    self.update_stats(Stats::record_disconnect);
                    tracing::info!("connection lost: {:?}", reason);
                    self.emit(types::ServerEvent::Disconnected { reason });
                    if !self.pause().await {
                        break;
                    }
                }
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        tracing::debug!("connection loop finished");
    }

    /// Tries every endpoint in order and returns the first open socket.
    async fn open(&self) -> Result<WsStream, String> {
        let mut last_error = String::from("no endpoint configured");
        for endpoint in self.config.endpoints() {
            let request = match utils::build_request(endpoint, &self.config) {
                Ok(request) => request,
                Err(e) => {
                    last_error = format!("{}: {}", endpoint, e);
                    continue;
                }
            };
            let attempt = tokio::time::timeout(
                self.config.connect_timeout(),
                tokio_tungstenite::connect_async(request),
            );
            match attempt.await {
                Ok(Ok((ws_stream, _))) => {
                    tracing::debug!("opened {}", endpoint);
                    return Ok(ws_stream);
                }
                Ok(Err(e)) => last_error = format!("{}: {}", endpoint, e),
                Err(_) => last_error = format!("{}: connect timed out", endpoint),
            }
            tracing::debug!("endpoint unavailable, trying next: {}", last_error);
        }
        Err(last_error)
    }

    /// Waits the fixed reconnect delay. Returns `false` if cancelled meanwhile.
    async fn pause(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.reconnect_delay()) => true,
        }
    }

    async fn pump(&self, ws_stream: WsStream, c_rx: &mut ClientRx) -> Ended {
        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        tracing::debug!("failed to send close frame: {}", e);
                    }
                    return Ended::Cancelled;
                }
                event = c_rx.recv() => {
                    let Some(event) = event else {
                        return Ended::Cancelled;
                    };
                    match serde_json::to_string(&event) {
                        Ok(text) => {
                            if let Err(e) = write.send(Message::Text(text)).await {
                                tracing::error!("failed to send message: {}", e);
                                return Ended::Lost(Some(e.to_string()));
                            }
                            self.update_stats(Stats::record_sent);
                        }
                        Err(e) => {
                            tracing::error!("failed to serialize event: {}", e);
                        }
                    }
                }
                message = read.next() => {
                    let message = match message {
                        None => return Ended::Lost(None),
                        Some(Err(e)) => {
                            tracing::error!("failed to read message: {}", e);
                            return Ended::Lost(Some(e.to_string()));
                        }
                        Some(Ok(message)) => message,
                    };
                    match message {
                        Message::Text(text) => self.handle_text(&text),
                        Message::Binary(bin) => {
                            tracing::warn!("unexpected binary message: {} bytes", bin.len());
                        }
                        Message::Close(reason) => {
                            tracing::info!("connection closed: {:?}", reason);
                            return Ended::Lost(reason.map(|v| format!("{:?}", v)));
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    fn handle_text(&self, text: &str) {
        match types::ServerEvent::from_frame(text) {
            Ok(event) => {
                tracing::debug!("received message: {}", event.name());
                if matches!(
                    event,
                    types::ServerEvent::Connected
                        | types::ServerEvent::Disconnected { .. }
                        | types::ServerEvent::ConnectError { .. }
                ) {
                    tracing::warn!("ignoring lifecycle event sent by the server: {}", event.name());
                    return;
                }
                self.update_stats(Stats::record_received);
                self.emit(event);
            }
            Err(e) => {
                let json = serde_json::from_str::<serde_json::Value>(text);
                json.map(|json| {
                    tracing::error!("failed to deserialize event: {}, json=> {:?}", e, json);
                })
                .unwrap_or_else(|_| {
                    tracing::error!("failed to deserialize event: {}, text=> {:?}", e, text);
                });
            }
        }
    }

    fn emit(&self, event: types::ServerEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        if let Err(e) = self.s_tx.send(event) {
            tracing::debug!("no subscriber for event: {}", e.0.name());
        }
    }

    fn update_stats(&self, update: impl FnOnce(&mut Stats)) {
        if let Ok(mut stats_guard) = self.stats.lock() {
            update(&mut stats_guard);
        } else {
            tracing::error!("failed to update stats");
        }
    }
}
