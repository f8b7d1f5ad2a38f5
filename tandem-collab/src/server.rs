//! WebSocket collaboration server plus the create/join HTTP endpoints.
//!
//! Architecture:
//! ```text
//! HTTP /create, /join ──► DocumentDirectory / UserDirectory (joining set)
//!
//! Client A ──┐                          ┌──► Document (Mutex<Buffer>)
//!             ├── InstructionDispatcher ─┤
//! Client B ──┘          │               └──► SessionRegistry
//!                       ▼
//!                  Broadcaster ──► outbound queue ──► writer task ──► peers
//! ```
//!
//! Each connection runs a reader loop feeding the dispatcher and a writer
//! task draining the connection's outbound queue.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tandem_core::{DocumentDirectory, UserDirectory};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

use crate::broadcast::BroadcastStats;
use crate::dispatcher::{Flow, InstructionDispatcher};
use crate::http::{self, HttpState};
use crate::session::{Connection, Outbound, SessionRegistry};

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// WebSocket bind address
    pub ws_addr: String,
    /// HTTP bind address for the create/join endpoints
    pub http_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_addr: "127.0.0.1:9090".to_string(),
            http_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `TANDEM_WS_ADDR` and `TANDEM_HTTP_ADDR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            ws_addr: lookup("TANDEM_WS_ADDR").unwrap_or(defaults.ws_addr),
            http_addr: lookup("TANDEM_HTTP_ADDR").unwrap_or(defaults.http_addr),
        }
    }
}

/// Server statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub total_messages: u64,
    pub broadcast: BroadcastStats,
}

#[derive(Default)]
struct AtomicServerStats {
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    total_messages: AtomicU64,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// The collaboration server. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct CollabServer {
    config: ServerConfig,
    documents: Arc<DocumentDirectory>,
    users: Arc<UserDirectory>,
    dispatcher: Arc<InstructionDispatcher>,
    stats: Arc<AtomicServerStats>,
}

impl CollabServer {
    pub fn new(config: ServerConfig) -> Self {
        let documents = Arc::new(DocumentDirectory::new());
        let users = Arc::new(UserDirectory::new());
        let sessions = Arc::new(SessionRegistry::new());
        let dispatcher = Arc::new(InstructionDispatcher::new(
            documents.clone(),
            users.clone(),
            sessions,
        ));
        Self {
            config,
            documents,
            users,
            dispatcher,
            stats: Arc::new(AtomicServerStats::default()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn documents(&self) -> &Arc<DocumentDirectory> {
        &self.documents
    }

    pub fn users(&self) -> &Arc<UserDirectory> {
        &self.users
    }

    pub fn dispatcher(&self) -> &Arc<InstructionDispatcher> {
        &self.dispatcher
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            total_connections: self.stats.total_connections.load(Ordering::Relaxed),
            active_connections: self.stats.active_connections.load(Ordering::Relaxed),
            total_messages: self.stats.total_messages.load(Ordering::Relaxed),
            broadcast: self.dispatcher.stats(),
        }
    }

    /// Bind both listeners and serve until one of them fails.
    pub async fn run(&self) -> Result<(), ServerError> {
        let ws = TcpListener::bind(&self.config.ws_addr).await?;
        let http = TcpListener::bind(&self.config.http_addr).await?;
        log::info!("WebSocket server listening on {}", self.config.ws_addr);
        log::info!("HTTP server listening on {}", self.config.http_addr);

        tokio::try_join!(self.serve_websocket(ws), self.serve_http(http))?;
        Ok(())
    }

    /// Accept WebSocket connections on an already bound listener.
    pub async fn serve_websocket(&self, listener: TcpListener) -> Result<(), ServerError> {
        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("New TCP connection from {addr}");

            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream, addr).await {
                    log::error!("Connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Serve the create/join endpoints on an already bound listener.
    pub async fn serve_http(&self, listener: TcpListener) -> Result<(), ServerError> {
        let state = HttpState::new(self.documents.clone(), self.users.clone());
        axum::serve(listener, http::router(state)).await?;
        Ok(())
    }

    async fn handle_connection(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
    ) -> Result<(), ServerError> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let (conn, mut outbound) = Connection::channel();
        let id = conn.id();
        self.dispatcher.open(conn.clone());
        self.stats.total_connections.fetch_add(1, Ordering::Relaxed);
        self.stats.active_connections.fetch_add(1, Ordering::Relaxed);
        log::info!("WebSocket connection {id} established from {addr}");

        let writer = tokio::spawn(async move {
            while let Some(item) = outbound.recv().await {
                let result = match item {
                    Outbound::Text(text) => ws_sender.send(Message::text(text)).await,
                    Outbound::Close => {
                        let _ = ws_sender.send(Message::Close(None)).await;
                        break;
                    }
                };
                if let Err(e) = result {
                    log::debug!("Writer for {id} stopped: {e}");
                    break;
                }
            }
        });

        while let Some(msg) = ws_receiver.next().await {
            let flow = match msg {
                Ok(Message::Text(text)) => {
                    self.stats.total_messages.fetch_add(1, Ordering::Relaxed);
                    self.dispatcher.handle_text(id, text.as_str())
                }
                Ok(Message::Binary(_)) => {
                    log::warn!("Binary frame from {addr} refused");
                    self.dispatcher.refuse(&conn, "Binary frames are not supported")
                }
                Ok(Message::Close(_)) => {
                    log::info!("Connection {id} closed by {addr}");
                    Flow::Close
                }
                // Ping/Pong are answered by tungstenite on the next write
                Ok(_) => Flow::Continue,
                Err(e) => {
                    log::error!("WebSocket error from {addr}: {e}");
                    Flow::Close
                }
            };
            if flow == Flow::Close {
                break;
            }
        }

        self.dispatcher.close(id);
        conn.close();
        drop(conn);
        let _ = writer.await;
        self.stats.active_connections.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }
}
