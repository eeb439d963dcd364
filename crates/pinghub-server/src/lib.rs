//! PingHub chat server.
//!
//! Real-time team chat over QUIC: one always-on global room, member-gated
//! group rooms, reactions, single-slot pins, typing indicators, and live
//! presence.
//!
//! # Architecture
//!
//! The [`Router`] follows the sans-IO pattern: it consumes
//! [`RouterEvent`]s and returns [`RouterAction`]s without performing any
//! I/O itself. [`Server`] is the production runtime that feeds it from
//! Quinn QUIC connections and executes the actions with Tokio.
//!
//! # Components
//!
//! - [`Router`]: action-based orchestrator (pure logic, no I/O)
//! - [`Server`]: production runtime that executes router actions
//! - [`QuinnTransport`]: QUIC transport via Quinn
//! - [`SystemEnv`]: production environment (real time, crypto RNG)
//! - [`MemoryStore`] / [`RedbStore`]: message and group persistence

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod env;
mod error;
mod group_directory;
mod message_store;
mod policy;
pub mod presence;
mod registry;
mod router;
mod server_error;
pub mod storage;
mod system_env;
mod transport;

use std::{collections::HashMap, sync::Arc};

use bytes::BytesMut;
pub use env::Environment;
pub use error::ServerError;
pub use group_directory::GroupDirectory;
pub use message_store::{MessageStore, NewMessage};
use pinghub_proto::{ClientEvent, LEN_PREFIX_SIZE, decode_frame, encode_frame, payload_len};
pub use policy::NewcomerPolicy;
pub use registry::{BindError, Identity, SessionInfo, SessionRegistry};
pub use router::{LogLevel, Router, RouterAction, RouterConfig, RouterEvent};
pub use server_error::{EventError, RouterError};
pub use storage::{FlakyStore, MemoryStore, RedbStore, Store, StoreError};
pub use system_env::SystemEnv;
use tokio::sync::RwLock;
pub use transport::{QuinnConnection, QuinnTransport};

/// Shared state for all connections.
///
/// Holds the connection and stream maps for message delivery.
struct SharedState {
    /// Session ID → QUIC connection (for closing)
    connections: RwLock<HashMap<u64, QuinnConnection>>,
    /// Session ID → persistent outbound stream.
    /// All events to a client go through this single stream, preserving
    /// delivery order.
    outbound_streams: RwLock<HashMap<u64, tokio::sync::Mutex<quinn::SendStream>>>,
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g. "0.0.0.0:4433")
    pub bind_address: String,
    /// Path to TLS certificate (PEM format)
    pub cert_path: Option<String>,
    /// Path to TLS private key (PEM format)
    pub key_path: Option<String>,
    /// Router configuration (limits, newcomer policy)
    pub router: RouterConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4433".to_string(),
            cert_path: None,
            key_path: None,
            router: RouterConfig::default(),
        }
    }
}

/// Production PingHub server.
///
/// Wraps a [`Router`] with Quinn QUIC transport and the system environment,
/// generic over the storage backend.
pub struct Server<S: Store> {
    router: Router<SystemEnv, S>,
    transport: QuinnTransport,
    env: SystemEnv,
}

impl<S: Store> Server<S> {
    /// Create and bind a new server over the given storage backend.
    pub fn bind(config: ServerRuntimeConfig, store: S) -> Result<Self, ServerError> {
        let env = SystemEnv::new();
        let router = Router::new(env.clone(), store, config.router.clone());

        let transport =
            QuinnTransport::bind(&config.bind_address, config.cert_path, config.key_path)?;

        Ok(Self { router, transport, env })
    }

    /// Run the server, accepting connections and processing frames.
    ///
    /// Runs until the endpoint is closed or an accept error occurs.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);

        let env = self.env;
        let router = Arc::new(tokio::sync::Mutex::new(self.router));
        let shared = Arc::new(SharedState {
            connections: RwLock::new(HashMap::new()),
            outbound_streams: RwLock::new(HashMap::new()),
        });

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let router = Arc::clone(&router);
                    let shared = Arc::clone(&shared);
                    let env = env.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, router, shared, &env).await {
                            tracing::error!("Connection error: {}", e);
                        }
                    });
                },
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                },
            }
        }
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.transport.local_addr()
    }
}

/// Handle a single QUIC connection.
async fn handle_connection<S: Store>(
    conn: QuinnConnection,
    router: Arc<tokio::sync::Mutex<Router<SystemEnv, S>>>,
    shared: Arc<SharedState>,
    env: &SystemEnv,
) -> Result<(), ServerError> {
    let session_id = {
        let mut buf = [0u8; 8];
        env.random_bytes(&mut buf);
        u64::from_le_bytes(buf)
    };

    tracing::debug!("New connection {} from {}", session_id, conn.remote_addr());

    let outbound_stream = conn
        .open_uni()
        .await
        .map_err(|e| ServerError::Internal(format!("failed to open outbound stream: {e}")))?;

    {
        let mut connections = shared.connections.write().await;
        connections.insert(session_id, conn.clone());
    }

    {
        let mut streams = shared.outbound_streams.write().await;
        streams.insert(session_id, tokio::sync::Mutex::new(outbound_stream));
    }

    {
        let mut router = router.lock().await;
        let actions = router.process_event(RouterEvent::ConnectionOpened { session_id })?;
        execute_actions(&router, actions, &shared).await?;
    }

    loop {
        match conn.accept_bi().await {
            Ok((send, recv)) => {
                let router = Arc::clone(&router);
                let shared = Arc::clone(&shared);

                tokio::spawn(async move {
                    if let Err(e) = handle_stream(session_id, send, recv, router, &shared).await {
                        tracing::debug!("Stream error: {}", e);
                    }
                });
            },
            Err(e) => {
                tracing::debug!("Connection closed: {}", e);
                break;
            },
        }
    }

    {
        let mut connections = shared.connections.write().await;
        connections.remove(&session_id);
    }

    {
        let mut streams = shared.outbound_streams.write().await;
        streams.remove(&session_id);
    }

    {
        let mut router = router.lock().await;
        let actions = router.process_event(RouterEvent::ConnectionClosed {
            session_id,
            reason: "connection closed".to_string(),
        })?;
        execute_actions(&router, actions, &shared).await?;
    }

    Ok(())
}

/// Handle a single bidirectional stream carrying client event frames.
async fn handle_stream<S: Store>(
    session_id: u64,
    send: quinn::SendStream,
    mut recv: quinn::RecvStream,
    router: Arc<tokio::sync::Mutex<Router<SystemEnv, S>>>,
    shared: &Arc<SharedState>,
) -> Result<(), ServerError> {
    // Replies go over the persistent outbound stream, not this one.
    drop(send);

    let mut buf = BytesMut::with_capacity(8192);

    loop {
        buf.clear();
        buf.resize(LEN_PREFIX_SIZE, 0);

        match recv.read_exact(&mut buf[..LEN_PREFIX_SIZE]).await {
            Ok(()) => {},
            Err(e) => {
                tracing::debug!("Read error: {}", e);
                break;
            },
        }

        let payload_size = match payload_len(&buf) {
            Ok(Some(size)) => size,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Invalid frame prefix: {}", e);
                break;
            },
        };

        if payload_size > 0 {
            buf.resize(LEN_PREFIX_SIZE + payload_size, 0);
            if let Err(e) = recv.read_exact(&mut buf[LEN_PREFIX_SIZE..]).await {
                tracing::debug!("Payload read error: {}", e);
                break;
            }
        }

        let event = match decode_frame::<ClientEvent>(&buf) {
            Ok((event, _)) => event,
            Err(e) => {
                tracing::warn!("Frame decode error: {}", e);
                break;
            },
        };

        let mut router = router.lock().await;
        match router.process_event(RouterEvent::EventReceived { session_id, event }) {
            Ok(actions) => execute_actions(&router, actions, shared).await?,
            Err(e) => {
                tracing::warn!("Event processing error: {}", e);
            },
        }
    }

    Ok(())
}

/// Execute router actions against the live connections.
///
/// Runs with the caller's router lock held, so a slow peer write stalls
/// event processing until it completes. Decoupling would need a per-session
/// send buffer between the router and the streams.
async fn execute_actions<S: Store>(
    router: &Router<SystemEnv, S>,
    actions: Vec<RouterAction>,
    shared: &SharedState,
) -> Result<(), ServerError> {
    for action in actions {
        match action {
            RouterAction::SendToSession { session_id, event } => {
                let frame = encode_frame(&event)?;

                let streams = shared.outbound_streams.read().await;
                if let Some(stream_mutex) = streams.get(&session_id) {
                    let mut stream = stream_mutex.lock().await;
                    if let Err(e) = stream.write_all(&frame).await {
                        tracing::warn!("SendToSession write failed for {}: {}", session_id, e);
                    }
                } else {
                    tracing::warn!("SendToSession: session {} not found", session_id);
                }
            },

            RouterAction::BroadcastAll { event, exclude } => {
                let frame = encode_frame(&event)?;

                let streams = shared.outbound_streams.read().await;
                for (session_id, stream_mutex) in streams.iter() {
                    if Some(*session_id) == exclude {
                        continue;
                    }
                    let mut stream = stream_mutex.lock().await;
                    if let Err(e) = stream.write_all(&frame).await {
                        tracing::warn!("BroadcastAll write failed for {}: {}", session_id, e);
                    }
                }
            },

            RouterAction::BroadcastRoom { room, event, exclude } => {
                let sessions = router.sessions_in_room(room);
                let frame = encode_frame(&event)?;

                let streams = shared.outbound_streams.read().await;
                for session_id in sessions {
                    if Some(session_id) == exclude {
                        continue;
                    }
                    if let Some(stream_mutex) = streams.get(&session_id) {
                        let mut stream = stream_mutex.lock().await;
                        if let Err(e) = stream.write_all(&frame).await {
                            tracing::warn!(
                                "BroadcastRoom write failed for {}: {}",
                                session_id,
                                e
                            );
                        }
                    }
                }
            },

            RouterAction::CloseConnection { session_id, reason } => {
                tracing::info!("Closing connection {}: {}", session_id, reason);
                let mut connections = shared.connections.write().await;
                if let Some(conn) = connections.remove(&session_id) {
                    conn.close(0u32.into(), reason.as_bytes());
                }
            },

            RouterAction::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
        }
    }

    Ok(())
}
