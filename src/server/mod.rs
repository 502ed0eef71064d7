//! Table server for the `tcp://` scheme.
//!
//! Serves a [`MemoryStore`] over the framed wire protocol: one tokio task
//! per connection, requests handled in order per connection.

use crate::backend::MemoryStore;
use crate::core::{Error, Result};
use crate::wire::{
    read_frame, write_frame, Request, RequestEnvelope, Response, ResponseEnvelope, WireErrorCode,
};
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7407".to_string(),
        }
    }
}

/// TCP server exposing table save/load over the wire protocol.
pub struct TableServer {
    store: Arc<MemoryStore>,
    config: ServerConfig,
}

impl Default for TableServer {
    fn default() -> Self {
        Self::new()
    }
}

impl TableServer {
    /// Create a server with a fresh store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            config: ServerConfig::default(),
        }
    }

    /// Create a server over an existing store.
    pub fn with_store(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            config: ServerConfig::default(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// The store this server persists into.
    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }

    /// Bind the configured address. Returns the listener so callers can
    /// recover the actual port when binding to port 0.
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(addr = %listener.local_addr()?, "table server listening");
        Ok(listener)
    }

    /// Accept connections until the listener fails.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!(%peer, "accepted connection");
            let store = Arc::clone(&self.store);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(store, stream).await {
                    warn!(%peer, error = %e, "connection closed with error");
                }
            });
        }
    }

    /// Bind and serve in one call.
    pub async fn run(self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }
}

async fn handle_connection(store: Arc<MemoryStore>, mut stream: TcpStream) -> Result<()> {
    loop {
        let envelope: RequestEnvelope = match read_frame(&mut stream).await {
            Ok(envelope) => envelope,
            // Clean disconnect between frames.
            Err(Error::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        };
        let response = dispatch(&store, &envelope.request);
        let reply = ResponseEnvelope::reply(&envelope, response);
        write_frame(&mut stream, &reply).await?;
    }
}

fn dispatch(store: &MemoryStore, request: &Request) -> Response {
    match request {
        Request::Ping => Response::Pong,
        Request::Save { table, entries } => match store.save(table, entries.clone()) {
            Ok(()) => Response::Saved,
            Err(e) => Response::Error {
                code: WireErrorCode::Internal,
                key: None,
                message: e.to_string(),
            },
        },
        Request::Load { table, keys } => match store.load(table, keys) {
            Ok(tensors) => Response::Loaded { tensors },
            Err(Error::KeyNotFound { key, .. }) => Response::Error {
                code: WireErrorCode::NotFound,
                key: Some(key.clone()),
                message: format!("key not found: {}", key),
            },
            Err(e) => Response::Error {
                code: WireErrorCode::Internal,
                key: None,
                message: e.to_string(),
            },
        },
    }
}
