//! Remote table backend over TCP.
//!
//! Speaks the crate's framed bincode protocol against a
//! [`TableServer`](crate::server::TableServer). One connection per backend
//! handle; requests are serialized over it and correlated by envelope id.
//! A call abandoned mid-roundtrip (a client-side timeout drops the future
//! between write and read) leaves unread bytes on the stream, so the
//! connection is discarded and the next call reconnects.

use crate::backend::{BackendKind, Entry, TableBackend};
use crate::core::{Error, Result};
use crate::tensor::Tensor;
use crate::wire::{
    read_frame, write_frame, Request, RequestEnvelope, Response, ResponseEnvelope, WireErrorCode,
};
use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

struct Connection {
    stream: TcpStream,
    /// Set while a roundtrip is on the stream, cleared only once the
    /// matching response has been read. If still set when the next call
    /// acquires the lock, the previous call was dropped mid-roundtrip and
    /// the stream contents are unknown.
    in_flight: bool,
}

/// TCP client for a remote table server.
pub struct RemoteBackend {
    addr: String,
    conn: Mutex<Option<Connection>>,
}

impl RemoteBackend {
    /// Connect to a table server. The connection is established eagerly;
    /// an unreachable address fails construction.
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = Self::open(addr).await?;
        debug!(addr, "connected to table server");
        Ok(Self {
            addr: addr.to_string(),
            conn: Mutex::new(Some(Connection {
                stream,
                in_flight: false,
            })),
        })
    }

    /// The server address this handle is bound to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn open(addr: &str) -> Result<TcpStream> {
        TcpStream::connect(addr)
            .await
            .map_err(|e| Error::ConnectionFailed {
                addr: addr.to_string(),
                reason: e.to_string(),
            })
    }

    async fn roundtrip(&self, request: Request) -> Result<Response> {
        let mut guard = self.conn.lock().await;
        if guard.as_ref().map_or(true, |c| c.in_flight) {
            debug!(addr = %self.addr, "discarding desynchronized connection, reconnecting");
            *guard = None;
            let stream = Self::open(&self.addr).await?;
            *guard = Some(Connection {
                stream,
                in_flight: false,
            });
        }
        let conn = match guard.as_mut() {
            Some(conn) => conn,
            None => {
                return Err(Error::ConnectionFailed {
                    addr: self.addr.clone(),
                    reason: "connection unavailable".to_string(),
                })
            }
        };

        conn.in_flight = true;
        let envelope = RequestEnvelope::new(request);
        write_frame(&mut conn.stream, &envelope).await?;
        let reply: ResponseEnvelope = read_frame(&mut conn.stream).await?;
        if reply.id != envelope.id {
            // Stream is off by one; leave in_flight set so the next call
            // reconnects instead of reading another stale envelope.
            return Err(Error::ProtocolError(format!(
                "response id {} does not match request id {}",
                reply.id, envelope.id
            )));
        }
        conn.in_flight = false;
        Ok(reply.response)
    }

    fn rehydrate_error(
        table: &str,
        code: WireErrorCode,
        key: Option<String>,
        message: String,
    ) -> Error {
        match (code, key) {
            (WireErrorCode::NotFound, Some(key)) => Error::KeyNotFound {
                table: table.to_string(),
                key,
            },
            _ => Error::Backend {
                table: table.to_string(),
                reason: message,
            },
        }
    }
}

#[async_trait]
impl TableBackend for RemoteBackend {
    async fn save(&self, table: &str, entries: Vec<Entry>) -> Result<()> {
        debug!(table, entries = entries.len(), "remote save");
        let response = self
            .roundtrip(Request::Save {
                table: table.to_string(),
                entries,
            })
            .await?;
        match response {
            Response::Saved => Ok(()),
            Response::Error { code, key, message } => {
                Err(Self::rehydrate_error(table, code, key, message))
            }
            other => Err(Error::ProtocolError(format!(
                "unexpected response to save: {:?}",
                other
            ))),
        }
    }

    async fn load(&self, table: &str, keys: &[String]) -> Result<Vec<Tensor>> {
        debug!(table, keys = keys.len(), "remote load");
        let response = self
            .roundtrip(Request::Load {
                table: table.to_string(),
                keys: keys.to_vec(),
            })
            .await?;
        match response {
            Response::Loaded { tensors } => {
                if tensors.len() != keys.len() {
                    return Err(Error::ProtocolError(format!(
                        "requested {} keys, server returned {} tensors",
                        keys.len(),
                        tensors.len()
                    )));
                }
                Ok(tensors)
            }
            Response::Error { code, key, message } => {
                Err(Self::rehydrate_error(table, code, key, message))
            }
            other => Err(Error::ProtocolError(format!(
                "unexpected response to load: {:?}",
                other
            ))),
        }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn health_check(&self) -> Result<bool> {
        match self.roundtrip(Request::Ping).await? {
            Response::Pong => Ok(true),
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_refused() {
        // Nothing listens on the discard port.
        let result = RemoteBackend::connect("127.0.0.1:9").await;
        match result {
            Err(Error::ConnectionFailed { addr, .. }) => assert_eq!(addr, "127.0.0.1:9"),
            other => panic!("unexpected: {:?}", other.err().map(|e| e.to_string())),
        }
    }

    #[tokio::test]
    async fn test_reconnects_after_abandoned_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            // First connection: swallow the request and never respond,
            // keeping the socket open so the client sees no close.
            let (mut first, _) = listener.accept().await.unwrap();
            let _stalled: RequestEnvelope = read_frame(&mut first).await.unwrap();

            // Second connection: behave like a normal server.
            let (mut second, _) = listener.accept().await.unwrap();
            loop {
                let envelope: RequestEnvelope = match read_frame(&mut second).await {
                    Ok(envelope) => envelope,
                    Err(_) => return,
                };
                let reply = ResponseEnvelope::reply(&envelope, Response::Saved);
                write_frame(&mut second, &reply).await.unwrap();
            }
        });

        let backend = RemoteBackend::connect(&addr).await.unwrap();
        let entry = Entry::new("k", Tensor::from_f32(&[1], &[1.0]).unwrap());

        // Abandon the first call mid-roundtrip, as a client timeout does.
        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            backend.save("t", vec![entry.clone()]),
        )
        .await;
        assert!(abandoned.is_err());

        // The stale connection must not be reused: the next call reconnects
        // and completes instead of reading the stranded response slot.
        backend.save("t", vec![entry]).await.unwrap();
    }
}
