//! Storage backends for dense tables.
//!
//! A backend persists batches of (key, tensor) entries under named tables.
//! Implementations are selected by URL scheme at client construction:
//! - `memory://<namespace>` - process-local store, shared per namespace
//! - `tcp://<host:port>` - remote table server over the wire protocol

pub mod memory;
pub mod remote;

pub use memory::{MemoryBackend, MemoryStore};
pub use remote::RemoteBackend;

use crate::core::{Error, Result};
use crate::tensor::Tensor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Backend type identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// Process-local in-memory store
    Memory,
    /// Remote table server over TCP
    Remote,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Remote => write!(f, "remote"),
        }
    }
}

/// A (key, tensor) pair transferred in one save batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entry {
    /// Key identifying the tensor within its table
    pub key: String,
    /// The tensor value
    pub tensor: Tensor,
}

impl Entry {
    /// Create an entry.
    pub fn new(key: &str, tensor: Tensor) -> Self {
        Self {
            key: key.to_string(),
            tensor,
        }
    }
}

/// Core trait for table backends.
///
/// Batch semantics: `load` is all-or-nothing - a missing key fails the whole
/// call and returns no values. Whether `save` is atomic across keys is a
/// property of the backend, not of this contract.
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Persist a batch of entries under a table. Last write wins per key.
    async fn save(&self, table: &str, entries: Vec<Entry>) -> Result<()>;

    /// Fetch the tensors stored under the given keys, in key order.
    ///
    /// Fails with [`Error::KeyNotFound`] if any key was never saved.
    async fn load(&self, table: &str, keys: &[String]) -> Result<Vec<Tensor>>;

    /// Get the backend kind.
    fn kind(&self) -> BackendKind;

    /// Health check for the backend.
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Resolve a backend URL and connect to it.
///
/// The URL must have the form `scheme://config`; the scheme selects the
/// implementation. Connection is eager: a `tcp://` URL that cannot be
/// reached fails here, not on first use.
pub async fn connect(url: &str) -> Result<Arc<dyn TableBackend>> {
    let (scheme, config) = url
        .split_once("://")
        .ok_or_else(|| Error::InvalidUrl(url.to_string()))?;

    match scheme {
        "memory" => Ok(Arc::new(MemoryBackend::open(config)) as Arc<dyn TableBackend>),
        "tcp" => {
            let backend = RemoteBackend::connect(config).await?;
            Ok(Arc::new(backend) as Arc<dyn TableBackend>)
        }
        other => Err(Error::UnknownScheme(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_display() {
        assert_eq!(BackendKind::Memory.to_string(), "memory");
        assert_eq!(BackendKind::Remote.to_string(), "remote");
    }

    #[test]
    fn test_connect_rejects_missing_separator() {
        let result = tokio_test::block_on(connect("memory"));
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        let result = connect("carrier-pigeon://coop").await;
        match result {
            Err(Error::UnknownScheme(scheme)) => assert_eq!(scheme, "carrier-pigeon"),
            other => panic!("unexpected: {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_connect_memory() {
        let backend = connect("memory://").await.unwrap();
        assert_eq!(backend.kind(), BackendKind::Memory);
        assert!(backend.health_check().await.unwrap());
    }
}
