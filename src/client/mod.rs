//! Dense parameter-server client.
//!
//! A [`DensePs`] binds one logical table on one backend at construction and
//! exposes batch save/load of named tensors. The client owns no persistence:
//! it marshals batches, enforces the argument contract, and surfaces backend
//! failures unchanged in kind with table/key context attached.

use crate::backend::{self, Entry, TableBackend};
use crate::core::{Error, Result};
use crate::tensor::Tensor;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Per-call time bound for save/load. `None` disables the bound.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Client statistics.
#[derive(Clone, Debug, Default)]
pub struct ClientStats {
    pub total_save_calls: u64,
    pub total_load_calls: u64,
    pub total_keys_saved: u64,
    pub total_keys_loaded: u64,
}

/// Client for one dense table on one backend.
///
/// The (table, backend) binding is fixed at construction. Calls are
/// blocking from the caller's perspective: each save/load is awaited to
/// completion and never surfaces partial results.
pub struct DensePs {
    table_name: String,
    backend: Arc<dyn TableBackend>,
    config: ClientConfig,
    stats: ClientStats,
}

impl DensePs {
    /// Create a client for `table_name` against the backend selected by
    /// `url` (`memory://<namespace>` or `tcp://<host:port>`).
    ///
    /// The backend connection is established eagerly; an unreachable or
    /// unrecognized URL fails here.
    pub async fn new(table_name: &str, url: &str) -> Result<Self> {
        if table_name.is_empty() {
            return Err(Error::EmptyTableName);
        }
        let backend = backend::connect(url).await?;
        debug!(table = table_name, backend = %backend.kind(), "created client");
        Ok(Self {
            table_name: table_name.to_string(),
            backend,
            config: ClientConfig::default(),
            stats: ClientStats::default(),
        })
    }

    /// Create a client over an already-constructed backend.
    pub fn with_backend(table_name: &str, backend: Arc<dyn TableBackend>) -> Result<Self> {
        if table_name.is_empty() {
            return Err(Error::EmptyTableName);
        }
        Ok(Self {
            table_name: table_name.to_string(),
            backend,
            config: ClientConfig::default(),
            stats: ClientStats::default(),
        })
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// The table this client is bound to.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Get statistics.
    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    /// Persist `tensors[i]` under `keys[i]` for every i.
    ///
    /// Requires `keys.len() == tensors.len()`; a mismatch fails before any
    /// backend I/O. An empty batch is a no-op. Last write wins per key
    /// across calls; atomicity across keys within one call is a property of
    /// the backend, not guaranteed by the client.
    pub async fn save(&mut self, keys: &[&str], tensors: &[Tensor]) -> Result<()> {
        if keys.len() != tensors.len() {
            return Err(Error::LengthMismatch {
                keys: keys.len(),
                tensors: tensors.len(),
            });
        }
        if keys.is_empty() {
            return Ok(());
        }

        let entries: Vec<Entry> = keys
            .iter()
            .zip(tensors.iter())
            .map(|(key, tensor)| Entry::new(key, tensor.clone()))
            .collect();

        self.bounded(self.backend.save(&self.table_name, entries))
            .await?;
        self.stats.total_save_calls += 1;
        self.stats.total_keys_saved += keys.len() as u64;
        debug!(table = %self.table_name, keys = keys.len(), "saved batch");
        Ok(())
    }

    /// Fetch the value saved under `keys[i]` and overwrite `tensors[i]`
    /// in place for every i.
    ///
    /// Requires `keys.len() == tensors.len()`; a mismatch fails before any
    /// backend I/O. Destination tensors must already match the stored
    /// dtype and shape; they are never resized or reallocated. The batch
    /// fails together: on any missing key or mismatched destination, no
    /// destination tensor is mutated.
    pub async fn load(&mut self, keys: &[&str], tensors: &mut [Tensor]) -> Result<()> {
        if keys.len() != tensors.len() {
            return Err(Error::LengthMismatch {
                keys: keys.len(),
                tensors: tensors.len(),
            });
        }
        if keys.is_empty() {
            return Ok(());
        }

        let owned_keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let values = self
            .bounded(self.backend.load(&self.table_name, &owned_keys))
            .await?;
        if values.len() != keys.len() {
            return Err(Error::Backend {
                table: self.table_name.clone(),
                reason: format!(
                    "requested {} keys, backend returned {} values",
                    keys.len(),
                    values.len()
                ),
            });
        }

        // Validate every destination before mutating any of them.
        for ((key, dst), src) in keys.iter().zip(tensors.iter()).zip(values.iter()) {
            if dst.dtype() != src.dtype() {
                return Err(Error::DtypeMismatch {
                    key: key.to_string(),
                    stored: src.dtype().to_string(),
                    destination: dst.dtype().to_string(),
                });
            }
            if dst.shape() != src.shape() {
                return Err(Error::ShapeMismatch {
                    key: key.to_string(),
                    stored: src.shape().to_vec(),
                    destination: dst.shape().to_vec(),
                });
            }
        }
        for ((key, dst), src) in keys.iter().zip(tensors.iter_mut()).zip(values.iter()) {
            dst.copy_from(key, src)?;
        }

        self.stats.total_load_calls += 1;
        self.stats.total_keys_loaded += keys.len() as u64;
        debug!(table = %self.table_name, keys = keys.len(), "loaded batch");
        Ok(())
    }

    async fn bounded<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| Error::Timeout(limit.as_millis() as u64))?,
            None => fut.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, MemoryBackend};
    use crate::tensor::Dtype;
    use async_trait::async_trait;
    use rand::Rng;

    fn rand_tensor(shape: &[usize]) -> Tensor {
        let mut rng = rand::thread_rng();
        let numel: usize = shape.iter().product();
        let values: Vec<f32> = (0..numel).map(|_| rng.gen()).collect();
        Tensor::from_f32(shape, &values).unwrap()
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        // The original scenario: save ["x", "y"], load back as ["y", "x"].
        let x = rand_tensor(&[5, 5]);
        let y = rand_tensor(&[4, 4]);

        let mut ps = DensePs::new("table", "memory://client-roundtrip")
            .await
            .unwrap();
        ps.save(&["x", "y"], &[x.clone(), y.clone()]).await.unwrap();

        let mut dsts = [Tensor::zeros_like(&y), Tensor::zeros_like(&x)];
        ps.load(&["y", "x"], &mut dsts).await.unwrap();

        assert!(y.allclose(&dsts[0], 1e-6));
        assert!(x.allclose(&dsts[1], 1e-6));
    }

    #[tokio::test]
    async fn test_length_mismatch_no_io() {
        let mut ps = DensePs::new("table", "memory://client-mismatch")
            .await
            .unwrap();
        let t = rand_tensor(&[2]);

        let result = ps.save(&["a", "b"], &[t.clone()]).await;
        assert!(matches!(
            result,
            Err(Error::LengthMismatch { keys: 2, tensors: 1 })
        ));

        // Nothing reached the backend.
        let store = MemoryBackend::open("client-mismatch").store();
        assert_eq!(store.key_count("table"), 0);

        let mut dst = [Tensor::zeros_like(&t)];
        let result = ps.load(&["a", "b"], &mut dst).await;
        assert!(matches!(result, Err(Error::LengthMismatch { .. })));
    }

    #[tokio::test]
    async fn test_unknown_key_leaves_destinations_untouched() {
        let mut ps = DensePs::new("table", "memory://client-unknown")
            .await
            .unwrap();
        let known = Tensor::from_f32(&[2], &[1.0, 2.0]).unwrap();
        ps.save(&["known"], &[known.clone()]).await.unwrap();

        let sentinel = Tensor::from_f32(&[2], &[-7.0, -7.0]).unwrap();
        let mut dsts = [sentinel.clone(), sentinel.clone()];
        let result = ps.load(&["known", "ghost"], &mut dsts).await;

        assert!(matches!(result, Err(Error::KeyNotFound { .. })));
        // Batch-wide failure: even the known key's destination is untouched.
        assert_eq!(dsts[0], sentinel);
        assert_eq!(dsts[1], sentinel);
    }

    #[tokio::test]
    async fn test_overwrite_returns_latest() {
        let mut ps = DensePs::new("table", "memory://client-overwrite")
            .await
            .unwrap();
        let first = Tensor::from_f32(&[3], &[1.0, 1.0, 1.0]).unwrap();
        let second = Tensor::from_f32(&[3], &[2.0, 2.0, 2.0]).unwrap();

        ps.save(&["k"], &[first]).await.unwrap();
        ps.save(&["k"], &[second.clone()]).await.unwrap();

        let mut dst = [Tensor::zeros_like(&second)];
        ps.load(&["k"], &mut dst).await.unwrap();
        assert_eq!(dst[0], second);
    }

    #[tokio::test]
    async fn test_shape_mismatch_no_partial_write() {
        let mut ps = DensePs::new("table", "memory://client-shape")
            .await
            .unwrap();
        let a = Tensor::from_f32(&[2], &[1.0, 2.0]).unwrap();
        let b = Tensor::from_f32(&[2], &[3.0, 4.0]).unwrap();
        ps.save(&["a", "b"], &[a, b]).await.unwrap();

        let good = Tensor::zeros(Dtype::F32, &[2]);
        let wrong = Tensor::zeros(Dtype::F32, &[5]);
        let mut dsts = [good.clone(), wrong.clone()];
        let result = ps.load(&["a", "b"], &mut dsts).await;

        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
        assert_eq!(dsts[0], good);
        assert_eq!(dsts[1], wrong);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let mut ps = DensePs::new("table", "memory://client-empty")
            .await
            .unwrap();
        ps.save(&[], &[]).await.unwrap();
        ps.load(&[], &mut []).await.unwrap();
        assert_eq!(ps.stats().total_save_calls, 0);
        assert_eq!(ps.stats().total_load_calls, 0);
    }

    #[tokio::test]
    async fn test_empty_table_name_rejected() {
        let result = DensePs::new("", "memory://client-noname").await;
        assert!(matches!(result, Err(Error::EmptyTableName)));
    }

    #[tokio::test]
    async fn test_stats_tracking() {
        let mut ps = DensePs::new("table", "memory://client-stats")
            .await
            .unwrap();
        let t = rand_tensor(&[2, 2]);
        ps.save(&["a", "b"], &[t.clone(), t.clone()]).await.unwrap();

        let mut dsts = [Tensor::zeros_like(&t)];
        ps.load(&["a"], &mut dsts).await.unwrap();

        assert_eq!(ps.stats().total_save_calls, 1);
        assert_eq!(ps.stats().total_keys_saved, 2);
        assert_eq!(ps.stats().total_load_calls, 1);
        assert_eq!(ps.stats().total_keys_loaded, 1);
    }

    struct StalledBackend;

    #[async_trait]
    impl TableBackend for StalledBackend {
        async fn save(&self, _table: &str, _entries: Vec<Entry>) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        async fn load(&self, _table: &str, _keys: &[String]) -> Result<Vec<Tensor>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }

        fn kind(&self) -> BackendKind {
            BackendKind::Remote
        }
    }

    #[tokio::test]
    async fn test_unresponsive_backend_times_out() {
        let mut ps = DensePs::with_backend("table", Arc::new(StalledBackend))
            .unwrap()
            .with_config(ClientConfig {
                timeout: Some(Duration::from_millis(50)),
            });

        let t = Tensor::zeros(Dtype::F32, &[1]);
        let result = ps.save(&["k"], &[t]).await;
        assert!(matches!(result, Err(Error::Timeout(50))));
    }

    #[tokio::test]
    async fn test_tcp_end_to_end() {
        let server = crate::server::TableServer::new().with_config(crate::server::ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
        });
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(server.serve(listener));

        let mut ps = DensePs::new("table", &format!("tcp://{}", addr))
            .await
            .unwrap();

        let x = rand_tensor(&[5, 5]);
        let y = rand_tensor(&[4, 4]);
        ps.save(&["x", "y"], &[x.clone(), y.clone()]).await.unwrap();

        let mut dsts = [Tensor::zeros_like(&y), Tensor::zeros_like(&x)];
        ps.load(&["y", "x"], &mut dsts).await.unwrap();
        assert!(y.allclose(&dsts[0], 1e-6));
        assert!(x.allclose(&dsts[1], 1e-6));
    }
}
