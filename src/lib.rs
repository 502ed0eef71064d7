//! # denseps - Dense Parameter-Server Client
//!
//! A batch save/load client for dense embedding tables:
//! - **DensePs**: one client per (table, backend) pair, batch save/load of
//!   named tensors with in-place restore
//! - **Backends**: selected by URL scheme - `memory://` (process-local,
//!   shared per namespace) and `tcp://` (remote table server)
//! - **TableServer**: tokio TCP server backing the `tcp://` scheme
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use denseps::{DensePs, Dtype, Tensor};
//!
//! #[tokio::main]
//! async fn main() -> denseps::Result<()> {
//!     let mut ps = DensePs::new("table", "memory://").await?;
//!
//!     let x = Tensor::from_f32(&[5, 5], &vec![0.5; 25])?;
//!     ps.save(&["x"], &[x.clone()]).await?;
//!
//!     let mut restored = Tensor::zeros(Dtype::F32, &[5, 5]);
//!     ps.load(&["x"], std::slice::from_mut(&mut restored)).await?;
//!     assert_eq!(restored, x);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod client;
pub mod core;
#[cfg(feature = "python")]
pub mod python;
pub mod server;
pub mod tensor;
pub mod wire;

pub use backend::{BackendKind, Entry, TableBackend};
pub use client::{ClientConfig, ClientStats, DensePs};
pub use crate::core::error::{Error, Result};
pub use server::{ServerConfig, TableServer};
pub use tensor::{Dtype, Tensor};

/// Install a process-wide fmt tracing subscriber.
///
/// Intended for binaries and tests; repeated calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();
}
