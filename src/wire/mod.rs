//! Wire protocol for the networked backend.
//!
//! Framed bincode messages over TCP:
//! - Request/response envelopes with correlation ids
//! - Length-prefixed frames, lz4-compressed above a threshold

pub mod codec;
pub mod protocol;

pub use codec::{read_frame, write_frame};
pub use protocol::{Request, RequestEnvelope, Response, ResponseEnvelope, WireErrorCode};
