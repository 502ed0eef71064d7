//! Request and response messages for the table protocol.

use crate::backend::Entry;
use crate::core::{now, Timestamp};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A request to the table server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Request {
    /// Liveness probe.
    Ping,
    /// Persist a batch of entries under a table.
    Save {
        /// Target table name
        table: String,
        /// Entries to persist
        entries: Vec<Entry>,
    },
    /// Fetch the values stored under the given keys.
    Load {
        /// Target table name
        table: String,
        /// Keys to fetch, in response order
        keys: Vec<String>,
    },
}

/// Error category carried over the wire.
///
/// Distinguishes the failures the client must rehydrate into typed errors
/// from generic server-side failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireErrorCode {
    /// A requested key was never saved to the table.
    NotFound,
    /// Malformed or unexpected request.
    BadRequest,
    /// Any other server-side failure.
    Internal,
}

/// A response from the table server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Response {
    /// Reply to [`Request::Ping`].
    Pong,
    /// The save batch was applied.
    Saved,
    /// Values for a load request, in request key order.
    Loaded {
        /// Fetched tensors
        tensors: Vec<Tensor>,
    },
    /// The request failed.
    Error {
        /// Error category
        code: WireErrorCode,
        /// Offending key, when the failure is key-specific
        key: Option<String>,
        /// Human-readable detail
        message: String,
    },
}

/// Envelope wrapping a request with its correlation id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Request ID (echoed back in the response)
    pub id: String,
    /// The request
    pub request: Request,
    /// Submission timestamp
    pub timestamp: Timestamp,
}

impl RequestEnvelope {
    /// Wrap a request with a fresh id.
    pub fn new(request: Request) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request,
            timestamp: now(),
        }
    }
}

/// Envelope wrapping a response, correlated to its request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// ID of the request this responds to
    pub id: String,
    /// The response
    pub response: Response,
    /// Completion timestamp
    pub timestamp: Timestamp,
}

impl ResponseEnvelope {
    /// Build a response to a given request envelope.
    pub fn reply(to: &RequestEnvelope, response: Response) -> Self {
        Self {
            id: to.id.clone(),
            response,
            timestamp: now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_ids_correlate() {
        let req = RequestEnvelope::new(Request::Ping);
        let resp = ResponseEnvelope::reply(&req, Response::Pong);
        assert_eq!(req.id, resp.id);
    }

    #[test]
    fn test_request_ids_unique() {
        let a = RequestEnvelope::new(Request::Ping);
        let b = RequestEnvelope::new(Request::Ping);
        assert_ne!(a.id, b.id);
    }
}
