//! Session seams consumed by both halves of the payment core.
//!
//! The base session transport (establishment, framing, demultiplexing) is
//! out of scope; the core only needs two narrow interfaces:
//!
//! - [`RpcSession`] — server side: originate a request *to the client* over
//!   an established session, and emit notifications. The payment challenge
//!   reuses the id of the inbound invocation currently being served, so
//!   implementations must tolerate that id collision (or rely on
//!   `params.requestId` for correlation).
//! - [`RpcClient`] — client side: the outbound send seam the audit-ledger
//!   interceptor wraps.
//!
//! Both traits are dyn-compatible and abstract over whatever session SDK
//! actually carries the bytes.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::facilitator::BoxFuture;
use crate::proto::RequestId;

/// A transport-level failure for an in-session RPC.
///
/// Carries the JSON-RPC error code where the peer produced one; pure
/// transport faults have no code.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct SessionError {
    /// JSON-RPC error code returned by the peer, if any.
    pub code: Option<i64>,
    /// Human-readable message.
    pub message: String,
}

impl SessionError {
    /// Creates a codeless transport error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Creates an error carrying a peer-supplied JSON-RPC code.
    #[must_use]
    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    /// Returns `true` if the peer does not implement the requested method.
    ///
    /// Matches the JSON-RPC `-32601` code or a "method not found" message;
    /// this is the primary signal that the peer does not speak the payment
    /// extension.
    #[must_use]
    pub fn is_method_not_found(&self) -> bool {
        self.code == Some(-32601) || self.message.to_ascii_lowercase().contains("method not found")
    }
}

/// Server-side view of an established session.
pub trait RpcSession: Send + Sync {
    /// Sends a server-originated request to the client and awaits its result.
    ///
    /// A peer error response surfaces as `Err(SessionError)` carrying the
    /// peer's error code.
    fn send_request(
        &self,
        method: &str,
        id: RequestId,
        params: Value,
    ) -> BoxFuture<'_, Result<Value, SessionError>>;

    /// Sends a notification to the client.
    fn send_notification(&self, method: &str, params: Value)
    -> BoxFuture<'_, Result<(), SessionError>>;
}

impl<T: RpcSession> RpcSession for Arc<T> {
    fn send_request(
        &self,
        method: &str,
        id: RequestId,
        params: Value,
    ) -> BoxFuture<'_, Result<Value, SessionError>> {
        self.as_ref().send_request(method, id, params)
    }

    fn send_notification(
        &self,
        method: &str,
        params: Value,
    ) -> BoxFuture<'_, Result<(), SessionError>> {
        self.as_ref().send_notification(method, params)
    }
}

/// An outgoing client→server RPC, as seen by the send-path interceptor.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    /// The JSON-RPC id of the request.
    pub id: RequestId,
    /// The method being invoked.
    pub method: String,
    /// The request params, if any.
    pub params: Option<Value>,
}

impl OutgoingRequest {
    /// Creates a new outgoing request.
    #[must_use]
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// Client-side outbound send seam.
///
/// The returned future resolves when the RPC completes — with the peer's
/// result or with a transport/peer error.
pub trait RpcClient: Send + Sync {
    /// Sends a request to the server and awaits its result.
    fn send(&self, request: OutgoingRequest) -> BoxFuture<'_, Result<Value, SessionError>>;
}

impl<T: RpcClient> RpcClient for Arc<T> {
    fn send(&self, request: OutgoingRequest) -> BoxFuture<'_, Result<Value, SessionError>> {
        self.as_ref().send(request)
    }
}

impl fmt::Display for OutgoingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id {})", self.method, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_not_found_by_code() {
        assert!(SessionError::with_code(-32601, "whatever").is_method_not_found());
        assert!(!SessionError::with_code(-32600, "whatever").is_method_not_found());
    }

    #[test]
    fn test_method_not_found_by_message() {
        assert!(SessionError::new("Method not found: x402/payment_required").is_method_not_found());
        assert!(!SessionError::new("connection reset").is_method_not_found());
    }
}
