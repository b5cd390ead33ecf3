//! Audit hook into the session's outbound send path.
//!
//! [`LedgerClient`] decorates any [`RpcClient`]: it records every outgoing
//! RPC in the audit ledger before forwarding, and records the request-level
//! outcome when the send resolves — independently of any embedded payment
//! flow, which reaches the ledger through the responder instead.

use std::sync::Arc;

use j402::session::{OutgoingRequest, RpcClient, SessionError};

use j402::facilitator::BoxFuture;

use crate::ledger::{AuditLedger, PendingRequest};

/// Send-path decorator populating the audit ledger.
pub struct LedgerClient<C> {
    inner: C,
    ledger: Arc<AuditLedger>,
    server_id: String,
}

impl<C> std::fmt::Debug for LedgerClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClient")
            .field("server_id", &self.server_id)
            .finish_non_exhaustive()
    }
}

impl<C: RpcClient> LedgerClient<C> {
    /// Wraps `inner`, attributing every request to `server_id`.
    pub fn new(inner: C, ledger: Arc<AuditLedger>, server_id: impl Into<String>) -> Self {
        Self {
            inner,
            ledger,
            server_id: server_id.into(),
        }
    }

    /// Returns the wrapped client.
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: RpcClient> RpcClient for LedgerClient<C> {
    fn send(&self, request: OutgoingRequest) -> BoxFuture<'_, Result<serde_json::Value, SessionError>> {
        Box::pin(async move {
            self.ledger
                .store_pending(PendingRequest::new(
                    request.id.clone(),
                    self.server_id.clone(),
                    request.method.clone(),
                    request.params.clone(),
                ))
                .map_err(|e| SessionError::with_code(e.code.code(), e.message))?;

            let id = request.id.clone();
            let result = self.inner.send(request).await;
            match &result {
                Ok(_) => {
                    self.ledger.mark_request_completed(&id, None);
                }
                Err(e) => {
                    tracing::debug!(request_id = %id, error = %e, "outgoing request failed");
                    self.ledger.mark_request_failed(&id, e.message.clone(), None);
                }
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{PaymentStatus, RequestStatus};
    use j402::proto::RequestId;
    use j402::store::MemoryStore;
    use serde_json::{Value, json};

    struct ScriptedClient {
        response: Result<Value, SessionError>,
    }

    impl RpcClient for ScriptedClient {
        fn send(&self, _request: OutgoingRequest) -> BoxFuture<'_, Result<Value, SessionError>> {
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    fn ledger() -> Arc<AuditLedger> {
        Arc::new(AuditLedger::new(Arc::new(MemoryStore::new())))
    }

    #[tokio::test]
    async fn test_successful_send_completes_record() {
        let ledger = ledger();
        let client = LedgerClient::new(
            ScriptedClient {
                response: Ok(json!({"ok": true})),
            },
            Arc::clone(&ledger),
            "https://server.example",
        );

        let result = client
            .send(OutgoingRequest::new(1, "tools/call", Some(json!({"a": 1}))))
            .await
            .unwrap();
        assert_eq!(result["ok"], true);

        let record = ledger.get(&RequestId::Number(1)).unwrap();
        assert_eq!(record.request_status, RequestStatus::Completed);
        assert_eq!(record.payment_status, PaymentStatus::Pending);
        assert_eq!(record.server_id, "https://server.example");
        assert!(ledger.get_pending(&RequestId::Number(1)).is_none());
    }

    #[tokio::test]
    async fn test_failed_send_records_reason() {
        let ledger = ledger();
        let client = LedgerClient::new(
            ScriptedClient {
                response: Err(SessionError::new("connection reset")),
            },
            Arc::clone(&ledger),
            "https://server.example",
        );

        let err = client
            .send(OutgoingRequest::new(2, "tools/call", None))
            .await
            .unwrap_err();
        assert_eq!(err.message, "connection reset");

        let record = ledger.get(&RequestId::Number(2)).unwrap();
        assert_eq!(record.request_status, RequestStatus::Failed);
        assert_eq!(record.error_reason.as_deref(), Some("connection reset"));
    }

    #[tokio::test]
    async fn test_empty_id_rejected_before_forwarding() {
        let ledger = ledger();
        let client = LedgerClient::new(
            ScriptedClient {
                response: Ok(Value::Null),
            },
            Arc::clone(&ledger),
            "https://server.example",
        );

        let err = client
            .send(OutgoingRequest::new("", "tools/call", None))
            .await
            .unwrap_err();
        assert_eq!(err.code, Some(-32600));
    }
}
