//! The RPC audit ledger: per-request lifecycle records.
//!
//! Every outgoing RPC gets an [`AuditRecord`] keyed by its request id. While
//! both the request and its payment are pending the record lives under
//! `pending:<id>` — the pending namespace is always the responder's
//! worklist. Any terminal transition (request completed or failed, payment
//! completed or failed) rekeys the record to `<id>` and deletes the pending
//! entry, so no orphan keys remain.
//!
//! The ledger is backed by any [`KeyValueStore`]; records default to a
//! 24-hour TTL.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use j402::error::PaymentError;
use j402::proto::RequestId;
use j402::store::KeyValueStore;
use j402::timestamp::UnixTimestamp;

/// Default record TTL: 24 hours.
pub const DEFAULT_RECORD_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Lifecycle of the request itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Sent, no outcome yet.
    Pending,
    /// The RPC resolved successfully.
    Completed,
    /// The RPC failed.
    Failed,
}

/// Lifecycle of the embedded payment, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// No settlement outcome yet.
    Pending,
    /// Settlement succeeded.
    Completed,
    /// Payment was refused or settlement failed.
    Failed,
}

/// One audit record per outgoing RPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// The JSON-RPC id of the request.
    pub request_id: RequestId,
    /// URL of the target server.
    pub server_id: String,
    /// The invoked method.
    pub method: String,
    /// The request params, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Request lifecycle state.
    pub request_status: RequestStatus,
    /// Payment lifecycle state.
    pub payment_status: PaymentStatus,
    /// Insertion time.
    pub created_at: UnixTimestamp,
    /// When the request resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_completed_at: Option<UnixTimestamp>,
    /// When the payment reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_completed_at: Option<UnixTimestamp>,
    /// Settlement transaction hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// The paying address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_address: Option<String>,
    /// Failure reason for request or payment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    /// Demanded amount in priced units, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_amount: Option<f64>,
    /// Demanded network, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_network: Option<String>,
    /// Demanded asset, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_asset: Option<String>,
    /// Demanded recipient, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_pay_to: Option<String>,
}

impl AuditRecord {
    /// Returns `true` while both request and payment are pending — the
    /// state in which the record lives under the pending namespace.
    #[must_use]
    pub fn is_fully_pending(&self) -> bool {
        self.request_status == RequestStatus::Pending
            && self.payment_status == PaymentStatus::Pending
    }
}

/// Input to [`AuditLedger::store_pending`].
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// The JSON-RPC id of the request.
    pub request_id: RequestId,
    /// URL of the target server.
    pub server_id: String,
    /// The invoked method.
    pub method: String,
    /// The request params, if any.
    pub params: Option<serde_json::Value>,
}

impl PendingRequest {
    /// Creates the insertion input for one outgoing RPC.
    pub fn new(
        request_id: impl Into<RequestId>,
        server_id: impl Into<String>,
        method: impl Into<String>,
        params: Option<serde_json::Value>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            server_id: server_id.into(),
            method: method.into(),
            params,
        }
    }
}

/// Payment details the responder learns from a challenge.
#[derive(Debug, Clone)]
pub struct PaymentDemand {
    /// Demanded amount in priced units.
    pub amount: f64,
    /// Demanded network.
    pub network: String,
    /// Demanded asset.
    pub asset: String,
    /// Demanded recipient.
    pub pay_to: String,
}

/// Settlement outcome details for [`AuditLedger::update_payment_status`].
#[derive(Debug, Clone, Default)]
pub struct PaymentOutcome {
    /// Settlement transaction hash.
    pub tx_hash: Option<String>,
    /// The paying address.
    pub payer: Option<String>,
    /// Failure reason.
    pub error_reason: Option<String>,
    /// Event time; defaults to now.
    pub when: Option<UnixTimestamp>,
}

/// Mapping `request id → AuditRecord` over a generic key/value store.
pub struct AuditLedger {
    store: Arc<dyn KeyValueStore<AuditRecord>>,
    ttl: Duration,
}

impl std::fmt::Debug for AuditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLedger")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn pending_key(id: &RequestId) -> String {
    format!("pending:{id}")
}

fn terminal_key(id: &RequestId) -> String {
    id.to_string()
}

impl AuditLedger {
    /// Creates a ledger over the given store with the default 24-hour TTL.
    pub fn new(store: Arc<dyn KeyValueStore<AuditRecord>>) -> Self {
        Self {
            store,
            ttl: DEFAULT_RECORD_TTL,
        }
    }

    /// Overrides the record TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Inserts a fresh record under `pending:<id>`.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_REQUEST` if the request id is empty.
    pub fn store_pending(&self, request: PendingRequest) -> Result<(), PaymentError> {
        if request.request_id.is_empty() {
            return Err(PaymentError::invalid_request("request id must not be empty"));
        }
        let record = AuditRecord {
            request_id: request.request_id.clone(),
            server_id: request.server_id,
            method: request.method,
            params: request.params,
            request_status: RequestStatus::Pending,
            payment_status: PaymentStatus::Pending,
            created_at: UnixTimestamp::now(),
            request_completed_at: None,
            payment_completed_at: None,
            tx_hash: None,
            payer_address: None,
            error_reason: None,
            payment_amount: None,
            payment_network: None,
            payment_asset: None,
            payment_pay_to: None,
        };
        self.store
            .set(&pending_key(&request.request_id), record, Some(self.ttl));
        Ok(())
    }

    /// Reads a record from the pending namespace.
    #[must_use]
    pub fn get_pending(&self, id: &RequestId) -> Option<AuditRecord> {
        self.store.get(&pending_key(id))
    }

    /// Reads a record wherever it currently lives.
    #[must_use]
    pub fn get(&self, id: &RequestId) -> Option<AuditRecord> {
        self.store
            .get(&pending_key(id))
            .or_else(|| self.store.get(&terminal_key(id)))
    }

    /// Marks the request completed and rekeys the record out of the pending
    /// namespace. Returns `false` if no record exists for `id`.
    pub fn mark_request_completed(&self, id: &RequestId, when: Option<UnixTimestamp>) -> bool {
        self.finish_request(id, RequestStatus::Completed, None, when)
    }

    /// Marks the request failed and rekeys the record out of the pending
    /// namespace. Returns `false` if no record exists for `id`.
    pub fn mark_request_failed(
        &self,
        id: &RequestId,
        reason: impl Into<String>,
        when: Option<UnixTimestamp>,
    ) -> bool {
        self.finish_request(id, RequestStatus::Failed, Some(reason.into()), when)
    }

    fn finish_request(
        &self,
        id: &RequestId,
        status: RequestStatus,
        reason: Option<String>,
        when: Option<UnixTimestamp>,
    ) -> bool {
        let Some(mut record) = self.get(id) else {
            return false;
        };
        record.request_status = status;
        record.request_completed_at = Some(when.unwrap_or_else(UnixTimestamp::now));
        if let Some(reason) = reason {
            record.error_reason = Some(reason);
        }
        self.rewrite(id, record);
        true
    }

    /// Attaches demand details learned from a payment challenge.
    pub fn annotate_payment(&self, id: &RequestId, demand: &PaymentDemand) -> bool {
        let Some(mut record) = self.get(id) else {
            return false;
        };
        record.payment_amount = Some(demand.amount);
        record.payment_network = Some(demand.network.clone());
        record.payment_asset = Some(demand.asset.clone());
        record.payment_pay_to = Some(demand.pay_to.clone());
        self.rewrite(id, record);
        true
    }

    /// Updates the payment lifecycle state and outcome fields.
    ///
    /// A terminal `status` rekeys the record to `<id>`; `pending` leaves the
    /// record where it is. Returns `false` if no record exists for `id`.
    pub fn update_payment_status(
        &self,
        id: &RequestId,
        status: PaymentStatus,
        outcome: PaymentOutcome,
    ) -> bool {
        let Some(mut record) = self.get(id) else {
            return false;
        };
        record.payment_status = status;
        if status != PaymentStatus::Pending {
            record.payment_completed_at = Some(outcome.when.unwrap_or_else(UnixTimestamp::now));
        }
        if let Some(tx) = outcome.tx_hash {
            record.tx_hash = Some(tx);
        }
        if let Some(payer) = outcome.payer {
            record.payer_address = Some(payer);
        }
        if let Some(reason) = outcome.error_reason {
            record.error_reason = Some(reason);
        }
        self.rewrite(id, record);
        true
    }

    /// Deletes the terminal record for `id`.
    ///
    /// Note the asymmetry inherited from the protocol surface: this removes
    /// `<id>`, not the pending entry.
    pub fn remove_pending(&self, id: &RequestId) -> bool {
        self.store.delete(&terminal_key(id))
    }

    /// Writes `record` under the key its state mandates and deletes the
    /// other key, keeping the pending namespace equal to the worklist.
    fn rewrite(&self, id: &RequestId, record: AuditRecord) {
        if record.is_fully_pending() {
            self.store.set(&pending_key(id), record, Some(self.ttl));
        } else {
            self.store.set(&terminal_key(id), record, Some(self.ttl));
            self.store.delete(&pending_key(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use j402::error::ErrorCode;
    use j402::store::MemoryStore;

    fn ledger() -> AuditLedger {
        AuditLedger::new(Arc::new(MemoryStore::new()))
    }

    fn pending(l: &AuditLedger, id: i64) -> RequestId {
        let id = RequestId::Number(id);
        l.store_pending(PendingRequest::new(
            id.clone(),
            "https://server.example",
            "tools/call",
            None,
        ))
        .unwrap();
        id
    }

    #[test]
    fn test_store_pending_keys_under_pending_namespace() {
        let l = ledger();
        let id = pending(&l, 1);
        let record = l.get_pending(&id).unwrap();
        assert!(record.is_fully_pending());
        assert_eq!(record.method, "tools/call");
    }

    #[test]
    fn test_empty_id_rejected() {
        let l = ledger();
        let err = l
            .store_pending(PendingRequest::new("", "srv", "m", None))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_mark_request_completed_rekeys_and_deletes_pending() {
        let l = ledger();
        let id = pending(&l, 2);
        assert!(l.mark_request_completed(&id, None));
        assert!(l.get_pending(&id).is_none());
        let record = l.get(&id).unwrap();
        assert_eq!(record.request_status, RequestStatus::Completed);
        assert!(record.request_completed_at.is_some());
    }

    #[test]
    fn test_request_failure_records_reason() {
        let l = ledger();
        let id = pending(&l, 3);
        assert!(l.mark_request_failed(&id, "connection reset", None));
        let record = l.get(&id).unwrap();
        assert_eq!(record.request_status, RequestStatus::Failed);
        assert_eq!(record.error_reason.as_deref(), Some("connection reset"));
        assert!(l.get_pending(&id).is_none());
    }

    #[test]
    fn test_payment_pending_keeps_record_in_worklist() {
        let l = ledger();
        let id = pending(&l, 4);
        assert!(l.update_payment_status(&id, PaymentStatus::Pending, PaymentOutcome::default()));
        assert!(l.get_pending(&id).is_some());
    }

    #[test]
    fn test_terminal_payment_rekeys() {
        let l = ledger();
        let id = pending(&l, 5);
        assert!(l.update_payment_status(
            &id,
            PaymentStatus::Completed,
            PaymentOutcome {
                tx_hash: Some("0xabc".into()),
                payer: Some("0xpayer".into()),
                ..Default::default()
            },
        ));
        assert!(l.get_pending(&id).is_none());
        let record = l.get(&id).unwrap();
        assert_eq!(record.payment_status, PaymentStatus::Completed);
        assert_eq!(record.tx_hash.as_deref(), Some("0xabc"));
        assert!(record.payment_completed_at.is_some());
    }

    #[test]
    fn test_update_finds_record_after_request_completed() {
        let l = ledger();
        let id = pending(&l, 6);
        l.mark_request_completed(&id, None);
        assert!(l.update_payment_status(
            &id,
            PaymentStatus::Failed,
            PaymentOutcome {
                error_reason: Some("settlement reverted".into()),
                ..Default::default()
            },
        ));
        let record = l.get(&id).unwrap();
        assert_eq!(record.request_status, RequestStatus::Completed);
        assert_eq!(record.payment_status, PaymentStatus::Failed);
    }

    #[test]
    fn test_remove_pending_deletes_terminal_key() {
        let l = ledger();
        let id = pending(&l, 7);
        l.mark_request_completed(&id, None);
        assert!(l.remove_pending(&id));
        assert!(l.get(&id).is_none());
    }

    #[test]
    fn test_annotate_payment() {
        let l = ledger();
        let id = pending(&l, 8);
        assert!(l.annotate_payment(
            &id,
            &PaymentDemand {
                amount: 0.001,
                network: "base-sepolia".into(),
                asset: "0xAsset".into(),
                pay_to: "0xRecipient".into(),
            },
        ));
        let record = l.get_pending(&id).unwrap();
        assert_eq!(record.payment_amount, Some(0.001));
        assert_eq!(record.payment_pay_to.as_deref(), Some("0xRecipient"));
    }

    #[test]
    fn test_missing_record_updates_return_false() {
        let l = ledger();
        let id = RequestId::Number(99);
        assert!(!l.mark_request_completed(&id, None));
        assert!(!l.update_payment_status(&id, PaymentStatus::Failed, PaymentOutcome::default()));
    }
}
