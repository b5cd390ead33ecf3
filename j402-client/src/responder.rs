//! The payment responder: answers challenges, reconciles settlements.
//!
//! When the server demands payment for an in-flight invocation, the
//! challenge arrives as a server-originated `x402/payment_required` request
//! carrying the invocation's correlation id. The responder:
//!
//! 1. Validates the demand and correlates it to a pending ledger record —
//!    unsolicited demands from unknown contexts are refused
//! 2. Converts the atomic amount back to priced units and runs the
//!    guardrails, before the wallet is touched
//! 3. Builds and signs the transfer authorization with the wallet account
//! 4. Returns the proof under `result.payment`
//!
//! The settlement notification handler reconciles `x402/payment_result`
//! params against the same ledger; notifications for unknown requests are
//! logged and ignored, and records already out of the pending namespace are
//! still updated (a cancellation race can deliver a settlement after the
//! request completed).

use rand::Rng;
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::sync::Arc;

use j402::error::PaymentError;
use j402::pricing::Pricer;
use j402::proto::{
    Authorization, ExactPayload, PaymentPayload, PaymentRequirements, PaymentResult,
};
use j402::timestamp::UnixTimestamp;
use j402::wallet::{SigningRequest, Wallet, WalletError};

use crate::guardrails::Guardrails;
use crate::ledger::{AuditLedger, PaymentDemand, PaymentOutcome, PaymentStatus};

/// Handles inbound payment challenges and settlement notifications.
pub struct PaymentResponder {
    ledger: Arc<AuditLedger>,
    wallet: Arc<dyn Wallet>,
    pricer: Arc<dyn Pricer>,
    guardrails: Guardrails,
}

impl std::fmt::Debug for PaymentResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentResponder")
            .field("guardrails", &self.guardrails)
            .finish_non_exhaustive()
    }
}

impl PaymentResponder {
    /// Creates a responder over the given ledger, wallet, pricer, and
    /// guardrails.
    pub fn new(
        ledger: Arc<AuditLedger>,
        wallet: Arc<dyn Wallet>,
        pricer: Arc<dyn Pricer>,
        guardrails: Guardrails,
    ) -> Self {
        Self {
            ledger,
            wallet,
            pricer,
            guardrails,
        }
    }

    /// Answers an `x402/payment_required` challenge.
    ///
    /// Returns the JSON-RPC result body: `{"payment": <signed payload>}`.
    ///
    /// # Errors
    ///
    /// - `PAYMENT_INVALID` for malformed demands, demands whose correlation
    ///   id is unknown to the ledger, and amounts the pricer cannot convert
    /// - `GUARDRAIL_VIOLATION` / `WHITELIST_VIOLATION` from the guardrails,
    ///   propagated unchanged
    /// - `INTERNAL_ERROR` for wallet failures
    pub async fn handle_payment_required(&self, params: Value) -> Result<Value, PaymentError> {
        let requirements: PaymentRequirements = serde_json::from_value(params)
            .map_err(|e| PaymentError::payment_invalid(format!("invalid payment demand: {e}")))?;
        if requirements.pay_to.is_empty()
            || requirements.max_amount_required.is_empty()
            || requirements.network.is_empty()
        {
            return Err(PaymentError::payment_invalid(
                "payment demand is missing required fields",
            ));
        }

        let request_id = requirements.request_id.clone();
        if self.ledger.get_pending(&request_id).is_none() {
            tracing::warn!(request_id = %request_id, "payment demanded for unknown request");
            return Err(PaymentError::payment_invalid("unknown payment"));
        }

        let amount = self
            .pricer
            .priced_amount(&requirements.max_amount_required, &requirements.network)
            .map_err(|e| {
                self.record_failure(&request_id, format!("cannot price demand: {e}"));
                PaymentError::payment_invalid(format!("cannot price demand: {e}"))
            })?;

        self.ledger.annotate_payment(
            &request_id,
            &PaymentDemand {
                amount,
                network: requirements.network.clone(),
                asset: requirements.asset.clone(),
                pay_to: requirements.pay_to.clone(),
            },
        );
        self.ledger.update_payment_status(
            &request_id,
            PaymentStatus::Pending,
            PaymentOutcome::default(),
        );

        if let Err(e) = self.guardrails.enforce(amount, &requirements.pay_to) {
            tracing::warn!(
                request_id = %request_id,
                amount,
                code = ?e.code,
                "payment demand refused by guardrails"
            );
            self.record_failure(&request_id, e.message.clone());
            return Err(e);
        }

        let payload = self.sign_demand(&requirements).await.map_err(|e| {
            self.record_failure(&request_id, e.to_string());
            PaymentError::internal(format!("payment signing failed: {e}"))
        })?;

        tracing::debug!(request_id = %request_id, amount, "payment demand authorized");
        let payment = serde_json::to_value(&payload)
            .map_err(|e| PaymentError::internal(format!("cannot encode payment: {e}")))?;
        Ok(json!({ "payment": payment }))
    }

    /// Reconciles an `x402/payment_result` notification into the ledger.
    ///
    /// Malformed params and unknown request ids are logged and ignored.
    pub fn handle_payment_result(&self, params: Value) {
        let result: PaymentResult = match serde_json::from_value(params) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed settlement notification");
                return;
            }
        };

        let status = if result.success {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Failed
        };
        let updated = self.ledger.update_payment_status(
            &result.request_id,
            status,
            PaymentOutcome {
                tx_hash: result.transaction.clone(),
                payer: result.payer.clone(),
                error_reason: result.error_reason.clone(),
                when: None,
            },
        );
        if updated {
            tracing::debug!(
                request_id = %result.request_id,
                success = result.success,
                transaction = result.transaction.as_deref().unwrap_or(""),
                "settlement reconciled"
            );
        } else {
            tracing::warn!(
                request_id = %result.request_id,
                "settlement notification for unknown request, ignoring"
            );
        }
    }

    async fn sign_demand(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentPayload, WalletError> {
        let account = self.wallet.get_account().await?;
        let authorization = Authorization {
            from: account.address(),
            to: requirements.pay_to.clone(),
            value: requirements.max_amount_required.clone(),
            valid_after: UnixTimestamp::ZERO,
            valid_before: UnixTimestamp::now() + requirements.max_timeout_seconds,
            nonce: random_nonce(),
        };
        let signature = account
            .sign_authorization(&SigningRequest {
                network: requirements.network.clone(),
                asset: requirements.asset.clone(),
                extra: requirements.extra.clone(),
                authorization: authorization.clone(),
            })
            .await?;
        Ok(PaymentPayload::exact(
            requirements.network.clone(),
            ExactPayload {
                signature,
                authorization,
            },
        ))
    }

    fn record_failure(&self, request_id: &j402::proto::RequestId, reason: String) {
        self.ledger.update_payment_status(
            request_id,
            PaymentStatus::Failed,
            PaymentOutcome {
                error_reason: Some(reason),
                ..Default::default()
            },
        );
    }
}

/// Generates a unique 32-byte authorization nonce as 0x-prefixed hex.
fn random_nonce() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    let mut out = String::with_capacity(2 + 64);
    out.push_str("0x");
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use j402::error::ErrorCode;
    use j402::facilitator::BoxFuture;
    use j402::pricing::{AssetQuote, PricingError};
    use j402::proto::{ExactScheme, RequestId, TypedDataExtra, V1};
    use j402::store::MemoryStore;
    use j402::wallet::Account;
    use crate::ledger::PendingRequest;

    struct FixedAccount;

    impl Account for FixedAccount {
        fn address(&self) -> String {
            "0x1111111111111111111111111111111111111111".into()
        }

        fn sign_authorization(
            &self,
            _request: &SigningRequest,
        ) -> BoxFuture<'_, Result<String, WalletError>> {
            Box::pin(async { Ok("0xsigned".into()) })
        }
    }

    struct FixedWallet;

    impl Wallet for FixedWallet {
        fn get_account(&self) -> BoxFuture<'_, Result<Arc<dyn Account>, WalletError>> {
            Box::pin(async { Ok(Arc::new(FixedAccount) as Arc<dyn Account>) })
        }
    }

    struct MicroPricer;

    impl Pricer for MicroPricer {
        fn quote(&self, amount: f64, _network: &str) -> Result<AssetQuote, PricingError> {
            Ok(AssetQuote {
                amount_atomic: format!("{}", (amount * 1_000_000.0).round() as u128),
                asset: "0xAsset".into(),
                decimals: 6,
                extra: TypedDataExtra::default(),
            })
        }

        fn priced_amount(&self, amount_atomic: &str, _network: &str) -> Result<f64, PricingError> {
            amount_atomic
                .parse::<u128>()
                .map(|a| a as f64 / 1_000_000.0)
                .map_err(|e| PricingError::InvalidAmount(e.to_string()))
        }
    }

    fn responder(guardrails: Guardrails) -> (PaymentResponder, Arc<AuditLedger>) {
        let ledger = Arc::new(AuditLedger::new(Arc::new(MemoryStore::new())));
        let responder = PaymentResponder::new(
            Arc::clone(&ledger),
            Arc::new(FixedWallet),
            Arc::new(MicroPricer),
            guardrails,
        );
        (responder, ledger)
    }

    fn demand(id: i64) -> Value {
        serde_json::to_value(PaymentRequirements {
            scheme: ExactScheme,
            network: "base-sepolia".into(),
            max_amount_required: "1000".into(),
            resource: "/tools/add-numbers".into(),
            description: String::new(),
            mime_type: "application/json".into(),
            pay_to: "0xRecipient".into(),
            max_timeout_seconds: 60,
            asset: "0xAsset".into(),
            output_schema: None,
            extra: None,
            x402_version: V1,
            request_id: RequestId::Number(id),
        })
        .unwrap()
    }

    fn seed_pending(ledger: &AuditLedger, id: i64) {
        ledger
            .store_pending(PendingRequest::new(
                RequestId::Number(id),
                "https://server.example",
                "tools/call",
                None,
            ))
            .unwrap();
    }

    #[tokio::test]
    async fn test_known_request_is_signed() {
        let (responder, ledger) = responder(Guardrails::new());
        seed_pending(&ledger, 1);

        let result = responder.handle_payment_required(demand(1)).await.unwrap();
        let payment = &result["payment"];
        assert_eq!(payment["scheme"], "exact");
        assert_eq!(payment["x402Version"], 1);
        assert_eq!(payment["payload"]["signature"], "0xsigned");
        let auth = &payment["payload"]["authorization"];
        assert_eq!(auth["to"], "0xRecipient");
        assert_eq!(auth["value"], "1000");
        assert_eq!(auth["validAfter"], "0");
        assert!(auth["nonce"].as_str().unwrap().starts_with("0x"));
        assert_eq!(auth["nonce"].as_str().unwrap().len(), 66);
    }

    #[tokio::test]
    async fn test_unknown_request_refused() {
        let (responder, _ledger) = responder(Guardrails::new());
        let err = responder.handle_payment_required(demand(42)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentInvalid);
        assert!(err.message.contains("unknown payment"));
    }

    #[tokio::test]
    async fn test_cap_violation_recorded_in_ledger() {
        let (responder, ledger) =
            responder(Guardrails::new().with_max_payment_per_call(0.0005));
        seed_pending(&ledger, 2);

        let err = responder.handle_payment_required(demand(2)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::GuardrailViolation);

        let record = ledger.get(&RequestId::Number(2)).unwrap();
        assert_eq!(record.payment_status, PaymentStatus::Failed);
        assert!(record.error_reason.unwrap().contains("cap"));
        assert!(ledger.get_pending(&RequestId::Number(2)).is_none());
    }

    #[tokio::test]
    async fn test_wallet_untouched_when_guardrails_refuse() {
        struct PanickyWallet;

        impl Wallet for PanickyWallet {
            fn get_account(&self) -> BoxFuture<'_, Result<Arc<dyn Account>, WalletError>> {
                panic!("wallet must not be touched before guardrails pass");
            }
        }

        let ledger = Arc::new(AuditLedger::new(Arc::new(MemoryStore::new())));
        let responder = PaymentResponder::new(
            Arc::clone(&ledger),
            Arc::new(PanickyWallet),
            Arc::new(MicroPricer),
            Guardrails::new().with_max_payment_per_call(0.0001),
        );
        seed_pending(&ledger, 10);

        let err = responder.handle_payment_required(demand(10)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::GuardrailViolation);
    }

    #[tokio::test]
    async fn test_malformed_demand_is_payment_invalid() {
        let (responder, _ledger) = responder(Guardrails::new());
        let err = responder
            .handle_payment_required(json!({"scheme": "exact"}))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentInvalid);
    }

    #[tokio::test]
    async fn test_wrong_scheme_is_payment_invalid() {
        let (responder, ledger) = responder(Guardrails::new());
        seed_pending(&ledger, 3);
        let mut params = demand(3);
        params["scheme"] = "upto".into();
        let err = responder.handle_payment_required(params).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentInvalid);
    }

    #[test]
    fn test_settlement_success_reconciled() {
        let (responder, ledger) = responder(Guardrails::new());
        seed_pending(&ledger, 4);

        responder.handle_payment_result(json!({
            "success": true,
            "transaction": "0xabc",
            "network": "base-sepolia",
            "payer": "0xpayer",
            "requestId": 4,
        }));

        let record = ledger.get(&RequestId::Number(4)).unwrap();
        assert_eq!(record.payment_status, PaymentStatus::Completed);
        assert_eq!(record.tx_hash.as_deref(), Some("0xabc"));
        assert_eq!(record.payer_address.as_deref(), Some("0xpayer"));
    }

    #[test]
    fn test_settlement_failure_reconciled() {
        let (responder, ledger) = responder(Guardrails::new());
        seed_pending(&ledger, 5);

        responder.handle_payment_result(json!({
            "success": false,
            "network": "base-sepolia",
            "errorReason": "reverted",
            "requestId": 5,
        }));

        let record = ledger.get(&RequestId::Number(5)).unwrap();
        assert_eq!(record.payment_status, PaymentStatus::Failed);
        assert_eq!(record.error_reason.as_deref(), Some("reverted"));
    }

    #[test]
    fn test_settlement_for_unknown_request_ignored() {
        let (responder, _ledger) = responder(Guardrails::new());
        // Must not panic or insert anything.
        responder.handle_payment_result(json!({
            "success": true,
            "network": "base-sepolia",
            "requestId": 999,
        }));
    }

    #[test]
    fn test_settlement_after_request_completed_still_reconciled() {
        let (responder, ledger) = responder(Guardrails::new());
        seed_pending(&ledger, 6);
        ledger.mark_request_completed(&RequestId::Number(6), None);

        responder.handle_payment_result(json!({
            "success": true,
            "transaction": "0xabc",
            "network": "base-sepolia",
            "requestId": 6,
        }));

        let record = ledger.get(&RequestId::Number(6)).unwrap();
        assert_eq!(record.payment_status, PaymentStatus::Completed);
    }

    #[test]
    fn test_random_nonce_shape() {
        let a = random_nonce();
        let b = random_nonce();
        assert_ne!(a, b);
        assert!(a.starts_with("0x"));
        assert_eq!(a.len(), 66);
        assert!(a[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
