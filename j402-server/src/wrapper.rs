//! Glue composing the payment orchestrator around registered handlers.
//!
//! [`PaymentGate::invoke`] is the session-layer entry point for every
//! dispatched RPC. For unprotected handlers it forwards directly; for
//! protected ones it runs the orchestrator's verify phase, executes the
//! handler, then settles. The gate is the sole owner of the invocation's
//! payment state and clears it on every exit path — success, payment
//! failure, cancellation, or handler failure — so a handler body can never
//! observe proof material.

use std::sync::Arc;

use j402::error::PaymentError;

use crate::context::InvocationContext;
use crate::orchestrator::PaymentOrchestrator;
use crate::registry::{HandlerDescriptor, HandlerRequest};

/// Composes the orchestrator around registered handler callables.
pub struct PaymentGate {
    orchestrator: Arc<PaymentOrchestrator>,
}

impl std::fmt::Debug for PaymentGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGate").finish_non_exhaustive()
    }
}

impl PaymentGate {
    /// Creates a gate over the given orchestrator.
    pub fn new(orchestrator: Arc<PaymentOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Invokes one registered handler with payment mediation.
    ///
    /// The `request` shape must match the descriptor's kind; a mismatch is a
    /// dispatch bug in the session layer and fails with `INVALID_PARAMS`.
    ///
    /// # Errors
    ///
    /// - Orchestrator verify failures are re-thrown verbatim
    /// - Handler failures surface as `"Handler execution failed: <msg>"`
    ///   with no settlement attempted
    /// - Settlement failures surface as `PAYMENT_EXECUTION_FAILED` after the
    ///   failure notification has been emitted
    pub async fn invoke(
        &self,
        descriptor: &HandlerDescriptor,
        request: HandlerRequest,
        ctx: &mut InvocationContext,
    ) -> Result<serde_json::Value, PaymentError> {
        if request.kind() != descriptor.kind {
            return Err(PaymentError::new(
                j402::error::ErrorCode::InvalidParams,
                format!(
                    "handler '{}' is a {}, dispatched as {}",
                    descriptor.name,
                    descriptor.kind,
                    request.kind()
                ),
            ));
        }

        let Some(options) = descriptor.payment.clone() else {
            return Self::run_handler(descriptor, request, ctx).await;
        };

        if let Err(e) = self
            .orchestrator
            .verify(&descriptor.name, &options, ctx)
            .await
        {
            ctx.clear_payment();
            return Err(e);
        }

        if ctx.is_cancelled() {
            ctx.clear_payment();
            tracing::debug!(
                handler = %descriptor.name,
                request_id = %ctx.request_id(),
                "invocation cancelled before execution, abandoning payment flow"
            );
            return Err(PaymentError::internal("invocation cancelled"));
        }

        let result = match Self::run_handler(descriptor, request, ctx).await {
            Ok(result) => result,
            Err(e) => {
                ctx.clear_payment();
                return Err(e);
            }
        };

        if ctx.is_cancelled() {
            ctx.clear_payment();
            tracing::debug!(
                handler = %descriptor.name,
                request_id = %ctx.request_id(),
                "invocation cancelled after execution, abandoning settlement"
            );
            return Err(PaymentError::internal("invocation cancelled"));
        }

        match self.orchestrator.settle(ctx).await {
            Ok(_) => {
                ctx.clear_payment();
                Ok(result)
            }
            Err(e) => {
                ctx.clear_payment();
                Err(e)
            }
        }
    }

    async fn run_handler(
        descriptor: &HandlerDescriptor,
        request: HandlerRequest,
        ctx: &InvocationContext,
    ) -> Result<serde_json::Value, PaymentError> {
        (descriptor.handler)(request, ctx.handler_view())
            .await
            .map_err(|e| PaymentError::internal(format!("Handler execution failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use j402::error::ErrorCode;
    use j402::facilitator::{
        BoxFuture, Facilitator, FacilitatorError, Settlement, VerifyOutcome,
    };
    use j402::pricing::{AssetQuote, Pricer, PricingError};
    use j402::proto::{PaymentPayload, PaymentRequirements, RequestId, TypedDataExtra};
    use j402::session::{RpcSession, SessionError};
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    use crate::orchestrator::ServerPaymentConfig;
    use crate::registry::{HandlerFn, HandlerKind, PaymentOptions};

    struct TestPricer;

    impl Pricer for TestPricer {
        fn quote(&self, amount: f64, _network: &str) -> Result<AssetQuote, PricingError> {
            Ok(AssetQuote {
                amount_atomic: format!("{}", (amount * 1_000_000.0).round() as u128),
                asset: "0xAsset".into(),
                decimals: 6,
                extra: TypedDataExtra::default(),
            })
        }

        fn priced_amount(&self, amount_atomic: &str, _network: &str) -> Result<f64, PricingError> {
            Ok(amount_atomic.parse::<u128>().unwrap_or(0) as f64 / 1_000_000.0)
        }
    }

    #[derive(Default)]
    struct CountingFacilitator {
        settle_calls: AtomicUsize,
    }

    impl Facilitator for CountingFacilitator {
        fn verify(
            &self,
            _payload: &PaymentPayload,
            _requirements: &PaymentRequirements,
        ) -> BoxFuture<'_, Result<VerifyOutcome, FacilitatorError>> {
            Box::pin(async { Ok(VerifyOutcome::valid("0xpayer".into())) })
        }

        fn settle(
            &self,
            _payload: &PaymentPayload,
            _requirements: &PaymentRequirements,
        ) -> BoxFuture<'_, Result<Settlement, FacilitatorError>> {
            self.settle_calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {
                Ok(Settlement::Success {
                    transaction: "0xabc".into(),
                    payer: "0xpayer".into(),
                    network: "base-sepolia".into(),
                })
            })
        }
    }

    struct PayingSession {
        challenges: AtomicUsize,
        notifications: Mutex<Vec<Value>>,
    }

    impl PayingSession {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                challenges: AtomicUsize::new(0),
                notifications: Mutex::new(Vec::new()),
            })
        }
    }

    impl RpcSession for PayingSession {
        fn send_request(
            &self,
            _method: &str,
            _id: RequestId,
            _params: Value,
        ) -> BoxFuture<'_, Result<Value, SessionError>> {
            self.challenges.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {
                Ok(json!({
                    "payment": {
                        "x402Version": 1,
                        "scheme": "exact",
                        "network": "base-sepolia",
                        "payload": {
                            "signature": "0xsig",
                            "authorization": {
                                "from": "0x1", "to": "0x2", "value": "1000",
                                "validAfter": "0", "validBefore": "60", "nonce": "0x00",
                            }
                        }
                    }
                }))
            })
        }

        fn send_notification(
            &self,
            _method: &str,
            params: Value,
        ) -> BoxFuture<'_, Result<(), SessionError>> {
            self.notifications.lock().unwrap().push(params);
            Box::pin(async { Ok(()) })
        }
    }

    fn gate(facilitator: Arc<CountingFacilitator>) -> PaymentGate {
        PaymentGate::new(Arc::new(PaymentOrchestrator::new(
            facilitator,
            Arc::new(TestPricer),
            ServerPaymentConfig::new("base-sepolia", "0xRecipient"),
        )))
    }

    fn ok_handler() -> HandlerFn {
        Arc::new(|_, _| Box::pin(async { Ok(json!("ok")) }))
    }

    fn failing_handler(msg: &'static str) -> HandlerFn {
        Arc::new(move |_, _| Box::pin(async move { Err(msg.into()) }))
    }

    #[tokio::test]
    async fn test_free_handler_skips_challenge() {
        let facilitator = Arc::new(CountingFacilitator::default());
        let gate = gate(Arc::clone(&facilitator));
        let session = PayingSession::new();
        let descriptor = HandlerDescriptor::new("free", HandlerKind::Tool, ok_handler());
        let mut ctx = InvocationContext::new(1, Arc::clone(&session) as Arc<dyn RpcSession>);

        let result = gate
            .invoke(&descriptor, HandlerRequest::Tool { arguments: None }, &mut ctx)
            .await
            .unwrap();
        assert_eq!(result, json!("ok"));
        assert_eq!(session.challenges.load(Ordering::SeqCst), 0);
        assert_eq!(facilitator.settle_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_protected_handler_settles_and_strips_state() {
        let facilitator = Arc::new(CountingFacilitator::default());
        let gate = gate(Arc::clone(&facilitator));
        let session = PayingSession::new();
        let descriptor = HandlerDescriptor::new("paid", HandlerKind::Tool, ok_handler())
            .with_payment(PaymentOptions::new(0.001));
        let mut ctx = InvocationContext::new(1, Arc::clone(&session) as Arc<dyn RpcSession>);

        let result = gate
            .invoke(&descriptor, HandlerRequest::Tool { arguments: None }, &mut ctx)
            .await
            .unwrap();
        assert_eq!(result, json!("ok"));
        assert!(!ctx.has_payment());
        assert_eq!(session.challenges.load(Ordering::SeqCst), 1);
        assert_eq!(facilitator.settle_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.notifications.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_handler_failure_skips_settlement() {
        let facilitator = Arc::new(CountingFacilitator::default());
        let gate = gate(Arc::clone(&facilitator));
        let session = PayingSession::new();
        let descriptor = HandlerDescriptor::new("paid", HandlerKind::Tool, failing_handler("boom"))
            .with_payment(PaymentOptions::new(0.001));
        let mut ctx = InvocationContext::new(1, Arc::clone(&session) as Arc<dyn RpcSession>);

        let err = gate
            .invoke(&descriptor, HandlerRequest::Tool { arguments: None }, &mut ctx)
            .await
            .unwrap_err();
        assert!(err.message.starts_with("Handler execution failed: boom"));
        assert!(!ctx.has_payment());
        assert_eq!(facilitator.settle_calls.load(Ordering::SeqCst), 0);
        assert!(session.notifications.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_before_execution_abandons_flow() {
        let facilitator = Arc::new(CountingFacilitator::default());
        let gate = gate(Arc::clone(&facilitator));
        let session = PayingSession::new();
        let descriptor = HandlerDescriptor::new("paid", HandlerKind::Tool, ok_handler())
            .with_payment(PaymentOptions::new(0.001));
        let token = CancellationToken::new();
        token.cancel();
        let mut ctx = InvocationContext::new(1, Arc::clone(&session) as Arc<dyn RpcSession>)
            .with_cancellation(token);

        let err = gate
            .invoke(&descriptor, HandlerRequest::Tool { arguments: None }, &mut ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert!(!ctx.has_payment());
        assert_eq!(facilitator.settle_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_kind_mismatch_is_invalid_params() {
        let facilitator = Arc::new(CountingFacilitator::default());
        let gate = gate(facilitator);
        let session = PayingSession::new();
        let descriptor = HandlerDescriptor::new("res", HandlerKind::Resource, ok_handler());
        let mut ctx = InvocationContext::new(1, Arc::clone(&session) as Arc<dyn RpcSession>);

        let err = gate
            .invoke(&descriptor, HandlerRequest::Tool { arguments: None }, &mut ctx)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
    }
}
