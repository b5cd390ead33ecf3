//! The verify → execute → settle state machine for one protected invocation.
//!
//! The orchestrator is stateless across invocations; all per-invocation
//! state lives in the caller's [`InvocationContext`]. Its two operations are
//! called by the wrapper in strict order:
//!
//! - [`PaymentOrchestrator::verify`] — assemble the payment demand, send the
//!   in-band `x402/payment_required` sub-RPC (reusing the originating
//!   request id), structurally validate the returned proof, and verify it
//!   with the facilitator. On success the verified proof is attached to the
//!   context.
//! - [`PaymentOrchestrator::settle`] — execute the on-chain settlement and
//!   emit exactly one `x402/payment_result` notification carrying the
//!   originating request id, succeed or fail.
//!
//! The sub-RPC is the only reverse-direction suspension point: the session
//! layer must allow the server to originate a request whose id matches an
//! inbound request currently being served.

use serde_json::json;
use url::Url;

use j402::error::PaymentError;
use j402::facilitator::{Facilitator, Settlement, VerifyOutcome};
use j402::pricing::Pricer;
use j402::proto::{
    ExactScheme, PaymentPayload, PaymentRequirements, PaymentResult, RequestId, V1, X402Version1,
};
use j402::{PAYMENT_REQUIRED_METHOD, PAYMENT_RESULT_METHOD};

use std::sync::Arc;

use crate::context::{InvocationContext, PaymentState};
use crate::registry::PaymentOptions;

/// Facilitator invalid-reason that maps onto the replay taxonomy entry.
const REPLAY_REASON: &str = "replay_detected";

/// Server-side payment configuration shared by all protected handlers.
#[derive(Debug, Clone)]
pub struct ServerPaymentConfig {
    /// The network payments are demanded on (e.g., `"base-sepolia"`).
    pub network: String,
    /// The recipient address for payments.
    pub pay_to: String,
    /// Base URL used to derive `resource` fields; when absent the resource
    /// is the path alone.
    pub base_url: Option<Url>,
    /// Validity window of signed authorizations, in seconds.
    pub max_timeout_seconds: u64,
}

impl ServerPaymentConfig {
    /// Creates a config for the given network and recipient, with the
    /// default 60-second authorization window.
    pub fn new(network: impl Into<String>, pay_to: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            pay_to: pay_to.into(),
            base_url: None,
            max_timeout_seconds: 60,
        }
    }

    /// Sets the base URL for `resource` derivation.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }
}

/// Mediates the payment lifecycle of a single protected invocation.
pub struct PaymentOrchestrator {
    facilitator: Arc<dyn Facilitator>,
    pricer: Arc<dyn Pricer>,
    config: ServerPaymentConfig,
}

impl std::fmt::Debug for PaymentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PaymentOrchestrator {
    /// Creates an orchestrator over the given facilitator and pricer.
    pub fn new(
        facilitator: Arc<dyn Facilitator>,
        pricer: Arc<dyn Pricer>,
        config: ServerPaymentConfig,
    ) -> Self {
        Self {
            facilitator,
            pricer,
            config,
        }
    }

    /// The configured payment network.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.config.network
    }

    /// Assembles the payment demand for one protected handler.
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_INVALID` if the pricer cannot quote the handler's
    /// amount on the configured network.
    pub fn assemble_requirements(
        &self,
        handler_name: &str,
        options: &PaymentOptions,
        request_id: &RequestId,
    ) -> Result<PaymentRequirements, PaymentError> {
        let quote = self
            .pricer
            .quote(options.amount, &self.config.network)
            .map_err(|e| {
                PaymentError::config_invalid(format!(
                    "cannot price handler '{handler_name}': {e}"
                ))
            })?;

        Ok(PaymentRequirements {
            scheme: ExactScheme,
            network: self.config.network.clone(),
            max_amount_required: quote.amount_atomic,
            resource: self.resource_url(handler_name),
            description: options.description.clone().unwrap_or_default(),
            mime_type: "application/json".to_owned(),
            pay_to: self.config.pay_to.clone(),
            max_timeout_seconds: self.config.max_timeout_seconds,
            asset: quote.asset,
            output_schema: None,
            extra: Some(quote.extra),
            x402_version: V1,
            request_id: request_id.clone(),
        })
    }

    /// Runs the challenge/verify phase for one invocation.
    ///
    /// On success the verified proof and requirements are attached to `ctx`
    /// for the later [`settle`](Self::settle) call.
    ///
    /// # Errors
    ///
    /// - `PAYMENT_REQUIRED` when the client does not implement the extension
    /// - `INVALID_REQUEST` when the proof claims a different protocol version
    /// - `PAYMENT_INVALID` for every other malformed, inconsistent, or
    ///   verifier-rejected proof
    /// - `CONFIG_INVALID` when the demand cannot be assembled
    pub async fn verify(
        &self,
        handler_name: &str,
        options: &PaymentOptions,
        ctx: &mut InvocationContext,
    ) -> Result<(), PaymentError> {
        let requirements =
            self.assemble_requirements(handler_name, options, ctx.request_id())?;
        let params = serde_json::to_value(&requirements)
            .map_err(|e| PaymentError::internal(format!("cannot encode requirements: {e}")))?;

        tracing::debug!(
            handler = handler_name,
            request_id = %ctx.request_id(),
            amount = %requirements.max_amount_required,
            "sending payment challenge"
        );

        let response = ctx
            .session()
            .send_request(PAYMENT_REQUIRED_METHOD, ctx.request_id().clone(), params)
            .await;

        let result = match response {
            Ok(result) => result,
            Err(e) if e.is_method_not_found() => {
                tracing::debug!(handler = handler_name, "client does not speak the extension");
                return Err(PaymentError::payment_required(format!(
                    "Payment required for '{handler_name}'"
                ))
                .with_details(json!({
                    "amount": options.amount,
                    "asset": requirements.asset,
                    "paymentAddress": requirements.pay_to,
                    "network": requirements.network,
                })));
            }
            Err(e) => {
                return Err(PaymentError::payment_invalid(format!(
                    "payment challenge failed: {e}"
                )));
            }
        };

        let payment = result
            .get("payment")
            .cloned()
            .ok_or_else(|| PaymentError::payment_invalid("challenge response has no payment"))?;
        let proof: PaymentPayload = serde_json::from_value(payment)
            .map_err(|e| PaymentError::payment_invalid(format!("malformed payment proof: {e}")))?;

        self.validate_proof(&proof, &requirements)?;

        let outcome = self
            .facilitator
            .verify(&proof, &requirements)
            .await
            .map_err(|e| PaymentError::payment_invalid(format!("verification error: {e}")))?;

        match outcome {
            VerifyOutcome::Valid { payer } => {
                tracing::debug!(handler = handler_name, payer, "payment proof verified");
                ctx.attach_payment(PaymentState {
                    proof,
                    requirements,
                });
                Ok(())
            }
            VerifyOutcome::Invalid { reason, .. } => {
                if reason == REPLAY_REASON {
                    return Err(PaymentError::replay_detected(format!(
                        "payment proof rejected: {reason}"
                    )));
                }
                Err(PaymentError::payment_invalid(format!(
                    "payment verification failed: {reason}"
                )))
            }
            _ => unreachable!("VerifyOutcome is non_exhaustive but only these variants exist"),
        }
    }

    /// Settles the payment verified earlier in this invocation.
    ///
    /// Emits exactly one `x402/payment_result` notification whatever the
    /// outcome; a notification that cannot be delivered is logged and
    /// otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns `PAYMENT_EXECUTION_FAILED` when the facilitator reports a
    /// failed settlement (after the failure notification has been emitted),
    /// or an internal error when called without a verified proof.
    pub async fn settle(&self, ctx: &mut InvocationContext) -> Result<Settlement, PaymentError> {
        let Some(state) = ctx.take_payment() else {
            return Err(PaymentError::internal(
                "settlement requested without a verified payment",
            ));
        };

        let settled = self
            .facilitator
            .settle(&state.proof, &state.requirements)
            .await;

        match settled {
            Ok(Settlement::Success {
                transaction,
                payer,
                network,
            }) => {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    transaction,
                    "payment settled"
                );
                self.notify_result(
                    ctx,
                    PaymentResult {
                        success: true,
                        transaction: Some(transaction.clone()),
                        network: network.clone(),
                        payer: Some(payer.clone()),
                        error_reason: None,
                        request_id: ctx.request_id().clone(),
                    },
                )
                .await;
                Ok(Settlement::Success {
                    transaction,
                    payer,
                    network,
                })
            }
            Ok(Settlement::Failed { reason, network }) => {
                self.fail_settlement(ctx, reason, network).await
            }
            Err(e) => {
                let network = state.requirements.network.clone();
                self.fail_settlement(ctx, e.to_string(), network).await
            }
            _ => unreachable!("Settlement is non_exhaustive but only these variants exist"),
        }
    }

    async fn fail_settlement(
        &self,
        ctx: &InvocationContext,
        reason: String,
        network: String,
    ) -> Result<Settlement, PaymentError> {
        tracing::warn!(request_id = %ctx.request_id(), reason, "payment settlement failed");
        self.notify_result(
            ctx,
            PaymentResult {
                success: false,
                transaction: None,
                network,
                payer: None,
                error_reason: Some(reason.clone()),
                request_id: ctx.request_id().clone(),
            },
        )
        .await;
        Err(PaymentError::execution_failed(format!(
            "payment settlement failed: {reason}"
        )))
    }

    async fn notify_result(&self, ctx: &InvocationContext, result: PaymentResult) {
        let params = match serde_json::to_value(&result) {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!(error = %e, "cannot encode settlement notification");
                return;
            }
        };
        if let Err(e) = ctx
            .session()
            .send_notification(PAYMENT_RESULT_METHOD, params)
            .await
        {
            tracing::warn!(
                request_id = %ctx.request_id(),
                error = %e,
                "settlement notification not delivered"
            );
        }
    }

    /// Structural validation of the returned proof against the demand.
    fn validate_proof(
        &self,
        proof: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<(), PaymentError> {
        if proof.payload.signature.is_empty() {
            return Err(PaymentError::payment_invalid("payment proof has no signature"));
        }
        if proof.x402_version != X402Version1::VALUE {
            return Err(PaymentError::invalid_request(format!(
                "unsupported x402 version {}",
                proof.x402_version
            )));
        }
        if proof.scheme != ExactScheme::VALUE {
            return Err(PaymentError::payment_invalid(format!(
                "unsupported payment scheme '{}'",
                proof.scheme
            )));
        }
        if proof.network != requirements.network {
            return Err(PaymentError::payment_invalid(format!(
                "payment network '{}' does not match demanded '{}'",
                proof.network, requirements.network
            )));
        }
        Ok(())
    }

    fn resource_url(&self, handler_name: &str) -> String {
        let path = format!("/tools/{handler_name}");
        match &self.config.base_url {
            Some(base) => format!("{}{path}", base.as_str().trim_end_matches('/')),
            None => path,
        }
    }
}
