//! Local spending guardrails, enforced before any signing.
//!
//! Two checks, applied in order, each fatal: a per-call monetary cap and a
//! recipient allowlist. Both raise before the wallet is ever touched, so a
//! violating demand can never produce a signature.

use serde_json::json;

use j402::error::PaymentError;

/// Client-side spending limits.
#[derive(Debug, Clone, Default)]
pub struct Guardrails {
    /// Maximum priced-unit amount per call; `None` disables the cap.
    pub max_payment_per_call: Option<f64>,
    /// Allowed recipient addresses; `None` disables the allowlist.
    pub whitelisted_servers: Option<Vec<String>>,
}

impl Guardrails {
    /// Creates guardrails with both checks disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-call cap in priced units.
    #[must_use]
    pub const fn with_max_payment_per_call(mut self, cap: f64) -> Self {
        self.max_payment_per_call = Some(cap);
        self
    }

    /// Sets the recipient allowlist.
    #[must_use]
    pub fn with_whitelisted_servers(mut self, servers: Vec<String>) -> Self {
        self.whitelisted_servers = Some(servers);
        self
    }

    /// Evaluates both checks against one payment demand.
    ///
    /// # Errors
    ///
    /// Returns `GUARDRAIL_VIOLATION` when the priced amount exceeds the
    /// per-call cap, or `WHITELIST_VIOLATION` when the recipient is not in
    /// the allowlist. An amount equal to the cap passes.
    pub fn enforce(&self, amount: f64, pay_to: &str) -> Result<(), PaymentError> {
        if let Some(cap) = self.max_payment_per_call {
            if amount > cap {
                return Err(PaymentError::guardrail_violation(format!(
                    "payment of {amount} exceeds per-call cap of {cap}"
                ))
                .with_details(json!({
                    "amount": amount,
                    "maxPaymentPerCall": cap,
                })));
            }
        }
        if let Some(servers) = &self.whitelisted_servers {
            if !servers.iter().any(|s| s == pay_to) {
                return Err(PaymentError::whitelist_violation(format!(
                    "recipient {pay_to} is not whitelisted"
                ))
                .with_details(json!({
                    "payTo": pay_to,
                    "whitelistedServers": servers,
                })));
            }
        }
        Ok(())
    }
}
