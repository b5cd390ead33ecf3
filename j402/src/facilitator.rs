//! Facilitator trait and outcome types for payment verification and settlement.
//!
//! The facilitator is an external collaborator: it cryptographically
//! validates a signed authorization against the demanded requirements and
//! executes the on-chain transfer. This module defines the dyn-compatible
//! [`Facilitator`] trait the orchestrator consumes, plus the typed outcomes
//! with their wire serde (`isValid`/`invalidReason`, `success`/`errorReason`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::proto::{PaymentPayload, PaymentRequirements};

/// Boxed future alias used by the dyn-compatible traits of this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors that can occur while talking to a facilitator.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FacilitatorError {
    /// The facilitator could not be reached or answered out of protocol.
    #[error("Facilitator transport error: {0}")]
    Transport(String),
    /// The facilitator rejected the request as malformed.
    #[error("Facilitator rejected request: {0}")]
    Rejected(String),
    /// Any other error not covered by the specific variants.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Result of verifying a payment proof against requirements.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum VerifyOutcome {
    /// The proof matches the requirements and passes all checks.
    Valid {
        /// The address of the payer.
        payer: String,
    },
    /// The proof was well-formed but failed verification.
    Invalid {
        /// Machine-readable reason verification failed.
        reason: String,
        /// The payer address, if identifiable.
        payer: Option<String>,
    },
}

impl VerifyOutcome {
    /// Constructs a successful outcome.
    #[must_use]
    pub const fn valid(payer: String) -> Self {
        Self::Valid { payer }
    }

    /// Constructs a failed outcome.
    #[must_use]
    pub const fn invalid(reason: String, payer: Option<String>) -> Self {
        Self::Invalid { reason, payer }
    }

    /// Returns `true` if verification succeeded.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyOutcomeWire {
    is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    invalid_reason: Option<String>,
}

impl Serialize for VerifyOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Self::Valid { payer } => VerifyOutcomeWire {
                is_valid: true,
                payer: Some(payer.clone()),
                invalid_reason: None,
            },
            Self::Invalid { reason, payer } => VerifyOutcomeWire {
                is_valid: false,
                payer: payer.clone(),
                invalid_reason: Some(reason.clone()),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VerifyOutcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = VerifyOutcomeWire::deserialize(deserializer)?;
        if wire.is_valid {
            let payer = wire
                .payer
                .ok_or_else(|| serde::de::Error::missing_field("payer"))?;
            Ok(Self::Valid { payer })
        } else {
            let reason = wire
                .invalid_reason
                .ok_or_else(|| serde::de::Error::missing_field("invalidReason"))?;
            Ok(Self::Invalid {
                reason,
                payer: wire.payer,
            })
        }
    }
}

/// Result of executing an on-chain settlement.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Settlement {
    /// Settlement succeeded.
    Success {
        /// The on-chain transaction hash.
        transaction: String,
        /// The address that paid.
        payer: String,
        /// The network where settlement occurred.
        network: String,
    },
    /// Settlement failed.
    Failed {
        /// Machine-readable reason for failure.
        reason: String,
        /// The network where settlement was attempted.
        network: String,
    },
}

impl Settlement {
    /// Returns `true` if the settlement succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the network the settlement targeted.
    #[must_use]
    pub fn network(&self) -> &str {
        match self {
            Self::Success { network, .. } | Self::Failed { network, .. } => network,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettlementWire {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_reason: Option<String>,
}

impl Serialize for Settlement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Self::Success {
                transaction,
                payer,
                network,
            } => SettlementWire {
                success: true,
                transaction: Some(transaction.clone()),
                payer: Some(payer.clone()),
                network: network.clone(),
                error_reason: None,
            },
            Self::Failed { reason, network } => SettlementWire {
                success: false,
                transaction: None,
                payer: None,
                network: network.clone(),
                error_reason: Some(reason.clone()),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Settlement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = SettlementWire::deserialize(deserializer)?;
        if wire.success {
            let transaction = wire
                .transaction
                .ok_or_else(|| serde::de::Error::missing_field("transaction"))?;
            let payer = wire
                .payer
                .ok_or_else(|| serde::de::Error::missing_field("payer"))?;
            Ok(Self::Success {
                transaction,
                payer,
                network: wire.network,
            })
        } else {
            let reason = wire
                .error_reason
                .ok_or_else(|| serde::de::Error::missing_field("errorReason"))?;
            Ok(Self::Failed {
                reason,
                network: wire.network,
            })
        }
    }
}

/// Asynchronous interface to an x402 payment facilitator.
///
/// Dyn-compatible so heterogeneous facilitator instances can be passed as
/// `Arc<dyn Facilitator>` into the orchestrator.
pub trait Facilitator: Send + Sync {
    /// Verifies a payment proof against the demanded requirements.
    ///
    /// This includes signature validity, balance sufficiency, and compliance
    /// with the declared amount, recipient, asset, and validity window.
    fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> BoxFuture<'_, Result<VerifyOutcome, FacilitatorError>>;

    /// Executes the on-chain settlement for a previously verified proof.
    fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> BoxFuture<'_, Result<Settlement, FacilitatorError>>;
}

impl<T: Facilitator> Facilitator for Arc<T> {
    fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> BoxFuture<'_, Result<VerifyOutcome, FacilitatorError>> {
        self.as_ref().verify(payload, requirements)
    }

    fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> BoxFuture<'_, Result<Settlement, FacilitatorError>> {
        self.as_ref().settle(payload, requirements)
    }
}
