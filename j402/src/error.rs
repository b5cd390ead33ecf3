//! Error taxonomy for the x402 session payment extension.
//!
//! Every failure surfaced across the session boundary carries a numeric code
//! from a fixed table: the JSON-RPC 2.0 range for protocol-level faults and
//! the 402xx range for payment-specific ones. [`PaymentError`] pairs a code
//! with a human-readable message and optional structured details, and
//! converts to/from JSON-RPC error objects.

use serde::{Deserialize, Serialize};

/// Machine-readable error codes, fixed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    /// Malformed JSON-RPC (`-32600`).
    InvalidRequest,
    /// The peer does not implement the requested method (`-32601`).
    MethodNotFound,
    /// Bad params (`-32602`).
    InvalidParams,
    /// Unclassified internal failure (`-32603`).
    InternalError,
    /// Protected handler invoked without a usable payment (`40200`).
    PaymentRequired,
    /// Proof malformed, network mismatch, or verifier rejection (`40201`).
    PaymentInvalid,
    /// Reserved; never emitted by the current state machine (`40202`).
    InsufficientPayment,
    /// Proof replay, as signaled by the facilitator (`40203`).
    ReplayDetected,
    /// Settlement failed on-chain (`40204`).
    PaymentExecutionFailed,
    /// Client-side per-call cap exceeded (`40210`).
    GuardrailViolation,
    /// Recipient not in the client allowlist (`40211`).
    WhitelistViolation,
    /// Invalid registration or pricing configuration.
    ///
    /// Local only: raised before any challenge exists, so it has no wire
    /// code of its own and crosses the boundary as `INTERNAL_ERROR`.
    ConfigInvalid,
}

impl ErrorCode {
    /// Returns the numeric wire code.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError | Self::ConfigInvalid => -32603,
            Self::PaymentRequired => 40200,
            Self::PaymentInvalid => 40201,
            Self::InsufficientPayment => 40202,
            Self::ReplayDetected => 40203,
            Self::PaymentExecutionFailed => 40204,
            Self::GuardrailViolation => 40210,
            Self::WhitelistViolation => 40211,
        }
    }

    /// Resolves a numeric wire code back to its taxonomy entry.
    ///
    /// `-32603` resolves to [`ErrorCode::InternalError`]; `CONFIG_INVALID`
    /// is local and never travels.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            -32600 => Some(Self::InvalidRequest),
            -32601 => Some(Self::MethodNotFound),
            -32602 => Some(Self::InvalidParams),
            -32603 => Some(Self::InternalError),
            40200 => Some(Self::PaymentRequired),
            40201 => Some(Self::PaymentInvalid),
            40202 => Some(Self::InsufficientPayment),
            40203 => Some(Self::ReplayDetected),
            40204 => Some(Self::PaymentExecutionFailed),
            40210 => Some(Self::GuardrailViolation),
            40211 => Some(Self::WhitelistViolation),
            _ => None,
        }
    }
}

/// A payment-layer error with a taxonomy code and optional structured details.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct PaymentError {
    /// The taxonomy entry.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Optional structured details (e.g., guardrail limits).
    pub details: Option<serde_json::Value>,
}

impl PaymentError {
    /// Creates an error with the given code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Attaches structured details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Protected handler invoked without a usable payment.
    #[must_use]
    pub fn payment_required(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PaymentRequired, message)
    }

    /// Proof malformed, inconsistent, or rejected by the verifier.
    #[must_use]
    pub fn payment_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PaymentInvalid, message)
    }

    /// Proof replay signaled by the facilitator.
    #[must_use]
    pub fn replay_detected(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ReplayDetected, message)
    }

    /// Settlement failed on-chain.
    #[must_use]
    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PaymentExecutionFailed, message)
    }

    /// Per-call cap exceeded.
    #[must_use]
    pub fn guardrail_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::GuardrailViolation, message)
    }

    /// Recipient not in the allowlist.
    #[must_use]
    pub fn whitelist_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::WhitelistViolation, message)
    }

    /// Malformed message on the extension wire.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Invalid registration or pricing configuration.
    #[must_use]
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalid, message)
    }

    /// Unclassified internal failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

/// A JSON-RPC error object as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl From<&PaymentError> for RpcErrorObject {
    fn from(err: &PaymentError) -> Self {
        Self {
            code: err.code.code(),
            message: err.message.clone(),
            data: err.details.clone(),
        }
    }
}

impl From<RpcErrorObject> for PaymentError {
    fn from(obj: RpcErrorObject) -> Self {
        Self {
            code: ErrorCode::from_code(obj.code).unwrap_or(ErrorCode::InternalError),
            message: obj.message,
            details: obj.data,
        }
    }
}
