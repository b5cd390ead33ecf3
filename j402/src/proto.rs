//! Wire format types for x402 payment messages over a JSON-RPC session.
//!
//! This module defines the shapes exchanged between client and server during
//! a payment-gated invocation:
//!
//! - [`PaymentRequirements`] — the server's demand, carried as the params of
//!   an `x402/payment_required` request
//! - [`PaymentPayload`] — the client's signed proof, returned under the
//!   `payment` key of the challenge response
//! - [`PaymentResult`] — the settlement notification params
//! - [`RequestId`] — JSON-RPC correlation id (number or string)
//!
//! All types serialize to JSON using camelCase field names. The protocol
//! version is pinned by the `x402Version` field.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::timestamp::UnixTimestamp;

/// A protocol version marker parameterized by its numeric value.
///
/// Serializes as a bare integer and rejects any other value on
/// deserialization, so a mismatched `x402Version` fails at the parse layer.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Version<const N: u8>;

impl<const N: u8> Version<N> {
    /// The numeric value of this protocol version.
    pub const VALUE: u8 = N;
}

impl<const N: u8> From<Version<N>> for u8 {
    fn from(_: Version<N>) -> Self {
        N
    }
}

impl<const N: u8> fmt::Display for Version<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{N}")
    }
}

impl<const N: u8> Serialize for Version<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(N)
    }
}

impl<'de, const N: u8> Deserialize<'de> for Version<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = u8::deserialize(deserializer)?;
        if v == N {
            Ok(Self)
        } else {
            Err(serde::de::Error::custom(format!(
                "expected version {N}, got {v}"
            )))
        }
    }
}

/// Version marker for x402 protocol version 1.
pub type X402Version1 = Version<1>;

/// Convenience constant for constructing version-1 protocol messages.
pub const V1: X402Version1 = Version;

/// A unit struct representing the string literal `"exact"`.
///
/// The only payment scheme spoken by this core: the client authorizes a
/// transfer of exactly the demanded amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ExactScheme;

impl ExactScheme {
    /// The string literal value: `"exact"`.
    pub const VALUE: &'static str = "exact";
}

impl fmt::Display for ExactScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::VALUE)
    }
}

impl AsRef<str> for ExactScheme {
    fn as_ref(&self) -> &str {
        Self::VALUE
    }
}

impl FromStr for ExactScheme {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::VALUE {
            Ok(Self)
        } else {
            Err(format!("expected '{}', got '{s}'", Self::VALUE))
        }
    }
}

impl Serialize for ExactScheme {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(Self::VALUE)
    }
}

impl<'de> Deserialize<'de> for ExactScheme {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A JSON-RPC request id: number or string.
///
/// The payment challenge reuses the id of the originating invocation, and
/// the settlement notification carries it back as `requestId`, so this type
/// appears on every wire message of the extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id.
    Number(i64),
    /// String id.
    String(String),
}

impl RequestId {
    /// Returns `true` if the id is an empty string.
    ///
    /// Empty ids are rejected by the client audit ledger.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::String(s) if s.is_empty())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for RequestId {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// EIP-712 typed-data domain parameters carried in requirement `extra`.
///
/// For ERC-3009 tokens these are the token contract's domain name and
/// version; the signing side combines them with the chain id and the asset
/// address to reconstruct the full domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataExtra {
    /// The domain name (e.g., `"USD Coin"`).
    pub name: String,
    /// The domain version (e.g., `"2"`).
    pub version: String,
}

/// The server's demand for payment for one invocation.
///
/// Sent as the params of the `x402/payment_required` sub-RPC. The
/// `request_id` field duplicates the JSON-RPC id so session layers that
/// cannot reuse an in-flight inbound id still have a durable correlation
/// field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// The payment scheme. Always `"exact"`.
    pub scheme: ExactScheme,
    /// The network name (e.g., `"base-sepolia"`).
    pub network: String,
    /// The demanded amount in the asset's smallest unit, as a decimal string.
    pub max_amount_required: String,
    /// URL identifying the priced endpoint.
    pub resource: String,
    /// Human-readable description of the priced handler.
    #[serde(default)]
    pub description: String,
    /// MIME type of the handler output.
    #[serde(default)]
    pub mime_type: String,
    /// The recipient address for payment.
    pub pay_to: String,
    /// Validity window of the signed authorization, in seconds.
    pub max_timeout_seconds: u64,
    /// The token contract address.
    pub asset: String,
    /// Optional JSON schema for the handler output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    /// EIP-712 domain parameters for the asset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<TypedDataExtra>,
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// Correlation id; equals the id of the RPC that triggered the challenge.
    pub request_id: RequestId,
}

/// The typed transfer authorization signed by the client.
///
/// Mirrors the ERC-3009 `transferWithAuthorization` parameter set: who may
/// transfer, to whom, how much, and during what time window. Timestamps and
/// the value serialize as strings to survive JSON number precision limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    /// The paying address (token owner).
    pub from: String,
    /// The recipient address.
    pub to: String,
    /// The amount in the asset's smallest unit, as a decimal string.
    pub value: String,
    /// The authorization is not valid before this timestamp.
    pub valid_after: UnixTimestamp,
    /// The authorization expires at this timestamp.
    pub valid_before: UnixTimestamp,
    /// Unique 32-byte nonce, 0x-prefixed hex.
    pub nonce: String,
}

/// Scheme-specific proof material: signature plus the authorization it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactPayload {
    /// EIP-712 signature over the authorization, 0x-prefixed hex.
    ///
    /// Defaults to empty when absent so structural validation can report a
    /// missing signature instead of a parse failure.
    #[serde(default)]
    pub signature: String,
    /// The structured authorization that was signed.
    pub authorization: Authorization,
}

/// The client's signed proof, returned in response to a challenge.
///
/// The version, scheme, and network fields are deliberately loose here: the
/// orchestrator checks each one explicitly so that mismatches map onto the
/// taxonomy (`INVALID_REQUEST` for a version mismatch, `PAYMENT_INVALID`
/// otherwise) rather than failing as an undifferentiated parse error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version claimed by the client.
    pub x402_version: u8,
    /// The payment scheme claimed by the client.
    pub scheme: String,
    /// The network the authorization targets.
    pub network: String,
    /// The signed proof material.
    pub payload: ExactPayload,
}

impl PaymentPayload {
    /// Assembles a version-1 exact-scheme payload.
    #[must_use]
    pub fn exact(network: impl Into<String>, payload: ExactPayload) -> Self {
        Self {
            x402_version: X402Version1::VALUE,
            scheme: ExactScheme::VALUE.to_owned(),
            network: network.into(),
            payload,
        }
    }
}

/// Settlement notification params, sent as `x402/payment_result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    /// Whether the settlement succeeded on-chain.
    pub success: bool,
    /// The on-chain transaction hash, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    /// The network where settlement was attempted.
    pub network: String,
    /// The paying address, where known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// Machine-readable failure reason, on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    /// Correlation id of the originating invocation.
    pub request_id: RequestId,
}
