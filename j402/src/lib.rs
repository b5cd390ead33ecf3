//! Core types and traits for the x402 session payment extension.
//!
//! j402 extends a bidirectional JSON-RPC session protocol (tools, prompts,
//! resources) with an in-band, blockchain-settled pay-per-call layer. When a
//! client invokes a protected handler, the server answers with a nested
//! `x402/payment_required` request travelling in the *reverse* direction over
//! the same session; the client signs a payment authorization, the server
//! verifies it with a facilitator, executes the handler, settles on-chain,
//! and emits an `x402/payment_result` notification.
//!
//! This crate holds the pieces shared by both halves:
//!
//! - [`proto`] — wire format types (requirements, payloads, settlement results)
//! - [`error`] — the numeric error taxonomy and [`PaymentError`](error::PaymentError)
//! - [`facilitator`] — the external verify/settle collaborator trait
//! - [`wallet`] — account abstraction for typed-data signing
//! - [`pricing`] — priced-units ↔ atomic-units conversion trait
//! - [`session`] — the minimal session seams both halves consume
//! - [`store`] — generic key/value store backing the client audit ledger
//! - [`timestamp`] — string-serialized Unix timestamps for authorization windows
//!
//! The server half lives in `j402-server`, the client half in `j402-client`,
//! and EVM signing/pricing defaults in `j402-evm`.

pub mod error;
pub mod facilitator;
pub mod pricing;
pub mod proto;
pub mod session;
pub mod store;
pub mod timestamp;
pub mod wallet;

/// JSON-RPC method for the server-originated payment challenge.
///
/// Sent as a *request* from server to client, reusing the id of the
/// originating invocation so the client can correlate it.
pub const PAYMENT_REQUIRED_METHOD: &str = "x402/payment_required";

/// JSON-RPC method for the asynchronous settlement notification.
pub const PAYMENT_RESULT_METHOD: &str = "x402/payment_result";

/// The x402 protocol version spoken by this crate.
pub const X402_VERSION: u8 = 1;
