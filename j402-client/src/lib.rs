//! Client half of the x402 session payment extension.
//!
//! Four cooperating components track and answer the server's payment
//! traffic:
//!
//! - [`ledger`] — the RPC audit ledger: one record per outgoing RPC, from
//!   the moment it is sent until its payment (if any) is reconciled
//! - [`interceptor`] — a decorator over the session's outbound send path
//!   that populates the ledger
//! - [`guardrails`] — per-call monetary cap and recipient allowlist,
//!   enforced before any signing
//! - [`responder`] — handles inbound `x402/payment_required` callbacks
//!   (correlate, enforce, sign, answer) and reconciles `x402/payment_result`
//!   notifications against the ledger
//!
//! # Flow
//!
//! 1. Every outgoing RPC passes through [`LedgerClient`](interceptor::LedgerClient),
//!    which records it as pending
//! 2. When the server demands payment, the challenge arrives with the same
//!    correlation id; the responder authorizes it only against a known
//!    pending invocation
//! 3. Guardrails run before the wallet is touched; violations travel back
//!    as the error body of the challenge response
//! 4. The eventual settlement notification is reconciled into the ledger

pub mod guardrails;
pub mod interceptor;
pub mod ledger;
pub mod responder;

pub use guardrails::Guardrails;
pub use interceptor::LedgerClient;
pub use ledger::{AuditLedger, AuditRecord, PaymentStatus, PendingRequest, RequestStatus};
pub use responder::PaymentResponder;
