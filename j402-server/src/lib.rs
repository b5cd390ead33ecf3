//! Server half of the x402 session payment extension.
//!
//! Three cooperating components wrap a protected handler invocation:
//!
//! - [`registry`] — explicit handler registration: descriptors carrying
//!   per-handler pricing metadata, partitioned by kind per session
//! - [`orchestrator`] — the verify → execute → settle state machine,
//!   including the in-band `x402/payment_required` sub-RPC back to the caller
//! - [`wrapper`] — glue composing the orchestrator around a registered
//!   handler while owning the per-invocation payment state
//!
//! # Flow
//!
//! 1. The session layer dispatches an inbound RPC to
//!    [`PaymentGate::invoke`](wrapper::PaymentGate::invoke)
//! 2. For a protected handler, the orchestrator assembles requirements and
//!    sends `x402/payment_required` back over the same session, reusing the
//!    inbound request id
//! 3. The returned proof is structurally validated, then verified with the
//!    facilitator
//! 4. Only then does the handler body run; a handler failure ends the flow
//!    with no settlement
//! 5. On handler success the payment is settled and exactly one
//!    `x402/payment_result` notification is emitted, carrying the
//!    originating request id

pub mod context;
pub mod orchestrator;
pub mod registry;
pub mod wrapper;

pub use context::{HandlerContext, InvocationContext};
pub use orchestrator::{PaymentOrchestrator, ServerPaymentConfig};
pub use registry::{
    HandlerDescriptor, HandlerKind, HandlerRegistry, HandlerRequest, PaymentOptions,
    SessionFactory, SessionHandlers,
};
pub use wrapper::PaymentGate;
