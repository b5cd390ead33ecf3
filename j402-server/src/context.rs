//! Per-invocation context and the sealed payment state.
//!
//! An [`InvocationContext`] is created when the session layer dispatches an
//! inbound RPC to the payment gate. It carries the request id, the session
//! handle for server-originated traffic, and a cancellation token. During
//! the verify phase the orchestrator attaches a crate-private
//! [`PaymentState`]; the wrapper is the sole owner of that state for the
//! invocation's duration and clears it on every exit path. Handler bodies
//! receive a [`HandlerContext`] view, which has no access to payment fields
//! at all.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use j402::proto::{PaymentPayload, PaymentRequirements, RequestId};
use j402::session::RpcSession;

/// Verified payment material held between verify and settle.
pub(crate) struct PaymentState {
    /// The client's verified proof.
    pub proof: PaymentPayload,
    /// The requirements the proof was verified against.
    pub requirements: PaymentRequirements,
}

/// Mutable per-RPC scratchpad, scoped to one handler execution.
pub struct InvocationContext {
    request_id: RequestId,
    session: Arc<dyn RpcSession>,
    cancellation: CancellationToken,
    payment: Option<PaymentState>,
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("request_id", &self.request_id)
            .field("has_payment", &self.payment.is_some())
            .finish_non_exhaustive()
    }
}

impl InvocationContext {
    /// Creates a context for one inbound RPC.
    pub fn new(request_id: impl Into<RequestId>, session: Arc<dyn RpcSession>) -> Self {
        Self {
            request_id: request_id.into(),
            session,
            cancellation: CancellationToken::new(),
            payment: None,
        }
    }

    /// Binds the session layer's cancellation signal for this RPC.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The id of the originating RPC.
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// The session this RPC arrived on.
    #[must_use]
    pub fn session(&self) -> &Arc<dyn RpcSession> {
        &self.session
    }

    /// Returns `true` if the session has cancelled the originating RPC.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// The view handed to handler bodies. Payment state is not reachable
    /// from it.
    #[must_use]
    pub fn handler_view(&self) -> HandlerContext {
        HandlerContext {
            request_id: self.request_id.clone(),
            session: Arc::clone(&self.session),
            cancellation: self.cancellation.clone(),
        }
    }

    pub(crate) fn attach_payment(&mut self, state: PaymentState) {
        self.payment = Some(state);
    }

    pub(crate) fn take_payment(&mut self) -> Option<PaymentState> {
        self.payment.take()
    }

    pub(crate) fn clear_payment(&mut self) {
        self.payment = None;
    }

    /// Whether verified payment state is currently attached.
    ///
    /// Exposed for tests asserting the wrapper strips state on every exit
    /// path; production code outside this crate has no use for it.
    #[must_use]
    pub fn has_payment(&self) -> bool {
        self.payment.is_some()
    }
}

/// The context a handler body observes: correlation id, session handle for
/// notifications, and the cancellation signal.
#[derive(Clone)]
pub struct HandlerContext {
    request_id: RequestId,
    session: Arc<dyn RpcSession>,
    cancellation: CancellationToken,
}

impl fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

impl HandlerContext {
    /// The id of the originating RPC.
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// The session this RPC arrived on.
    #[must_use]
    pub fn session(&self) -> &Arc<dyn RpcSession> {
        &self.session
    }

    /// Returns `true` if the session has cancelled the originating RPC.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
