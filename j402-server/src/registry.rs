//! Handler registration and per-session descriptor materialization.
//!
//! Handlers are registered explicitly through [`HandlerRegistry::register`]
//! — a descriptor names the handler, fixes its kind (tool, prompt, resource,
//! or resource template), and optionally attaches [`PaymentOptions`] that
//! make it payment-protected. A [`SessionFactory`] holds one descriptor
//! factory per handler-bearing type and materializes a fresh
//! [`SessionHandlers`] partition at session start, so per-session mutable
//! state captured by handler closures never leaks across sessions.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use j402::error::PaymentError;
use j402::facilitator::BoxFuture;

use crate::context::HandlerContext;

/// The four handler kinds of the base protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HandlerKind {
    /// A named tool invoked with arguments.
    Tool,
    /// A prompt template invoked with arguments.
    Prompt,
    /// A fixed resource read by URI.
    Resource,
    /// A parameterized resource read by URI plus template variables.
    ResourceTemplate,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Tool => "tool",
            Self::Prompt => "prompt",
            Self::Resource => "resource",
            Self::ResourceTemplate => "resourceTemplate",
        };
        f.write_str(s)
    }
}

/// Per-handler pricing metadata. Presence makes a handler protected.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOptions {
    /// The price in human units (e.g., `0.001` USDC).
    pub amount: f64,
    /// Optional description used in the payment demand.
    pub description: Option<String>,
}

impl PaymentOptions {
    /// Creates payment options for the given priced amount.
    #[must_use]
    pub const fn new(amount: f64) -> Self {
        Self {
            amount,
            description: None,
        }
    }

    /// Sets the demand description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The arguments a handler callback receives, per kind.
///
/// This encodes the base protocol's calling conventions: tools and prompts
/// take argument maps, resources a URI, resource templates a URI plus
/// template variables.
#[derive(Debug, Clone)]
pub enum HandlerRequest {
    /// Tool invocation; `arguments` is absent for tools without input shape.
    Tool {
        /// Tool arguments.
        arguments: Option<serde_json::Map<String, Value>>,
    },
    /// Prompt invocation.
    Prompt {
        /// Prompt arguments.
        arguments: serde_json::Map<String, Value>,
    },
    /// Resource read.
    Resource {
        /// The resource URI.
        uri: String,
    },
    /// Resource template read.
    ResourceTemplate {
        /// The resource URI.
        uri: String,
        /// Expanded template variables.
        variables: serde_json::Map<String, Value>,
    },
}

impl HandlerRequest {
    /// Returns the handler kind this request shape targets.
    #[must_use]
    pub const fn kind(&self) -> HandlerKind {
        match self {
            Self::Tool { .. } => HandlerKind::Tool,
            Self::Prompt { .. } => HandlerKind::Prompt,
            Self::Resource { .. } => HandlerKind::Resource,
            Self::ResourceTemplate { .. } => HandlerKind::ResourceTemplate,
        }
    }
}

/// The bound handler callable.
///
/// Handlers return their result as JSON; failures surface as boxed errors
/// which the wrapper folds into a generic "Handler execution failed" error.
pub type HandlerFn = Arc<
    dyn Fn(
            HandlerRequest,
            HandlerContext,
        )
            -> BoxFuture<'static, Result<Value, Box<dyn std::error::Error + Send + Sync>>>
        + Send
        + Sync,
>;

/// Registration for one handler: identity, kind, shapes, pricing, callable.
#[derive(Clone)]
pub struct HandlerDescriptor {
    /// Unique handler name.
    pub name: String,
    /// The handler kind.
    pub kind: HandlerKind,
    /// Optional JSON schema of the handler input.
    pub input_schema: Option<Value>,
    /// Optional JSON schema of the handler output.
    pub output_schema: Option<Value>,
    /// Pricing metadata; presence makes the handler protected.
    pub payment: Option<PaymentOptions>,
    /// The bound callable.
    pub handler: HandlerFn,
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("payment", &self.payment)
            .finish_non_exhaustive()
    }
}

impl HandlerDescriptor {
    /// Creates a descriptor for the given name, kind, and callable.
    pub fn new(name: impl Into<String>, kind: HandlerKind, handler: HandlerFn) -> Self {
        Self {
            name: name.into(),
            kind,
            input_schema: None,
            output_schema: None,
            payment: None,
            handler,
        }
    }

    /// Attaches payment options, making the handler protected.
    #[must_use]
    pub fn with_payment(mut self, options: PaymentOptions) -> Self {
        self.payment = Some(options);
        self
    }

    /// Attaches an input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Attaches an output schema.
    #[must_use]
    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Returns `true` if the descriptor carries payment options.
    #[must_use]
    pub const fn is_protected(&self) -> bool {
        self.payment.is_some()
    }
}

/// Collects handler descriptors, validating each registration.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<HandlerDescriptor>,
    kinds_by_name: HashMap<String, HandlerKind>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.handlers.iter().map(|h| h.name.as_str()).collect();
        f.debug_tuple("HandlerRegistry").field(&names).finish()
    }
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler descriptor.
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_INVALID` if the name is empty, already bound to a
    /// (possibly different) kind, or the payment amount is not a positive
    /// finite number.
    pub fn register(&mut self, descriptor: HandlerDescriptor) -> Result<&mut Self, PaymentError> {
        if descriptor.name.is_empty() {
            return Err(PaymentError::config_invalid("handler name must not be empty"));
        }
        if let Some(existing) = self.kinds_by_name.get(&descriptor.name) {
            let message = if *existing == descriptor.kind {
                format!("handler '{}' registered twice", descriptor.name)
            } else {
                format!(
                    "handler '{}' registered as both {existing} and {}",
                    descriptor.name, descriptor.kind
                )
            };
            return Err(PaymentError::config_invalid(message));
        }
        if let Some(options) = &descriptor.payment {
            if !options.amount.is_finite() || options.amount <= 0.0 {
                return Err(PaymentError::config_invalid(format!(
                    "handler '{}' has non-positive payment amount {}",
                    descriptor.name, options.amount
                )));
            }
        }
        self.kinds_by_name
            .insert(descriptor.name.clone(), descriptor.kind);
        self.handlers.push(descriptor);
        Ok(self)
    }

    /// Partitions the registered handlers by kind.
    ///
    /// Ordering is deterministic: kind (tool, prompt, resource, resource
    /// template), then registration order within each kind.
    #[must_use]
    pub fn into_session(self) -> SessionHandlers {
        let mut session = SessionHandlers::default();
        for descriptor in self.handlers {
            match descriptor.kind {
                HandlerKind::Tool => session.tools.push(descriptor),
                HandlerKind::Prompt => session.prompts.push(descriptor),
                HandlerKind::Resource => session.resources.push(descriptor),
                HandlerKind::ResourceTemplate => session.resource_templates.push(descriptor),
            }
        }
        session
    }
}

/// Handler descriptors for one session, partitioned by kind.
#[derive(Debug, Default, Clone)]
pub struct SessionHandlers {
    /// Tool handlers, in registration order.
    pub tools: Vec<HandlerDescriptor>,
    /// Prompt handlers, in registration order.
    pub prompts: Vec<HandlerDescriptor>,
    /// Resource handlers, in registration order.
    pub resources: Vec<HandlerDescriptor>,
    /// Resource-template handlers, in registration order.
    pub resource_templates: Vec<HandlerDescriptor>,
}

impl SessionHandlers {
    /// Finds a descriptor by kind and name.
    #[must_use]
    pub fn find(&self, kind: HandlerKind, name: &str) -> Option<&HandlerDescriptor> {
        let list = match kind {
            HandlerKind::Tool => &self.tools,
            HandlerKind::Prompt => &self.prompts,
            HandlerKind::Resource => &self.resources,
            HandlerKind::ResourceTemplate => &self.resource_templates,
        };
        list.iter().find(|d| d.name == name)
    }

    /// Total number of handlers across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
            + self.prompts.len()
            + self.resources.len()
            + self.resource_templates.len()
    }

    /// Returns `true` if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Produces the descriptors of one handler-bearing type.
///
/// Called once per session so that state captured by the returned closures
/// is fresh for every session.
pub type DescriptorFactory =
    Arc<dyn Fn() -> Result<Vec<HandlerDescriptor>, PaymentError> + Send + Sync>;

/// Builds fresh per-session handler partitions from registered factories.
#[derive(Default, Clone)]
pub struct SessionFactory {
    factories: Vec<DescriptorFactory>,
}

impl fmt::Debug for SessionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionFactory")
            .field("factories", &self.factories.len())
            .finish()
    }
}

impl SessionFactory {
    /// Creates an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor factory for one handler-bearing type.
    #[must_use]
    pub fn with_type<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<Vec<HandlerDescriptor>, PaymentError> + Send + Sync + 'static,
    {
        self.factories.push(Arc::new(factory));
        self
    }

    /// Materializes and validates the handlers for one new session.
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_INVALID` if any factory fails or any descriptor is
    /// rejected at registration.
    pub fn build_session(&self) -> Result<SessionHandlers, PaymentError> {
        let mut registry = HandlerRegistry::new();
        for factory in &self.factories {
            for descriptor in factory()? {
                registry.register(descriptor)?;
            }
        }
        Ok(registry.into_session())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use j402::error::ErrorCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop_handler() -> HandlerFn {
        Arc::new(|_, _| Box::pin(async { Ok(Value::Null) }))
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut registry = HandlerRegistry::new();
        let err = registry
            .register(
                HandlerDescriptor::new("paid", HandlerKind::Tool, noop_handler())
                    .with_payment(PaymentOptions::new(0.0)),
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalid);
    }

    #[test]
    fn test_negative_amount_rejected() {
        let mut registry = HandlerRegistry::new();
        let err = registry
            .register(
                HandlerDescriptor::new("paid", HandlerKind::Tool, noop_handler())
                    .with_payment(PaymentOptions::new(-1.0)),
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalid);
    }

    #[test]
    fn test_duplicate_kind_rejected() {
        let mut registry = HandlerRegistry::new();
        registry
            .register(HandlerDescriptor::new(
                "thing",
                HandlerKind::Tool,
                noop_handler(),
            ))
            .unwrap();
        let err = registry
            .register(HandlerDescriptor::new(
                "thing",
                HandlerKind::Prompt,
                noop_handler(),
            ))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalid);
        assert!(err.message.contains("both tool and prompt"));
    }

    #[test]
    fn test_partition_order_is_deterministic() {
        let mut registry = HandlerRegistry::new();
        registry
            .register(HandlerDescriptor::new(
                "r1",
                HandlerKind::Resource,
                noop_handler(),
            ))
            .unwrap();
        registry
            .register(HandlerDescriptor::new(
                "t1",
                HandlerKind::Tool,
                noop_handler(),
            ))
            .unwrap();
        registry
            .register(HandlerDescriptor::new(
                "t2",
                HandlerKind::Tool,
                noop_handler(),
            ))
            .unwrap();
        let session = registry.into_session();
        let tool_names: Vec<&str> = session.tools.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(tool_names, ["t1", "t2"]);
        assert_eq!(session.resources.len(), 1);
        assert_eq!(session.len(), 3);
    }

    #[test]
    fn test_build_session_materializes_fresh_instances() {
        static BUILDS: AtomicUsize = AtomicUsize::new(0);
        let factory = SessionFactory::new().with_type(|| {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            Ok(vec![HandlerDescriptor::new(
                "fresh",
                HandlerKind::Tool,
                noop_handler(),
            )])
        });

        let a = factory.build_session().unwrap();
        let b = factory.build_session().unwrap();
        assert_eq!(a.tools.len(), 1);
        assert_eq!(b.tools.len(), 1);
        assert_eq!(BUILDS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_find_by_kind_and_name() {
        let mut registry = HandlerRegistry::new();
        registry
            .register(HandlerDescriptor::new(
                "add",
                HandlerKind::Tool,
                noop_handler(),
            ))
            .unwrap();
        let session = registry.into_session();
        assert!(session.find(HandlerKind::Tool, "add").is_some());
        assert!(session.find(HandlerKind::Prompt, "add").is_none());
        assert!(session.find(HandlerKind::Tool, "missing").is_none());
    }
}
