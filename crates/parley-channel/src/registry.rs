//! Handlers for inbound business envelopes, keyed by operation type.

use std::collections::HashMap;
use std::sync::Arc;

use parley_core::{Envelope, OperationType};
use tracing::debug;

/// Receives envelopes of one operation type.
pub trait EnvelopeHandler: Send + Sync {
    /// Handle a status-200 envelope.
    fn handle(&self, envelope: &Envelope);
}

impl<F> EnvelopeHandler for F
where
    F: Fn(&Envelope) + Send + Sync,
{
    fn handle(&self, envelope: &Envelope) {
        self(envelope);
    }
}

/// Registry mapping operation types to handlers.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<OperationType, Arc<dyn EnvelopeHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the same operation.
    pub fn register(
        &mut self,
        operation: impl Into<OperationType>,
        handler: impl EnvelopeHandler + 'static,
    ) {
        let _ = self.handlers.insert(operation.into(), Arc::new(handler));
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(
        mut self,
        operation: impl Into<OperationType>,
        handler: impl EnvelopeHandler + 'static,
    ) -> Self {
        self.register(operation, handler);
        self
    }

    /// Deliver an envelope. Returns `false` if no handler is registered.
    pub fn dispatch(&self, envelope: &Envelope) -> bool {
        let Some(handler) = self.handlers.get(&envelope.operation_type) else {
            debug!(operation = %envelope.operation_type, "no handler registered, dropping envelope");
            return false;
        };
        handler.handle(envelope);
        true
    }

    /// Check whether an operation has a handler.
    pub fn has_handler(&self, operation: &OperationType) -> bool {
        self.handlers.contains_key(operation)
    }

    /// Registered operation names (sorted).
    pub fn operations(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .keys()
            .map(|op| op.as_str().to_owned())
            .collect();
        names.sort();
        names
    }
}
