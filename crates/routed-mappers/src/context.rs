//! Call-scoped routing context.
//!
//! A [`CallContext`] is passed explicitly to every routed call. It holds at
//! most one routing key and a correlation id recorded on routed-call spans.
//! A key stays set until it is replaced or cleared, so one context can carry
//! the same key across several routed calls.

use uuid::Uuid;

use crate::error::RoutingError;
use crate::key::RoutingKey;

/// Holder of the current routing key for one logical thread of execution.
#[derive(Debug, Clone)]
pub struct CallContext<K> {
    key: Option<K>,
    correlation_id: String,
}

impl<K: RoutingKey> CallContext<K> {
    /// Create an empty context with a fresh correlation id.
    pub fn new() -> Self {
        Self {
            key: None,
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create a context already routed to `key`.
    pub fn with_key(key: K) -> Self {
        let mut ctx = Self::new();
        ctx.set(key);
        ctx
    }

    /// Route subsequent calls to `key`, replacing any previous key.
    pub fn set(&mut self, key: K) {
        self.key = Some(key);
    }

    /// Like [`CallContext::set`], for keys coming from an untyped source.
    ///
    /// `None` is rejected with [`RoutingError::InvalidArgument`] and leaves
    /// the current key untouched.
    pub fn try_set(&mut self, key: Option<K>) -> Result<(), RoutingError> {
        match key {
            Some(key) => {
                self.set(key);
                Ok(())
            }
            None => Err(RoutingError::InvalidArgument(
                "routing key cannot be absent",
            )),
        }
    }

    /// The current key, or `None` when no key has been set.
    pub fn get(&self) -> Option<K> {
        self.key
    }

    /// Remove the current key.
    pub fn clear(&mut self) {
        self.key = None;
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

impl<K: RoutingKey> Default for CallContext<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Backend;

    #[test]
    fn test_new_context_is_absent() {
        let ctx = CallContext::<Backend>::new();
        assert_eq!(ctx.get(), None);
    }

    #[test]
    fn test_set_overwrites_previous_key() {
        let mut ctx = CallContext::with_key(Backend::A);
        assert_eq!(ctx.get(), Some(Backend::A));

        ctx.set(Backend::B);
        assert_eq!(ctx.get(), Some(Backend::B));
    }

    #[test]
    fn test_clear_restores_absent() {
        let mut ctx = CallContext::with_key(Backend::A);
        ctx.clear();
        assert_eq!(ctx.get(), None);

        // Clearing an already empty context is a no-op.
        ctx.clear();
        assert_eq!(ctx.get(), None);
    }

    #[test]
    fn test_try_set_rejects_absent_key() {
        let mut ctx = CallContext::with_key(Backend::A);
        let err = ctx.try_set(None).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidArgument(_)));
        assert_eq!(ctx.get(), Some(Backend::A));

        ctx.try_set(Some(Backend::B)).unwrap();
        assert_eq!(ctx.get(), Some(Backend::B));
    }

    #[test]
    fn test_contexts_are_independent() {
        let mut first = CallContext::with_key(Backend::A);
        let second = first.clone();
        first.set(Backend::B);

        assert_eq!(second.get(), Some(Backend::A));
        assert_ne!(
            CallContext::<Backend>::new().correlation_id(),
            CallContext::<Backend>::new().correlation_id()
        );
    }
}
