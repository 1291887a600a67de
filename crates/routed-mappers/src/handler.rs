//! Invocation handler behind every routed proxy.
//!
//! For each call: read the routing key through the configured supplier,
//! resolve the target for (interface, key) from the [`ProxyEntry`], and
//! forward the call. The target's result, including its errors, is returned
//! as-is. A missing key is an error; there is no default backend.

use std::fmt;
use std::sync::Arc;

use crate::context::CallContext;
use crate::entry::ProxyEntry;
use crate::error::RoutingError;
use crate::interface::{BackendFactory, InterfaceDescriptor, RoutedInterface};
use crate::key::RoutingKey;
use crate::registry::{KeySupplier, TargetRegistry};
use crate::stats::RoutingStats;

/// Routes calls on interface `I` to the target selected by the call context.
pub struct RoutingInvocationHandler<I: ?Sized, K, H> {
    descriptor: &'static InterfaceDescriptor,
    entry: ProxyEntry<I, K, H>,
    supplier: KeySupplier<K>,
    stats: RoutingStats,
}

impl<I, K, H> RoutingInvocationHandler<I, K, H>
where
    I: RoutedInterface + ?Sized,
    K: RoutingKey,
    H: BackendFactory<I>,
{
    pub fn new(registry: &TargetRegistry<K, H>, stats: RoutingStats) -> Self {
        Self {
            descriptor: I::descriptor(),
            entry: ProxyEntry::new(registry.backends()),
            supplier: Arc::clone(registry.supplier()),
            stats,
        }
    }

    pub fn descriptor(&self) -> &'static InterfaceDescriptor {
        self.descriptor
    }

    pub fn entry(&self) -> &ProxyEntry<I, K, H> {
        &self.entry
    }

    /// Resolve the target the next call under `ctx` would reach.
    pub fn resolve(&self, ctx: &CallContext<K>, method: &'static str) -> Result<Arc<I>, RoutingError> {
        let key = self.routing_key(ctx, method)?;
        self.entry.get_or_materialize(key, &self.stats)
    }

    fn routing_key(&self, ctx: &CallContext<K>, method: &'static str) -> Result<K, RoutingError> {
        (self.supplier)(ctx).ok_or_else(|| {
            self.stats.inc_missing_context();
            tracing::warn!(
                correlation_id = %ctx.correlation_id(),
                interface = self.descriptor.name,
                method = method,
                "Tried to invoke routed method without setting a target"
            );
            RoutingError::ContextMissing {
                interface: self.descriptor.name,
                method,
            }
        })
    }

    /// Forward one call to the target selected by `ctx`.
    ///
    /// Routing failures are converted into the interface's error type through
    /// `From<RoutingError>`; whatever `call` returns is passed through untouched.
    pub fn invoke<R, E, F>(&self, ctx: &CallContext<K>, method: &'static str, call: F) -> Result<R, E>
    where
        F: FnOnce(&I) -> Result<R, E>,
        E: From<RoutingError>,
    {
        let span = routed_tracing::routed_call_span!(ctx.correlation_id(), self.descriptor.name, method);
        let _enter = span.enter();

        let key = self.routing_key(ctx, method)?;
        span.record("key", tracing::field::display(key));

        let target = self.entry.get_or_materialize(key, &self.stats)?;
        self.stats.inc_routed_calls();
        tracing::debug!(method = method, "Invoking routed method");

        call(&*target)
    }
}

impl<I: ?Sized, K: RoutingKey, H> fmt::Debug for RoutingInvocationHandler<I, K, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingInvocationHandler")
            .field("interface", &self.descriptor.name)
            .field("entry", &self.entry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tracing::field::{Field, Visit};
    use tracing::span::{Id, Record};
    use tracing::Subscriber;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::registry::LookupSpan;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    use super::*;
    use crate::testing::{Backend, MemoryBackend, Store, StoreError};

    /// Collects `(span name, value)` for every `key` recorded after span creation.
    #[derive(Clone, Default)]
    struct RecordedKeys(Arc<Mutex<Vec<(String, String)>>>);

    impl RecordedKeys {
        fn take(&self) -> Vec<(String, String)> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    struct KeyVisitor(Option<String>);

    impl Visit for KeyVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "key" {
                self.0 = Some(format!("{value:?}"));
            }
        }
    }

    impl<S> Layer<S> for RecordedKeys
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
            let mut visitor = KeyVisitor(None);
            values.record(&mut visitor);
            if let (Some(value), Some(span)) = (visitor.0, ctx.span(id)) {
                self.0.lock().unwrap().push((span.name().to_string(), value));
            }
        }
    }

    fn handler() -> (
        RoutingInvocationHandler<dyn Store, Backend, MemoryBackend>,
        MemoryBackend,
        MemoryBackend,
    ) {
        let a = MemoryBackend::new("a");
        let b = MemoryBackend::new("b");
        let registry = TargetRegistry::builder()
            .backend(Backend::A, a.clone())
            .backend(Backend::B, b.clone())
            .interface::<dyn Store>()
            .build()
            .unwrap();
        (RoutingInvocationHandler::new(&registry, RoutingStats::new()), a, b)
    }

    #[test]
    fn test_invoke_without_key_fails() {
        let (handler, a, b) = handler();
        let ctx = CallContext::new();

        let result: Result<Option<String>, StoreError> =
            handler.invoke(&ctx, "get", |target| target.get(1));

        assert!(matches!(
            result,
            Err(StoreError::Routing(RoutingError::ContextMissing {
                interface: "Store",
                method: "get",
            }))
        ));
        assert_eq!(a.constructed() + b.constructed(), 0);
        assert_eq!(handler.stats.snapshot().missing_context, 1);
    }

    #[test]
    fn test_invoke_reaches_only_selected_backend() {
        let (handler, a, b) = handler();
        let ctx = CallContext::with_key(Backend::B);

        let result: Result<(), StoreError> =
            handler.invoke(&ctx, "put", |target| target.put(7, "hello".to_string()));
        result.unwrap();

        assert_eq!(b.calls(), 1);
        assert_eq!(a.calls(), 0);
        assert_eq!(a.constructed(), 0);
        assert!(handler.entry().is_materialized(Backend::B));
    }

    #[test]
    fn test_delegated_error_is_unchanged() {
        let (handler, _a, _b) = handler();
        let ctx = CallContext::with_key(Backend::A);

        let first: Result<(), StoreError> =
            handler.invoke(&ctx, "put", |target| target.put(1, "x".to_string()));
        first.unwrap();
        let second: Result<(), StoreError> =
            handler.invoke(&ctx, "put", |target| target.put(1, "x".to_string()));

        assert!(matches!(
            second,
            Err(StoreError::Duplicate { id: 1, ref backend }) if backend == "a"
        ));
    }

    #[test]
    fn test_resolve_same_key_is_identity_equal() {
        let (handler, _a, _b) = handler();
        let ctx = CallContext::with_key(Backend::A);

        let first = handler.resolve(&ctx, "get").unwrap();
        let second = handler.resolve(&ctx, "get").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_key_is_recorded_on_routed_call_span_only() {
        let recorded = RecordedKeys::default();
        let _default = tracing_subscriber::registry()
            .with(recorded.clone())
            .set_default();

        let (handler, _a, _b) = handler();
        let ctx = CallContext::with_key(Backend::B);

        let caller = tracing::info_span!("caller", key = tracing::field::Empty);
        let _enter = caller.enter();

        handler.resolve(&ctx, "get").unwrap();
        assert!(recorded.take().is_empty());

        let result: Result<Option<String>, StoreError> =
            handler.invoke(&ctx, "get", |target| target.get(1));
        assert_eq!(result.unwrap(), None);
        assert_eq!(
            recorded.take(),
            vec![("routed_call".to_string(), "B".to_string())]
        );
    }
}
