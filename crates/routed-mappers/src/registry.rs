//! Target registry: routing key to backend handle, key supplier, and the
//! interfaces to route. Immutable once built.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::CallContext;
use crate::error::ConfigurationError;
use crate::handler::RoutingInvocationHandler;
use crate::interface::{BackendFactory, BackendHandle, InterfaceDescriptor, RoutedInterface};
use crate::key::RoutingKey;
use crate::stats::RoutingStats;

/// Reads the routing key for a call from its context.
pub type KeySupplier<K> = Arc<dyn Fn(&CallContext<K>) -> Option<K> + Send + Sync>;

type InstallFn<K, H> = fn(&TargetRegistry<K, H>, &RoutingStats) -> Arc<dyn Any + Send + Sync>;

/// A registered interface with a type-erased constructor for its handler.
pub(crate) struct InterfaceRegistration<K, H> {
    pub(crate) descriptor: &'static InterfaceDescriptor,
    pub(crate) type_id: TypeId,
    pub(crate) install: InstallFn<K, H>,
}

fn install_handler<I, K, H>(
    registry: &TargetRegistry<K, H>,
    stats: &RoutingStats,
) -> Arc<dyn Any + Send + Sync>
where
    I: RoutedInterface + ?Sized,
    K: RoutingKey,
    H: BackendFactory<I>,
{
    Arc::new(RoutingInvocationHandler::<I, K, H>::new(registry, stats.clone()))
}

/// Immutable routing configuration.
pub struct TargetRegistry<K, H> {
    backends: HashMap<K, Arc<H>>,
    supplier: KeySupplier<K>,
    interfaces: Vec<InterfaceRegistration<K, H>>,
}

impl<K: RoutingKey, H: BackendHandle> TargetRegistry<K, H> {
    pub fn builder() -> TargetRegistryBuilder<K, H> {
        TargetRegistryBuilder::new()
    }

    pub fn backend(&self, key: K) -> Option<&Arc<H>> {
        self.backends.get(&key)
    }

    pub fn backends(&self) -> &HashMap<K, Arc<H>> {
        &self.backends
    }

    pub fn supplier(&self) -> &KeySupplier<K> {
        &self.supplier
    }

    /// Descriptors of the registered interfaces, in registration order.
    pub fn interfaces(&self) -> impl Iterator<Item = &'static InterfaceDescriptor> + '_ {
        self.interfaces.iter().map(|r| r.descriptor)
    }

    pub(crate) fn registrations(&self) -> &[InterfaceRegistration<K, H>] {
        &self.interfaces
    }
}

impl<K: RoutingKey, H> fmt::Debug for TargetRegistry<K, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetRegistry")
            .field("keys", &self.backends.keys().collect::<Vec<_>>())
            .field(
                "interfaces",
                &self.interfaces.iter().map(|r| r.descriptor.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Builder for [`TargetRegistry`].
pub struct TargetRegistryBuilder<K, H> {
    backends: Vec<(K, Arc<H>)>,
    supplier: Option<KeySupplier<K>>,
    interfaces: Vec<InterfaceRegistration<K, H>>,
}

impl<K: RoutingKey, H: BackendHandle> TargetRegistryBuilder<K, H> {
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            supplier: None,
            interfaces: Vec::new(),
        }
    }

    /// Route calls made under `key` to `backend`.
    pub fn backend(mut self, key: K, backend: H) -> Self {
        self.backends.push((key, Arc::new(backend)));
        self
    }

    /// Replace the default supplier, which reads [`CallContext::get`].
    pub fn supplier<F>(mut self, supplier: F) -> Self
    where
        F: Fn(&CallContext<K>) -> Option<K> + Send + Sync + 'static,
    {
        self.supplier = Some(Arc::new(supplier));
        self
    }

    /// Register interface `I` for proxying.
    pub fn interface<I>(mut self) -> Self
    where
        I: RoutedInterface + ?Sized,
        H: BackendFactory<I>,
    {
        self.interfaces.push(InterfaceRegistration {
            descriptor: I::descriptor(),
            type_id: TypeId::of::<I>(),
            install: install_handler::<I, K, H>,
        });
        self
    }

    /// Build the registry.
    ///
    /// Fails if a key is registered twice, if any key in [`RoutingKey::all`]
    /// has no backend, or if an interface is registered twice.
    pub fn build(self) -> Result<TargetRegistry<K, H>, ConfigurationError> {
        let mut backends = HashMap::with_capacity(self.backends.len());
        for (key, backend) in self.backends {
            if backends.insert(key, backend).is_some() {
                return Err(ConfigurationError::DuplicateBackend {
                    key: key.to_string(),
                });
            }
        }

        if let Some(key) = K::all().iter().find(|k| !backends.contains_key(*k)) {
            return Err(ConfigurationError::MissingBackend {
                key: key.to_string(),
            });
        }

        for (i, registration) in self.interfaces.iter().enumerate() {
            if self.interfaces[..i]
                .iter()
                .any(|r| r.type_id == registration.type_id)
            {
                return Err(ConfigurationError::DuplicateInterface {
                    interface: registration.descriptor.name,
                });
            }
        }

        let supplier: KeySupplier<K> = match self.supplier {
            Some(supplier) => supplier,
            None => Arc::new(|ctx: &CallContext<K>| ctx.get()),
        };

        Ok(TargetRegistry {
            backends,
            supplier,
            interfaces: self.interfaces,
        })
    }
}

impl<K: RoutingKey, H: BackendHandle> Default for TargetRegistryBuilder<K, H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Backend, MemoryBackend, Store};

    #[test]
    fn test_build_with_full_coverage() {
        let registry = TargetRegistry::builder()
            .backend(Backend::A, MemoryBackend::new("a"))
            .backend(Backend::B, MemoryBackend::new("b"))
            .interface::<dyn Store>()
            .build()
            .unwrap();

        assert_eq!(registry.backend(Backend::A).unwrap().name(), "a");
        assert_eq!(registry.backend(Backend::B).unwrap().name(), "b");
        let names: Vec<_> = registry.interfaces().map(|d| d.name).collect();
        assert_eq!(names, vec!["Store"]);
    }

    #[test]
    fn test_missing_backend_fails_at_build() {
        let err = TargetRegistry::builder()
            .backend(Backend::A, MemoryBackend::new("a"))
            .interface::<dyn Store>()
            .build()
            .unwrap_err();

        assert!(matches!(err, ConfigurationError::MissingBackend { ref key } if key == "B"));
    }

    #[test]
    fn test_duplicate_backend_rejected() {
        let err = TargetRegistry::builder()
            .backend(Backend::A, MemoryBackend::new("a"))
            .backend(Backend::A, MemoryBackend::new("a2"))
            .backend(Backend::B, MemoryBackend::new("b"))
            .build()
            .unwrap_err();

        assert!(matches!(err, ConfigurationError::DuplicateBackend { ref key } if key == "A"));
    }

    #[test]
    fn test_duplicate_interface_rejected() {
        let err = TargetRegistry::builder()
            .backend(Backend::A, MemoryBackend::new("a"))
            .backend(Backend::B, MemoryBackend::new("b"))
            .interface::<dyn Store>()
            .interface::<dyn Store>()
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigurationError::DuplicateInterface { interface: "Store" }
        ));
    }

    #[test]
    fn test_default_supplier_reads_context() {
        let registry = TargetRegistry::builder()
            .backend(Backend::A, MemoryBackend::new("a"))
            .backend(Backend::B, MemoryBackend::new("b"))
            .build()
            .unwrap();

        let mut ctx = CallContext::new();
        assert_eq!((registry.supplier())(&ctx), None);
        ctx.set(Backend::B);
        assert_eq!((registry.supplier())(&ctx), Some(Backend::B));
    }

    #[test]
    fn test_custom_supplier_replaces_default() {
        let registry = TargetRegistry::builder()
            .backend(Backend::A, MemoryBackend::new("a"))
            .backend(Backend::B, MemoryBackend::new("b"))
            .supplier(|ctx: &CallContext<Backend>| ctx.get().or(Some(Backend::A)))
            .build()
            .unwrap();

        let ctx = CallContext::new();
        assert_eq!((registry.supplier())(&ctx), Some(Backend::A));
    }
}
