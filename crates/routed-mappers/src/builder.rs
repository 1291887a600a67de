//! Builds and publishes one routed proxy per registered interface.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigurationError, RoutingError};
use crate::handler::RoutingInvocationHandler;
use crate::interface::{BackendFactory, BackendHandle, InterfaceDescriptor, RoutedInterface};
use crate::key::RoutingKey;
use crate::registry::TargetRegistry;
use crate::stats::RoutingStats;

/// A forwarding adapter over a [`RoutingInvocationHandler`].
///
/// Implemented by the `Routed*` types generated by
/// [`routed_interface!`](crate::routed_interface).
pub trait RoutedProxy<K, H>: Sized {
    type Interface: RoutedInterface + ?Sized;

    fn from_handler(handler: Arc<RoutingInvocationHandler<Self::Interface, K, H>>) -> Self;
}

struct PublishedProxy {
    descriptor: &'static InterfaceDescriptor,
    handler: Arc<dyn Any + Send + Sync>,
}

/// Builds the routed proxies for every interface in a [`TargetRegistry`].
pub struct RoutedProxyBuilder<K, H> {
    registry: Arc<TargetRegistry<K, H>>,
    stats: RoutingStats,
}

impl<K: RoutingKey, H: BackendHandle> RoutedProxyBuilder<K, H> {
    pub fn new(registry: TargetRegistry<K, H>) -> Self {
        Self::from_shared(Arc::new(registry))
    }

    pub fn from_shared(registry: Arc<TargetRegistry<K, H>>) -> Self {
        Self {
            registry,
            stats: RoutingStats::new(),
        }
    }

    /// Share `stats` with the published handlers instead of a fresh set.
    pub fn with_stats(mut self, stats: RoutingStats) -> Self {
        self.stats = stats;
        self
    }

    /// Validate each interface, register it with every backend, and publish
    /// its handler. Any failure aborts the build; nothing is published.
    pub fn build(self) -> Result<RoutedProxies<K, H>, ConfigurationError> {
        let mut proxies = HashMap::new();

        for registration in self.registry.registrations() {
            let descriptor = registration.descriptor;
            descriptor.validate()?;

            for key in K::all() {
                let backend = self
                    .registry
                    .backend(*key)
                    .ok_or_else(|| ConfigurationError::MissingBackend {
                        key: key.to_string(),
                    })?;

                backend.register_interface(descriptor).map_err(|source| {
                    ConfigurationError::InterfaceRegistration {
                        interface: descriptor.name,
                        backend: backend.name().to_string(),
                        source,
                    }
                })?;
            }

            let handler = (registration.install)(&self.registry, &self.stats);
            proxies.insert(registration.type_id, PublishedProxy { descriptor, handler });

            tracing::info!(
                interface = descriptor.name,
                methods = descriptor.methods.len(),
                backends = K::all().len(),
                "Published routed proxy"
            );
        }

        Ok(RoutedProxies {
            registry: self.registry,
            proxies,
            stats: self.stats,
        })
    }
}

/// The published routed proxies, looked up by interface.
pub struct RoutedProxies<K, H> {
    registry: Arc<TargetRegistry<K, H>>,
    proxies: HashMap<TypeId, PublishedProxy>,
    stats: RoutingStats,
}

impl<K: RoutingKey, H: BackendHandle> RoutedProxies<K, H> {
    /// The routed proxy for `P::Interface`.
    pub fn get<P>(&self) -> Result<P, RoutingError>
    where
        P: RoutedProxy<K, H>,
        H: BackendFactory<P::Interface>,
    {
        self.handler::<P::Interface>()
            .map(P::from_handler)
            .ok_or_else(|| RoutingError::ProxyNotPublished {
                interface: <P::Interface as RoutedInterface>::descriptor().name,
            })
    }

    /// The handler published for interface `I`, if any.
    pub fn handler<I>(&self) -> Option<Arc<RoutingInvocationHandler<I, K, H>>>
    where
        I: RoutedInterface + ?Sized,
        H: BackendFactory<I>,
    {
        let published = self.proxies.get(&TypeId::of::<I>())?;
        Arc::clone(&published.handler)
            .downcast::<RoutingInvocationHandler<I, K, H>>()
            .ok()
    }

    /// Descriptors of the published interfaces.
    pub fn interfaces(&self) -> impl Iterator<Item = &'static InterfaceDescriptor> + '_ {
        self.proxies.values().map(|p| p.descriptor)
    }

    pub fn registry(&self) -> &TargetRegistry<K, H> {
        &self.registry
    }

    pub fn stats(&self) -> &RoutingStats {
        &self.stats
    }
}

impl<K: RoutingKey, H: BackendHandle> fmt::Debug for RoutedProxies<K, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutedProxies")
            .field("interfaces", &self.interfaces().map(|d| d.name).collect::<Vec<_>>())
            .finish()
    }
}
