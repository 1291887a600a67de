//! routed-mappers: one logical mapper interface, many per-database targets.
//!
//! Callers set a [`RoutingKey`] on a [`CallContext`] and invoke methods on a
//! routed proxy. Each call reads the key, resolves (and on first use
//! materializes) the concrete implementation bound to that key's backend, and
//! forwards the call to it unchanged.
//!
//! Interfaces are declared with [`routed_interface!`], registered on a
//! [`TargetRegistry`], and published by a [`RoutedProxyBuilder`].

pub mod builder;
pub mod context;
pub mod entry;
pub mod error;
pub mod handler;
pub mod interface;
pub mod key;
pub mod registry;
pub mod stats;

#[cfg(test)]
mod testing;

pub use builder::{RoutedProxies, RoutedProxy, RoutedProxyBuilder};
pub use context::CallContext;
pub use entry::ProxyEntry;
pub use error::{BoxError, ConfigurationError, RoutingError};
pub use handler::RoutingInvocationHandler;
pub use interface::{
    BackendFactory, BackendHandle, InterfaceDescriptor, MethodDescriptor, RoutedInterface,
    StatementKind,
};
pub use key::RoutingKey;
pub use registry::{KeySupplier, TargetRegistry, TargetRegistryBuilder};
pub use stats::{RoutingStats, StatsSnapshot};
