//! Routed interface descriptors and the backend traits that materialize them.
//!
//! An interface is a trait whose methods each carry an embedded statement.
//! [`routed_interface!`](crate::routed_interface) declares the trait, its
//! static [`InterfaceDescriptor`], and a `Routed*` forwarding adapter.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{BoxError, ConfigurationError};

/// Kind of statement a mapper method executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Insert,
    Select,
    Update,
    Delete,
}

/// One method of a routed interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub kind: StatementKind,
    /// Statement text handed to the backend when the interface is registered.
    pub statement: &'static str,
}

/// Static description of a routed interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub name: &'static str,
    pub methods: &'static [MethodDescriptor],
}

impl InterfaceDescriptor {
    pub fn method(&self, name: &str) -> Option<&'static MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Check that the descriptor is a usable dispatch surface: at least one
    /// method, unique method names, and a statement for every method.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidInterface {
            interface: self.name,
            reason,
        };

        if self.methods.is_empty() {
            return Err(invalid("declares no methods".to_string()));
        }

        let mut seen = HashSet::new();
        for method in self.methods {
            if !seen.insert(method.name) {
                return Err(invalid(format!("method {} declared twice", method.name)));
            }
            if method.statement.trim().is_empty() {
                return Err(invalid(format!("method {} has no statement", method.name)));
            }
        }

        Ok(())
    }
}

/// Implemented for `dyn Trait` of every routed interface.
pub trait RoutedInterface: Send + Sync + 'static {
    fn descriptor() -> &'static InterfaceDescriptor;
}

/// A per-backend handle (session factory) the router draws targets from.
pub trait BackendHandle: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Bind an interface's statements to this backend. Called once per
    /// interface while proxies are built; an error aborts startup.
    fn register_interface(&self, descriptor: &'static InterfaceDescriptor) -> Result<(), BoxError> {
        let _ = descriptor;
        Ok(())
    }
}

/// A backend handle able to produce concrete implementations of `I`.
pub trait BackendFactory<I: RoutedInterface + ?Sized>: BackendHandle {
    /// Build the implementation of `I` bound to this backend. The router calls
    /// this at most once per (interface, key) unless it fails.
    fn materialize(&self, descriptor: &'static InterfaceDescriptor) -> Result<Arc<I>, BoxError>;
}

/// Declare a routed interface.
///
/// Expands to:
/// - the trait itself (with `Send + Sync + 'static` supertraits),
/// - a [`RoutedInterface`] impl for `dyn Trait` carrying the descriptor,
/// - a `Routed*` adapter whose methods take `&CallContext<K>` first and
///   forward through a [`RoutingInvocationHandler`](crate::RoutingInvocationHandler).
///
/// Every method must return `Result<T, E>` with `E: From<RoutingError>`.
/// Errors produced by the target are returned to the caller unchanged.
///
/// ```ignore
/// routed_interface! {
///     pub trait Store => RoutedStore {
///         #[statement(Insert, "INSERT INTO store VALUES (#{id}, #{msg})")]
///         fn put(&self, id: u32, msg: String) -> Result<(), StoreError>;
///         #[statement(Select, "SELECT msg FROM store WHERE id = #{id}")]
///         fn get(&self, id: u32) -> Result<Option<String>, StoreError>;
///     }
/// }
/// ```
#[macro_export]
macro_rules! routed_interface {
    (
        $(#[$meta:meta])*
        $vis:vis trait $name:ident => $routed:ident {
            $(
                #[statement($kind:ident, $sql:literal)]
                $(#[$method_meta:meta])*
                fn $method:ident(&self $(, $arg:ident : $ty:ty)*) -> $ret:ty;
            )+
        }
    ) => {
        $(#[$meta])*
        $vis trait $name: Send + Sync + 'static {
            $(
                $(#[$method_meta])*
                fn $method(&self $(, $arg: $ty)*) -> $ret;
            )+
        }

        impl $crate::interface::RoutedInterface for dyn $name {
            fn descriptor() -> &'static $crate::interface::InterfaceDescriptor {
                static DESCRIPTOR: $crate::interface::InterfaceDescriptor =
                    $crate::interface::InterfaceDescriptor {
                        name: stringify!($name),
                        methods: &[
                            $(
                                $crate::interface::MethodDescriptor {
                                    name: stringify!($method),
                                    kind: $crate::interface::StatementKind::$kind,
                                    statement: $sql,
                                },
                            )+
                        ],
                    };
                &DESCRIPTOR
            }
        }

        #[doc = concat!(
            "Routed proxy for [`", stringify!($name), "`]: each call is forwarded to ",
            "the implementation selected by the call context."
        )]
        $vis struct $routed<K, H> {
            handler: ::std::sync::Arc<$crate::handler::RoutingInvocationHandler<dyn $name, K, H>>,
        }

        impl<K, H> ::std::clone::Clone for $routed<K, H> {
            fn clone(&self) -> Self {
                Self {
                    handler: ::std::sync::Arc::clone(&self.handler),
                }
            }
        }

        impl<K, H> $crate::builder::RoutedProxy<K, H> for $routed<K, H>
        where
            K: $crate::key::RoutingKey,
            H: $crate::interface::BackendFactory<dyn $name>,
        {
            type Interface = dyn $name;

            fn from_handler(
                handler: ::std::sync::Arc<$crate::handler::RoutingInvocationHandler<dyn $name, K, H>>,
            ) -> Self {
                Self { handler }
            }
        }

        impl<K, H> $routed<K, H>
        where
            K: $crate::key::RoutingKey,
            H: $crate::interface::BackendFactory<dyn $name>,
        {
            pub fn handler(&self) -> &$crate::handler::RoutingInvocationHandler<dyn $name, K, H> {
                &self.handler
            }

            $(
                $(#[$method_meta])*
                pub fn $method(&self, ctx: &$crate::context::CallContext<K> $(, $arg: $ty)*) -> $ret {
                    self.handler
                        .invoke(ctx, stringify!($method), move |target| target.$method($($arg),*))
                }
            )+
        }
    };
}
