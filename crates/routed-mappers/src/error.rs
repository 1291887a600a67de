//! Error types for registry construction and routed calls.

use thiserror::Error;

/// Boxed error returned by backend collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Startup-time configuration failures. No proxy is published when one occurs.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("no backend registered for routing key {key}")]
    MissingBackend { key: String },

    #[error("routing key {key} registered more than once")]
    DuplicateBackend { key: String },

    #[error("interface {interface} registered more than once")]
    DuplicateInterface { interface: &'static str },

    #[error("interface {interface} cannot be routed: {reason}")]
    InvalidInterface {
        interface: &'static str,
        reason: String,
    },

    #[error("backend {backend} rejected interface {interface}: {source}")]
    InterfaceRegistration {
        interface: &'static str,
        backend: String,
        #[source]
        source: BoxError,
    },
}

/// Failures raised by the routing layer itself.
///
/// Errors returned by the concrete target are never converted into this type;
/// they reach the caller exactly as the target produced them.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("no routing target set for {interface}::{method}")]
    ContextMissing {
        interface: &'static str,
        method: &'static str,
    },

    #[error("routing key {key} has no target for {interface}")]
    UnknownKey { interface: &'static str, key: String },

    #[error("failed to materialize {interface} for routing key {key}: {source}")]
    TargetResolution {
        interface: &'static str,
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("no routed proxy published for {interface}")]
    ProxyNotPublished { interface: &'static str },
}
