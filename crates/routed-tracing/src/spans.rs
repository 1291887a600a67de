//! Span builder helpers for routed-call instrumentation.

/// Create a span for one routed call through a proxy.
///
/// Usage: `let _span = routed_call_span!(correlation_id, interface, method).entered();`
///
/// `key` is recorded once the routing key has been read from the call context.
#[macro_export]
macro_rules! routed_call_span {
    ($correlation_id:expr, $interface:expr, $method:expr) => {
        tracing::debug_span!(
            "routed_call",
            correlation_id = %$correlation_id,
            interface = %$interface,
            method = %$method,
            key = tracing::field::Empty,
        )
    };
}

/// Create a span for materializing the concrete target of (interface, key).
#[macro_export]
macro_rules! materialize_span {
    ($interface:expr, $key:expr, $backend:expr) => {
        tracing::info_span!(
            "materialize_target",
            interface = %$interface,
            key = %$key,
            backend = %$backend,
            latency_us = tracing::field::Empty,
        )
    };
}
