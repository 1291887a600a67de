//! Tracing setup for routed mappers: subscriber initialization with optional
//! OTLP export, plus span macros for routed calls.

pub mod config;
pub mod otlp;
pub mod spans;

pub use config::{OtlpProtocol, TracingConfig};
pub use otlp::{init_tracing, TracingGuard};
