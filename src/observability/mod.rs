//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Resolved flags:
//!     → logging.rs (level filter + human/JSON renderer, installed once)
//!     → tracing.rs (tracer provider + W3C propagator, replaceable)
//!
//! Consumers:
//!     → every `tracing` event in the process
//!     → `opentelemetry::global::tracer` users
//! ```
//!
//! # Design Decisions
//! - Global state is only mutated through the two hooks
//! - Teardown is explicit: call `shutdown_tracing` before exit

pub mod logging;
pub mod tracing;

pub use logging::{LogFormat, LogLevel, LoggingHook};
pub use self::tracing::{Provider, TracingHook};

/// Flush any installed trace exporter.
pub fn shutdown_tracing() -> crate::Result<()> {
    self::tracing::shutdown()
}
