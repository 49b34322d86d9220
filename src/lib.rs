//! Command bootstrap toolkit.
//!
//! Resolves namespaced command-line options and prefixed environment
//! variables, applies logging and tracing configuration through an ordered
//! pre-execution hook chain, and bootstraps TLS-aware gRPC and HTTP
//! listeners from the resolved options.
//!
//! ```text
//!   argv ──▶ clap ──▶ FlagSet ◀── PREFIX_FLAG env vars
//!                        │
//!                        ▼
//!        HookStack [EnvOverrides, LoggingHook, TracingHook]
//!                        │
//!                        ▼
//!        GrpcServer / HttpServer ──▶ spawn ──▶ join_all
//! ```

// Option resolution
pub mod config;
pub mod error;

// Command lifecycle
pub mod lifecycle;
pub mod observability;

// Listeners
pub mod net;
pub mod server;

pub use config::{EnvOverrides, FlagSet};
pub use error::{Error, Result};
pub use lifecycle::{Hook, HookStack, Invocation, Shutdown};
pub use observability::{LoggingHook, TracingHook};
pub use server::{GrpcServer, HttpServer, ServerHandle};
