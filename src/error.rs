//! Crate-wide error type.
//!
//! Every failure in the resolution pipeline is a configuration or environment
//! problem for the operator to fix. Nothing here is retried.

use crate::net::tls::TlsError;
use crate::server::Protocol;

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while resolving options, configuring subsystems, or
/// bootstrapping servers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A flag was read or set that was never registered.
    #[error("unknown flag: --{0}")]
    UnknownFlag(String),

    /// A flag was read with a getter for the wrong kind.
    #[error("flag --{flag} is a {actual} flag, not a {expected} flag")]
    FlagType {
        flag: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Textual input could not be parsed as the flag's kind.
    #[error("invalid value {value:?} for --{flag}: {reason}")]
    Coercion {
        flag: String,
        value: String,
        reason: String,
    },

    #[error("unknown log level: {0}")]
    UnrecognizedLevel(String),

    #[error("unknown log format: {0}")]
    UnrecognizedFormat(String),

    #[error("unknown tracing provider: {0}")]
    UnrecognizedProvider(String),

    /// The global tracing subscriber could not be installed.
    #[error("failed to install log subscriber: {0}")]
    LoggerInstall(String),

    /// The span exporter could not be built for the endpoint.
    #[error("failed to create trace exporter for {endpoint}: {reason}")]
    Exporter { endpoint: String, reason: String },

    #[error("failed to shut down tracer provider: {0}")]
    TracerShutdown(String),

    /// Exactly one of the certificate and key paths was supplied.
    #[error(
        "failed to start {protocol} server: must provide both --{prefix}-tls-cert-path and --{prefix}-tls-key-path"
    )]
    TlsPairing { protocol: Protocol, prefix: String },

    /// The certificate or key could not be loaded.
    #[error("failed to load TLS material for {protocol} server (--{prefix}-*): {source}")]
    TlsLoad {
        protocol: Protocol,
        prefix: String,
        #[source]
        source: TlsError,
    },

    /// tonic rejected the TLS identity.
    #[error("failed to configure TLS for gRPC server (--{prefix}-*): {source}")]
    GrpcTls {
        prefix: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("failed to listen on addr {addr} for {protocol} server: {source}")]
    Listen {
        protocol: Protocol,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serve {protocol}: {source}")]
    Serve {
        protocol: Protocol,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A listener task panicked or was cancelled.
    #[error("{protocol} listener task (--{prefix}-*) did not complete: {reason}")]
    Task {
        protocol: Protocol,
        prefix: String,
        reason: String,
    },
}
