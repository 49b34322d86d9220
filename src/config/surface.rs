//! Flag families registered under a namespace prefix.
//!
//! Each `register_*` function declares `<prefix>-<name>` options with their
//! defaults. An empty prefix selects the family's default prefix, which is
//! also what the matching hook or server constructor uses when given "".

use std::time::Duration;

use crate::config::FlagSet;

pub const DEFAULT_LOG_PREFIX: &str = "log";
pub const DEFAULT_TRACING_PREFIX: &str = "otel";
pub const DEFAULT_GRPC_PREFIX: &str = "grpc";
pub const DEFAULT_HTTP_PREFIX: &str = "http";

pub const DEFAULT_GRPC_ADDR: &str = ":50051";
pub const DEFAULT_HTTP_ADDR: &str = ":8443";
pub const DEFAULT_JAEGER_ENDPOINT: &str = "http://jaeger:14268/api/traces";
pub const DEFAULT_MAX_CONN_AGE: Duration = Duration::from_secs(30);

/// `value` unless it is empty.
pub fn default_if_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

/// Name of the running binary, used when no tracing service name is given.
pub fn default_service_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}

/// Adds `<prefix>-level` and `<prefix>-format`.
pub fn register_logging_flags(flags: &mut FlagSet, prefix: &str) {
    let prefix = default_if_empty(prefix, DEFAULT_LOG_PREFIX);
    flags
        .string(
            format!("{prefix}-level"),
            "info",
            r#"verbosity of logging ("trace", "debug", "info", "warn", "error", "fatal", "panic")"#,
        )
        .string(
            format!("{prefix}-format"),
            "auto",
            r#"format of logs ("auto", "human", "json")"#,
        );
}

/// Adds `<prefix>-provider`, `<prefix>-jaeger-endpoint` and
/// `<prefix>-jaeger-service-name`.
pub fn register_tracing_flags(flags: &mut FlagSet, prefix: &str, service_name: &str) {
    let prefix = default_if_empty(prefix, DEFAULT_TRACING_PREFIX);
    let service_name = if service_name.is_empty() {
        default_service_name()
    } else {
        service_name.to_string()
    };

    flags
        .string(
            format!("{prefix}-provider"),
            "none",
            r#"opentelemetry provider for tracing ("none", "jaeger")"#,
        )
        .string(
            format!("{prefix}-jaeger-endpoint"),
            DEFAULT_JAEGER_ENDPOINT,
            "jaeger collector endpoint",
        )
        .string(
            format!("{prefix}-jaeger-service-name"),
            service_name,
            "jaeger service name for trace data",
        );
}

/// Adds `<prefix>-addr`, `<prefix>-tls-cert-path`, `<prefix>-tls-key-path`,
/// `<prefix>-max-conn-age` and `<prefix>-enabled`.
pub fn register_grpc_server_flags(
    flags: &mut FlagSet,
    prefix: &str,
    service_name: &str,
    default_addr: &str,
    default_enabled: bool,
) {
    let prefix = default_if_empty(prefix, DEFAULT_GRPC_PREFIX);
    let service_name = default_if_empty(service_name, "grpc");
    let default_addr = default_if_empty(default_addr, DEFAULT_GRPC_ADDR);

    register_listener_flags(flags, prefix, service_name, default_addr);
    flags
        .duration(
            format!("{prefix}-max-conn-age"),
            DEFAULT_MAX_CONN_AGE,
            format!("how long a connection serving {service_name} should be able to live"),
        )
        .bool(
            format!("{prefix}-enabled"),
            default_enabled,
            format!("enable {service_name} gRPC server"),
        );
}

/// Adds `<prefix>-addr`, `<prefix>-tls-cert-path`, `<prefix>-tls-key-path`
/// and `<prefix>-enabled`.
pub fn register_http_server_flags(
    flags: &mut FlagSet,
    prefix: &str,
    service_name: &str,
    default_addr: &str,
    default_enabled: bool,
) {
    let prefix = default_if_empty(prefix, DEFAULT_HTTP_PREFIX);
    let service_name = default_if_empty(service_name, "http");
    let default_addr = default_if_empty(default_addr, DEFAULT_HTTP_ADDR);

    register_listener_flags(flags, prefix, service_name, default_addr);
    flags.bool(
        format!("{prefix}-enabled"),
        default_enabled,
        format!("enable {service_name} http server"),
    );
}

fn register_listener_flags(flags: &mut FlagSet, prefix: &str, service_name: &str, default_addr: &str) {
    flags
        .string(
            format!("{prefix}-addr"),
            default_addr,
            format!("address to listen on to serve {service_name}"),
        )
        .string(
            format!("{prefix}-tls-cert-path"),
            "",
            format!("local path to the TLS certificate used to serve {service_name}"),
        )
        .string(
            format!("{prefix}-tls-key-path"),
            "",
            format!("local path to the TLS key used to serve {service_name}"),
        );
}
