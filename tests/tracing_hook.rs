//! The tracing hook installs a global tracer provider, so the whole lifecycle
//! runs as one test in its own binary.

use opentelemetry::global;
use opentelemetry::propagation::TextMapPropagator;
use tracing::Level;

use cmdboot::config::register_tracing_flags;
use cmdboot::observability::shutdown_tracing;
use cmdboot::observability::tracing::is_installed;
use cmdboot::{Error, FlagSet, Hook, Invocation, TracingHook};

fn invocation(command: &str, provider: &str, endpoint: Option<&str>) -> Invocation {
    let mut flags = FlagSet::new();
    register_tracing_flags(&mut flags, "otel", "cmdboot-test");
    flags.set("otel-provider", provider).unwrap();
    if let Some(endpoint) = endpoint {
        flags.set("otel-jaeger-endpoint", endpoint).unwrap();
    }
    Invocation::new(command, flags)
}

#[test]
fn tracing_hook_lifecycle() {
    let hook = TracingHook::new("otel");

    hook.run(&mut invocation("serve", "none", None)).unwrap();
    assert!(!is_installed());

    let err = hook.run(&mut invocation("serve", "zipkin", None)).unwrap_err();
    assert!(matches!(err, Error::UnrecognizedProvider(ref p) if p == "zipkin"));
    assert!(!is_installed());

    let err = hook
        .run(&mut invocation("serve", "jaeger", Some("jaeger:14268")))
        .unwrap_err();
    assert!(matches!(err, Error::Exporter { .. }), "{err}");
    assert!(!is_installed());

    hook.run(&mut invocation("completion", "jaeger", Some("http://127.0.0.1:4318/v1/traces")))
        .unwrap();
    assert!(!is_installed());

    TracingHook::new("")
        .announce_at(Level::DEBUG)
        .run(&mut invocation("serve", "jaeger", Some("http://127.0.0.1:4318/v1/traces")))
        .unwrap();
    assert!(is_installed());
    assert!(global::get_text_map_propagator(|propagator| propagator
        .fields()
        .any(|field| field == "traceparent")));

    shutdown_tracing().unwrap();
    assert!(!is_installed());
    // Nothing left to flush.
    shutdown_tracing().unwrap();
}
