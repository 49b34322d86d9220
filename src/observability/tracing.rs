//! Distributed tracing support.
//!
//! # Responsibilities
//! - Resolve `<prefix>-provider` into a process-wide tracer provider
//! - Export spans in batches to the configured collector endpoint
//! - Install W3C Trace Context as the global propagator
//!
//! # Design Decisions
//! - Optional: the `none` provider installs nothing
//! - Always-on sampling; the collector decides what to keep
//! - The provider is kept so it can be flushed at shutdown

use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use opentelemetry::global;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing::Level;

use crate::config::surface::{default_if_empty, DEFAULT_TRACING_PREFIX};
use crate::error::{Error, Result};
use crate::lifecycle::{Hook, Invocation};

/// Accepted tracing providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    None,
    Jaeger,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::None => "none",
            Provider::Jaeger => "jaeger",
        }
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Provider::None),
            "jaeger" => Ok(Provider::Jaeger),
            _ => Err(Error::UnrecognizedProvider(s.to_string())),
        }
    }
}

static PROVIDER: Mutex<Option<SdkTracerProvider>> = Mutex::new(None);

fn validate_endpoint(endpoint: &str) -> Result<()> {
    let invalid = |reason: String| Error::Exporter {
        endpoint: endpoint.to_string(),
        reason,
    };
    let url = url::Url::parse(endpoint).map_err(|err| invalid(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}

/// Build a batched, always-sampling exporter pipeline against `endpoint` and
/// install it as the global tracer provider.
///
/// Spans are sent as OTLP over HTTP, which Jaeger collectors accept.
pub fn install_exporter(endpoint: &str, service_name: &str) -> Result<()> {
    validate_endpoint(endpoint)?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|err| Error::Exporter {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        })?;

    let resource = Resource::builder_empty()
        .with_service_name(service_name.to_string())
        .build();

    let provider = SdkTracerProvider::builder()
        .with_sampler(Sampler::AlwaysOn)
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TraceContextPropagator::new());

    let previous = PROVIDER
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(provider);
    if let Some(previous) = previous {
        if let Err(err) = previous.shutdown() {
            tracing::warn!(error = %err, "failed to shut down replaced tracer provider");
        }
    }
    Ok(())
}

/// Whether an exporter pipeline is currently installed.
pub fn is_installed() -> bool {
    PROVIDER
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}

/// Flush and remove the installed provider. A no-op when none is installed.
pub fn shutdown() -> Result<()> {
    let provider = PROVIDER.lock().unwrap_or_else(PoisonError::into_inner).take();
    match provider {
        Some(provider) => provider
            .shutdown()
            .map_err(|err| Error::TracerShutdown(err.to_string())),
        None => Ok(()),
    }
}

/// Hook applying the `<prefix>-provider` option.
#[derive(Debug, Clone)]
pub struct TracingHook {
    prefix: String,
    announce: Level,
}

impl TracingHook {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: default_if_empty(prefix, DEFAULT_TRACING_PREFIX).to_string(),
            announce: Level::INFO,
        }
    }

    /// Severity of the event recording the selected provider.
    pub fn announce_at(mut self, level: Level) -> Self {
        self.announce = level;
        self
    }
}

impl Hook for TracingHook {
    fn run(&self, invocation: &mut Invocation) -> Result<()> {
        if invocation.is_builtin() {
            return Ok(());
        }

        let flags = invocation.flags();
        let provider: Provider = flags
            .get_string(&format!("{}-provider", self.prefix))?
            .parse()?;

        if provider == Provider::Jaeger {
            install_exporter(
                flags.get_string(&format!("{}-jaeger-endpoint", self.prefix))?,
                flags.get_string(&format!("{}-jaeger-service-name", self.prefix))?,
            )?;
        }

        let new_provider = provider.as_str();
        match self.announce {
            Level::TRACE => tracing::trace!(new_provider, "set tracing provider"),
            Level::DEBUG => tracing::debug!(new_provider, "set tracing provider"),
            Level::INFO => tracing::info!(new_provider, "set tracing provider"),
            Level::WARN => tracing::warn!(new_provider, "set tracing provider"),
            _ => tracing::error!(new_provider, "set tracing provider"),
        }
        Ok(())
    }
}
