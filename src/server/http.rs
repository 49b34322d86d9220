//! HTTP listener on axum-server.
//!
//! Serves HTTP/1.1 and HTTP/2, over rustls when a certificate pair is
//! configured.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;

use crate::config::surface::{default_if_empty, DEFAULT_HTTP_PREFIX};
use crate::config::FlagSet;
use crate::error::{Error, Result};
use crate::lifecycle::Shutdown;
use crate::net::{listener, tls};
use crate::server::{Protocol, ServerDescriptor, ServerHandle, ServerState, StateReporter, Transport};

/// How long in-flight requests may run once shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// An HTTP server bound to an axum router.
pub struct HttpServer {
    descriptor: ServerDescriptor,
    router: Router,
    tls: Option<RustlsConfig>,
}

impl HttpServer {
    /// Build a server from the `<prefix>-*` HTTP flags.
    pub fn from_flags(flags: &FlagSet, prefix: &str, router: Router) -> Result<Self> {
        let prefix = default_if_empty(prefix, DEFAULT_HTTP_PREFIX);
        let descriptor = ServerDescriptor::from_flags(flags, Protocol::Http, prefix)?;

        let tls = match &descriptor.transport {
            Transport::Plaintext => {
                descriptor.warn_if_plaintext();
                None
            }
            Transport::Tls { cert_path, key_path } => Some(
                tls::load_rustls_config(cert_path, key_path).map_err(|source| Error::TlsLoad {
                    protocol: Protocol::Http,
                    prefix: prefix.to_string(),
                    source,
                })?,
            ),
        };

        Ok(Self {
            descriptor,
            router,
            tls,
        })
    }

    pub fn descriptor(&self) -> &ServerDescriptor {
        &self.descriptor
    }

    /// Serve until `shutdown` resolves. Returns immediately when disabled.
    pub async fn listen<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.run(shutdown, StateReporter::detached()).await
    }

    /// Serve on a new task until `shutdown` is triggered.
    pub fn spawn(self, shutdown: &Shutdown) -> ServerHandle {
        let signal = shutdown.signal();
        let descriptor = self.descriptor.clone();
        ServerHandle::spawn(&descriptor, move |reporter| self.run(signal, reporter))
    }

    async fn run<F>(self, shutdown: F, reporter: StateReporter) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let result = self.serve(shutdown, &reporter).await;
        reporter.finish(&result);
        result
    }

    async fn serve<F>(self, shutdown: F, reporter: &StateReporter) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            descriptor,
            router,
            tls,
        } = self;

        if !descriptor.enabled {
            reporter.set(ServerState::Disabled);
            tracing::debug!(prefix = %descriptor.prefix, "http server disabled");
            return Ok(());
        }

        let (std_listener, local_addr) =
            listener::bind(&descriptor.addr).map_err(|err| descriptor.listen_error(err))?;

        let handle = Handle::new();
        let drain = tokio::spawn({
            let handle = handle.clone();
            async move {
                shutdown.await;
                handle.graceful_shutdown(Some(DRAIN_TIMEOUT));
            }
        });

        reporter.set(ServerState::Listening(local_addr));
        tracing::info!(
            prefix = %descriptor.prefix,
            address = %local_addr,
            tls = tls.is_some(),
            "http server listening"
        );

        let app = router.into_make_service();
        let served = match tls {
            Some(config) => {
                axum_server::tls_rustls::from_tcp_rustls(std_listener, config)
                    .handle(handle)
                    .serve(app)
                    .await
            }
            None => axum_server::from_tcp(std_listener).handle(handle).serve(app).await,
        };
        drain.abort();

        served.map_err(|err| descriptor.serve_error(err))?;
        tracing::info!(prefix = %descriptor.prefix, "http server stopped");
        Ok(())
    }
}

impl fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServer")
            .field("descriptor", &self.descriptor)
            .field("tls", &self.tls.is_some())
            .finish_non_exhaustive()
    }
}
