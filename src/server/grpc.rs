//! gRPC listener on tonic.

use std::fmt;
use std::future::Future;

use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::server::Router;
use tonic::transport::{Identity, Server, ServerTlsConfig};

use crate::config::surface::{default_if_empty, DEFAULT_GRPC_PREFIX};
use crate::config::FlagSet;
use crate::error::{Error, Result};
use crate::lifecycle::Shutdown;
use crate::net::{listener, tls};
use crate::server::{Protocol, ServerDescriptor, ServerHandle, ServerState, StateReporter, Transport};

/// A configured tonic server with no services yet.
pub struct GrpcServer {
    descriptor: ServerDescriptor,
    builder: Server,
}

impl GrpcServer {
    /// Build a server from the `<prefix>-*` gRPC flags.
    ///
    /// Connections are closed after `<prefix>-max-conn-age`. TLS material is
    /// loaded and validated here, so a bad pair fails before anything binds.
    pub fn from_flags(flags: &FlagSet, prefix: &str) -> Result<Self> {
        let prefix = default_if_empty(prefix, DEFAULT_GRPC_PREFIX);
        let descriptor = ServerDescriptor::from_flags(flags, Protocol::Grpc, prefix)?;

        let mut builder = Server::builder();
        if let Some(age) = descriptor.max_conn_age {
            builder = builder.max_connection_age(age);
        }

        match &descriptor.transport {
            Transport::Plaintext => descriptor.warn_if_plaintext(),
            Transport::Tls { cert_path, key_path } => {
                let material = tls::load_tls_material(cert_path, key_path).map_err(|source| {
                    Error::TlsLoad {
                        protocol: Protocol::Grpc,
                        prefix: prefix.to_string(),
                        source,
                    }
                })?;
                let identity = Identity::from_pem(material.cert_pem, material.key_pem);
                builder = builder
                    .tls_config(ServerTlsConfig::new().identity(identity))
                    .map_err(|source| Error::GrpcTls {
                        prefix: prefix.to_string(),
                        source,
                    })?;
            }
        }

        Ok(Self { descriptor, builder })
    }

    pub fn descriptor(&self) -> &ServerDescriptor {
        &self.descriptor
    }

    /// Register services, typically `|server| server.add_service(svc)`.
    pub fn routes(mut self, register: impl FnOnce(&mut Server) -> Router) -> GrpcService {
        let router = register(&mut self.builder);
        GrpcService {
            descriptor: self.descriptor,
            router,
        }
    }
}

impl fmt::Debug for GrpcServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcServer")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// A gRPC server with its services registered, ready to listen.
pub struct GrpcService {
    descriptor: ServerDescriptor,
    router: Router,
}

impl GrpcService {
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
        let Self { descriptor, router } = self;

        if !descriptor.enabled {
            reporter.set(ServerState::Disabled);
            tracing::debug!(prefix = %descriptor.prefix, "gRPC server disabled");
            return Ok(());
        }

        let (std_listener, local_addr) =
            listener::bind(&descriptor.addr).map_err(|err| descriptor.listen_error(err))?;
        let listener = tokio::net::TcpListener::from_std(std_listener)
            .map_err(|err| descriptor.listen_error(err))?;

        reporter.set(ServerState::Listening(local_addr));
        tracing::info!(
            prefix = %descriptor.prefix,
            address = %local_addr,
            tls = descriptor.transport.is_tls(),
            "gRPC server listening"
        );

        router
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
            .await
            .map_err(|err| descriptor.serve_error(err))?;

        tracing::info!(prefix = %descriptor.prefix, "gRPC server stopped");
        Ok(())
    }
}

impl fmt::Debug for GrpcService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcService")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
