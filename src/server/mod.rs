//! Server bootstrap from resolved flags.
//!
//! # Data Flow
//! ```text
//! FlagSet
//!     → ServerDescriptor::from_flags (addr, TLS pairing, max-conn-age, enabled)
//!     → grpc.rs / http.rs (construct: plaintext or TLS, keepalive policy)
//!     → listen / spawn (skip when disabled, bind, serve until shutdown)
//!
//! Server States:
//!     Constructed → Disabled | Listening → Stopped | Failed
//! ```
//!
//! # Design Decisions
//! - A lone certificate or key path is always an error
//! - Disabled servers never touch the network, whatever the other flags say
//! - Each listener runs in its own task; the process joins them all

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use crate::config::FlagSet;
use crate::error::{Error, Result};
use crate::lifecycle::Shutdown;

pub mod grpc;
pub mod http;

pub use grpc::{GrpcServer, GrpcService};
pub use http::HttpServer;

/// Which protocol a server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Grpc,
    Http,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Grpc => f.write_str("gRPC"),
            Protocol::Http => f.write_str("http"),
        }
    }
}

/// How connections are secured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Plaintext,
    Tls { cert_path: PathBuf, key_path: PathBuf },
}

impl Transport {
    /// Decide the transport from a certificate/key path pair.
    pub fn from_paths(protocol: Protocol, prefix: &str, cert_path: &str, key_path: &str) -> Result<Self> {
        match (cert_path.is_empty(), key_path.is_empty()) {
            (true, true) => Ok(Transport::Plaintext),
            (false, false) => Ok(Transport::Tls {
                cert_path: PathBuf::from(cert_path),
                key_path: PathBuf::from(key_path),
            }),
            _ => Err(Error::TlsPairing {
                protocol,
                prefix: prefix.to_string(),
            }),
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls { .. })
    }
}

/// Listener configuration resolved from `<prefix>-*` flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
    pub protocol: Protocol,
    pub prefix: String,
    pub addr: String,
    pub transport: Transport,
    /// Only read for gRPC.
    pub max_conn_age: Option<Duration>,
    pub enabled: bool,
}

impl ServerDescriptor {
    pub fn from_flags(flags: &FlagSet, protocol: Protocol, prefix: &str) -> Result<Self> {
        let flag = |name: &str| format!("{prefix}-{name}");

        let transport = Transport::from_paths(
            protocol,
            prefix,
            &flags.get_string_expanded(&flag("tls-cert-path"))?,
            &flags.get_string_expanded(&flag("tls-key-path"))?,
        )?;
        let max_conn_age = match protocol {
            Protocol::Grpc => Some(flags.get_duration(&flag("max-conn-age"))?),
            Protocol::Http => None,
        };

        Ok(Self {
            protocol,
            prefix: prefix.to_string(),
            addr: flags.get_string_expanded(&flag("addr"))?,
            transport,
            max_conn_age,
            enabled: flags.get_bool(&flag("enabled"))?,
        })
    }

    fn listen_error(&self, source: std::io::Error) -> Error {
        Error::Listen {
            protocol: self.protocol,
            addr: self.addr.clone(),
            source,
        }
    }

    fn serve_error(&self, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Error {
        Error::Serve {
            protocol: self.protocol,
            source: source.into(),
        }
    }

    fn warn_if_plaintext(&self) {
        if !self.transport.is_tls() {
            match self.protocol {
                Protocol::Grpc => tracing::warn!(prefix = %self.prefix, "grpc server serving plaintext"),
                Protocol::Http => tracing::warn!(prefix = %self.prefix, "http server serving plaintext"),
            }
        }
    }
}

/// Where a server is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Constructed,
    /// Configured but intentionally not started.
    Disabled,
    Listening(SocketAddr),
    Stopped,
    Failed,
}

/// Publishes state transitions. Sending never fails, even with no observer.
#[derive(Debug)]
pub(crate) struct StateReporter {
    tx: watch::Sender<ServerState>,
}

impl StateReporter {
    pub(crate) fn new() -> (Self, watch::Receiver<ServerState>) {
        let (tx, rx) = watch::channel(ServerState::Constructed);
        (Self { tx }, rx)
    }

    /// A reporter nobody watches.
    pub(crate) fn detached() -> Self {
        Self::new().0
    }

    pub(crate) fn set(&self, state: ServerState) {
        self.tx.send_replace(state);
    }

    pub(crate) fn finish(&self, result: &Result<()>) {
        match result {
            Ok(()) => {
                if *self.tx.borrow() != ServerState::Disabled {
                    self.set(ServerState::Stopped);
                }
            }
            Err(_) => self.set(ServerState::Failed),
        }
    }
}

/// A listener running in its own task.
#[derive(Debug)]
pub struct ServerHandle {
    protocol: Protocol,
    prefix: String,
    state: watch::Receiver<ServerState>,
    task: JoinHandle<Result<()>>,
}

impl ServerHandle {
    pub(crate) fn spawn<F>(descriptor: &ServerDescriptor, run: impl FnOnce(StateReporter) -> F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let (reporter, state) = StateReporter::new();
        let serve = run(reporter);
        Self {
            protocol: descriptor.protocol,
            prefix: descriptor.prefix.clone(),
            state,
            task: tokio::spawn(serve),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Wait until the server has either bound or decided not to, returning
    /// the bound address when listening.
    pub async fn listening(&mut self) -> Option<SocketAddr> {
        let state = self
            .state
            .wait_for(|state| *state != ServerState::Constructed)
            .await
            .map(|state| *state)
            .unwrap_or_else(|_| *self.state.borrow());
        match state {
            ServerState::Listening(addr) => Some(addr),
            _ => None,
        }
    }

    /// Wait for the listener task and return its result.
    pub async fn join(self) -> Result<()> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(Error::Task {
                protocol: self.protocol,
                prefix: self.prefix,
                reason: err.to_string(),
            }),
        }
    }
}

/// Join every listener. The first failure triggers `shutdown` so the others
/// stop, and is returned once all tasks have finished.
pub async fn join_all(handles: Vec<ServerHandle>, shutdown: &Shutdown) -> Result<()> {
    let mut tasks = JoinSet::new();
    let mut owners = HashMap::new();
    for handle in handles {
        let owner = (handle.protocol, handle.prefix.clone());
        let id = tasks.spawn(handle.join()).id();
        owners.insert(id, owner);
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next_with_id().await {
        let result = match joined {
            Ok((_, result)) => result,
            Err(err) => {
                let (protocol, prefix) = owners
                    .remove(&err.id())
                    .unwrap_or((Protocol::Grpc, String::new()));
                Err(Error::Task {
                    protocol,
                    prefix,
                    reason: err.to_string(),
                })
            }
        };
        if let Err(err) = result {
            tracing::error!(error = %err, "listener stopped with an error");
            shutdown.trigger();
            first_error.get_or_insert(err);
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
