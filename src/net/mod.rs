//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! <prefix>-addr
//!     → listener.rs (normalize, bind, non-blocking std listener)
//! <prefix>-tls-cert-path / <prefix>-tls-key-path
//!     → tls.rs (read PEM, validate pair, rustls ServerConfig)
//!     → handed to the gRPC or HTTP server
//! ```
//!
//! # Design Decisions
//! - Binding is separate from serving so bind failures are reported as such
//! - TLS material is validated at construction, before anything binds

pub mod listener;
pub mod tls;
