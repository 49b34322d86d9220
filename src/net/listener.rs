//! TCP listener binding.
//!
//! # Responsibilities
//! - Normalize `:port` style addresses
//! - Bind to the configured address
//! - Hand a non-blocking std listener to the serving stack

use std::net::{SocketAddr, TcpListener};

/// Expand a bare `:port` into an all-interfaces IPv4 address.
///
/// Anything else, including host names, is passed through for resolution at
/// bind time.
pub fn normalize_addr(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => addr.to_string(),
    }
}

/// Bind `addr` and switch the socket to non-blocking mode.
pub fn bind(addr: &str) -> std::io::Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(normalize_addr(addr))?;
    listener.set_nonblocking(true)?;
    let local_addr = listener.local_addr()?;

    tracing::debug!(address = %local_addr, "listener bound");
    Ok((listener, local_addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bare_ports() {
        assert_eq!(normalize_addr(":50051"), "0.0.0.0:50051");
        assert_eq!(normalize_addr("127.0.0.1:8443"), "127.0.0.1:8443");
        assert_eq!(normalize_addr("localhost:80"), "localhost:80");
    }

    #[test]
    fn binds_ephemeral_ports() {
        let (_listener, addr) = bind("127.0.0.1:0").unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn occupied_ports_fail() {
        let (_held, addr) = bind("127.0.0.1:0").unwrap();
        assert!(bind(&addr.to_string()).is_err());
    }
}
