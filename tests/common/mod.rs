//! Shared utilities for listener integration tests.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use cmdboot::config::{register_grpc_server_flags, register_http_server_flags};
use cmdboot::FlagSet;

/// gRPC and HTTP flags under the default prefixes, both enabled and bound to
/// ephemeral loopback ports.
pub fn server_flags() -> FlagSet {
    let mut flags = FlagSet::new();
    register_grpc_server_flags(&mut flags, "grpc", "", "127.0.0.1:0", true);
    register_http_server_flags(&mut flags, "http", "", "127.0.0.1:0", true);
    flags
}

/// Write a fresh self-signed certificate and key for `localhost` into `dir`.
pub fn write_cert_pair(dir: &Path) -> (PathBuf, PathBuf) {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_path = dir.join("cert.pem");
    let key_path = dir.join("key.pem");
    std::fs::write(&cert_path, cert.serialize_pem().unwrap()).unwrap();
    std::fs::write(&key_path, cert.serialize_private_key_pem()).unwrap();
    (cert_path, key_path)
}

/// Issue a plaintext HTTP/1.1 GET and return the status code and body.
pub async fn http_get(addr: SocketAddr, path: &str) -> (u16, String) {
    let mut stream = tokio::time::timeout(Duration::from_secs(5), TcpStream::connect(addr))
        .await
        .expect("connect timed out")
        .unwrap();

    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut raw))
        .await
        .expect("read timed out")
        .unwrap();

    let text = String::from_utf8_lossy(&raw).into_owned();
    let status = text
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or(0);
    let body = text
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (status, body)
}

/// Issue an HTTP/1.1 GET over TLS, trusting only the certificate at
/// `cert_path` for `localhost`. Returns the negotiated ALPN protocol, the
/// status code and the body.
pub async fn https_get(addr: SocketAddr, cert_path: &Path, path: &str) -> (Option<Vec<u8>>, u16, String) {
    let cert_pem = std::fs::read(cert_path).unwrap();
    let path = path.to_string();

    tokio::task::spawn_blocking(move || {
        use std::io::{ErrorKind, Read, Write};
        use std::sync::Arc;

        let mut roots = rustls::RootCertStore::empty();
        for cert in rustls_pemfile::certs(&mut cert_pem.as_slice()) {
            roots.add(cert.unwrap()).unwrap();
        }
        let mut config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();
        config.alpn_protocols = vec![b"http/1.1".to_vec()];

        let server_name = rustls::pki_types::ServerName::try_from("localhost").unwrap();
        let conn = rustls::ClientConnection::new(Arc::new(config), server_name).unwrap();
        let sock = std::net::TcpStream::connect(addr).unwrap();
        sock.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut tls = rustls::StreamOwned::new(conn, sock);

        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        tls.write_all(request.as_bytes()).unwrap();

        let mut raw = Vec::new();
        match tls.read_to_end(&mut raw) {
            Ok(_) => {}
            // Peers may close without close_notify.
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {}
            Err(err) => panic!("tls read failed: {err}"),
        }
        let alpn = tls.conn.alpn_protocol().map(<[u8]>::to_vec);

        let text = String::from_utf8_lossy(&raw).into_owned();
        let status = text
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap_or(0);
        let body = text
            .split_once("\r\n\r\n")
            .map(|(_, body)| body.to_string())
            .unwrap_or_default();
        (alpn, status, body)
    })
    .await
    .unwrap()
}
