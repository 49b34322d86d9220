//! TLS configuration and certificate loading.

use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;

/// Why certificate material could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("certificate file not found: {0}")]
    CertificateNotFound(PathBuf),

    #[error("private key file not found: {0}")]
    PrivateKeyNotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no PEM certificates found in {0}")]
    NoCertificates(PathBuf),

    #[error("no PEM private key found in {0}")]
    NoPrivateKey(PathBuf),

    #[error("failed to parse PEM in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("certificate and key rejected: {0}")]
    Configuration(#[from] rustls::Error),
}

/// Certificate chain and private key read from disk, kept as PEM as well so
/// both the rustls and tonic stacks can consume them.
#[derive(Debug)]
pub struct TlsMaterial {
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
    pub server_config: Arc<ServerConfig>,
}

fn read_file(path: &Path, missing: fn(PathBuf) -> TlsError) -> Result<Vec<u8>, TlsError> {
    if !path.exists() {
        return Err(missing(path.to_path_buf()));
    }
    std::fs::read(path).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_certificates(path: &Path, pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn parse_private_key(path: &Path, pem: &[u8]) -> Result<PrivateKeyDer<'static>, TlsError> {
    rustls_pemfile::private_key(&mut BufReader::new(pem))
        .map_err(|source| TlsError::Parse {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}

/// Load and validate a certificate/key pair.
///
/// The pair is checked by building a rustls server config with the ring
/// provider, advertising `h2` and `http/1.1` over ALPN.
pub fn load_tls_material(cert_path: &Path, key_path: &Path) -> Result<TlsMaterial, TlsError> {
    let cert_pem = read_file(cert_path, TlsError::CertificateNotFound)?;
    let key_pem = read_file(key_path, TlsError::PrivateKeyNotFound)?;

    let certs = parse_certificates(cert_path, &cert_pem)?;
    let key = parse_private_key(key_path, &key_pem)?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(TlsMaterial {
        cert_pem,
        key_pem,
        server_config: Arc::new(config),
    })
}

/// Load TLS configuration for axum-server from certificate and key files.
pub fn load_rustls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, TlsError> {
    let material = load_tls_material(cert_path, key_path)?;
    Ok(RustlsConfig::from_config(material.server_config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_pair(dir: &Path) -> (PathBuf, PathBuf) {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert_path = dir.join("cert.pem");
        let key_path = dir.join("key.pem");
        fs::write(&cert_path, cert.serialize_pem().unwrap()).unwrap();
        fs::write(&key_path, cert.serialize_private_key_pem()).unwrap();
        (cert_path, key_path)
    }

    #[test]
    fn loads_a_generated_pair() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = write_pair(dir.path());

        let material = load_tls_material(&cert, &key).unwrap();
        assert_eq!(
            material.server_config.alpn_protocols,
            vec![b"h2".to_vec(), b"http/1.1".to_vec()]
        );
        assert!(!material.cert_pem.is_empty());
    }

    #[test]
    fn missing_files_are_named() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, _) = write_pair(dir.path());

        let err = load_tls_material(&dir.path().join("nope.pem"), &cert).unwrap_err();
        assert!(matches!(err, TlsError::CertificateNotFound(_)));

        let err = load_tls_material(&cert, &dir.path().join("nope.key")).unwrap_err();
        assert!(matches!(err, TlsError::PrivateKeyNotFound(_)));
    }

    #[test]
    fn garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (cert, key) = write_pair(dir.path());
        let junk = dir.path().join("junk.pem");
        fs::write(&junk, "this is not pem").unwrap();

        assert!(matches!(
            load_tls_material(&junk, &key),
            Err(TlsError::NoCertificates(_))
        ));
        assert!(matches!(
            load_tls_material(&cert, &junk),
            Err(TlsError::NoPrivateKey(_))
        ));
        // A certificate file holds no key.
        assert!(matches!(
            load_tls_material(&cert, &cert),
            Err(TlsError::NoPrivateKey(_))
        ));
    }
}
