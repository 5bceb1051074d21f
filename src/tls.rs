//! Listener configuration: plaintext or a restricted TLS profile.
//!
//! The TLS profile accepts TLS 1.2 and 1.3 only, AEAD cipher suites only
//! (ECDHE key exchange for TLS 1.2), key exchange groups X25519, P-256 and
//! P-384 in that preference, and enforces the server's cipher order.

use crate::config::Config;
use rustls::crypto::ring::{cipher_suite, default_provider, kx_group};
use rustls::crypto::CryptoProvider;
use rustls::ServerConfig;
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Config section holding listener settings.
pub const SECTION: &str = "https";

#[derive(Debug)]
pub enum TlsError {
    /// Certificate file unreadable or not PEM
    Certificate { path: PathBuf, detail: String },
    /// Certificate file contained no certificate
    NoCertificates { path: PathBuf },
    /// Key file unreadable, not PEM, or not a supported key type
    Key { path: PathBuf, detail: String },
    /// rustls refused the profile or the certificate/key pair
    Profile(rustls::Error),
}

impl fmt::Display for TlsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsError::Certificate { path, detail } => {
                write!(f, "cannot load certificate {}: {detail}", path.display())
            }
            TlsError::NoCertificates { path } => {
                write!(f, "no certificate found in {}", path.display())
            }
            TlsError::Key { path, detail } => {
                write!(f, "cannot load private key {}: {detail}", path.display())
            }
            TlsError::Profile(e) => write!(f, "invalid TLS configuration: {e}"),
        }
    }
}

impl std::error::Error for TlsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TlsError::Profile(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rustls::Error> for TlsError {
    fn from(e: rustls::Error) -> Self {
        TlsError::Profile(e)
    }
}

/// ring provider narrowed to the allowed suites and groups.
#[must_use]
pub fn restricted_provider() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: vec![
            cipher_suite::TLS13_CHACHA20_POLY1305_SHA256,
            cipher_suite::TLS13_AES_256_GCM_SHA384,
            cipher_suite::TLS13_AES_128_GCM_SHA256,
            cipher_suite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
            cipher_suite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
            cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
            cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
            cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
        ],
        kx_groups: vec![kx_group::X25519, kx_group::SECP256R1, kx_group::SECP384R1],
        ..default_provider()
    }
}

/// Build the server TLS profile from PEM certificate chain and key files.
///
/// # Errors
///
/// Fails when either file cannot be read or parsed, or the key does not
/// match the certificate.
pub fn load_server_config(certificate: &Path, key: &Path) -> Result<Arc<ServerConfig>, TlsError> {
    let chain: Vec<CertificateDer<'static>> = CertificateDer::pem_file_iter(certificate)
        .map_err(|e| TlsError::Certificate {
            path: certificate.to_path_buf(),
            detail: e.to_string(),
        })?
        .collect::<Result<_, _>>()
        .map_err(|e| TlsError::Certificate {
            path: certificate.to_path_buf(),
            detail: e.to_string(),
        })?;
    if chain.is_empty() {
        return Err(TlsError::NoCertificates {
            path: certificate.to_path_buf(),
        });
    }
    let private_key = PrivateKeyDer::from_pem_file(key).map_err(|e| TlsError::Key {
        path: key.to_path_buf(),
        detail: e.to_string(),
    })?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(restricted_provider()))
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])?
        .with_no_client_auth()
        .with_single_cert(chain, private_key)?;
    config.ignore_client_order = true;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(Arc::new(config))
}

/// `https.*` listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    pub address: String,
    pub certificate: String,
    pub key: String,
}

impl ListenerConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            address: config.get(SECTION, "address"),
            certificate: config.get(SECTION, "certificate"),
            key: config.get(SECTION, "key"),
        }
    }

    /// TLS is used only when both certificate and key are configured.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        !self.certificate.is_empty() && !self.key.is_empty()
    }

    /// Socket address to bind; `:port` binds all interfaces.
    #[must_use]
    pub fn bind_address(&self) -> String {
        if self.address.starts_with(':') {
            format!("0.0.0.0{}", self.address)
        } else {
            self.address.clone()
        }
    }

    /// URL for the startup log; `:port` is shown as `localhost:port`.
    #[must_use]
    pub fn display_url(&self) -> String {
        let scheme = if self.is_tls() { "https" } else { "http" };
        if self.address.starts_with(':') {
            format!("{scheme}://localhost{}", self.address)
        } else {
            format!("{scheme}://{}", self.address)
        }
    }

    /// Load the TLS profile when TLS is configured.
    ///
    /// # Errors
    ///
    /// See [`load_server_config`].
    pub fn server_config(&self) -> Result<Option<Arc<ServerConfig>>, TlsError> {
        if !self.is_tls() {
            return Ok(None);
        }
        load_server_config(Path::new(&self.certificate), Path::new(&self.key)).map(Some)
    }
}
