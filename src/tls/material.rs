//! Trust material loading and rustls server configuration.
//!
//! All files are expected in PEM format. The server chain and trust root must
//! each contain at least one certificate; the key file must contain a private
//! key (PKCS#8, PKCS#1 or SEC1).

use std::path::Path;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::server::WebPkiClientVerifier;
use rustls::sign::CertifiedKey;
use rustls::{RootCertStore, ServerConfig};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use super::verifier::{ClientAuth, DeferredClientVerifier};
use crate::config::{ConfigError, VerifyConfig};

/// Certificate, key and trust root of the verification listener.
#[derive(Debug)]
pub struct TrustConfiguration {
    server_chain: Vec<CertificateDer<'static>>,
    server_key: PrivateKeyDer<'static>,
    trust_roots: Arc<RootCertStore>,
    require_client_cert: bool,
    provider: Arc<CryptoProvider>,
}

impl TrustConfiguration {
    /// Parse trust material from PEM bytes.
    ///
    /// Fails unless every blob decodes and the key belongs to the server
    /// certificate.
    pub fn from_pem(
        cert_pem: &[u8],
        key_pem: &[u8],
        ca_pem: &[u8],
        require_client_cert: bool,
    ) -> Result<Self, ConfigError> {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

        let server_chain = parse_certs("server certificate", cert_pem)?;
        X509Certificate::from_der(&server_chain[0]).map_err(|e| {
            ConfigError::TrustMaterial(format!("server certificate is not valid X.509: {e}"))
        })?;

        let server_key = PrivateKeyDer::from_pem_slice(key_pem)
            .map_err(|e| ConfigError::TrustMaterial(format!("server private key: {e}")))?;
        let signing_key = provider
            .key_provider
            .load_private_key(server_key.clone_key())
            .map_err(|e| ConfigError::TrustMaterial(format!("server private key: {e}")))?;
        CertifiedKey::new(server_chain.clone(), signing_key)
            .keys_match()
            .map_err(|e| {
                ConfigError::TrustMaterial(format!("server key does not match certificate: {e}"))
            })?;

        let mut trust_roots = RootCertStore::empty();
        for cert in parse_certs("trust root", ca_pem)? {
            trust_roots.add(cert).map_err(|e| {
                ConfigError::TrustMaterial(format!("trust root is not a usable CA certificate: {e}"))
            })?;
        }

        Ok(Self {
            server_chain,
            server_key,
            trust_roots: Arc::new(trust_roots),
            require_client_cert,
            provider,
        })
    }

    /// Read and parse the files named by a resolved configuration.
    pub fn load(config: &VerifyConfig) -> Result<Self, ConfigError> {
        let cert = read_file(&config.cert_path)?;
        let key = read_file(&config.key_path)?;
        let ca = read_file(&config.ca_path)?;

        let trust = Self::from_pem(&cert, &key, &ca, config.require_client_cert)?;
        tracing::debug!(
            cert = %config.cert_path.display(),
            ca = %config.ca_path.display(),
            trust_roots = trust.trust_roots.len(),
            "Loaded trust material"
        );
        Ok(trust)
    }

    pub fn require_client_cert(&self) -> bool {
        self.require_client_cert
    }

    /// Build the rustls server configuration and the matching client
    /// authentication mode.
    ///
    /// A client certificate is always requested. When it is required, rustls'
    /// WebPKI verifier aborts handshakes that lack a trusted chain. Otherwise
    /// chain validation is deferred until the handshake completes.
    pub fn server_config(&self) -> Result<(ServerConfig, ClientAuth), ConfigError> {
        let webpki = client_verifier(self.trust_roots.clone(), self.provider.clone())?;

        let (verifier, client_auth) = if self.require_client_cert {
            (webpki, ClientAuth::Required)
        } else {
            let deferred: Arc<dyn rustls::server::danger::ClientCertVerifier> =
                Arc::new(DeferredClientVerifier::new(webpki.clone()));
            (deferred, ClientAuth::Deferred(webpki))
        };

        let config = ServerConfig::builder_with_provider(self.provider.clone())
            .with_safe_default_protocol_versions()?
            .with_client_cert_verifier(verifier)
            .with_single_cert(self.server_chain.clone(), self.server_key.clone_key())?;

        Ok((config, client_auth))
    }
}

fn client_verifier(
    roots: Arc<RootCertStore>,
    provider: Arc<CryptoProvider>,
) -> Result<Arc<dyn rustls::server::danger::ClientCertVerifier>, ConfigError> {
    WebPkiClientVerifier::builder_with_provider(roots, provider)
        .build()
        .map_err(|e| ConfigError::TrustMaterial(format!("failed to build client verifier: {e}")))
}

fn parse_certs(what: &str, pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigError::TrustMaterial(format!("{what}: {e}")))?;

    if certs.is_empty() {
        return Err(ConfigError::TrustMaterial(format!(
            "{what}: no PEM certificates found"
        )));
    }
    Ok(certs)
}

fn read_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|e| {
        ConfigError::TrustMaterial(format!("cannot read '{}': {e}", path.display()))
    })
}
