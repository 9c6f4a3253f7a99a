//! Client certificate verification modes.

use std::fmt;
use std::sync::Arc;

use rustls::client::danger::HandshakeSignatureValid;
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{DigitallySignedStruct, DistinguishedName, SignatureScheme};
use rustls_pki_types::{CertificateDer, UnixTime};

/// How the presented client chain is judged.
#[derive(Clone)]
pub enum ClientAuth {
    /// rustls validated the chain during the handshake and aborts it on
    /// failure, so any connection that carries peer certificates is verified.
    Required,
    /// The handshake accepts any chain; this verifier judges it once the
    /// handshake has completed.
    Deferred(Arc<dyn ClientCertVerifier>),
}

impl fmt::Debug for ClientAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientAuth::Required => f.write_str("Required"),
            ClientAuth::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

impl ClientAuth {
    /// Whether the chain presented in a completed handshake is trusted.
    ///
    /// `chain` is end-entity first. An empty chain is never trusted.
    pub fn peer_verified(&self, chain: &[CertificateDer<'_>]) -> Result<bool, rustls::Error> {
        let Some((end_entity, intermediates)) = chain.split_first() else {
            return Ok(false);
        };

        match self {
            ClientAuth::Required => Ok(true),
            ClientAuth::Deferred(verifier) => verifier
                .verify_client_cert(end_entity, intermediates, UnixTime::now())
                .map(|_| true),
        }
    }
}

/// Requests a client certificate without letting its validity decide the
/// handshake.
///
/// Handshake signatures are still checked by the wrapped verifier, so a
/// client can only present a certificate whose key it holds.
#[derive(Debug)]
pub struct DeferredClientVerifier {
    inner: Arc<dyn ClientCertVerifier>,
}

impl DeferredClientVerifier {
    pub fn new(inner: Arc<dyn ClientCertVerifier>) -> Self {
        Self { inner }
    }
}

impl ClientCertVerifier for DeferredClientVerifier {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        false
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        self.inner.root_hint_subjects()
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}
