//! TLS acceptor that attaches the peer's authorization to each connection.
//!
//! Wraps axum-server's `RustlsAcceptor`. Once the handshake completes the
//! client chain is evaluated exactly once and the resulting
//! `PeerAuthorization` is inserted into the extensions of every request
//! served over that connection.

use std::io;

use axum_server::accept::{Accept, DefaultAcceptor};
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::server::TlsStream;
use tower_http::add_extension::AddExtension;

use super::verifier::ClientAuth;
use crate::peer::{authorize, PeerAuthorization, PeerCertificate, UnauthorizedReason};

#[derive(Clone)]
pub struct PeerAuthAcceptor {
    inner: RustlsAcceptor<DefaultAcceptor>,
    client_auth: ClientAuth,
}

impl PeerAuthAcceptor {
    pub fn new(config: RustlsConfig, client_auth: ClientAuth) -> Self {
        Self {
            inner: RustlsAcceptor::new(config),
            client_auth,
        }
    }
}

impl<I, S> Accept<I, S> for PeerAuthAcceptor
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    S: Send + 'static,
{
    type Stream = TlsStream<I>;
    type Service = AddExtension<S, PeerAuthorization>;
    type Future = BoxFuture<'static, io::Result<(Self::Stream, Self::Service)>>;

    fn accept(&self, stream: I, service: S) -> Self::Future {
        let acceptor = self.inner.clone();
        let client_auth = self.client_auth.clone();

        Box::pin(async move {
            let (stream, service) = acceptor.accept(stream, service).await?;
            let (_, connection) = stream.get_ref();
            let chain = connection.peer_certificates().unwrap_or_default();
            let peer = evaluate_peer(&client_auth, chain);

            tracing::debug!(
                authorized = peer.is_authorized(),
                presented = !chain.is_empty(),
                "TLS handshake completed"
            );

            Ok((stream, AddExtension::new(service, peer)))
        })
    }
}

/// Derive the authorization of a peer from its presented chain.
fn evaluate_peer(
    client_auth: &ClientAuth,
    chain: &[rustls_pki_types::CertificateDer<'_>],
) -> PeerAuthorization {
    let verified = match client_auth.peer_verified(chain) {
        Ok(verified) => verified,
        Err(e) => {
            tracing::debug!(error = %e, "Client certificate rejected");
            false
        }
    };

    let certificate = match chain.first().map(|der| PeerCertificate::from_der(der)) {
        Some(Ok(cert)) => Some(cert),
        Some(Err(e)) => {
            // Presented but unusable
            tracing::debug!(error = %e, "Client certificate unreadable");
            return PeerAuthorization::Unauthorized(UnauthorizedReason::Untrusted);
        }
        None => None,
    };

    authorize(verified, certificate)
}
