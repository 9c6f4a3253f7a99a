//! Listener construction and startup.
//!
//! Construction (`new`) validates everything that can be validated without a
//! socket and fails with `ConfigError`. Only `serve` binds, and it runs until
//! the process is terminated or the handle is told to shut down.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;

use crate::config::ConfigError;
use crate::distribution::{validate_routes, DistributionEndpointConfig, DistributionRoute};
use crate::routes::{create_distribution_router, create_verification_router};
use crate::tls::{ClientAuth, PeerAuthAcceptor, TrustConfiguration};

/// Server startup error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),
}

/// The mutual-TLS diagnostic listener.
pub struct VerificationServer {
    addr: SocketAddr,
    tls_config: Arc<rustls::ServerConfig>,
    client_auth: ClientAuth,
}

impl VerificationServer {
    /// Build the TLS configuration from `trust`.
    pub fn new(trust: &TrustConfiguration, addr: SocketAddr) -> Result<Self, ConfigError> {
        let (mut tls_config, client_auth) = trust.server_config()?;
        // Prefer HTTP/2, fall back to HTTP/1.1
        tls_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        Ok(Self {
            addr,
            tls_config: Arc::new(tls_config),
            client_auth,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accept connections until the handle shuts the server down.
    ///
    /// Handshake and connection errors are confined to their connection.
    pub async fn serve(self, handle: Handle) -> Result<(), ServerError> {
        tracing::info!(
            addr = %self.addr,
            client_auth = ?self.client_auth,
            "Starting HTTPS verification server"
        );

        let acceptor = PeerAuthAcceptor::new(
            RustlsConfig::from_config(self.tls_config),
            self.client_auth,
        );

        axum_server::bind(self.addr)
            .acceptor(acceptor)
            .handle(handle)
            .serve(create_verification_router().into_make_service_with_connect_info::<SocketAddr>())
            .await?;
        Ok(())
    }
}

/// The plain-HTTP CRL/AIA publisher.
#[derive(Debug)]
pub struct DistributionServer {
    addr: SocketAddr,
    endpoints: DistributionEndpointConfig,
    routes: Vec<DistributionRoute>,
}

impl DistributionServer {
    /// Validate the endpoint ports and the route set.
    ///
    /// Fails with `ConfigError::PortMismatch` when the CRL and AIA URLs name
    /// different ports; no socket has been opened at that point.
    pub fn new(
        endpoints: &DistributionEndpointConfig,
        routes: Vec<DistributionRoute>,
        host: IpAddr,
    ) -> Result<Self, ConfigError> {
        let port = endpoints.shared_port()?;
        validate_routes(&routes)?;

        Ok(Self {
            addr: SocketAddr::new(host, port),
            endpoints: endpoints.clone(),
            routes,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn routes(&self) -> &[DistributionRoute] {
        &self.routes
    }

    pub fn router(&self) -> Router {
        create_distribution_router(&self.routes)
    }

    /// Serve the routes until the handle shuts the server down.
    pub async fn serve(self, handle: Handle) -> Result<(), ServerError> {
        tracing::info!(addr = %self.addr, "Starting CRL/AIA distribution server");
        tracing::info!(url = %self.endpoints.crl_url(), "Publishing CRLs");
        tracing::info!(url = %self.endpoints.aia_url(), "Publishing AIA certificates");
        for route in &self.routes {
            tracing::debug!(
                mount = %route.mount_path(),
                dir = %route.source_dir().display(),
                "Mounted distribution route"
            );
        }

        let app = self.router();
        axum_server::bind(self.addr)
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await?;
        Ok(())
    }
}
