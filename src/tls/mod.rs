//! TLS termination for the verification listener.
//!
//! - `material`: PEM trust material and the rustls server configuration
//! - `verifier`: required versus deferred client certificate checking
//! - `acceptor`: per-connection peer authorization for axum-server

mod acceptor;
mod material;
mod verifier;

pub use acceptor::PeerAuthAcceptor;
pub use material::TrustConfiguration;
pub use verifier::{ClientAuth, DeferredClientVerifier};
