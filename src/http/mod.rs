//! HTTP listeners.
//!
//! - **Verification**: HTTPS with client certificate inspection, served by
//!   axum-server through `PeerAuthAcceptor`
//! - **Distribution**: plain HTTP publishing the CRL and AIA trees
//!
//! Neither listener drains connections on shutdown; the process is stopped
//! externally.

mod server;
pub mod static_files;

pub use server::{DistributionServer, ServerError, VerificationServer};
