//! ca-webservices: network services for a private certificate authority.
//!
//! Two independent listeners:
//!
//! - a mutual-TLS diagnostic endpoint that reports whether the client's
//!   certificate chains to the CA's trust root ([`http::VerificationServer`])
//! - a plain-HTTP publisher for CRL and AIA artifacts that refuses to start
//!   unless both URLs share one port ([`http::DistributionServer`])

pub mod config;
pub mod distribution;
pub mod error;
pub mod http;
pub mod middleware;
pub mod peer;
pub mod routes;
pub mod tls;

pub use error::Error;
