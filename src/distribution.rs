//! CRL/AIA distribution endpoints and routes.
//!
//! Both artifact classes are published by one plain-HTTP listener, so the
//! CRL and AIA URLs must agree on their port. That check happens here, before
//! anything is bound.

use std::path::{Path, PathBuf};

use url::Url;

use crate::config::ConfigError;

/// The public CRL and AIA URLs the CA embeds in issued certificates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionEndpointConfig {
    crl_url: Url,
    aia_url: Url,
}

impl DistributionEndpointConfig {
    pub fn new(crl_url: Url, aia_url: Url) -> Self {
        Self { crl_url, aia_url }
    }

    pub fn crl_url(&self) -> &Url {
        &self.crl_url
    }

    pub fn aia_url(&self) -> &Url {
        &self.aia_url
    }

    /// The port both endpoints are served on.
    ///
    /// Ports are compared after scheme defaults are applied, so
    /// `http://host/crl` and `http://host:80/aia` agree. Hosts and paths are
    /// not compared.
    pub fn shared_port(&self) -> Result<u16, ConfigError> {
        let crl = effective_port(&self.crl_url)?;
        let aia = effective_port(&self.aia_url)?;
        if crl != aia {
            return Err(ConfigError::PortMismatch { crl, aia });
        }
        Ok(crl)
    }
}

fn effective_port(url: &Url) -> Result<u16, ConfigError> {
    url.port_or_known_default()
        .ok_or_else(|| ConfigError::MissingPort(url.clone()))
}

/// A directory published read-only under a URL path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionRoute {
    mount_path: String,
    source_dir: PathBuf,
}

impl DistributionRoute {
    /// The mount path is normalized to start with `/` and carry no trailing `/`.
    pub fn new(mount_path: &str, source_dir: impl Into<PathBuf>) -> Self {
        let trimmed = mount_path.trim_matches('/');
        Self {
            mount_path: format!("/{trimmed}"),
            source_dir: source_dir.into(),
        }
    }

    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }
}

/// Check a route set before it is mounted.
///
/// Routes may share a mount path; their directories are then searched in
/// configuration order.
pub fn validate_routes(routes: &[DistributionRoute]) -> Result<(), ConfigError> {
    if routes.is_empty() {
        return Err(ConfigError::Validation(
            "No distribution routes configured".to_string(),
        ));
    }
    Ok(())
}

/// Group routes by mount path, keeping the first-seen order of both the
/// mount paths and the routes within each group.
pub fn group_by_mount(routes: &[DistributionRoute]) -> Vec<(&str, Vec<&DistributionRoute>)> {
    let mut groups: Vec<(&str, Vec<&DistributionRoute>)> = Vec::new();
    for route in routes {
        match groups
            .iter()
            .position(|(mount, _)| *mount == route.mount_path())
        {
            Some(i) => groups[i].1.push(route),
            None => groups.push((route.mount_path(), vec![route])),
        }
    }
    groups
}
