//! Configuration loading and constants.
//!
//! Settings come from three layers, highest priority first: command line
//! arguments (which also read `CERT_AUTHORITY_HOME`, `CA_CRL_URL` and
//! `CA_AIA_URL` from the environment), an optional TOML file, and the defaults
//! below. `VerifySettings` and `DistributionSettings` hold the partially
//! specified layers; `resolve` turns them into the immutable `VerifyConfig` and
//! `DistributionConfig` each listener is constructed from.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use clap::Args;
use serde::Deserialize;
use url::Url;

use crate::distribution::{DistributionEndpointConfig, DistributionRoute};

// =============================================================================
// Defaults
// =============================================================================

/// Default listening port of the verification listener
pub const DEFAULT_VERIFY_PORT: u16 = 44303;

/// Listeners bind every interface unless told otherwise
pub const DEFAULT_BIND_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Subdirectory of the CA home holding published CRLs
pub const CRL_SUBDIR: &str = "crl";

/// Subdirectory of the CA home holding issuer certificates (AIA)
pub const AIA_SUBDIR: &str = "certs";

/// Trust root file name under the AIA subdirectory
pub const DEFAULT_TRUST_ROOT_FILE: &str = "root_ca.pem";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "ca_webservices=info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: LogFormat = LogFormat::Text;

// =============================================================================
// File layer
// =============================================================================

/// Root of the optional TOML configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub verify: VerifySettings,
    #[serde(default)]
    pub distribution: DistributionSettings,
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT,
        }
    }
}

impl LoggingConfig {
    fn default_format() -> LogFormat {
        DEFAULT_LOG_FORMAT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

// =============================================================================
// Verification listener settings
// =============================================================================

/// Verification listener settings as given by the operator.
///
/// Doubles as the `verify` subcommand's arguments and the `[verify]` table of
/// the config file; every field is optional so the layers can be merged.
#[derive(Debug, Clone, Default, Args, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifySettings {
    /// HTTPS listener port [default: 44303]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind [default: 0.0.0.0]
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Server certificate chain (PEM)
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// Server private key (PEM)
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// Trust root bundle (PEM) [default: $CERT_AUTHORITY_HOME/certs/root_ca.pem]
    #[arg(long)]
    pub ca: Option<PathBuf>,

    /// Abort handshakes that do not present a trusted client certificate
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub mutual: Option<bool>,

    /// CA home directory, used to locate the default trust root
    #[arg(long, env = "CERT_AUTHORITY_HOME")]
    pub ca_home: Option<PathBuf>,
}

/// Resolved verification listener configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyConfig {
    pub addr: SocketAddr,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub ca_path: PathBuf,
    pub require_client_cert: bool,
}

impl VerifySettings {
    /// Overlay `self` on top of `base`; fields set in `self` win.
    pub fn merge(self, base: VerifySettings) -> VerifySettings {
        VerifySettings {
            port: self.port.or(base.port),
            host: self.host.or(base.host),
            cert: self.cert.or(base.cert),
            key: self.key.or(base.key),
            ca: self.ca.or(base.ca),
            mutual: self.mutual.or(base.mutual),
            ca_home: self.ca_home.or(base.ca_home),
        }
    }

    /// Apply defaults and check that every referenced file exists.
    pub fn resolve(self) -> Result<VerifyConfig, ConfigError> {
        let cert_path = self.cert.ok_or(ConfigError::MissingValue("cert"))?;
        let key_path = self.key.ok_or(ConfigError::MissingValue("key"))?;
        let ca_path = match (self.ca, self.ca_home) {
            (Some(ca), _) => ca,
            (None, Some(home)) => home.join(AIA_SUBDIR).join(DEFAULT_TRUST_ROOT_FILE),
            (None, None) => return Err(ConfigError::MissingValue("ca")),
        };

        require_file("TLS Certificate", &cert_path)?;
        require_file("TLS Private Key", &key_path)?;
        require_file("TLS Certificate Authority Trust Root", &ca_path)?;

        Ok(VerifyConfig {
            addr: SocketAddr::new(
                self.host.unwrap_or(DEFAULT_BIND_HOST),
                self.port.unwrap_or(DEFAULT_VERIFY_PORT),
            ),
            cert_path,
            key_path,
            ca_path,
            require_client_cert: self.mutual.unwrap_or(false),
        })
    }
}

fn require_file(label: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::MissingFile {
            label,
            path: path.to_path_buf(),
        })
    }
}

// =============================================================================
// Distribution listener settings
// =============================================================================

/// Distribution listener settings as given by the operator.
#[derive(Debug, Clone, Default, Args, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DistributionSettings {
    /// Public URL of the CRL endpoint; its path is the CRL mount point
    #[arg(long, env = "CA_CRL_URL")]
    pub crl_url: Option<String>,

    /// Public URL of the AIA endpoint; its path is the AIA mount point
    #[arg(long, env = "CA_AIA_URL")]
    pub aia_url: Option<String>,

    /// CA home directory containing the crl/ and certs/ trees
    #[arg(long, env = "CERT_AUTHORITY_HOME")]
    pub ca_home: Option<PathBuf>,

    /// Address to bind [default: 0.0.0.0]
    #[arg(long)]
    pub host: Option<IpAddr>,
}

/// Resolved distribution listener configuration.
#[derive(Debug, Clone)]
pub struct DistributionConfig {
    pub host: IpAddr,
    pub endpoints: DistributionEndpointConfig,
    pub ca_home: PathBuf,
}

impl DistributionSettings {
    /// Overlay `self` on top of `base`; fields set in `self` win.
    pub fn merge(self, base: DistributionSettings) -> DistributionSettings {
        DistributionSettings {
            crl_url: self.crl_url.or(base.crl_url),
            aia_url: self.aia_url.or(base.aia_url),
            ca_home: self.ca_home.or(base.ca_home),
            host: self.host.or(base.host),
        }
    }

    pub fn resolve(self) -> Result<DistributionConfig, ConfigError> {
        let crl_url = parse_url(
            "crl_url",
            &self.crl_url.ok_or(ConfigError::MissingValue("crl_url"))?,
        )?;
        let aia_url = parse_url(
            "aia_url",
            &self.aia_url.ok_or(ConfigError::MissingValue("aia_url"))?,
        )?;
        let ca_home = self.ca_home.ok_or(ConfigError::MissingValue("ca_home"))?;

        Ok(DistributionConfig {
            host: self.host.unwrap_or(DEFAULT_BIND_HOST),
            endpoints: DistributionEndpointConfig::new(crl_url, aia_url),
            ca_home,
        })
    }
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
        name,
        value: value.to_string(),
        source,
    })
}

impl DistributionConfig {
    /// CRL and AIA routes rooted in the CA home.
    pub fn routes(&self) -> Vec<DistributionRoute> {
        vec![
            DistributionRoute::new(self.endpoints.crl_url().path(), self.ca_home.join(CRL_SUBDIR)),
            DistributionRoute::new(self.endpoints.aia_url().path(), self.ca_home.join(AIA_SUBDIR)),
        ]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
    #[error("Missing required setting '{0}'")]
    MissingValue(&'static str),
    #[error("{label} \"{}\" is not a valid file path", path.display())]
    MissingFile { label: &'static str, path: PathBuf },
    #[error("Invalid trust material: {0}")]
    TrustMaterial(String),
    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),
    #[error("Invalid {name} \"{value}\": {source}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        source: url::ParseError,
    },
    #[error("URL \"{0}\" has no port and no default port for its scheme")]
    MissingPort(Url),
    #[error("CRL and AIA ports must match (CRL port {crl}, AIA port {aia})")]
    PortMismatch { crl: u16, aia: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_filter_is_valid() {
        assert!(tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
        assert!(!DEFAULT_LOG_FILTER.contains("tower_http"));
    }

    fn write_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"pem").unwrap();
        path
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[logging]
format = "json"

[verify]
port = 8443
mutual = true

[distribution]
crl_url = "http://pki.example.com:8080/crl"
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.verify.port, Some(8443));
        assert_eq!(config.verify.mutual, Some(true));
        assert_eq!(
            config.distribution.crl_url.as_deref(),
            Some("http://pki.example.com:8080/crl")
        );
    }

    #[test]
    fn test_load_config_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[verify]\nprot = 1\n").unwrap();

        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.verify.port.is_none());
    }

    #[test]
    fn test_verify_merge_prefers_overlay() {
        let base = VerifySettings {
            port: Some(1000),
            mutual: Some(true),
            ..Default::default()
        };
        let overlay = VerifySettings {
            port: Some(2000),
            ..Default::default()
        };

        let merged = overlay.merge(base);
        assert_eq!(merged.port, Some(2000));
        assert_eq!(merged.mutual, Some(true));
    }

    #[test]
    fn test_verify_resolve_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = VerifySettings {
            cert: Some(write_file(dir.path(), "server.pem")),
            key: Some(write_file(dir.path(), "server.key")),
            ca: Some(write_file(dir.path(), "root.pem")),
            ..Default::default()
        };

        let config = settings.resolve().unwrap();
        assert_eq!(config.addr.port(), DEFAULT_VERIFY_PORT);
        assert_eq!(config.addr.ip(), DEFAULT_BIND_HOST);
        assert!(!config.require_client_cert);
    }

    #[test]
    fn test_verify_resolve_derives_trust_root_from_ca_home() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(AIA_SUBDIR)).unwrap();
        let root = write_file(&dir.path().join(AIA_SUBDIR), DEFAULT_TRUST_ROOT_FILE);
        let settings = VerifySettings {
            cert: Some(write_file(dir.path(), "server.pem")),
            key: Some(write_file(dir.path(), "server.key")),
            ca_home: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let config = settings.resolve().unwrap();
        assert_eq!(config.ca_path, root);
    }

    #[test]
    fn test_verify_resolve_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = VerifySettings {
            cert: Some(dir.path().join("absent.pem")),
            key: Some(write_file(dir.path(), "server.key")),
            ca: Some(write_file(dir.path(), "root.pem")),
            ..Default::default()
        };

        let err = settings.resolve().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingFile {
                label: "TLS Certificate",
                ..
            }
        ));
        assert!(err.to_string().contains("is not a valid file path"));
    }

    #[test]
    fn test_verify_resolve_requires_cert() {
        let err = VerifySettings::default().resolve().unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue("cert")));
    }

    #[test]
    fn test_distribution_resolve_builds_routes() {
        let settings = DistributionSettings {
            crl_url: Some("http://pki.example.com:8080/crl".to_string()),
            aia_url: Some("http://pki.example.com:8080/aia/".to_string()),
            ca_home: Some(PathBuf::from("/srv/ca")),
            host: None,
        };

        let config = settings.resolve().unwrap();
        let routes = config.routes();
        assert_eq!(routes[0].mount_path(), "/crl");
        assert_eq!(routes[0].source_dir(), Path::new("/srv/ca/crl"));
        assert_eq!(routes[1].mount_path(), "/aia");
        assert_eq!(routes[1].source_dir(), Path::new("/srv/ca/certs"));
    }

    #[test]
    fn test_distribution_resolve_rejects_bad_url() {
        let settings = DistributionSettings {
            crl_url: Some("not a url".to_string()),
            aia_url: Some("http://pki.example.com/aia".to_string()),
            ca_home: Some(PathBuf::from("/srv/ca")),
            host: None,
        };

        assert!(matches!(
            settings.resolve(),
            Err(ConfigError::InvalidUrl { name: "crl_url", .. })
        ));
    }
}
