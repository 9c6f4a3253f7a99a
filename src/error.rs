use crate::config::ConfigError;
use crate::http::ServerError;

/// Anything that stops a listener from running.
///
/// Configuration errors are raised before any socket is bound; server errors
/// come from binding or serving.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Server(#[from] ServerError),
}
