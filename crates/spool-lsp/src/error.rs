use thiserror::Error;

/// Error types for the spool-lsp front-end.
///
/// Everything fatal to a server run is represented here; handler-level
/// faults never surface through this type; they are contained by the
/// reactor and turned into responses or log lines.
///
/// # Examples
///
/// ```
/// use spool_lsp::error::{Result, ServerError};
///
/// fn check_root(root: Option<&str>) -> Result<()> {
///     root.map(|_| ())
///         .ok_or_else(|| ServerError::Handshake("missing workspace root".into()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("stream guard installation failed: {0}")]
    StreamGuard(#[source] std::io::Error),

    #[error("stream guard is not supported on this platform")]
    StreamGuardUnsupported,

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed frame: {0}")]
    Frame(String),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("session initialization failed: {0}")]
    Session(String),
}

/// Error returned by the embedder's configuration parse function.
#[derive(Error, Debug)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

/// Convenience type alias for `Result<T, ServerError>`.
pub type Result<T> = std::result::Result<T, ServerError>;
