use thiserror::Error;

/// Fault raised by a request or notification handler.
///
/// A handler returning `Err` is a handler fault: the reactor logs it with
/// full detail and, for requests, reports it to the client as an INTERNAL
/// error carrying this description. It is never retried.
///
/// # Examples
///
/// ```
/// use spool_core::error::{HandlerError, HandlerResult};
///
/// fn lookup(name: &str) -> HandlerResult<String> {
///     if name.is_empty() {
///         return Err(HandlerError::from("empty symbol name"));
///     }
///     Ok(name.to_uppercase())
/// }
/// ```
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("{0}")]
    Message(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::Message(message.to_owned())
    }
}

/// Convenience type alias for handler return values.
pub type HandlerResult<T> = std::result::Result<T, HandlerError>;
