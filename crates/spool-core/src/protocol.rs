use crate::request_id::RequestId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// JSON-RPC error codes emitted by this layer.
pub mod error_codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i64 = -32700;
    /// The message was not a valid request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// The method does not exist or is not registered.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal server error, including handler faults.
    pub const INTERNAL_ERROR: i64 = -32603;
    /// A request arrived before the initialize handshake completed.
    pub const SERVER_NOT_INITIALIZED: i64 = -32002;
    /// The request was cancelled by the client.
    pub const REQUEST_CANCELLED: i64 = -32800;
}

/// Well-known method names recognized directly by this layer.
pub mod methods {
    /// The handshake request.
    pub const INITIALIZE: &str = "initialize";
    /// Cancel notification carrying a target request id.
    pub const CANCEL_REQUEST: &str = "$/cancelRequest";
    /// Exit notification; terminates the process.
    pub const EXIT: &str = "exit";
}

/// A decoded inbound frame before classification.
///
/// JSON-RPC overlays requests, notifications, and responses on one object
/// shape; this struct captures the superset and [`RawMessage::classify`]
/// sorts out which kind actually arrived.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub id: Option<RequestId>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ResponseError>,
}

/// A classified inbound message.
#[derive(Debug, Clone)]
pub enum Message {
    /// A request: response expected under the same id.
    Request {
        id: RequestId,
        method: String,
        params: Value,
    },
    /// A notification: no response expected.
    Notification { method: String, params: Value },
    /// A response to a server-initiated request. This layer issues none, so
    /// replies are logged and dropped by the dispatcher.
    Reply { id: Option<RequestId> },
}

impl Message {
    /// Returns the method name, if the message carries one.
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => Some(method),
            Self::Reply { .. } => None,
        }
    }
}

/// A structurally invalid inbound message.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("message carries neither a method nor a result/error")]
    NotAMessage {
        /// Id to echo in an error response, when the frame carried one.
        id: Option<RequestId>,
    },
}

impl RawMessage {
    /// Sorts a decoded frame into request, notification, or reply.
    ///
    /// # Examples
    ///
    /// ```
    /// use spool_core::protocol::{Message, RawMessage};
    ///
    /// let raw: RawMessage =
    ///     serde_json::from_str(r#"{"id":1,"method":"textDocument/hover","params":{}}"#).unwrap();
    /// assert!(matches!(raw.classify().unwrap(), Message::Request { .. }));
    /// ```
    pub fn classify(self) -> Result<Message, ProtocolError> {
        match (self.method, self.id) {
            (Some(method), Some(id)) => Ok(Message::Request {
                id,
                method,
                params: self.params,
            }),
            (Some(method), None) => Ok(Message::Notification {
                method,
                params: self.params,
            }),
            (None, id) => {
                if self.result.is_some() || self.error.is_some() {
                    Ok(Message::Reply { id })
                } else {
                    Err(ProtocolError::NotAMessage { id })
                }
            }
        }
    }
}

/// An outbound response frame.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Response {
    jsonrpc: &'static str,
    /// Echoes the request id; `null` for protocol-level errors where the
    /// offending frame carried no usable id.
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Response {
    /// Builds a success response.
    pub fn ok(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response.
    pub fn error(id: Option<RequestId>, error: ResponseError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// The error member of a response frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,
}

impl ResponseError {
    /// The client cancelled the request; a legitimate race outcome, not a
    /// server failure.
    pub fn cancelled() -> Self {
        Self {
            code: error_codes::REQUEST_CANCELLED,
            message: "request cancelled".into(),
            data: None,
        }
    }

    /// An unexpected fault inside a handler, carrying the fault description.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            code: error_codes::INTERNAL_ERROR,
            message: detail.into(),
            data: None,
        }
    }

    /// No handler is registered under the method name.
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: error_codes::METHOD_NOT_FOUND,
            message: format!("method not found: {method}"),
            data: None,
        }
    }

    /// The message was structurally invalid or arrived out of protocol order.
    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self {
            code: error_codes::INVALID_REQUEST,
            message: detail.into(),
            data: None,
        }
    }

    /// The handshake's parameters could not be used.
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self {
            code: error_codes::INVALID_PARAMS,
            message: detail.into(),
            data: None,
        }
    }

    /// A request arrived before the initialize handshake.
    pub fn not_initialized() -> Self {
        Self {
            code: error_codes::SERVER_NOT_INITIALIZED,
            message: "server not initialized".into(),
            data: None,
        }
    }

    /// The frame body was not valid JSON.
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self {
            code: error_codes::PARSE_ERROR,
            message: detail.into(),
            data: None,
        }
    }
}
