use crate::error::HandlerError;
use crate::protocol::{Response, ResponseError};
use crate::request_id::RequestId;
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

/// A type-erased request handler invocation, bound to its session and
/// parameters at dispatch time.
pub type RequestAction = BoxFuture<'static, Result<Value, HandlerError>>;

/// A type-erased notification handler invocation.
pub type NotificationAction = BoxFuture<'static, Result<(), HandlerError>>;

/// One queued unit of work for the reactor.
///
/// Everything that is not a control message becomes a `WorkItem` on the
/// single FIFO channel between the dispatcher and the reactor worker.
pub enum WorkItem {
    /// No response expected; a fault is logged and the queue moves on.
    Notification {
        method: String,
        action: NotificationAction,
    },
    /// Response expected. The responder reports the success value, a
    /// CANCELLED outcome, or an INTERNAL fault back to the client.
    Request {
        id: RequestId,
        method: String,
        action: RequestAction,
        responder: Responder,
    },
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notification { method, .. } => f
                .debug_struct("WorkItem::Notification")
                .field("method", method)
                .finish_non_exhaustive(),
            Self::Request { id, method, .. } => f
                .debug_struct("WorkItem::Request")
                .field("id", id)
                .field("method", method)
                .finish_non_exhaustive(),
        }
    }
}

/// Response hand-off for a single request.
///
/// Consuming `respond` guarantees at most one response per request id. The
/// outbound channel closing underneath it (transport already gone during
/// shutdown) is not an error; the response is dropped and noted at debug
/// level.
pub struct Responder {
    id: RequestId,
    out: mpsc::UnboundedSender<Response>,
}

impl Responder {
    /// Binds a responder to a request id and the outbound channel.
    pub fn new(id: RequestId, out: mpsc::UnboundedSender<Response>) -> Self {
        Self { id, out }
    }

    /// The request id this responder answers.
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Sends the response frame for this request.
    pub fn respond(self, result: Result<Value, ResponseError>) {
        let response = match result {
            Ok(value) => Response::ok(self.id, value),
            Err(error) => Response::error(Some(self.id), error),
        };
        if self.out.send(response).is_err() {
            tracing::debug!("outbound channel closed, response dropped");
        }
    }
}
