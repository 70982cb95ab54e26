//! Translates classified inbound messages into reactor work.
//!
//! Control messages (cancel, exit) are handled synchronously here, on the
//! transport task, so they take effect immediately no matter how deep the
//! work queue is. Everything else is bound to the session and enqueued in
//! arrival order.

use crate::lifecycle::ShutdownBarrier;
use serde::Deserialize;
use serde_json::Value;
use spool_core::protocol::{Message, Response, ResponseError};
use spool_core::work::WorkItem;
use spool_core::{
    CancellationTracker, ControlHandler, Handler, HandlerRegistry, RequestId, Responder,
};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Deserialize)]
struct CancelParams {
    id: RequestId,
}

pub(crate) struct Dispatcher<S> {
    registry: Arc<HandlerRegistry<S>>,
    session: Arc<S>,
    tracker: Arc<CancellationTracker>,
    barrier: ShutdownBarrier,
    queue: mpsc::UnboundedSender<WorkItem>,
    out: mpsc::UnboundedSender<Response>,
}

impl<S: Send + Sync + 'static> Dispatcher<S> {
    pub fn new(
        registry: Arc<HandlerRegistry<S>>,
        session: Arc<S>,
        tracker: Arc<CancellationTracker>,
        barrier: ShutdownBarrier,
        queue: mpsc::UnboundedSender<WorkItem>,
        out: mpsc::UnboundedSender<Response>,
    ) -> Self {
        Self {
            registry,
            session,
            tracker,
            barrier,
            queue,
            out,
        }
    }

    pub fn dispatch(&self, message: Message) {
        match message {
            Message::Request { id, method, params } => self.dispatch_request(id, method, params),
            Message::Notification { method, params } => {
                self.dispatch_notification(&method, params);
            }
            Message::Reply { id } => {
                tracing::debug!(?id, "dropping reply frame; this layer issues no requests");
            }
        }
    }

    fn dispatch_request(&self, id: RequestId, method: String, params: Value) {
        match self.registry.get(&method) {
            Some(Handler::Request(handler)) => {
                self.tracker.mark_pending(id.clone());

                let handler = Arc::clone(handler);
                let session = Arc::clone(&self.session);
                let action = Box::pin(async move { handler.handle(session, params).await });
                let item = WorkItem::Request {
                    id: id.clone(),
                    method,
                    action,
                    responder: Responder::new(id.clone(), self.out.clone()),
                };

                if self.queue.send(item).is_err() {
                    // Reactor already gone; the barrier is firing. Answer
                    // rather than leaving the client to hang on the id.
                    self.tracker.clear(&id);
                    self.respond_error(id, ResponseError::internal("server is shutting down"));
                }
            }
            Some(Handler::Notification(_)) | Some(Handler::Control(_)) => {
                self.respond_error(
                    id,
                    ResponseError::invalid_request(format!("{method} is a notification method")),
                );
            }
            None => {
                tracing::debug!(%method, "no handler registered for request");
                self.respond_error(id, ResponseError::method_not_found(&method));
            }
        }
    }

    fn dispatch_notification(&self, method: &str, params: Value) {
        match self.registry.get(method) {
            Some(Handler::Control(ControlHandler::CancelRequest)) => self.cancel(params),
            Some(Handler::Control(ControlHandler::Exit)) => {
                tracing::info!("exit notification received");
                self.barrier.fire();
            }
            Some(Handler::Notification(handler)) => {
                let handler = Arc::clone(handler);
                let session = Arc::clone(&self.session);
                let action = Box::pin(async move { handler.handle(session, params).await });
                let item = WorkItem::Notification {
                    method: method.to_owned(),
                    action,
                };
                if self.queue.send(item).is_err() {
                    tracing::warn!(%method, "work queue closed, notification dropped");
                }
            }
            Some(Handler::Request(_)) => {
                tracing::warn!(%method, "request method invoked as a notification, dropped");
            }
            None => {
                tracing::debug!(%method, "no handler registered for notification");
            }
        }
    }

    /// The producer side of the cancellation race. Runs synchronously so a
    /// backed-up queue cannot delay it.
    fn cancel(&self, params: Value) {
        match serde_json::from_value::<CancelParams>(params) {
            Ok(cancel) => {
                if self.tracker.cancel(&cancel.id) {
                    tracing::debug!(id = %cancel.id, "cancel requested");
                } else {
                    tracing::debug!(
                        id = %cancel.id,
                        "cancel ignored; request unknown, finished, or already cancelled"
                    );
                }
            }
            Err(error) => {
                tracing::warn!(%error, "malformed cancel notification params");
            }
        }
    }

    fn respond_error(&self, id: RequestId, error: ResponseError) {
        if self.out.send(Response::error(Some(id), error)).is_err() {
            tracing::debug!("outbound channel closed, error response dropped");
        }
    }
}
