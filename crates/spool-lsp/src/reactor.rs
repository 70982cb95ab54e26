//! The single worker that drains queued inbound work.
//!
//! Work items are processed strictly in arrival order. A request is raced
//! against its own cancellation: whichever side finishes first wins and the
//! loser's outcome is discarded. Handler faults are contained here, since
//! one broken handler must never take the worker down. Anything that does
//! terminate the worker fires the shutdown barrier on the way out, so the
//! process can never hang on a dead reactor.

use crate::lifecycle::ShutdownBarrier;
use serde_json::Value;
use spool_core::error::HandlerError;
use spool_core::protocol::ResponseError;
use spool_core::work::RequestAction;
use spool_core::{CancellationTracker, RequestId, WorkItem};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

/// Tagged outcome of one request invocation.
///
/// Every handler call resolves to exactly one of these; the classification
/// happens in one place instead of being re-derived from exception shapes
/// at each call site.
#[derive(Debug)]
enum RequestOutcome {
    Completed(Value),
    Cancelled,
    Faulted(String),
}

/// Fires the barrier when the worker unwinds or returns.
///
/// Held for the whole lifetime of the worker body so the signal is the
/// worker's very last action on every exit path, panics included.
struct FireOnExit(ShutdownBarrier);

impl Drop for FireOnExit {
    fn drop(&mut self) {
        self.0.fire();
    }
}

/// Starts the reactor worker on the given queue.
pub(crate) fn spawn(
    queue: mpsc::UnboundedReceiver<WorkItem>,
    tracker: Arc<CancellationTracker>,
    barrier: ShutdownBarrier,
) -> JoinHandle<()> {
    tokio::spawn(run(queue, tracker, barrier))
}

async fn run(
    mut queue: mpsc::UnboundedReceiver<WorkItem>,
    tracker: Arc<CancellationTracker>,
    barrier: ShutdownBarrier,
) {
    let _shutdown = FireOnExit(barrier);

    while let Some(item) = queue.recv().await {
        match item {
            WorkItem::Notification { method, action } => {
                match tokio::spawn(action).await {
                    Ok(Ok(())) => {}
                    Ok(Err(fault)) => {
                        tracing::error!(%method, %fault, "notification handler failed");
                    }
                    Err(join) => {
                        let fault = describe_join_fault(&join);
                        tracing::error!(%method, %fault, "notification handler failed");
                    }
                }
            }
            WorkItem::Request {
                id,
                method,
                action,
                responder,
            } => {
                match race(&tracker, &id, action).await {
                    RequestOutcome::Completed(value) => responder.respond(Ok(value)),
                    RequestOutcome::Cancelled => {
                        tracing::debug!(%id, %method, "request cancelled by client");
                        responder.respond(Err(ResponseError::cancelled()));
                    }
                    RequestOutcome::Faulted(fault) => {
                        tracing::error!(%id, %method, %fault, "request handler failed");
                        responder.respond(Err(ResponseError::internal(fault)));
                    }
                }
                tracker.clear(&id);
            }
        }
    }

    tracing::debug!("work queue closed, reactor worker stopping");
}

/// Races the handler against the request's cancellation.
///
/// The handler runs as its own task. If the cancellation wait wins, the
/// task is detached rather than aborted: cancellation is cooperative at
/// the granularity of the whole handler call, and a handler that never
/// observes it simply finishes on its own with nobody listening.
async fn race(
    tracker: &CancellationTracker,
    id: &RequestId,
    action: RequestAction,
) -> RequestOutcome {
    // A request cancelled while still queued resolves without ever starting
    // its handler.
    if tracker.is_cancelled(id) {
        return RequestOutcome::Cancelled;
    }
    let handler = tokio::spawn(action);
    tokio::select! {
        biased;
        () = tracker.cancelled(id) => RequestOutcome::Cancelled,
        joined = handler => classify(joined),
    }
}

fn classify(joined: Result<Result<Value, HandlerError>, JoinError>) -> RequestOutcome {
    match joined {
        Ok(Ok(value)) => RequestOutcome::Completed(value),
        Ok(Err(fault)) => RequestOutcome::Faulted(fault.to_string()),
        Err(join) => RequestOutcome::Faulted(describe_join_fault(&join)),
    }
}

fn describe_join_fault(join: &JoinError) -> String {
    if join.is_cancelled() {
        // This layer never aborts handler tasks, so an abort surfacing here
        // means cancellation arrived through the wrong channel. That is an
        // internal bug, not client cancellation; report it as a fault.
        "handler task aborted outside the cancellation protocol".into()
    } else {
        format!("handler panicked: {join}")
    }
}
