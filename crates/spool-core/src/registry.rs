use crate::error::HandlerResult;
use crate::protocol::methods;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// A request handler: produces a response value for the client.
///
/// Implemented automatically for async closures of the matching shape, so
/// embedders can register functions directly:
///
/// ```
/// use serde_json::Value;
/// use spool_core::HandlerRegistry;
///
/// struct Session;
///
/// let mut registry: HandlerRegistry<Session> = HandlerRegistry::new();
/// registry.register_request("workspace/echo", |_session, params: Value| async move {
///     Ok(params)
/// });
/// assert!(registry.get("workspace/echo").is_some());
/// ```
#[async_trait]
pub trait RequestHandler<S>: Send + Sync {
    async fn handle(&self, session: Arc<S>, params: Value) -> HandlerResult<Value>;
}

/// A notification handler: runs for its effects, no response expected.
#[async_trait]
pub trait NotificationHandler<S>: Send + Sync {
    async fn handle(&self, session: Arc<S>, params: Value) -> HandlerResult<()>;
}

#[async_trait]
impl<S, F, Fut> RequestHandler<S> for F
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>, Value) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult<Value>> + Send,
{
    async fn handle(&self, session: Arc<S>, params: Value) -> HandlerResult<Value> {
        self(session, params).await
    }
}

#[async_trait]
impl<S, F, Fut> NotificationHandler<S> for F
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>, Value) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult<()>> + Send,
{
    async fn handle(&self, session: Arc<S>, params: Value) -> HandlerResult<()> {
        self(session, params).await
    }
}

/// The built-in control handlers.
///
/// Control messages are handled synchronously by the dispatcher, never
/// queued, so cancellation and exit take effect regardless of queue depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlHandler {
    /// `$/cancelRequest`: mark the target id cancelled.
    CancelRequest,
    /// `exit`: fire the shutdown barrier.
    Exit,
}

/// A registered handler variant.
pub enum Handler<S> {
    Request(Arc<dyn RequestHandler<S>>),
    Notification(Arc<dyn NotificationHandler<S>>),
    Control(ControlHandler),
}

impl<S> Clone for Handler<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Request(h) => Self::Request(Arc::clone(h)),
            Self::Notification(h) => Self::Notification(Arc::clone(h)),
            Self::Control(c) => Self::Control(*c),
        }
    }
}

impl<S> std::fmt::Debug for Handler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request(_) => f.write_str("Handler::Request"),
            Self::Notification(_) => f.write_str("Handler::Notification"),
            Self::Control(c) => write!(f, "Handler::Control({c:?})"),
        }
    }
}

/// Method-name keyed handler registry.
///
/// Merges three sources with explicit precedence: the two built-in control
/// handlers (always present, never overridable), domain handlers registered
/// by the embedding caller, and plugin-contributed handlers absorbed with
/// [`HandlerRegistry::extend_with`] (which never displaces an existing
/// entry). Lookup is by exact method name.
pub struct HandlerRegistry<S> {
    handlers: HashMap<String, Handler<S>>,
}

impl<S> HandlerRegistry<S> {
    /// Creates a registry holding only the control handlers.
    pub fn new() -> Self {
        let mut handlers = HashMap::new();
        handlers.insert(
            methods::CANCEL_REQUEST.to_owned(),
            Handler::Control(ControlHandler::CancelRequest),
        );
        handlers.insert(
            methods::EXIT.to_owned(),
            Handler::Control(ControlHandler::Exit),
        );
        Self { handlers }
    }

    /// Registers a request handler under `method`.
    ///
    /// Re-registering a domain method replaces the previous handler.
    /// Control method names are refused; the built-ins always win.
    pub fn register_request(
        &mut self,
        method: impl Into<String>,
        handler: impl RequestHandler<S> + 'static,
    ) {
        self.insert(method.into(), Handler::Request(Arc::new(handler)));
    }

    /// Registers a notification handler under `method`.
    pub fn register_notification(
        &mut self,
        method: impl Into<String>,
        handler: impl NotificationHandler<S> + 'static,
    ) {
        self.insert(method.into(), Handler::Notification(Arc::new(handler)));
    }

    fn insert(&mut self, method: String, handler: Handler<S>) {
        if matches!(self.handlers.get(&method), Some(Handler::Control(_))) {
            tracing::warn!(%method, "refusing to override a control handler");
            return;
        }
        self.handlers.insert(method, handler);
    }

    /// Absorbs plugin-contributed handlers.
    ///
    /// Entries already present, control and domain alike, keep their
    /// handler; shadowed plugin entries are logged and dropped.
    pub fn extend_with(&mut self, plugin: Self) {
        for (method, handler) in plugin.handlers {
            if matches!(handler, Handler::Control(_)) {
                continue;
            }
            if self.handlers.contains_key(&method) {
                tracing::debug!(%method, "plugin handler shadowed by an earlier registration");
                continue;
            }
            self.handlers.insert(method, handler);
        }
    }

    /// Looks up the handler for a method name.
    pub fn get(&self, method: &str) -> Option<&Handler<S>> {
        self.handlers.get(method)
    }

    /// Total number of registered methods, control handlers included.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` when only the control handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers
            .values()
            .all(|handler| matches!(handler, Handler::Control(_)))
    }
}

impl<S> Default for HandlerRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
