//! The embedder-facing server: handshake, reactor start-up, and the
//! shutdown race.
//!
//! The embedding caller supplies the domain: a default configuration, a
//! pure configuration parse function, the handler registry (plus optional
//! plugin registries), and a session factory. This module supplies the
//! protocol front-end around it: it performs the initialize exchange,
//! builds the session, starts the reactor worker, and then races the
//! transport loop against the shutdown barrier until one of them ends the
//! process.

use crate::dispatch::Dispatcher;
use crate::error::{ConfigError, Result};
use crate::lifecycle::{InitializeParams, ShutdownBarrier};
use crate::reactor;
use crate::session::{ClientEnvironment, LogLevel, Session, VirtualFileStore};
use crate::stream_guard::StreamGuard;
use crate::transport::{self, FrameReader};
use serde_json::{Value, json};
use spool_core::protocol::{Message, ProtocolError, RawMessage, Response, ResponseError, methods};
use spool_core::{CancellationTracker, HandlerRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

type ConfigParser<S> = Box<
    dyn Fn(
            &<S as Session>::Config,
            &Value,
        ) -> std::result::Result<<S as Session>::Config, ConfigError>
        + Send
        + Sync,
>;

type SessionFactory<S> = Box<
    dyn Fn(ClientEnvironment, Arc<VirtualFileStore>, Option<PathBuf>) -> Result<Arc<S>>
        + Send
        + Sync,
>;

/// Builder for a [`Server`].
///
/// # Examples
///
/// ```no_run
/// use serde_json::{Value, json};
/// use spool_core::HandlerRegistry;
/// use spool_lsp::server::ServerBuilder;
/// use spool_lsp::session::{LogLevel, Session};
/// use std::sync::Arc;
///
/// struct Engine;
///
/// impl Session for Engine {
///     type Config = Value;
///     fn log(&self, _level: LogLevel, _message: &str) {}
///     fn register_config(&self, _config: Value) {}
/// }
///
/// let mut handlers = HandlerRegistry::new();
/// handlers.register_request("textDocument/hover", |_session: Arc<Engine>, _params| async move {
///     Ok(Value::Null)
/// });
///
/// let server = ServerBuilder::new(
///     json!({}),
///     |_prev, raw| Ok(raw.clone()),
///     |_env, _files, _root| Ok(Arc::new(Engine)),
/// )
/// .handlers(handlers)
/// .initialize_result(json!({"capabilities": {"hoverProvider": true}}))
/// .build();
///
/// # let _ = server;
/// ```
pub struct ServerBuilder<S: Session> {
    default_config: S::Config,
    parse_config: ConfigParser<S>,
    session_factory: SessionFactory<S>,
    registry: HandlerRegistry<S>,
    initialize_result: Value,
}

impl<S: Session> ServerBuilder<S> {
    /// Starts a builder from the embedder's startup contract: the default
    /// configuration, the pure `(previous, raw JSON) -> config` parse
    /// function, and the session factory.
    pub fn new(
        default_config: S::Config,
        parse_config: impl Fn(&S::Config, &Value) -> std::result::Result<S::Config, ConfigError>
        + Send
        + Sync
        + 'static,
        session_factory: impl Fn(ClientEnvironment, Arc<VirtualFileStore>, Option<PathBuf>) -> Result<Arc<S>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            default_config,
            parse_config: Box::new(parse_config),
            session_factory: Box::new(session_factory),
            registry: HandlerRegistry::new(),
            initialize_result: json!({"capabilities": {}}),
        }
    }

    /// Sets the domain handler registry.
    pub fn handlers(mut self, registry: HandlerRegistry<S>) -> Self {
        self.registry = registry;
        self
    }

    /// Absorbs plugin-contributed handlers; earlier registrations win.
    pub fn plugin_handlers(mut self, plugin: HandlerRegistry<S>) -> Self {
        self.registry.extend_with(plugin);
        self
    }

    /// Sets the payload returned from the initialize request, typically the
    /// capabilities object and server info.
    pub fn initialize_result(mut self, result: Value) -> Self {
        self.initialize_result = result;
        self
    }

    pub fn build(self) -> Server<S> {
        Server {
            default_config: self.default_config,
            parse_config: self.parse_config,
            session_factory: self.session_factory,
            registry: self.registry,
            initialize_result: self.initialize_result,
        }
    }
}

/// A configured protocol front-end, ready to serve one session.
pub struct Server<S: Session> {
    default_config: S::Config,
    parse_config: ConfigParser<S>,
    session_factory: SessionFactory<S>,
    registry: HandlerRegistry<S>,
    initialize_result: Value,
}

impl<S: Session> Server<S> {
    /// Serves one session over the given byte streams.
    ///
    /// Returns when the transport closes, when the shutdown barrier fires
    /// (exit notification or reactor death), or on a fatal transport fault.
    pub async fn run<R, W>(self, input: R, output: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let Self {
            default_config,
            parse_config,
            session_factory,
            registry,
            initialize_result,
        } = self;

        let mut frames = FrameReader::new(input);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(transport::write_loop(out_rx, output));

        let session = handshake(
            &mut frames,
            &out_tx,
            default_config,
            &parse_config,
            &session_factory,
            &initialize_result,
        )
        .await;
        let session = match session {
            Ok(Some(session)) => session,
            Ok(None) => {
                drop(out_tx);
                let _ = writer.await;
                return Ok(());
            }
            Err(error) => {
                drop(out_tx);
                let _ = writer.await;
                return Err(error);
            }
        };

        let tracker = Arc::new(CancellationTracker::new());
        let barrier = ShutdownBarrier::new();
        let (work_tx, work_rx) = mpsc::unbounded_channel();
        let worker = reactor::spawn(work_rx, Arc::clone(&tracker), barrier.clone());

        let dispatcher = Dispatcher::new(
            Arc::new(registry),
            session,
            tracker,
            barrier.clone(),
            work_tx,
            out_tx.clone(),
        );

        let result = tokio::select! {
            result = read_loop(&mut frames, &dispatcher, &out_tx) => result,
            () = barrier.wait() => {
                tracing::info!("shutdown barrier fired, ending transport loop");
                Ok(())
            }
        };

        // In-flight work is abandoned; clients of a closing server get no
        // further responses. Aborting beats blocking on a peer that has
        // stopped draining the wire.
        worker.abort();
        writer.abort();
        drop(dispatcher);
        drop(out_tx);
        let _ = writer.await;
        result
    }

    /// Serves one session over the process's standard streams.
    ///
    /// Installs the stream guard before anything else touches the wire; a
    /// guard failure aborts startup.
    pub async fn serve_stdio(self) -> Result<()> {
        let guard = StreamGuard::install()?;
        let wire = tokio::fs::File::from_std(guard.into_wire());
        self.run(tokio::io::stdin(), wire).await
    }
}

/// Decodes one frame body, answering protocol-level garbage in place.
fn decode(payload: &[u8], out: &mpsc::UnboundedSender<Response>) -> Option<Message> {
    let raw: RawMessage = match serde_json::from_slice(payload) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(%error, "undecodable frame body");
            let _ = out.send(Response::error(
                None,
                ResponseError::parse_error(error.to_string()),
            ));
            return None;
        }
    };
    match raw.classify() {
        Ok(message) => Some(message),
        Err(ProtocolError::NotAMessage { id }) => {
            tracing::warn!("frame is not a request, notification, or reply");
            let _ = out.send(Response::error(
                id,
                ResponseError::invalid_request("message carries neither method nor result"),
            ));
            None
        }
    }
}

/// Runs the pre-initialize phase and performs the handshake.
///
/// Returns the established session, or `None` when the stream closed (or an
/// exit notification arrived) before any session existed.
async fn handshake<S: Session, R: AsyncRead + Unpin>(
    frames: &mut FrameReader<R>,
    out: &mpsc::UnboundedSender<Response>,
    default_config: S::Config,
    parse_config: &ConfigParser<S>,
    session_factory: &SessionFactory<S>,
    initialize_result: &Value,
) -> Result<Option<Arc<S>>> {
    loop {
        let Some(payload) = frames.next_frame().await? else {
            tracing::info!("transport closed before initialize");
            return Ok(None);
        };
        let Some(message) = decode(&payload, out) else {
            continue;
        };

        match message {
            Message::Request { id, method, params } if method == methods::INITIALIZE => {
                let params: InitializeParams = match serde_json::from_value(params) {
                    Ok(params) => params,
                    Err(error) => {
                        tracing::warn!(%error, "unusable initialize params");
                        let _ = out.send(Response::error(
                            Some(id),
                            ResponseError::invalid_params(error.to_string()),
                        ));
                        continue;
                    }
                };

                let environment = params.client_environment();
                let root = params.root_dir();
                let files = Arc::new(VirtualFileStore::new());

                let config = match params.initialization_options.as_ref() {
                    Some(raw) => match parse_config(&default_config, raw) {
                        Ok(config) => config,
                        Err(error) => {
                            tracing::warn!(%error, "rejecting initializationOptions, keeping defaults");
                            default_config
                        }
                    },
                    None => default_config,
                };

                let session = match session_factory(environment, files, root) {
                    Ok(session) => session,
                    Err(error) => {
                        let _ = out.send(Response::error(
                            Some(id),
                            ResponseError::internal(error.to_string()),
                        ));
                        return Err(error);
                    }
                };
                session.register_config(config);

                let _ = out.send(Response::ok(id, initialize_result.clone()));
                session.log(LogLevel::Info, "session established");
                tracing::info!("initialize handshake complete");
                return Ok(Some(session));
            }
            Message::Request { id, method, .. } => {
                tracing::debug!(%method, "request before initialize rejected");
                let _ = out.send(Response::error(Some(id), ResponseError::not_initialized()));
            }
            Message::Notification { method, .. } if method == methods::EXIT => {
                tracing::info!("exit before initialize");
                return Ok(None);
            }
            Message::Notification { method, .. } => {
                tracing::debug!(%method, "notification before initialize dropped");
            }
            Message::Reply { id } => {
                tracing::debug!(?id, "reply before initialize dropped");
            }
        }
    }
}

/// Drains the transport until it closes, feeding the dispatcher.
async fn read_loop<S, R>(
    frames: &mut FrameReader<R>,
    dispatcher: &Dispatcher<S>,
    out: &mpsc::UnboundedSender<Response>,
) -> Result<()>
where
    S: Send + Sync + 'static,
    R: AsyncRead + Unpin,
{
    while let Some(payload) = frames.next_frame().await? {
        let Some(message) = decode(&payload, out) else {
            continue;
        };

        // Only one handshake per session; a second initialize is a
        // protocol violation, rejected defensively.
        if let Message::Request { id, method, .. } = &message
            && method == methods::INITIALIZE
        {
            tracing::warn!("duplicate initialize request rejected");
            let _ = out.send(Response::error(
                Some(id.clone()),
                ResponseError::invalid_request("initialize may only be sent once per session"),
            ));
            continue;
        }

        dispatcher.dispatch(message);
    }
    tracing::info!("transport stream closed");
    Ok(())
}
