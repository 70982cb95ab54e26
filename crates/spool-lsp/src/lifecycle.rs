use crate::session::ClientEnvironment;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Single-fire shutdown signal.
///
/// Goes from unset to fired exactly once, either when the reactor worker
/// terminates or when an exit notification arrives. The main execution path
/// races the transport loop against [`ShutdownBarrier::wait`]; whichever
/// finishes first ends the process, so a dead reactor can never leave the
/// server hung on transport I/O.
#[derive(Debug, Clone, Default)]
pub struct ShutdownBarrier {
    token: CancellationToken,
}

impl ShutdownBarrier {
    /// Creates an unfired barrier.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Fires the barrier. Idempotent; later calls are no-ops.
    pub fn fire(&self) {
        if !self.token.is_cancelled() {
            tracing::debug!("shutdown barrier fired");
        }
        self.token.cancel();
    }

    /// Suspends until the barrier fires; immediate if it already has.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    /// Returns whether the barrier has fired.
    pub fn has_fired(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// The subset of the initialize handshake this layer consumes.
///
/// Everything else in the params (capabilities, workspace folders, trace
/// settings) passes through to the embedder untouched inside the raw
/// `initialization_options` payload it parses itself.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct InitializeParams {
    pub process_id: Option<i64>,
    pub client_info: Option<ClientInfo>,
    pub root_uri: Option<String>,
    pub root_path: Option<String>,
    pub initialization_options: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClientInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl InitializeParams {
    /// Builds the client environment handed to the session factory.
    pub fn client_environment(&self) -> ClientEnvironment {
        ClientEnvironment {
            process_id: self.process_id,
            client_name: self.client_info.as_ref().map(|info| info.name.clone()),
            client_version: self
                .client_info
                .as_ref()
                .and_then(|info| info.version.clone()),
        }
    }

    /// Resolves the project root, preferring `rootUri` over the deprecated
    /// `rootPath`.
    pub fn root_dir(&self) -> Option<PathBuf> {
        if let Some(uri) = &self.root_uri
            && let Some(path) = uri.strip_prefix("file://")
        {
            return Some(PathBuf::from(path));
        }
        self.root_path.as_ref().map(PathBuf::from)
    }
}
