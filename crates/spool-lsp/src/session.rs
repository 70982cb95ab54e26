use dashmap::DashMap;
use std::fmt;

/// Severity levels accepted by the session's logging sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
            Self::Info => f.write_str("info"),
            Self::Debug => f.write_str("debug"),
        }
    }
}

/// The opaque session-state collaborator behind the reactor.
///
/// The analysis engine that computes hover text, diagnostics, and friends
/// lives entirely behind this trait. The front-end creates one session via
/// the embedder's factory during the initialize handshake, registers the
/// parsed configuration exactly once, and otherwise only hands the session
/// to handlers and writes to its logging sink. It never mutates the session.
///
/// The session is shared read-only across all concurrently dispatched
/// request tasks; implementations must be internally safe for that use.
pub trait Session: Send + Sync + 'static {
    /// The embedder's configuration type, produced by its parse function
    /// from the handshake's `initializationOptions` payload.
    type Config: Send + 'static;

    /// Leveled text sink for session-scoped messages.
    fn log(&self, level: LogLevel, message: &str);

    /// Registers the configuration established during the handshake.
    /// Invoked exactly once, right after handshake parsing.
    fn register_config(&self, config: Self::Config);
}

/// Client identity extracted from the initialize handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientEnvironment {
    /// The client's process id, when advertised.
    pub process_id: Option<i64>,
    /// Editor/client name, e.g. "Neovim".
    pub client_name: Option<String>,
    /// Editor/client version string.
    pub client_version: Option<String>,
}

/// Editor-held document contents, keyed by URI.
///
/// Created by the front-end at handshake time and handed to the session
/// factory, so the analysis engine can read possibly-unsaved buffer contents
/// instead of going to disk. Document sync methods (didOpen/didChange/
/// didClose) are ordinary registry notifications; the embedder's handlers
/// keep the store current through the session they built around it.
///
/// # Examples
///
/// ```
/// use spool_lsp::session::VirtualFileStore;
///
/// let store = VirtualFileStore::new();
/// store.open("file:///src/lib.rs".into(), "fn main() {}".into());
/// assert_eq!(store.read("file:///src/lib.rs").as_deref(), Some("fn main() {}"));
///
/// store.close("file:///src/lib.rs");
/// assert!(store.read("file:///src/lib.rs").is_none());
/// ```
#[derive(Debug, Default)]
pub struct VirtualFileStore {
    files: DashMap<String, String>,
}

impl VirtualFileStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
        }
    }

    /// Records a newly opened document.
    pub fn open(&self, uri: String, text: String) {
        self.files.insert(uri, text);
    }

    /// Replaces the contents of an open document.
    ///
    /// Opening and updating are deliberately the same operation; a change
    /// for a document the store never saw simply establishes it.
    pub fn update(&self, uri: String, text: String) {
        self.files.insert(uri, text);
    }

    /// Drops a closed document, returning its last contents if it was open.
    pub fn close(&self, uri: &str) -> Option<String> {
        self.files.remove(uri).map(|(_, text)| text)
    }

    /// Reads a document's current contents.
    pub fn read(&self, uri: &str) -> Option<String> {
        self.files.get(uri).map(|entry| entry.clone())
    }

    /// Returns whether a document is currently open.
    pub fn contains(&self, uri: &str) -> bool {
        self.files.contains_key(uri)
    }

    /// Number of open documents.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` when no documents are open.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
