//! Request-reactor front-end for an editor-tooling protocol server.
//!
//! spool-lsp accepts framed protocol messages over a byte stream, sequences
//! them against a stateful analysis session, and implements cooperative
//! cancellation of in-flight requests. The semantic engine itself stays an
//! external collaborator behind the [`session::Session`] trait; the domain
//! request and notification handlers are supplied by the embedding caller
//! through a [`spool_core::HandlerRegistry`].
//!
//! # Guarantees
//!
//! - Queued work runs strictly in arrival order on a single reactor worker.
//! - Cancel and exit are handled synchronously, ahead of any queue backlog.
//! - A cancelled request answers CANCELLED promptly; the handler's own
//!   result is discarded. A faulting handler answers INTERNAL. Clients
//!   never see a hang.
//! - A dead reactor fires the shutdown barrier, ending the process instead
//!   of leaving it wedged on transport I/O.
//! - With the stream guard installed, nothing but protocol frames reaches
//!   the wire.

pub mod error;
pub mod lifecycle;
pub mod server;
pub mod session;
pub mod stream_guard;

mod dispatch;
mod reactor;
mod transport;

// Re-export commonly used types
pub use error::{ConfigError, Result, ServerError};
pub use lifecycle::ShutdownBarrier;
pub use server::{Server, ServerBuilder};
pub use session::{ClientEnvironment, LogLevel, Session, VirtualFileStore};
pub use stream_guard::StreamGuard;
