//! Core abstractions for spool.
//!
//! This crate provides the protocol-independent building blocks of the
//! request reactor: request identifiers, the wire message model, the
//! pending/cancelled bookkeeping, the handler registry, and the work items
//! handed from the dispatcher to the reactor worker. It performs no I/O;
//! everything here is driven by the `spool-lsp` front-end.
//!
//! # Architecture
//!
//! spool-core defines:
//! - **Identifiers**: [`RequestId`], opaque and client-assigned
//! - **Wire model**: [`protocol::Message`], [`protocol::Response`] and the
//!   JSON-RPC error code table
//! - **Cancellation**: [`CancellationTracker`], the single shared-state
//!   component of the reactor
//! - **Dispatch**: [`HandlerRegistry`] mapping method names to request,
//!   notification, or control handlers
//! - **Hand-off**: [`WorkItem`] and [`Responder`], the FIFO payload between
//!   transport and reactor

pub mod cancel;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod request_id;
pub mod work;

// Re-export commonly used types
pub use cancel::CancellationTracker;
pub use error::HandlerError;
pub use registry::{ControlHandler, Handler, HandlerRegistry, NotificationHandler, RequestHandler};
pub use request_id::RequestId;
pub use work::{Responder, WorkItem};
