//! Isolates the wire channel from accidental writes.
//!
//! The protocol is length-framed, so a single stray `println!` (or a
//! library printing a banner) on stdout corrupts a frame and kills the
//! session. The guard runs before any other component: it captures a
//! private duplicate of the original stdout for the transport, then
//! repoints fd 1 at the error stream so every later write to stdout lands
//! with the diagnostics instead of on the wire. The wire handle is written
//! with raw, unbuffered writes and flushed per frame.

#![allow(unsafe_code)]

use crate::error::ServerError;
use std::fs::File;

#[cfg(unix)]
use std::io::{self, Write};
#[cfg(unix)]
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

/// Owner of the protocol's private output handle.
///
/// Install exactly once, before the transport starts reading or writing.
/// Failure to duplicate or redirect a stream is fatal; the server must not
/// start on an unguarded wire.
pub struct StreamGuard {
    wire: File,
}

/// Duplicates `primary` for the wire, then repoints `primary` at
/// `diversion`'s open file. After the call, `primary` and `diversion` share
/// the diagnostic destination and only the returned descriptor reaches the
/// original one.
#[cfg(unix)]
fn divert(primary: RawFd, diversion: RawFd) -> io::Result<OwnedFd> {
    // SAFETY: dup allocates a fresh descriptor; -1 is translated to the OS
    // error before ownership is assumed.
    let wire = unsafe { libc::dup(primary) };
    if wire < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: wire is a freshly duplicated, valid descriptor owned by
    // nothing else in the process.
    let wire = unsafe { OwnedFd::from_raw_fd(wire) };
    // SAFETY: dup2 atomically repoints primary; both descriptors remain
    // open and the kernel rejects invalid arguments with an error code.
    if unsafe { libc::dup2(diversion, primary) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(wire)
}

impl StreamGuard {
    /// Captures the wire and redirects stdout into the error stream.
    ///
    /// Emits one probe byte on the redirected stream and flushes it, so a
    /// failed redirection aborts startup here rather than corrupting the
    /// first frame the transport writes.
    #[cfg(unix)]
    pub fn install() -> Result<Self, ServerError> {
        let wire = divert(libc::STDOUT_FILENO, libc::STDERR_FILENO)
            .map_err(ServerError::StreamGuard)?;

        // fd 1 now reaches the diagnostic destination; prove it accepts
        // writes before the transport touches the wire.
        let mut diverted = std::io::stdout();
        diverted
            .write_all(b"\n")
            .and_then(|()| diverted.flush())
            .map_err(ServerError::StreamGuard)?;

        tracing::debug!("stream guard installed, stdout diverted to stderr");
        Ok(Self {
            wire: File::from(wire),
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> Result<Self, ServerError> {
        Err(ServerError::StreamGuardUnsupported)
    }

    /// Hands the private wire handle to the transport.
    pub fn into_wire(self) -> File {
        self.wire
    }
}
