//! Content-Length framed transport over a byte stream.
//!
//! One frame is a `Content-Length: N` header block terminated by an empty
//! line, followed by exactly N bytes of JSON. The reader yields raw frame
//! bodies; the writer is a task fed responses over a channel so the reactor
//! and the dispatcher never touch the wire directly. Every frame is flushed
//! as soon as it is written; the wire must never sit in a buffer.

use crate::error::ServerError;
use spool_core::protocol::Response;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// Upper bound on a single frame body. Nothing in an editor session comes
/// close; anything larger is a broken or hostile peer.
const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Reads framed messages from the inbound byte stream.
pub(crate) struct FrameReader<R> {
    input: BufReader<R>,
    line: String,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: BufReader::new(input),
            line: String::new(),
        }
    }

    /// Returns the next frame body, or `None` on clean end of stream.
    ///
    /// A stream that ends inside a frame, or a header block without a
    /// usable `Content-Length`, is a transport fault and fatal to the read
    /// loop.
    pub async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, ServerError> {
        let mut content_length: Option<usize> = None;
        let mut first_line = true;

        loop {
            self.line.clear();
            let read = self.input.read_line(&mut self.line).await?;
            if read == 0 {
                if first_line {
                    return Ok(None);
                }
                return Err(ServerError::Frame("stream ended inside a header block".into()));
            }
            first_line = false;

            let line = self.line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                break;
            }

            let Some((name, value)) = line.split_once(':') else {
                return Err(ServerError::Frame(format!("header without a colon: {line:?}")));
            };
            if name.eq_ignore_ascii_case("Content-Length") {
                let length = value.trim().parse::<usize>().map_err(|_| {
                    ServerError::Frame(format!("unparseable Content-Length: {:?}", value.trim()))
                })?;
                content_length = Some(length);
            }
            // Content-Type and unknown headers are tolerated and ignored.
        }

        let Some(length) = content_length else {
            return Err(ServerError::Frame("missing Content-Length header".into()));
        };
        if length > MAX_FRAME_SIZE {
            return Err(ServerError::Frame(format!(
                "frame of {length} bytes exceeds the {MAX_FRAME_SIZE} byte limit"
            )));
        }

        let mut body = vec![0u8; length];
        self.input.read_exact(&mut body).await.map_err(|e| {
            ServerError::Frame(format!("stream ended inside a {length} byte body: {e}"))
        })?;
        Ok(Some(body))
    }
}

/// Writes one framed payload and flushes it.
pub(crate) async fn write_frame<W: AsyncWrite + Unpin>(
    output: &mut W,
    payload: &[u8],
) -> std::io::Result<()> {
    let header = format!("Content-Length: {}\r\n\r\n", payload.len());
    output.write_all(header.as_bytes()).await?;
    output.write_all(payload).await?;
    output.flush().await
}

/// Drains the outbound channel onto the wire until the channel closes or
/// the wire rejects a write.
pub(crate) async fn write_loop<W: AsyncWrite + Unpin>(
    mut responses: mpsc::UnboundedReceiver<Response>,
    mut output: W,
) {
    while let Some(response) = responses.recv().await {
        let payload = match serde_json::to_vec(&response) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::error!(%error, "failed to serialize response frame");
                continue;
            }
        };
        if let Err(error) = write_frame(&mut output, &payload).await {
            tracing::error!(%error, "wire write failed, stopping writer");
            break;
        }
    }
}
