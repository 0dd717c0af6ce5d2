use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use std::{fmt, io};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::{
    codec::{Decoder, Encoder, Framed, LinesCodec, LinesCodecError},
    sync::CancellationToken,
};
use tracing::{debug, info, warn};

use crate::{protocol, state::AppState};

/// Longest request line accepted; longer lines are answered with an error.
pub const MAX_LINE_LENGTH: usize = 1024;

/// A request line the codec could not turn into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectedLine {
    TooLong,
    NotUtf8,
}

impl fmt::Display for RejectedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectedLine::TooLong => write!(f, "line longer than {} bytes", MAX_LINE_LENGTH),
            RejectedLine::NotUtf8 => f.write_str("line is not valid UTF-8"),
        }
    }
}

/// [`LinesCodec`] that yields bad lines as items instead of errors.
///
/// `Framed` stops reading after the decoder returns an error, so oversized or
/// non-UTF-8 lines are surfaced as `Err(RejectedLine)` items and the stream
/// keeps going. Only transport failures are real errors.
#[derive(Debug)]
pub struct RequestLineCodec {
    lines: LinesCodec,
}

impl RequestLineCodec {
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        }
    }

    fn map(
        decoded: Result<Option<String>, LinesCodecError>,
    ) -> Result<Option<Result<String, RejectedLine>>, LinesCodecError> {
        match decoded {
            Ok(line) => Ok(line.map(Ok)),
            // the inner codec discards the rest of the line on its next call
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Err(RejectedLine::TooLong))),
            // the offending line has already been consumed from the buffer
            Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                Ok(Some(Err(RejectedLine::NotUtf8)))
            }
            Err(e) => Err(e),
        }
    }
}

impl Default for RequestLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RequestLineCodec {
    type Item = Result<String, RejectedLine>;
    type Error = LinesCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Self::map(self.lines.decode(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Self::map(self.lines.decode_eof(src))
    }
}

impl Encoder<String> for RequestLineCodec {
    type Error = LinesCodecError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.lines.encode(line, dst)
    }
}

/// Accepts connections until `shutdown` fires, serving each on its own task.
///
/// Connections run concurrently, but every order goes through the single
/// lock in [`AppState`], so submissions are applied one at a time.
pub async fn serve_lines(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "line server listening");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("line server shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };
                debug!(%peer, "connection opened");
                let state = state.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    match handle_connection(stream, state, shutdown).await {
                        Ok(()) => debug!(%peer, "connection closed"),
                        Err(e) => warn!(%peer, error = %e, "connection closed with error"),
                    }
                });
            }
        }
    }
    Ok(())
}

/// Serves one client: each line in is one request, answered before the next is read.
pub async fn handle_connection(
    stream: TcpStream,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), LinesCodecError> {
    let mut lines = Framed::new(stream, RequestLineCodec::new());

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = lines.next() => next,
        };
        let reply = match next {
            // one write per request; the codec adds the final newline
            Some(Ok(Ok(line))) => protocol::respond(&state, &line).join("\n"),
            Some(Ok(Err(rejected))) => {
                debug!(%rejected, "rejected request line");
                format!("ERROR: {}", rejected)
            }
            Some(Err(e)) => return Err(e),
            None => break,
        };
        lines.send(reply).await?;
    }
    Ok(())
}
