//! Content-Length framed transport over stdio
//!
//! The editor shell talks to the adapter through stdin/stdout using the DAP
//! base protocol framing:
//! ```text
//! Content-Length: <n>\r\n
//! \r\n
//! <n bytes of JSON>
//! ```
//! Reading runs in a spawned task that feeds decoded requests into a channel,
//! so the adapter's event loop can select over client requests and streaming
//! notices without blocking on either.

use crate::protocol::{Event, ProtocolMessage, Request, Response};
use tether_core::{Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// Read one framed message. `Ok(None)` means the peer closed the stream.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<ProtocolMessage>>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("Content-Length") {
                let length = value.trim().parse::<usize>().map_err(|_| {
                    Error::InvalidMessage(format!("bad Content-Length header: {line}"))
                })?;
                content_length = Some(length);
            }
        }
    }

    let length = content_length
        .ok_or_else(|| Error::InvalidMessage("missing Content-Length header".to_string()))?;
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    let message = serde_json::from_slice(&body)?;
    trace!(?message, "received");
    Ok(Some(message))
}

/// Spawn the reader task over stdin (or any buffered reader) and hand back
/// the request channel. Non-request messages are not expected from a DAP
/// client and are dropped with a warning. The channel closes on EOF.
pub fn spawn_reader<R>(reader: R) -> mpsc::Receiver<Request>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        loop {
            match read_message(&mut reader).await {
                Ok(Some(ProtocolMessage::Request(request))) => {
                    if tx.send(request).await.is_err() {
                        break;
                    }
                }
                Ok(Some(other)) => {
                    warn!(seq = other.seq(), "ignoring non-request message from client");
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(%err, "failed to read client message");
                    break;
                }
            }
        }
    });
    rx
}

/// Serializing writer for the adapter's side of the conversation. Owns the
/// outgoing sequence counter; every response and event gets the next seq.
pub struct MessageWriter<W> {
    writer: W,
    seq: i64,
}

impl<W> MessageWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self { writer, seq: 0 }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    async fn write(&mut self, message: &ProtocolMessage) -> Result<()> {
        let body = serde_json::to_vec(message)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        self.writer.write_all(header.as_bytes()).await?;
        self.writer.write_all(&body).await?;
        self.writer.flush().await?;
        trace!(?message, "sent");
        Ok(())
    }

    fn next_seq(&mut self) -> i64 {
        self.seq += 1;
        self.seq
    }

    pub async fn send_response(&mut self, mut response: Response) -> Result<()> {
        response.seq = self.next_seq();
        self.write(&ProtocolMessage::Response(response)).await
    }

    pub async fn send_event(&mut self, event: &str, body: Option<serde_json::Value>) -> Result<()> {
        let seq = self.next_seq();
        let mut event = Event::new(seq, event);
        if let Some(body) = body {
            event = event.with_body(body);
        }
        self.write(&ProtocolMessage::Event(event)).await
    }
}
