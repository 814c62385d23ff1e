//! Newline-delimited JSON framing over any async byte pipe.

use std::{
    pin::Pin,
    task::{ready, Context, Poll},
};

use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};

use crate::{
    frame::Frame,
    receive::{reassemble, LiveValue, ReassembleError},
    send::ObjectSerializer,
    value::AsyncValue,
};


/// Media type peers should advertise for this encoding.
pub const CONTENT_TYPE: &str = "application/x-ndjson";

#[derive(Debug, thiserror::Error)]
pub enum NdjsonError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Writes each frame as one line of JSON, flushing per frame so updates reach
/// the peer as soon as they exist.
#[derive(Debug)]
pub struct NdjsonWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> NdjsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn send(&mut self, frame: &Frame) -> Result<(), NdjsonError> {
        let mut line = serde_json::to_vec(frame)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        tracing::trace!(len = line.len(), "frame written");
        Ok(())
    }

    /// Closes the underlying writer, which peers read as the end of the
    /// session.
    pub async fn shutdown(&mut self) -> Result<(), NdjsonError> {
        self.writer.shutdown().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Decodes one JSON value per line, skipping blank lines.
#[derive(Debug)]
pub struct NdjsonReader<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin> NdjsonReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }
}

impl<R: AsyncRead + Unpin> Stream for NdjsonReader<R> {
    type Item = Result<Value, NdjsonError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            let line = match ready!(Pin::new(&mut this.lines).poll_next_line(cx)) {
                Ok(Some(line)) => line,
                Ok(None) => return Poll::Ready(None),
                Err(error) => return Poll::Ready(Some(Err(error.into()))),
            };
            if line.trim().is_empty() {
                continue;
            }
            return Poll::Ready(Some(serde_json::from_str(&line).map_err(Into::into)));
        }
    }
}

/// Serializes `root` onto `writer`, one frame per line, and shuts the writer
/// down once every registered source has finished.
pub async fn send_object<W>(root: AsyncValue, writer: W) -> Result<(), NdjsonError>
where
    W: AsyncWrite + Unpin,
{
    let mut frames = ObjectSerializer::new(root);
    let mut writer = NdjsonWriter::new(writer);
    while let Some(frame) = frames.next().await {
        writer.send(&frame).await?;
    }
    writer.shutdown().await
}

/// Reads the root frame from `reader` and spawns the driver that applies the
/// updates behind it.
///
/// The handle resolves once the peer shuts the stream down; join it to learn
/// whether the session ended cleanly.
pub async fn receive_object<R>(
    reader: R,
) -> Result<
    (
        LiveValue,
        tokio::task::JoinHandle<Result<(), ReassembleError>>,
    ),
    ReassembleError,
>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (root, rest) = reassemble(NdjsonReader::new(reader)).await?;
    Ok((root, tokio::spawn(rest.run())))
}
