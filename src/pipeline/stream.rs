//! Stream mode: documents whose contents arrive incrementally.
//!
//! ```text
//! producer ──send──> [bounded mpsc] ──next_chunk──> Accumulator
//!                                                       │ finish (sender dropped)
//!                                                       v
//!                                           parse once ─> rewrite_sheet
//!                                                       │
//!                                                       v
//!                     consumer <──CHUNK_SIZE── ContentStream::lazy (serialize on first pull)
//! ```
//!
//! Input chunks are pulled as soon as they arrive, so a producer waiting on a
//! full channel resumes immediately. Output is produced one chunk per pull;
//! a consumer that stops pulling stops the output.

use std::io;
use std::mem;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::parse_bytes;
use crate::debug;
use crate::document::{Contents, Delivery, Document, Parsed};
use crate::error::{RewriteError, StreamClosed, StreamError};
use crate::policy::RewritePolicy;
use crate::rewrite::rewrite_sheet;
use crate::syntax::{StyleSyntax, Stylesheet, stringify_with_fallback};

/// Size of the pieces a serialized stream hands out.
pub const CHUNK_SIZE: usize = 16 * 1024;

type Chunk = Result<Vec<u8>, io::Error>;

// ============================================================================
// ContentStream
// ============================================================================

/// Pull-driven byte stream with a completion signal.
pub struct ContentStream {
    source: Source,
}

enum Source {
    Channel(mpsc::Receiver<Chunk>),
    Lazy {
        sheet: Stylesheet,
        syntax: Arc<dyn StyleSyntax>,
    },
    Ready {
        text: Vec<u8>,
        pos: usize,
    },
    Done,
}

impl std::fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.source {
            Source::Channel(_) => "channel",
            Source::Lazy { .. } => "lazy",
            Source::Ready { .. } => "ready",
            Source::Done => "done",
        };
        f.debug_struct("ContentStream").field("source", &state).finish()
    }
}

impl ContentStream {
    /// Bounded channel: `capacity` chunks may be in flight before
    /// [`ChunkSender::send`] waits.
    pub fn channel(capacity: usize) -> (ChunkSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            ChunkSender { tx },
            Self {
                source: Source::Channel(rx),
            },
        )
    }

    /// Stream over bytes already in memory.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            source: Source::Ready {
                text: bytes.into(),
                pos: 0,
            },
        }
    }

    /// Stream that serializes `sheet` on the first pull.
    pub(crate) fn lazy(sheet: Stylesheet, syntax: Arc<dyn StyleSyntax>) -> Self {
        Self {
            source: Source::Lazy { sheet, syntax },
        }
    }

    /// Next chunk, or `None` once the stream is complete.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, StreamError> {
        if matches!(self.source, Source::Lazy { .. }) {
            self.serialize()?;
        }

        match &mut self.source {
            Source::Channel(rx) => match rx.recv().await {
                Some(Ok(chunk)) => Ok(Some(chunk)),
                Some(Err(err)) => {
                    self.source = Source::Done;
                    Err(StreamError::Upstream(err))
                }
                None => {
                    self.source = Source::Done;
                    Ok(None)
                }
            },
            Source::Ready { text, pos } => {
                if *pos >= text.len() {
                    self.source = Source::Done;
                    return Ok(None);
                }
                let end = (*pos + CHUNK_SIZE).min(text.len());
                let chunk = text[*pos..end].to_vec();
                *pos = end;
                Ok(Some(chunk))
            }
            Source::Lazy { .. } | Source::Done => Ok(None),
        }
    }

    fn serialize(&mut self) -> Result<(), StreamError> {
        if let Source::Lazy { sheet, syntax } = mem::replace(&mut self.source, Source::Done) {
            let text = stringify_with_fallback(syntax.as_ref(), &sheet)?;
            debug!("stream"; "serialized {} bytes", text.len());
            self.source = Source::Ready {
                text: text.into_bytes(),
                pos: 0,
            };
        }
        Ok(())
    }

    /// Drain the stream into one buffer.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, StreamError> {
        let mut acc = Accumulator::new();
        while let Some(chunk) = self.next_chunk().await? {
            acc.append(chunk);
        }
        Ok(acc.finish())
    }

    /// Pass every chunk on to `sink`.
    ///
    /// Stops without error when the receiving side of `sink` has gone away.
    /// Returns the number of bytes delivered.
    pub async fn forward(&mut self, sink: &ChunkSender) -> Result<usize, StreamError> {
        let mut sent = 0;
        while let Some(chunk) = self.next_chunk().await? {
            let len = chunk.len();
            if sink.send(chunk).await.is_err() {
                debug!("stream"; "consumer gone after {} bytes", sent);
                break;
            }
            sent += len;
        }
        Ok(sent)
    }
}

// ============================================================================
// ChunkSender
// ============================================================================

/// Producing side of [`ContentStream::channel`]. Dropping every sender
/// completes the stream.
#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: mpsc::Sender<Chunk>,
}

impl ChunkSender {
    /// Send one chunk, waiting while the channel is full.
    pub async fn send(&self, chunk: impl Into<Vec<u8>>) -> Result<(), StreamClosed> {
        self.tx.send(Ok(chunk.into())).await.map_err(|_| StreamClosed)
    }

    /// [`send`](Self::send) from a thread outside the runtime.
    pub fn blocking_send(&self, chunk: impl Into<Vec<u8>>) -> Result<(), StreamClosed> {
        self.tx.blocking_send(Ok(chunk.into())).map_err(|_| StreamClosed)
    }

    /// Abort the stream with `err`.
    pub async fn fail(self, err: io::Error) {
        // a closed receiver has nobody to tell
        let _ = self.tx.send(Err(err)).await;
    }

    /// [`fail`](Self::fail) from a thread outside the runtime.
    pub fn blocking_fail(self, err: io::Error) {
        let _ = self.tx.blocking_send(Err(err));
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// Accumulator
// ============================================================================

/// Collects stream chunks, in arrival order, into one buffer.
#[derive(Debug, Default)]
pub struct Accumulator {
    buf: Vec<u8>,
    chunks: usize,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, chunk: Vec<u8>) {
        if self.buf.is_empty() {
            self.buf = chunk;
        } else {
            self.buf.extend_from_slice(&chunk);
        }
        self.chunks += 1;
    }

    /// Chunks received so far.
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

// ============================================================================
// Processing
// ============================================================================

/// Parse and rewrite a streamed document.
///
/// The stream is drained completely and parsed once; the document ends up
/// [`Contents::Parsed`] with [`Delivery::Stream`]. Already parsed documents
/// are rewritten without parsing again. Returns the number of rewritten URLs.
///
/// On a parse error the drained bytes are put back as a stream.
pub async fn process(
    document: &mut Document,
    policy: &RewritePolicy,
    syntax: &Arc<dyn StyleSyntax>,
) -> Result<usize, RewriteError> {
    let (mut sheet, syntax) = match document.take_contents() {
        Contents::Parsed(parsed) => (parsed.sheet, parsed.syntax),
        Contents::Stream(mut stream) => {
            let mut acc = Accumulator::new();
            loop {
                match stream.next_chunk().await {
                    Ok(Some(chunk)) => acc.append(chunk),
                    Ok(None) => break,
                    Err(source) => {
                        return Err(RewriteError::Stream {
                            path: document.path.clone(),
                            source,
                        });
                    }
                }
            }
            debug!("stream"; "{}: {} bytes in {} chunks", document.path.display(), acc.len(), acc.chunks());
            let bytes = acc.finish();
            let sheet = match parse_bytes(&bytes, &document.path, syntax.as_ref()) {
                Ok(sheet) => sheet,
                Err(err) => {
                    document.set_contents(Contents::Stream(ContentStream::from_bytes(bytes)));
                    return Err(err.into());
                }
            };
            (sheet, syntax.clone())
        }
        Contents::Buffer(bytes) => match parse_bytes(&bytes, &document.path, syntax.as_ref()) {
            Ok(sheet) => (sheet, syntax.clone()),
            Err(err) => {
                document.set_contents(Contents::Buffer(bytes));
                return Err(err.into());
            }
        },
        Contents::Null => return Err(RewriteError::Empty(document.path.clone())),
    };

    let count = rewrite_sheet(&mut sheet, document, policy);
    document.set_contents(Contents::Parsed(Parsed {
        sheet,
        syntax,
        delivery: Delivery::Stream,
    }));
    Ok(count)
}
