//! Content pipeline: documents in, rewritten documents out.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  Buffer mode (sync, rayon friendly)          │
//! │  Buffer -> parse -> rewrite -> Parsed{Buffer} │
//! └──────────────────────────────────────────────┘
//!
//! ┌──────────────────────────────────────────────┐
//! │  Stream mode (async, tokio)                  │
//! │  Stream -> accumulate -> parse -> rewrite     │
//! │         -> Parsed{Stream}                     │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Both modes leave the document parsed; text is produced when a reader
//! calls [`Document::materialize`]. A document that is already parsed is
//! rewritten again without being parsed a second time.

pub mod buffer;
pub mod stream;

pub use stream::{Accumulator, CHUNK_SIZE, ChunkSender, ContentStream};

use std::path::Path;
use std::sync::Arc;

use crate::document::{Contents, Delivery, Document};
use crate::error::{ParseError, RewriteError};
use crate::policy::RewritePolicy;
use crate::syntax::{Lossless, StyleSyntax, Stylesheet};

/// Parse raw document bytes, rejecting invalid UTF-8 with a positioned error.
pub(crate) fn parse_bytes(
    bytes: &[u8],
    path: &Path,
    syntax: &dyn StyleSyntax,
) -> Result<Stylesheet, ParseError> {
    match std::str::from_utf8(bytes) {
        Ok(text) => syntax.parse(text, path),
        Err(err) => {
            let valid = String::from_utf8_lossy(&bytes[..err.valid_up_to()]);
            Err(ParseError::at(path, &valid, valid.len(), "Invalid UTF-8"))
        }
    }
}

// =============================================================================
// Rewriter
// =============================================================================

/// A policy and a syntax, ready to process any number of documents.
///
/// Cloning is cheap; clones share the policy and syntax.
#[derive(Clone)]
pub struct Rewriter {
    policy: Arc<RewritePolicy>,
    syntax: Arc<dyn StyleSyntax>,
}

impl std::fmt::Debug for Rewriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rewriter")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Rewriter {
    /// Rewriter using the default [`Lossless`] syntax.
    pub fn new(policy: impl Into<RewritePolicy>) -> Self {
        Self {
            policy: Arc::new(policy.into()),
            syntax: Arc::new(Lossless::new()),
        }
    }

    pub fn with_syntax(mut self, syntax: Arc<dyn StyleSyntax>) -> Self {
        self.syntax = syntax;
        self
    }

    pub fn policy(&self) -> &RewritePolicy {
        &self.policy
    }

    /// Buffer mode. Returns the number of rewritten URLs.
    pub fn rewrite_buffer(&self, document: &mut Document) -> Result<usize, RewriteError> {
        buffer::process(document, &self.policy, &self.syntax)
    }

    /// Process `document` in the mode its contents call for.
    pub async fn rewrite(&self, document: &mut Document) -> Result<usize, RewriteError> {
        let streaming = match document.contents() {
            Contents::Stream(_) => true,
            Contents::Parsed(parsed) => parsed.delivery == Delivery::Stream,
            Contents::Buffer(_) | Contents::Null => false,
        };
        if streaming {
            stream::process(document, &self.policy, &self.syntax).await
        } else {
            buffer::process(document, &self.policy, &self.syntax)
        }
    }

    /// Process documents concurrently, one task each, results in input order.
    pub async fn rewrite_all(&self, documents: Vec<Document>) -> Vec<Result<Document, RewriteError>> {
        let handles: Vec<_> = documents
            .into_iter()
            .map(|mut document| {
                let rewriter = self.clone();
                tokio::spawn(async move {
                    rewriter.rewrite(&mut document).await?;
                    Ok::<_, RewriteError>(document)
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(err) => std::panic::resume_unwind(err.into_panic()),
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyInput;

    fn doc(source: &str) -> Document {
        Document::new("/root/css/file.css", "/root", "/").with_buffer(source)
    }

    #[test]
    fn test_parse_bytes_rejects_invalid_utf8() {
        let err = parse_bytes(b"a {\n b: \xff }", Path::new("bad.css"), &Lossless::new()).unwrap_err();
        assert_eq!(err.reason, "Invalid UTF-8");
        assert_eq!((err.line, err.column), (2, 5));
    }

    #[tokio::test]
    async fn test_rewrite_picks_mode() {
        let rewriter = Rewriter::new(PolicyInput::from("/a/b"));

        let mut buffered = doc("a { b: url(x.png) }");
        rewriter.rewrite(&mut buffered).await.unwrap();
        assert!(matches!(
            buffered.contents(),
            Contents::Parsed(parsed) if parsed.delivery == Delivery::Buffer
        ));

        let mut streamed = Document::new("/root/css/file.css", "/root", "/")
            .with_stream(ContentStream::from_bytes("a { b: url(x.png) }"));
        rewriter.rewrite(&mut streamed).await.unwrap();
        assert!(matches!(
            streamed.contents(),
            Contents::Parsed(parsed) if parsed.delivery == Delivery::Stream
        ));
        assert_eq!(
            streamed.read_bytes().await.unwrap(),
            b"a { b: url(/a/b/css/x.png) }"
        );
    }

    #[tokio::test]
    async fn test_rewrite_all_keeps_order() {
        let rewriter = Rewriter::new(RewritePolicy::from_prefix("/p"));
        let documents = vec![
            doc("a { b: url(one.png) }"),
            doc("a { b: c"),
            Document::new("/root/css/file.css", "/root", "/")
                .with_stream(ContentStream::from_bytes("a { b: url(two.png) }")),
        ];

        let mut results = rewriter.rewrite_all(documents).await.into_iter();
        let mut first = results.next().unwrap().unwrap();
        assert_eq!(first.read_bytes().await.unwrap(), b"a { b: url(/p/css/one.png) }");
        assert!(matches!(results.next().unwrap(), Err(RewriteError::Parse(_))));
        let mut third = results.next().unwrap().unwrap();
        assert_eq!(third.read_bytes().await.unwrap(), b"a { b: url(/p/css/two.png) }");
    }

    #[tokio::test]
    async fn test_reprocessing_parsed_document_skips_parse() {
        let rewriter = Rewriter::new(RewritePolicy::from_prefix("/p"));
        let mut document = doc("a { b: url(x.png) }");
        rewriter.rewrite_buffer(&mut document).unwrap();
        // second pass sees the already rewritten absolute URL
        rewriter.rewrite_buffer(&mut document).unwrap();
        assert_eq!(
            document.read_bytes().await.unwrap(),
            b"a { b: url(/p/p/css/x.png) }"
        );
    }
}
