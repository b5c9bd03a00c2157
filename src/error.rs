//! Error types for parsing, serializing and streaming stylesheets.
//!
//! Every error that can abort a document carries that document's path, so a
//! caller processing many files can tell which one to fix.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

// ============================================================================
// ParseError
// ============================================================================

/// Stylesheet text could not be turned into a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}:{}:{}: {}", .path.display(), .line, .column, .reason)]
pub struct ParseError {
    /// Document the error originated from
    pub path: PathBuf,
    /// 1-based line
    pub line: usize,
    /// 1-based column, in characters
    pub column: usize,
    pub reason: String,
}

impl ParseError {
    /// Build an error at byte `offset` of `source`.
    pub fn at(path: &Path, source: &str, offset: usize, reason: impl Into<String>) -> Self {
        let (line, column) = line_column(source, offset);
        Self {
            path: path.to_path_buf(),
            line,
            column,
            reason: reason.into(),
        }
    }
}

/// 1-based line and column of a byte offset.
fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

// ============================================================================
// SerializeError
// ============================================================================

/// A tree could not be printed back to text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializeError {
    /// The inline source map annotation is not a valid source map
    #[error("invalid source map: {0}")]
    SourceMap(String),

    #[error("{0}")]
    Syntax(String),
}

// ============================================================================
// StreamError
// ============================================================================

/// Failure while moving bytes through a [`ContentStream`](crate::pipeline::ContentStream).
#[derive(Debug, Error)]
pub enum StreamError {
    /// The producer reported an error before completing
    #[error("upstream failed")]
    Upstream(#[source] io::Error),

    /// Lazy serialization failed on the first pull
    #[error(transparent)]
    Serialize(#[from] SerializeError),
}

/// The receiving side of a content stream has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("content stream closed")]
pub struct StreamClosed;

// ============================================================================
// RewriteError
// ============================================================================

/// Errors surfaced by the pipeline stage for a single document.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("failed to serialize `{}`", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: SerializeError,
    },

    #[error("stream error in `{}`", .path.display())]
    Stream {
        path: PathBuf,
        #[source]
        source: StreamError,
    },

    /// The document has no contents to work on
    #[error("`{}` has no contents", .0.display())]
    Empty(PathBuf),

    /// Buffer mode was asked to process a live stream
    #[error("`{}` is a stream, not a buffer", .0.display())]
    Streaming(PathBuf),
}

impl RewriteError {
    /// Path of the document that failed.
    pub fn path(&self) -> &Path {
        match self {
            Self::Parse(err) => &err.path,
            Self::Serialize { path, .. }
            | Self::Stream { path, .. }
            | Self::Empty(path)
            | Self::Streaming(path) => path,
        }
    }

    /// Full cause chain, one cause per line.
    pub fn detail(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            out.push_str("\n  caused by: ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_contains_path() {
        let source = "a {\n  color: red;\n";
        let err = ParseError::at(Path::new("css/error.css"), source, 0, "Unclosed block");
        let display = err.to_string();
        assert!(display.contains("css/error.css"));
        assert_eq!(display, "css/error.css:1:1: Unclosed block");
    }

    #[test]
    fn test_line_column() {
        let source = "a {\n  cölor: red;\n}";
        assert_eq!(line_column(source, 0), (1, 1));
        assert_eq!(line_column(source, 4), (2, 1));
        // columns count characters, not bytes
        assert_eq!(line_column(source, 9), (2, 5));
        // offsets inside a character snap back to its start
        assert_eq!(line_column(source, 8), (2, 4));
        assert_eq!(line_column(source, 1000), (3, 2));
    }

    #[test]
    fn test_rewrite_error_path_and_detail() {
        let err = RewriteError::Serialize {
            path: PathBuf::from("main.css"),
            source: SerializeError::SourceMap("bad base64".into()),
        };
        assert_eq!(err.path(), Path::new("main.css"));
        let detail = err.detail();
        assert!(detail.contains("failed to serialize `main.css`"));
        assert!(detail.contains("invalid source map: bad base64"));
    }
}
