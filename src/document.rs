//! The host document record.
//!
//! A [`Document`] is what flows between pipeline stages: a logical path, the
//! directories it resolves against and its contents. Contents move through
//! an explicit state machine:
//!
//! ```text
//!            parse + rewrite                 materialize
//! Buffer ───────────────────> Parsed{Buffer} ────────────> Buffer
//! Stream ───────────────────> Parsed{Stream} ────────────> Stream (lazy)
//! ```
//!
//! The stage holding a `&mut Document` owns its contents exclusively.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{RewriteError, SerializeError};
use crate::pipeline::ContentStream;
use crate::resolve::to_slash;
use crate::syntax::{StyleSyntax, Stylesheet, stringify_with_fallback};

/// How a parsed document is handed back once serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Buffer,
    Stream,
}

/// A parsed tree waiting to be serialized.
#[derive(Clone)]
pub struct Parsed {
    pub sheet: Stylesheet,
    pub syntax: Arc<dyn StyleSyntax>,
    pub delivery: Delivery,
}

/// Content states of a document.
#[derive(Default)]
pub enum Contents {
    /// No contents (directories, removed files)
    #[default]
    Null,
    Buffer(Vec<u8>),
    Stream(ContentStream),
    Parsed(Parsed),
}

impl Contents {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Buffer(_) => "buffer",
            Self::Stream(_) => "stream",
            Self::Parsed(_) => "parsed",
        }
    }
}

impl std::fmt::Debug for Contents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffer(bytes) => write!(f, "Buffer({} bytes)", bytes.len()),
            Self::Parsed(parsed) => write!(f, "Parsed({:?})", parsed.delivery),
            other => f.write_str(other.name()),
        }
    }
}

/// A stylesheet travelling through the pipeline.
#[derive(Debug)]
pub struct Document {
    /// Logical path, absolute or relative to `cwd`
    pub path: PathBuf,
    /// Base directory, the default resolution root
    pub base: PathBuf,
    /// Working directory relative paths are resolved against
    pub cwd: PathBuf,
    contents: Contents,
}

impl Document {
    /// Create a document with no contents.
    pub fn new(path: impl Into<PathBuf>, base: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            base: base.into(),
            cwd: cwd.into(),
            contents: Contents::Null,
        }
    }

    pub fn with_buffer(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.contents = Contents::Buffer(bytes.into());
        self
    }

    pub fn with_stream(mut self, stream: ContentStream) -> Self {
        self.contents = Contents::Stream(stream);
        self
    }

    /// Current contents, without serializing.
    pub fn contents(&self) -> &Contents {
        &self.contents
    }

    pub fn set_contents(&mut self, contents: Contents) {
        self.contents = contents;
    }

    /// Move the contents out, leaving [`Contents::Null`].
    pub fn take_contents(&mut self) -> Contents {
        std::mem::take(&mut self.contents)
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self.contents, Contents::Parsed(_))
    }

    /// Default resolution root: `cwd` joined with `base`.
    pub fn root(&self) -> PathBuf {
        self.cwd.join(&self.base)
    }

    /// [`root`](Self::root) in slash form.
    pub fn root_slash(&self) -> String {
        to_slash(&self.root())
    }

    /// Absolute logical path in slash form.
    pub fn slash_path(&self) -> String {
        to_slash(&self.cwd.join(&self.path))
    }

    /// Path relative to `base`, falling back to the file name.
    pub fn relative(&self) -> PathBuf {
        let absolute = self.cwd.join(&self.path);
        match absolute.strip_prefix(self.root()) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => absolute
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| self.path.clone()),
        }
    }

    /// Turn a parsed tree back into raw contents.
    ///
    /// Buffer delivery serializes now. Stream delivery becomes a
    /// [`ContentStream`] that serializes on its first pull. Raw contents
    /// are returned as they are.
    pub fn materialize(&mut self) -> Result<&Contents, SerializeError> {
        self.contents = match self.take_contents() {
            Contents::Parsed(parsed) => match parsed.delivery {
                Delivery::Buffer => {
                    match stringify_with_fallback(parsed.syntax.as_ref(), &parsed.sheet) {
                        Ok(text) => Contents::Buffer(text.into_bytes()),
                        Err(err) => {
                            self.contents = Contents::Parsed(parsed);
                            return Err(err);
                        }
                    }
                }
                Delivery::Stream => {
                    Contents::Stream(ContentStream::lazy(parsed.sheet, parsed.syntax))
                }
            },
            raw => raw,
        };
        Ok(&self.contents)
    }

    /// Materialize and read the whole contents, leaving the document empty.
    pub async fn read_bytes(&mut self) -> Result<Vec<u8>, RewriteError> {
        if let Err(source) = self.materialize().map(|_| ()) {
            return Err(RewriteError::Serialize {
                path: self.path.clone(),
                source,
            });
        }
        match self.take_contents() {
            Contents::Null => Err(RewriteError::Empty(self.path.clone())),
            Contents::Buffer(bytes) => Ok(bytes),
            Contents::Stream(mut stream) => {
                stream
                    .read_to_end()
                    .await
                    .map_err(|source| RewriteError::Stream {
                        path: self.path.clone(),
                        source,
                    })
            }
            Contents::Parsed(_) => unreachable!("materialize leaves raw contents"),
        }
    }

    /// Copy a document whose contents are not a live stream.
    pub fn try_clone(&self) -> Option<Self> {
        let contents = match &self.contents {
            Contents::Null => Contents::Null,
            Contents::Buffer(bytes) => Contents::Buffer(bytes.clone()),
            Contents::Parsed(parsed) => Contents::Parsed(parsed.clone()),
            Contents::Stream(_) => return None,
        };
        Some(Self {
            path: self.path.clone(),
            base: self.base.clone(),
            cwd: self.cwd.clone(),
            contents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Lossless;
    use std::path::Path;

    fn parsed(delivery: Delivery) -> Document {
        let syntax: Arc<dyn StyleSyntax> = Arc::new(Lossless::new());
        let sheet = syntax.parse("a { b: c }", Path::new("a.css")).unwrap();
        let mut document = Document::new("/site/a.css", "/site", "/");
        document.set_contents(Contents::Parsed(Parsed {
            sheet,
            syntax,
            delivery,
        }));
        document
    }

    #[test]
    fn test_paths() {
        let document = Document::new("css/main.css", "public", "/work");
        assert_eq!(document.root(), PathBuf::from("/work/public"));
        assert_eq!(document.slash_path(), "/work/css/main.css");

        let document = Document::new("/work/public/css/main.css", "public", "/work");
        assert_eq!(document.relative(), PathBuf::from("css/main.css"));
    }

    #[test]
    fn test_materialize_buffer() {
        let mut document = parsed(Delivery::Buffer);
        match document.materialize().unwrap() {
            Contents::Buffer(bytes) => assert_eq!(bytes, b"a { b: c }"),
            other => panic!("unexpected {other:?}"),
        }
        // raw contents stay as they are
        assert_eq!(document.materialize().unwrap().name(), "buffer");
    }

    #[tokio::test]
    async fn test_materialize_stream_is_lazy() {
        let mut document = parsed(Delivery::Stream);
        assert_eq!(document.materialize().unwrap().name(), "stream");
        assert_eq!(document.read_bytes().await.unwrap(), b"a { b: c }");
        assert!(matches!(document.contents(), Contents::Null));
    }

    #[tokio::test]
    async fn test_read_bytes_of_empty_document() {
        let mut document = Document::new("/a.css", "/", "/");
        assert!(matches!(
            document.read_bytes().await,
            Err(RewriteError::Empty(_))
        ));
    }

    #[test]
    fn test_try_clone() {
        let document = Document::new("/a.css", "/", "/").with_buffer("x");
        let copy = document.try_clone().unwrap();
        assert!(matches!(copy.contents(), Contents::Buffer(bytes) if bytes == b"x"));

        let copy = parsed(Delivery::Buffer).try_clone().unwrap();
        assert!(copy.is_parsed());

        let streaming = Document::new("/a.css", "/", "/").with_stream(ContentStream::from_bytes("x"));
        assert!(streaming.try_clone().is_none());
    }
}
