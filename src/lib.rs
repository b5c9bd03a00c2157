//! cssurl - rewrite `url(...)` and `@import` references in stylesheets.
//!
//! Relative references are resolved against the stylesheet that contains
//! them, made absolute to a root directory, prefixed and optionally passed
//! through a transform hook. Everything else in the stylesheet comes out
//! byte for byte.
//!
//! ```ignore
//! use cssurl::{Document, Rewriter, RewritePolicy};
//!
//! let rewriter = Rewriter::new(RewritePolicy::from_prefix("/a/b"));
//! let mut document = Document::new("css/main.css", "", "/site")
//!     .with_buffer("a { background: url(../img/a.png) }");
//! rewriter.rewrite_buffer(&mut document)?;
//! assert_eq!(document.read_bytes().await?, b"a { background: url(/a/b/img/a.png) }");
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod logger;
pub mod pipeline;
pub mod policy;
pub mod resolve;
pub mod rewrite;
pub mod syntax;

pub use document::{Contents, Delivery, Document};
pub use error::{ParseError, RewriteError, SerializeError, StreamError};
pub use pipeline::{ContentStream, Rewriter};
pub use policy::{PolicyInput, RewriteContext, RewriteOptions, RewritePolicy, UrlTransform};
