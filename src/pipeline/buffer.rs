//! Buffer mode: documents fully materialized in memory.
//!
//! Synchronous so batches can run on rayon.

use std::sync::Arc;

use super::parse_bytes;
use crate::document::{Contents, Delivery, Document, Parsed};
use crate::error::RewriteError;
use crate::policy::RewritePolicy;
use crate::rewrite::rewrite_sheet;
use crate::syntax::StyleSyntax;

/// Parse and rewrite a buffered document.
///
/// The document ends up [`Contents::Parsed`] with [`Delivery::Buffer`]. On a
/// parse error the original bytes are left in place. Returns the number of
/// rewritten URLs.
pub fn process(
    document: &mut Document,
    policy: &RewritePolicy,
    syntax: &Arc<dyn StyleSyntax>,
) -> Result<usize, RewriteError> {
    let (mut sheet, syntax) = match document.take_contents() {
        Contents::Parsed(parsed) => (parsed.sheet, parsed.syntax),
        Contents::Buffer(bytes) => match parse_bytes(&bytes, &document.path, syntax.as_ref()) {
            Ok(sheet) => (sheet, syntax.clone()),
            Err(err) => {
                document.set_contents(Contents::Buffer(bytes));
                return Err(err.into());
            }
        },
        Contents::Stream(stream) => {
            document.set_contents(Contents::Stream(stream));
            return Err(RewriteError::Streaming(document.path.clone()));
        }
        Contents::Null => return Err(RewriteError::Empty(document.path.clone())),
    };

    let count = rewrite_sheet(&mut sheet, document, policy);
    document.set_contents(Contents::Parsed(Parsed {
        sheet,
        syntax,
        delivery: Delivery::Buffer,
    }));
    Ok(count)
}
