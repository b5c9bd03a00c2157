//! Built-in transform hooks selectable from config and CLI.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{RewriteContext, UrlTransform};
use crate::document::Document;

/// Named transform applied after prefixing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TransformKind {
    /// Leave the rebuilt URL alone (default).
    #[default]
    None,
    /// `/-/<fingerprint><url>`
    HashPrefix,
    /// `<url>?v=<fingerprint>`
    VersionQuery,
}

impl TransformKind {
    /// Hook implementing this transform. Assets without stats keep the
    /// rebuilt URL.
    pub fn hook(self) -> Option<UrlTransform> {
        match self {
            Self::None => None,
            Self::HashPrefix => Some(Arc::new(hash_prefix)),
            Self::VersionQuery => Some(Arc::new(version_query)),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::HashPrefix => "hash-prefix",
            Self::VersionQuery => "version-query",
        }
    }
}

fn hash_prefix(url: &str, _: &Document, ctx: &RewriteContext<'_>) -> String {
    match ctx.stats() {
        Some(stats) => format!("/-/{}{}", stats.fingerprint(), url),
        None => url.to_string(),
    }
}

fn version_query(url: &str, _: &Document, ctx: &RewriteContext<'_>) -> String {
    match ctx.stats() {
        Some(stats) => append_version(url, stats.fingerprint()),
        None => url.to_string(),
    }
}

/// Append `v=<version>` before any fragment, joining an existing query.
fn append_version(url: &str, version: &str) -> String {
    let (path, fragment) = match url.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (url, None),
    };
    let sep = if path.contains('?') { '&' } else { '?' };
    match fragment {
        Some(fragment) => format!("{path}{sep}v={version}#{fragment}"),
        None => format!("{path}{sep}v={version}"),
    }
}
