//! Per-occurrence context handed to transform hooks.

use std::cell::OnceCell;
use std::path::Path;

use super::RewritePolicy;
use super::stats::AssetStats;
use crate::document::Document;

/// Kind of source the URL was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccurrenceKind {
    Css,
}

impl OccurrenceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Css => "css",
        }
    }
}

/// Where in the stylesheet the URL was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlSite {
    /// `prop: ... url(...) ...`
    Declaration,
    /// `@import url(...)` or `@import "..."`
    Import,
}

/// Everything a transform hook may want to know about one occurrence.
pub struct RewriteContext<'a> {
    /// Root-relative URL before `prefix` was applied
    pub clean: &'a str,
    pub policy: &'a RewritePolicy,
    pub kind: OccurrenceKind,
    pub site: UrlSite,
    pub document: &'a Document,
    /// Slash-separated resolution root
    pub root: &'a str,
    stats: OnceCell<Option<AssetStats>>,
}

impl<'a> RewriteContext<'a> {
    pub(crate) fn new(
        clean: &'a str,
        policy: &'a RewritePolicy,
        document: &'a Document,
        root: &'a str,
        site: UrlSite,
    ) -> Self {
        Self {
            clean,
            policy,
            kind: OccurrenceKind::Css,
            site,
            document,
            root,
            stats: OnceCell::new(),
        }
    }

    /// Metadata of the referenced asset.
    ///
    /// Computed on first call through the policy's stats provider; `None`
    /// without a provider or when the asset does not exist.
    pub fn stats(&self) -> Option<&AssetStats> {
        self.stats
            .get_or_init(|| {
                self.policy
                    .stats_provider()
                    .and_then(|provider| provider.stats(self.clean, Path::new(self.root)))
            })
            .as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::StatsProvider;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    impl StatsProvider for Counting {
        fn stats(&self, clean: &str, root: &Path) -> Option<AssetStats> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Some(AssetStats {
                path: root.join(clean.trim_start_matches('/')),
                size: 3,
                modified: None,
                hash: "0123456789abcdef".into(),
            })
        }
    }

    #[test]
    fn test_stats_are_lazy_and_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = RewritePolicy::default().with_stats(Counting(calls.clone()));
        let document = Document::new("/site/a.css", "/site", "/");
        let ctx = RewriteContext::new("/img/a.png", &policy, &document, "/site", UrlSite::Declaration);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let stats = ctx.stats().unwrap();
        assert_eq!(stats.path, PathBuf::from("/site/img/a.png"));
        assert_eq!(stats.fingerprint(), "01234567");
        ctx.stats();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
