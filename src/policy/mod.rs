//! URL rewrite policy.
//!
//! A [`RewritePolicy`] decides which `url(...)` literals are rewritten and
//! what they become:
//!
//! ```text
//! literal ─trim─> valid_url? ─no──> untouched
//!                    │yes
//!                    v
//!            absolute_url(root) ─> rebuild_url(prefix) ─> transform_url? ─> new literal
//! ```
//!
//! Policies are immutable once built and cheap to clone; share one across
//! any number of concurrently processed documents.

mod context;
pub mod stats;
mod transform;

pub use context::{OccurrenceKind, RewriteContext, UrlSite};
pub use stats::{AssetStats, FsStats, StatsProvider};
pub use transform::TransformKind;

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::document::Document;
use crate::resolve::{absolute_url, rebuild_url, to_slash};

/// Eligibility predicate.
pub type UrlFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Post-processing hook: `(rebuilt url, document, context) -> url`.
pub type UrlTransform = Arc<dyn Fn(&str, &Document, &RewriteContext<'_>) -> String + Send + Sync>;

/// Default eligibility: not `scheme://`, not `//host`, not `data:`, not `#id`.
pub fn default_valid_url(url: &str) -> bool {
    static RE_ABSOLUTE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^([a-zA-Z]+:)?//").unwrap());

    !RE_ABSOLUTE.is_match(url) && !url.starts_with("data:") && !url.starts_with('#')
}

// ============================================================================
// Policy
// ============================================================================

/// Canonical rewrite configuration.
#[derive(Clone)]
pub struct RewritePolicy {
    /// Prepended to every rewritten absolute path
    pub prefix: String,
    /// Overrides the document's resolution root
    pub base_dir: Option<PathBuf>,
    valid_url: UrlFilter,
    transform_url: Option<UrlTransform>,
    stats: Option<Arc<dyn StatsProvider>>,
}

impl Default for RewritePolicy {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            base_dir: None,
            valid_url: Arc::new(default_valid_url),
            transform_url: None,
            stats: None,
        }
    }
}

impl fmt::Debug for RewritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewritePolicy")
            .field("prefix", &self.prefix)
            .field("base_dir", &self.base_dir)
            .field("transform_url", &self.transform_url.is_some())
            .field("stats", &self.stats.is_some())
            .finish_non_exhaustive()
    }
}

impl RewritePolicy {
    /// Policy that only adds `prefix`.
    pub fn from_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Policy that only installs a transform hook.
    pub fn from_transform(transform: UrlTransform) -> Self {
        Self {
            transform_url: Some(transform),
            ..Self::default()
        }
    }

    /// Policy from the full option set; unset options keep their defaults.
    pub fn from_options(options: RewriteOptions) -> Self {
        let defaults = Self::default();
        Self {
            prefix: options.prefix.unwrap_or(defaults.prefix),
            base_dir: options.base_dir,
            valid_url: options.valid_url.unwrap_or(defaults.valid_url),
            transform_url: options.transform_url,
            stats: options.stats,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn with_valid_url(mut self, filter: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.valid_url = Arc::new(filter);
        self
    }

    pub fn with_transform(
        mut self,
        transform: impl Fn(&str, &Document, &RewriteContext<'_>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.transform_url = Some(Arc::new(transform));
        self
    }

    /// Install or clear a shared hook.
    pub fn with_transform_hook(mut self, transform: Option<UrlTransform>) -> Self {
        self.transform_url = transform;
        self
    }

    pub fn with_stats(mut self, provider: impl StatsProvider + 'static) -> Self {
        self.stats = Some(Arc::new(provider));
        self
    }

    /// Whether `url` (already trimmed) should be rewritten.
    #[inline]
    pub fn is_eligible(&self, url: &str) -> bool {
        !url.is_empty() && (self.valid_url)(url)
    }

    /// Resolution root for `document` in slash form: `base_dir` (relative to
    /// the document's cwd) when set, the document's own root otherwise.
    pub fn root_for(&self, document: &Document) -> String {
        match &self.base_dir {
            Some(dir) => to_slash(&document.cwd.join(dir)),
            None => document.root_slash(),
        }
    }

    pub(crate) fn stats_provider(&self) -> Option<&dyn StatsProvider> {
        self.stats.as_deref()
    }

    /// Rewrite one literal found in `document`.
    ///
    /// Returns `None` when the literal is not eligible and must be left
    /// byte-identical.
    pub fn rewrite(
        &self,
        literal: &str,
        document: &Document,
        root: &str,
        site: UrlSite,
    ) -> Option<String> {
        let target = literal.trim();
        if !self.is_eligible(target) {
            return None;
        }

        let clean = absolute_url(target, &document.slash_path(), root);
        let rebuilt = rebuild_url(&clean, &self.prefix);

        let Some(transform) = &self.transform_url else {
            return Some(rebuilt);
        };
        let ctx = RewriteContext::new(&clean, self, document, root, site);
        Some(transform(&rebuilt, document, &ctx))
    }
}

// ============================================================================
// Construction shapes
// ============================================================================

/// Full option set, all optional.
#[derive(Clone, Default)]
pub struct RewriteOptions {
    pub prefix: Option<String>,
    pub base_dir: Option<PathBuf>,
    pub valid_url: Option<UrlFilter>,
    pub transform_url: Option<UrlTransform>,
    pub stats: Option<Arc<dyn StatsProvider>>,
}

/// Every accepted way of describing a policy.
///
/// ```ignore
/// let a: RewritePolicy = PolicyInput::from("/static").into();
/// let b: RewritePolicy = PolicyInput::Transform(Arc::new(|url, _, _| url.to_uppercase())).into();
/// ```
pub enum PolicyInput {
    /// Shorthand for `prefix`
    Prefix(String),
    /// Shorthand for `transform_url`
    Transform(UrlTransform),
    Options(RewriteOptions),
}

impl From<PolicyInput> for RewritePolicy {
    fn from(input: PolicyInput) -> Self {
        match input {
            PolicyInput::Prefix(prefix) => Self::from_prefix(prefix),
            PolicyInput::Transform(transform) => Self::from_transform(transform),
            PolicyInput::Options(options) => Self::from_options(options),
        }
    }
}

impl From<&str> for PolicyInput {
    fn from(prefix: &str) -> Self {
        Self::Prefix(prefix.to_string())
    }
}

impl From<String> for PolicyInput {
    fn from(prefix: String) -> Self {
        Self::Prefix(prefix)
    }
}

impl From<UrlTransform> for PolicyInput {
    fn from(transform: UrlTransform) -> Self {
        Self::Transform(transform)
    }
}

impl From<RewriteOptions> for PolicyInput {
    fn from(options: RewriteOptions) -> Self {
        Self::Options(options)
    }
}
