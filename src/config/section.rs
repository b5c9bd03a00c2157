//! `[rewrite]` and `[output]` sections.
//!
//! # Example
//!
//! ```toml
//! [rewrite]
//! prefix = "/static"          # Prepended to every rewritten path
//! base_dir = "public"         # Resolution root (default: each input's directory)
//! exclude = ["^/vendor/"]     # URLs matching any pattern are left alone
//! transform = "hash-prefix"   # none | hash-prefix | version-query
//! source_map = true           # Validate inline source maps when printing
//!
//! [output]
//! dir = "dist"                # Write here instead of stdout
//! mode = "stream"             # buffer | stream
//! ```

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{ConfigDiagnostics, FieldPath};
use crate::policy::TransformKind;

// ============================================================================
// [rewrite]
// ============================================================================

/// How URLs are rewritten.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RewriteSection {
    /// Prepended to every rewritten absolute path.
    pub prefix: String,
    /// Overrides the resolution root.
    pub base_dir: Option<PathBuf>,
    /// Regexes; matching URLs are not rewritten.
    pub exclude: Vec<String>,
    /// Post-processing applied after prefixing.
    pub transform: TransformKind,
    /// Validate inline source maps when serializing.
    pub source_map: bool,
}

impl Default for RewriteSection {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            base_dir: None,
            exclude: Vec::new(),
            transform: TransformKind::None,
            source_map: true,
        }
    }
}

pub struct RewriteFields {
    pub prefix: FieldPath,
    pub base_dir: FieldPath,
    pub exclude: FieldPath,
    pub transform: FieldPath,
    pub source_map: FieldPath,
}

impl RewriteSection {
    pub const FIELDS: RewriteFields = RewriteFields {
        prefix: FieldPath::new("rewrite.prefix"),
        base_dir: FieldPath::new("rewrite.base_dir"),
        exclude: FieldPath::new("rewrite.exclude"),
        transform: FieldPath::new("rewrite.transform"),
        source_map: FieldPath::new("rewrite.source_map"),
    };

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.prefix.contains("://") {
            diag.error_with_hint(
                Self::FIELDS.prefix,
                format!("`{}` is a URL, {} must be a path", self.prefix, Self::FIELDS.prefix),
                "runs of `/` are collapsed; serve assets from a CDN with a transform instead",
            );
        }

        if let Some(dir) = &self.base_dir
            && !dir.is_dir()
        {
            diag.error(
                Self::FIELDS.base_dir,
                format!("directory `{}` does not exist", dir.display()),
            );
        }

        for pattern in &self.exclude {
            if let Err(err) = Regex::new(pattern) {
                diag.error_with_hint(
                    Self::FIELDS.exclude,
                    format!("invalid pattern `{pattern}`"),
                    err.to_string(),
                );
            }
        }
    }

    /// Compiled `exclude` patterns. Invalid ones are skipped; `validate`
    /// reports them.
    pub fn exclude_patterns(&self) -> Vec<Regex> {
        self.exclude
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
    }

    pub fn template() -> String {
        [
            "[rewrite]",
            "# Prepended to every rewritten absolute path.",
            "prefix = \"\"",
            "# Resolution root. Defaults to each input's directory.",
            "# base_dir = \"public\"",
            "# URLs matching any of these regexes are left alone.",
            "exclude = []",
            "# none | hash-prefix | version-query",
            "transform = \"none\"",
            "# Validate inline source maps when printing.",
            "source_map = true",
        ]
        .join("\n")
    }
}

// ============================================================================
// [output]
// ============================================================================

/// Which pipeline mode documents go through.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Read whole files, rewrite in parallel (default).
    #[default]
    Buffer,
    /// Feed files through bounded channels.
    Stream,
}

/// Where results go.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputSection {
    /// Output directory; stdout when absent.
    pub dir: Option<PathBuf>,
    pub mode: OutputMode,
}

pub struct OutputFields {
    pub dir: FieldPath,
    pub mode: FieldPath,
}

impl OutputSection {
    pub const FIELDS: OutputFields = OutputFields {
        dir: FieldPath::new("output.dir"),
        mode: FieldPath::new("output.mode"),
    };

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if let Some(dir) = &self.dir
            && dir.exists()
            && !dir.is_dir()
        {
            diag.error(
                Self::FIELDS.dir,
                format!("`{}` exists and is not a directory", dir.display()),
            );
        }
    }

    /// Target file for `relative` below the output directory.
    pub fn target(&self, relative: &Path) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(relative))
    }

    pub fn template() -> String {
        [
            "[output]",
            "# Output directory. Results go to stdout when unset.",
            "# dir = \"dist\"",
            "# buffer | stream",
            "mode = \"buffer\"",
        ]
        .join("\n")
    }
}
