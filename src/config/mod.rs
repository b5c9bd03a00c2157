//! Configuration for the `cssurl` tool.
//!
//! Loaded from `cssurl.toml`, found by searching upward from the current
//! directory. The directory holding the file is the config root; relative
//! paths inside the file are resolved against it. Command line flags are
//! applied on top through [`Overrides`].
//!
//! ```text
//! cssurl.toml ──parse──> CssurlConfig ──normalize──> apply_overrides ──validate──> ok
//!                                                                          │
//!                                                 to_policy / to_rewriter ◄┘
//! ```

mod error;
mod field;
mod section;
mod util;

pub use error::{ConfigDiagnostic, ConfigDiagnostics, ConfigError};
pub use field::FieldPath;
pub use section::{OutputMode, OutputSection, RewriteSection};
pub use util::{expand_path, find_config_file, find_config_file_from};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::log;
use crate::pipeline::Rewriter;
use crate::policy::{FsStats, RewritePolicy, TransformKind, default_valid_url};
use crate::syntax::Lossless;

/// Default config file name.
pub const CONFIG_FILE: &str = "cssurl.toml";

/// Values given on the command line. `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub prefix: Option<String>,
    pub base_dir: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub stream: bool,
    pub transform: Option<TransformKind>,
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CssurlConfig {
    /// Path of the loaded file; empty when running on defaults.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub rewrite: RewriteSection,

    #[serde(default)]
    pub output: OutputSection,
}

impl CssurlConfig {
    /// Find, parse and validate the config, then apply `overrides`.
    ///
    /// A missing file is not an error: defaults are used with the current
    /// directory as root.
    pub fn load(config_name: &Path, overrides: Overrides) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(|err| ConfigError::Io(PathBuf::from("."), err))?;
        let (mut config, root) = match util::find_config_file_from(config_name, &cwd) {
            Some(path) => {
                let config = Self::from_path(&path)?;
                let root = path.parent().map(Path::to_path_buf).unwrap_or_else(|| cwd.clone());
                (Self { config_path: path, ..config }, root)
            }
            None => {
                crate::debug!("config"; "no {} found, using defaults", config_name.display());
                (Self::default(), cwd.clone())
            }
        };

        config.root = root.clone();
        config.normalize_paths(&root);
        config.apply_overrides(overrides, &cwd);
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string. Paths are left as written.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load from `path`, warning about unknown fields.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }

    /// Resolve configured paths against `root`.
    fn normalize_paths(&mut self, root: &Path) {
        if let Some(dir) = self.rewrite.base_dir.take() {
            self.rewrite.base_dir = Some(expand_path(&dir, root));
        }
        if let Some(dir) = self.output.dir.take() {
            self.output.dir = Some(expand_path(&dir, root));
        }
    }

    /// Apply command line values. Their paths are relative to `cwd`.
    pub fn apply_overrides(&mut self, overrides: Overrides, cwd: &Path) {
        let Overrides {
            prefix,
            base_dir,
            out,
            stream,
            transform,
        } = overrides;

        if let Some(prefix) = prefix {
            self.rewrite.prefix = prefix;
        }
        if let Some(dir) = base_dir {
            self.rewrite.base_dir = Some(expand_path(&dir, cwd));
        }
        if let Some(dir) = out {
            self.output.dir = Some(expand_path(&dir, cwd));
        }
        if stream {
            self.output.mode = OutputMode::Stream;
        }
        if let Some(kind) = transform {
            self.rewrite.transform = kind;
        }
    }

    /// Validate all sections, collecting every problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();
        self.rewrite.validate(&mut diag);
        self.output.validate(&mut diag);
        diag.print_warnings();
        diag.into_result().map_err(ConfigError::Diagnostics)
    }

    /// Build the rewrite policy this config describes.
    pub fn to_policy(&self) -> RewritePolicy {
        let mut policy = RewritePolicy::from_prefix(self.rewrite.prefix.clone())
            .with_transform_hook(self.rewrite.transform.hook());

        if let Some(dir) = &self.rewrite.base_dir {
            policy = policy.with_base_dir(dir.clone());
        }

        if !self.rewrite.exclude.is_empty() {
            match RegexSet::new(&self.rewrite.exclude) {
                Ok(exclude) => {
                    policy = policy
                        .with_valid_url(move |url| default_valid_url(url) && !exclude.is_match(url));
                }
                Err(err) => log!("warning"; "exclude patterns ignored: {}", err),
            }
        }

        if self.rewrite.transform != TransformKind::None {
            policy = policy.with_stats(FsStats::new());
        }

        policy
    }

    /// Rewriter with this config's policy and syntax.
    pub fn to_rewriter(&self) -> Rewriter {
        let syntax = Lossless::new().with_source_maps(self.rewrite.source_map);
        Rewriter::new(self.to_policy()).with_syntax(Arc::new(syntax))
    }

    /// Whether output goes through stream mode.
    pub fn is_stream(&self) -> bool {
        self.output.mode == OutputMode::Stream
    }

    /// Commented default config written by `cssurl init`.
    pub fn template() -> String {
        format!("{}\n\n{}\n", RewriteSection::template(), OutputSection::template())
    }
}

#[cfg(test)]
pub(crate) fn test_parse_config(content: &str) -> CssurlConfig {
    CssurlConfig::from_str(content).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::policy::UrlSite;

    #[test]
    fn test_template_parses_to_defaults() {
        let (config, ignored) = CssurlConfig::parse_with_ignored(&CssurlConfig::template()).unwrap();
        assert!(ignored.is_empty());
        assert_eq!(config.rewrite, RewriteSection::default());
        assert_eq!(config.output, OutputSection::default());
    }

    #[test]
    fn test_unknown_fields_are_collected() {
        let (config, ignored) = CssurlConfig::parse_with_ignored(
            "[rewrite]\nprefix = \"/p\"\ncolour = 1\n\n[extra]\na = 1",
        )
        .unwrap();
        assert_eq!(config.rewrite.prefix, "/p");
        assert_eq!(ignored, ["rewrite.colour", "extra"]);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            CssurlConfig::from_str("[rewrite\nprefix = 1"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_normalize_and_overrides() {
        let mut config = test_parse_config("[rewrite]\nbase_dir = \"public\"\n[output]\ndir = \"dist\"");
        config.normalize_paths(Path::new("/site"));
        assert_eq!(config.rewrite.base_dir, Some(PathBuf::from("/site/public")));
        assert_eq!(config.output.dir, Some(PathBuf::from("/site/dist")));

        config.apply_overrides(
            Overrides {
                prefix: Some("/cdn".into()),
                out: Some("build".into()),
                stream: true,
                transform: Some(TransformKind::HashPrefix),
                ..Overrides::default()
            },
            Path::new("/work"),
        );
        assert_eq!(config.rewrite.prefix, "/cdn");
        assert_eq!(config.rewrite.base_dir, Some(PathBuf::from("/site/public")));
        assert_eq!(config.output.dir, Some(PathBuf::from("/work/build")));
        assert!(config.is_stream());
        assert_eq!(config.rewrite.transform, TransformKind::HashPrefix);
    }

    #[test]
    fn test_validate_collects_errors() {
        let mut config = test_parse_config("[rewrite]\nprefix = \"http://x\"\nexclude = [\"[\"]");
        config.normalize_paths(Path::new("/site"));
        match config.validate() {
            Err(ConfigError::Diagnostics(diag)) => assert_eq!(diag.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_policy_excludes() {
        let config = test_parse_config("[rewrite]\nprefix = \"/p\"\nexclude = [\"^vendor/\", \"\\\\.svg$\"]");
        let policy = config.to_policy();
        let document = Document::new("/root/a.css", "/root", "/");
        let root = policy.root_for(&document);

        assert_eq!(
            policy.rewrite("img/a.png", &document, &root, UrlSite::Declaration).as_deref(),
            Some("/p/img/a.png")
        );
        assert!(policy.rewrite("vendor/a.png", &document, &root, UrlSite::Declaration).is_none());
        assert!(policy.rewrite("icons/a.svg", &document, &root, UrlSite::Declaration).is_none());
        assert!(policy.rewrite("//cdn/a.png", &document, &root, UrlSite::Declaration).is_none());
    }

    #[test]
    fn test_policy_base_dir() {
        let mut config = test_parse_config("[rewrite]\nbase_dir = \"public\"");
        config.normalize_paths(Path::new("/site"));
        let policy = config.to_policy();
        let document = Document::new("/site/public/css/a.css", "/elsewhere", "/");
        let root = policy.root_for(&document);
        assert_eq!(root, "/site/public");
        assert_eq!(
            policy.rewrite("../img/a.png", &document, &root, UrlSite::Import).as_deref(),
            Some("/img/a.png")
        );
    }

    #[tokio::test]
    async fn test_to_rewriter() {
        let config = test_parse_config("[rewrite]\nprefix = \"/a/b\"\nsource_map = false");
        let rewriter = config.to_rewriter();
        let mut document = Document::new("/root/css/x.css", "/root", "/")
            .with_buffer("a { b: url(../i.png) }");
        assert_eq!(rewriter.rewrite(&mut document).await.unwrap(), 1);
        assert_eq!(document.read_bytes().await.unwrap(), b"a { b: url(/a/b/i.png) }");
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("public")).unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[rewrite]\nbase_dir = \"public\"\nprefix = \"/s\"").unwrap();

        // absolute names skip the upward search
        let config = CssurlConfig::load(&path, Overrides::default()).unwrap();
        assert_eq!(config.config_path, path);
        assert_eq!(config.root, dir.path());
        assert_eq!(config.rewrite.base_dir, Some(dir.path().join("public")));
        assert_eq!(config.rewrite.prefix, "/s");
    }
}
