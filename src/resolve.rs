//! Path resolution for stylesheet URLs.
//!
//! All functions work on `/`-separated strings with POSIX semantics, no
//! matter the host platform: stylesheet URLs are always slash-separated and
//! document paths are converted with [`to_slash`] before they get here.
//!
//! ```text
//! absolute_url("../img/a.png", "/site/css/main.css", "/site")  -> /img/a.png
//! rebuild_url("/img/a.png", "/a/b")                            -> /a/b/img/a.png
//! ```

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// Resolve `url` against the file that references it, relative to `root`.
///
/// - URLs starting with `/` are returned unchanged.
/// - The fragment (`#...`) is split off, the rest is joined with the parent
///   directory and normalized, then reattached verbatim.
/// - If the result starts with `root`, that prefix is trimmed and the rest is
///   made root-relative (leading `/`). Paths escaping the root are returned
///   normalized but untrimmed.
pub fn absolute_url(url: &str, parent: &str, root: &str) -> String {
    if url.starts_with('/') {
        return url.to_string();
    }

    let (path, fragment) = match url.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (url, None),
    };

    let mut out = normalize_path(&join_paths(dirname(parent), path));
    if let Some(rest) = out.strip_prefix(root) {
        out = if rest.starts_with('/') {
            rest.to_string()
        } else {
            format!("/{rest}")
        };
    }

    match fragment {
        Some(fragment) => format!("{out}#{fragment}"),
        None => out,
    }
}

/// Prepend `prefix` to `url`, collapsing runs of `/`.
///
/// An empty prefix leaves the URL untouched.
pub fn rebuild_url(url: &str, prefix: &str) -> String {
    static RE_SLASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/{2,}").unwrap());

    if prefix.is_empty() {
        return url.to_string();
    }

    let joined = normalize_path(&join_paths(prefix, url));
    RE_SLASHES.replace_all(&joined, "/").into_owned()
}

/// Normalize a slash-separated path.
///
/// Collapses `.` and empty segments, resolves `..` against preceding
/// segments and keeps a trailing slash. `..` above `/` is dropped for
/// absolute paths and kept for relative ones. An empty relative result
/// becomes `.`.
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let absolute = path.starts_with('/');
    let trailing = path.ends_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            _ => segments.push(part),
        }
    }

    let mut out = segments.join("/");
    if out.is_empty() && !absolute {
        out.push('.');
    }
    if trailing && !out.is_empty() {
        out.push('/');
    }
    if absolute {
        out.insert(0, '/');
    }
    out
}

/// Join two path pieces with `/` and normalize the result.
pub fn join_paths(base: &str, rel: &str) -> String {
    let joined = match (base.is_empty(), rel.is_empty()) {
        (true, true) => return ".".to_string(),
        (true, false) => rel.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}/{rel}"),
    };
    normalize_path(&joined)
}

/// Directory part of a slash-separated path.
///
/// `/a/b/c.css` -> `/a/b`, `/c.css` -> `/`, `c.css` -> `.`
pub fn dirname(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.starts_with('/') { "/" } else { "." };
    }
    match trimmed.rfind('/') {
        Some(0) => "/",
        Some(idx) => &trimmed[..idx],
        None => ".",
    }
}

/// Convert a platform path to the slash-separated form used here.
pub fn to_slash(path: &Path) -> String {
    let lossy = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        lossy.into_owned()
    } else {
        lossy.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_url_trims_root() {
        assert_eq!(
            absolute_url("../img/a.png", "/root/css/file.css", "/root"),
            "/img/a.png"
        );
        assert_eq!(
            absolute_url("img/a.png", "/root/css/file.css", "/root"),
            "/css/img/a.png"
        );
        assert_eq!(
            absolute_url("./a.png", "/root/file.css", "/root/"),
            "/a.png"
        );
    }

    #[test]
    fn test_absolute_url_keeps_rooted_urls() {
        assert_eq!(
            absolute_url("/img/a.png", "/root/css/file.css", "/root"),
            "/img/a.png"
        );
    }

    #[test]
    fn test_absolute_url_fragment_is_verbatim() {
        assert_eq!(
            absolute_url("../fonts/icons.svg#glyph", "/site/css/main.css", "/site"),
            "/fonts/icons.svg#glyph"
        );
        // only the first `#` splits
        assert_eq!(
            absolute_url("a.svg#x#y", "/site/main.css", "/site"),
            "/a.svg#x#y"
        );
    }

    #[test]
    fn test_absolute_url_outside_root_is_untrimmed() {
        assert_eq!(
            absolute_url("../../shared/a.png", "/site/css/main.css", "/site"),
            "/shared/a.png"
        );
        assert_eq!(
            absolute_url("../../../x.png", "/site/css/main.css", "/site"),
            "/x.png"
        );
        assert_eq!(
            absolute_url("../other/a.png", "/site/main.css", "/site"),
            "/other/a.png"
        );
        assert_eq!(
            absolute_url("a.png", "/elsewhere/main.css", "/site"),
            "/elsewhere/a.png"
        );
    }

    #[test]
    fn test_rebuild_url_collapses_separators() {
        assert_eq!(rebuild_url("//img/a.png", "/a/b"), "/a/b/img/a.png");
        assert_eq!(rebuild_url("/img/a.png", "/a/b/"), "/a/b/img/a.png");
        assert_eq!(rebuild_url("/img//a.png", "//cdn"), "/cdn/img/a.png");
    }

    #[test]
    fn test_rebuild_url_empty_prefix() {
        assert_eq!(rebuild_url("img//a.png", ""), "img//a.png");
    }

    #[test]
    fn test_rebuild_url_keeps_trailing_slash() {
        assert_eq!(rebuild_url("/fonts/", "/static"), "/static/fonts/");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/a/./b/../c"), "/a/c");
        assert_eq!(normalize_path("/../a"), "/a");
        assert_eq!(normalize_path("../a/../../b"), "../../b");
        assert_eq!(normalize_path("a/.."), ".");
        assert_eq!(normalize_path("a//b/"), "a/b/");
        assert_eq!(normalize_path(""), ".");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn test_dirname() {
        assert_eq!(dirname("/a/b/c.css"), "/a/b");
        assert_eq!(dirname("/c.css"), "/");
        assert_eq!(dirname("c.css"), ".");
        assert_eq!(dirname("/a/b/"), "/a");
        assert_eq!(dirname("/"), "/");
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/a/b", "../c"), "/a/c");
        assert_eq!(join_paths(".", "img/a.png"), "img/a.png");
        assert_eq!(join_paths("", ""), ".");
    }
}
