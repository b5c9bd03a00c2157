//! Rewrite URL literals inside a parsed stylesheet.
//!
//! Two places carry URLs:
//!
//! - declaration values: `background: url(../img/a.png) no-repeat`
//! - `@import` params: `@import url('../a.css')` or `@import "../a.css"`
//!
//! Only the literal between the delimiters changes; quotes, padding and
//! everything around the literal are kept as they were.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::debug;
use crate::document::Document;
use crate::policy::{RewritePolicy, UrlSite};
use crate::syntax::{Node, Stylesheet};

/// `url(` + `'...'` / `"..."` / unquoted + `)`, single line, non-empty.
/// Quoted forms may carry trailing whitespace before `)`.
///
/// Alternatives are tried in order, so a quote without its partner falls
/// through to the unquoted form.
static RE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\((?:'(.+?)'([ \t\r\n\x0C]*)\)|"(.+?)"([ \t\r\n\x0C]*)\)|(.+?)\))"#)
        .unwrap()
});

/// Replace every `url(...)` literal in `value`.
///
/// `rewrite` receives the literal without quotes and returns its
/// replacement, or `None` to leave the whole occurrence untouched. Returns
/// `None` when nothing was replaced.
pub fn replace_urls<F>(value: &str, mut rewrite: F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    if !value.contains("url(") {
        return None;
    }

    let mut changed = false;
    let out = RE_URL.replace_all(value, |caps: &Captures<'_>| {
        let replaced = if let Some(m) = caps.get(1) {
            let pad = &caps[2];
            rewrite(m.as_str()).map(|url| format!("url('{url}'{pad})"))
        } else if let Some(m) = caps.get(3) {
            let pad = &caps[4];
            rewrite(m.as_str()).map(|url| format!("url(\"{url}\"{pad})"))
        } else {
            rewrite_unquoted(&caps[5], &mut rewrite).map(|inner| format!("url({inner})"))
        };
        match replaced {
            Some(text) => {
                changed = true;
                text
            }
            None => caps[0].to_string(),
        }
    });

    changed.then(|| out.into_owned())
}

/// Unquoted branch. `url( "a.png" )` lands here with its padding; the
/// quoted literal inside is rewritten with padding and quotes kept.
fn rewrite_unquoted<F>(literal: &str, rewrite: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    let inner = literal.trim();
    let quote = inner.chars().next().filter(|c| *c == '"' || *c == '\'');
    match quote {
        Some(q) if inner.len() >= 2 && inner.ends_with(q) => {
            let lead = &literal[..literal.len() - literal.trim_start().len()];
            let trail = &literal[literal.trim_end().len()..];
            let url = rewrite(&inner[1..inner.len() - 1])?;
            Some(format!("{lead}{q}{url}{q}{trail}"))
        }
        _ => rewrite(literal),
    }
}

/// Rewrite `@import` params: a leading bare string, then any `url(...)`.
pub fn replace_import<F>(params: &str, mut rewrite: F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some((lead, quote, inner, rest)) = split_leading_string(params) else {
        return replace_urls(params, rewrite);
    };

    let bare = rewrite(inner);
    let tail = replace_urls(rest, &mut rewrite);
    if bare.is_none() && tail.is_none() {
        return None;
    }
    Some(format!(
        "{lead}{quote}{}{quote}{}",
        bare.as_deref().unwrap_or(inner),
        tail.as_deref().unwrap_or(rest)
    ))
}

/// `  "inner" rest` -> (`  `, `"`, `inner`, ` rest`)
fn split_leading_string(params: &str) -> Option<(&str, char, &str, &str)> {
    let body = params.trim_start();
    let lead = &params[..params.len() - body.len()];
    let quote = body.chars().next().filter(|c| *c == '"' || *c == '\'')?;

    let bytes = body.as_bytes();
    let mut i = 1;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'\\' => i += 2,
            b'\n' => return None,
            b if b == quote as u8 => return Some((lead, quote, &body[1..i], &body[i + 1..])),
            _ => i += 1,
        }
    }
    None
}

/// Rewrite every eligible URL in `sheet`, which was parsed from `document`.
///
/// Nodes are visited in document order and changed in place. Returns the
/// number of rewritten literals.
pub fn rewrite_sheet(sheet: &mut Stylesheet, document: &Document, policy: &RewritePolicy) -> usize {
    let root = policy.root_for(document);
    let mut count = 0;

    let mut apply = |literal: &str, site: UrlSite| {
        let url = policy.rewrite(literal, document, &root, site)?;
        debug!("rewrite"; "{}: {} -> {}", document.path.display(), literal.trim(), url);
        count += 1;
        Some(url)
    };

    sheet.walk_mut(|node| match node {
        Node::Decl(decl) => {
            if let Some(value) = replace_urls(&decl.value, |lit| apply(lit, UrlSite::Declaration)) {
                decl.value = value;
            }
        }
        Node::AtRule(rule) if rule.name == "import" => {
            if let Some(params) = replace_import(&rule.params, |lit| apply(lit, UrlSite::Import)) {
                rule.params = params;
            }
        }
        _ => {}
    });

    count
}
