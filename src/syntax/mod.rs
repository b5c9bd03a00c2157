//! Stylesheet syntax: text → tree → text.
//!
//! The rest of the crate only talks to [`StyleSyntax`], so tests and hosts
//! can plug in their own grammar. [`Lossless`] is the default: a small
//! structural parser over the `cssparser` tokenizer that keeps every raw
//! byte around the nodes it recognizes, so printing an untouched tree reproduces the input exactly.
//!
//! # Tree shape
//!
//! ```text
//! Stylesheet
//! ├── Rule        selector { ... }
//! │   └── Decl    prop: value;
//! ├── AtRule      @name params { ... } | @name params;
//! └── Comment     /* ... */
//! ```

mod parser;
mod printer;
pub mod sourcemap;

use std::path::{Path, PathBuf};

use crate::debug;
use crate::error::{ParseError, SerializeError};

// ============================================================================
// Capability
// ============================================================================

/// Parse and print stylesheets.
pub trait StyleSyntax: Send + Sync {
    /// Parse `source`; `from` names the document in errors.
    fn parse(&self, source: &str, from: &Path) -> Result<Stylesheet, ParseError>;

    /// Print a tree back to text.
    fn stringify(
        &self,
        sheet: &Stylesheet,
        options: &StringifyOptions,
    ) -> Result<String, SerializeError>;
}

/// Options for [`StyleSyntax::stringify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringifyOptions {
    /// Honor positional metadata (inline source maps).
    pub source_map: bool,
}

impl Default for StringifyOptions {
    fn default() -> Self {
        Self { source_map: true }
    }
}

/// Print `sheet`, retrying once with positional metadata disabled.
///
/// A stylesheet carrying a broken inline source map still has perfectly
/// printable rules; only the second failure is reported.
pub fn stringify_with_fallback(
    syntax: &dyn StyleSyntax,
    sheet: &Stylesheet,
) -> Result<String, SerializeError> {
    match syntax.stringify(sheet, &StringifyOptions::default()) {
        Ok(text) => Ok(text),
        Err(err) => {
            debug!("syntax"; "{}: {}, retrying without source map", sheet_name(sheet), err);
            syntax.stringify(sheet, &StringifyOptions { source_map: false })
        }
    }
}

fn sheet_name(sheet: &Stylesheet) -> String {
    sheet
        .from
        .as_deref()
        .map_or_else(|| "<input>".to_string(), |p| p.display().to_string())
}

// ============================================================================
// Lossless syntax
// ============================================================================

/// Default byte-preserving syntax.
#[derive(Debug, Clone, Copy)]
pub struct Lossless {
    validate_source_maps: bool,
}

impl Default for Lossless {
    fn default() -> Self {
        Self {
            validate_source_maps: true,
        }
    }
}

impl Lossless {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check inline source map annotations when printing with
    /// `source_map: true`.
    pub fn with_source_maps(mut self, validate: bool) -> Self {
        self.validate_source_maps = validate;
        self
    }
}

impl StyleSyntax for Lossless {
    fn parse(&self, source: &str, from: &Path) -> Result<Stylesheet, ParseError> {
        parser::parse(source, from)
    }

    fn stringify(
        &self,
        sheet: &Stylesheet,
        options: &StringifyOptions,
    ) -> Result<String, SerializeError> {
        if self.validate_source_maps
            && options.source_map
            && let Some(url) = sheet.source_map_url()
        {
            sourcemap::validate(url)?;
        }
        Ok(printer::print(sheet))
    }
}

// ============================================================================
// Tree
// ============================================================================

/// Parsed stylesheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stylesheet {
    pub nodes: Vec<Node>,
    /// Raw text after the last node
    pub after: String,
    /// File the sheet was parsed from
    pub from: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Rule(Rule),
    AtRule(AtRule),
    Decl(Declaration),
    Comment(Comment),
}

/// `selector { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub before: String,
    pub selector: String,
    /// Whitespace between selector and `{`
    pub between: String,
    pub block: Block,
    /// Byte offset in the source
    pub offset: usize,
}

/// Contents of a `{ ... }` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub nodes: Vec<Node>,
    /// Raw text before the closing `}`
    pub after: String,
}

/// `@name params;` or `@name params { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtRule {
    pub before: String,
    /// Keyword without `@`
    pub name: String,
    pub after_name: String,
    pub params: String,
    /// Whitespace between params and `{` / `;`
    pub between: String,
    pub block: Option<Block>,
    pub semicolon: bool,
    pub offset: usize,
}

/// `prop: value;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub before: String,
    pub prop: String,
    /// Raw text from the end of `prop` to the start of `value`, colon included
    pub between: String,
    pub value: String,
    /// Whitespace between value and `;`
    pub after: String,
    pub semicolon: bool,
    pub offset: usize,
}

/// `/* text */`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub before: String,
    pub text: String,
    pub offset: usize,
}

impl Stylesheet {
    /// Visit every node in document order, parents before children.
    pub fn walk_mut<F: FnMut(&mut Node)>(&mut self, mut f: F) {
        walk_nodes_mut(&mut self.nodes, &mut f);
    }

    /// Visit every node in document order, parents before children.
    pub fn walk<F: FnMut(&Node)>(&self, mut f: F) {
        walk_nodes(&self.nodes, &mut f);
    }

    /// URL of the trailing `/*# sourceMappingURL=... */` annotation, if any.
    pub fn source_map_url(&self) -> Option<&str> {
        self.nodes.iter().rev().find_map(|node| match node {
            Node::Comment(comment) => sourcemap::annotation_url(&comment.text),
            _ => None,
        })
    }
}

impl Node {
    /// Child nodes of rules and block at-rules.
    pub fn children(&self) -> Option<&[Node]> {
        match self {
            Self::Rule(rule) => Some(&rule.block.nodes),
            Self::AtRule(AtRule {
                block: Some(block), ..
            }) => Some(&block.nodes),
            _ => None,
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Self::Rule(rule) => Some(&mut rule.block.nodes),
            Self::AtRule(AtRule {
                block: Some(block), ..
            }) => Some(&mut block.nodes),
            _ => None,
        }
    }
}

fn walk_nodes_mut<F: FnMut(&mut Node)>(nodes: &mut [Node], f: &mut F) {
    for node in nodes {
        f(node);
        if let Some(children) = node.children_mut() {
            walk_nodes_mut(children, f);
        }
    }
}

fn walk_nodes<F: FnMut(&Node)>(nodes: &[Node], f: &mut F) {
    for node in nodes {
        f(node);
        if let Some(children) = node.children() {
            walk_nodes(children, f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn parse(source: &str) -> Stylesheet {
        Lossless::new()
            .parse(source, Path::new("test.css"))
            .unwrap()
    }

    #[test]
    fn test_walk_is_document_order() {
        let sheet = parse("@import 'a.css';\na { b: 1; @media x { c { d: 2 } } e: 3 }\n@font-face { src: x }");
        let mut seen = Vec::new();
        sheet.walk(|node| match node {
            Node::Decl(decl) => seen.push(decl.prop.clone()),
            Node::AtRule(rule) => seen.push(format!("@{}", rule.name)),
            Node::Rule(rule) => seen.push(rule.selector.clone()),
            Node::Comment(_) => {}
        });
        assert_eq!(
            seen,
            ["@import", "a", "b", "@media", "c", "d", "e", "@font-face", "src"]
        );
    }

    #[test]
    fn test_source_map_url() {
        let sheet = parse("a { b: c }\n/*# sourceMappingURL=main.css.map */\n");
        assert_eq!(sheet.source_map_url(), Some("main.css.map"));
        assert_eq!(parse("/* plain */ a { b: c }").source_map_url(), None);
    }

    #[test]
    fn test_lossless_rejects_broken_inline_map() {
        let sheet = parse("a { b: c }\n/*# sourceMappingURL=data:application/json;base64,@@@ */");
        let syntax = Lossless::new();
        assert!(matches!(
            syntax.stringify(&sheet, &StringifyOptions::default()),
            Err(SerializeError::SourceMap(_))
        ));
        assert!(
            syntax
                .stringify(&sheet, &StringifyOptions { source_map: false })
                .is_ok()
        );
        assert!(
            Lossless::new()
                .with_source_maps(false)
                .stringify(&sheet, &StringifyOptions::default())
                .is_ok()
        );
    }

    /// Fails the first `fail` stringify calls that ask for source maps.
    struct Flaky {
        fail: usize,
        calls: AtomicUsize,
    }

    impl StyleSyntax for Flaky {
        fn parse(&self, source: &str, from: &Path) -> Result<Stylesheet, ParseError> {
            Lossless::new().parse(source, from)
        }

        fn stringify(
            &self,
            sheet: &Stylesheet,
            options: &StringifyOptions,
        ) -> Result<String, SerializeError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if options.source_map || n < self.fail {
                return Err(SerializeError::SourceMap("stale mappings".into()));
            }
            Lossless::new().stringify(sheet, options)
        }
    }

    #[test]
    fn test_stringify_fallback_retries_once() {
        let syntax = Flaky {
            fail: 1,
            calls: AtomicUsize::new(0),
        };
        let sheet = parse("a { b: c }");
        assert_eq!(stringify_with_fallback(&syntax, &sheet).unwrap(), "a { b: c }");
        assert_eq!(syntax.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stringify_fallback_surfaces_second_failure() {
        let syntax = Flaky {
            fail: 2,
            calls: AtomicUsize::new(0),
        };
        let sheet = parse("a { b: c }");
        assert!(stringify_with_fallback(&syntax, &sheet).is_err());
        assert_eq!(syntax.calls.load(Ordering::SeqCst), 2);
    }
}
