//! Structural stylesheet parser on top of the `cssparser` tokenizer.
//!
//! Recognizes just enough grammar to find rules, at-rules, declarations and
//! comments. Everything else (selectors, values, params) is kept as raw text
//! recovered with `position()` / `slice_from()`, and whitespace between nodes
//! is stored on the node that follows it.
//!
//! Each scan tokenizes a fresh slice starting at a byte offset, so the
//! structure stays offset based while strings, comments, escapes, blocks and
//! `url(` tokens follow the CSS tokenization rules.

use std::path::Path;

use cssparser::Parser as CssParser;
use cssparser::ParserInput;
use cssparser::Token;

use super::{AtRule, Block, Comment, Declaration, Node, Rule, Stylesheet};
use crate::error::ParseError;

/// Parse stylesheet text into a lossless tree.
pub fn parse(source: &str, from: &Path) -> Result<Stylesheet, ParseError> {
    let mut parser = Parser {
        src: source,
        pos: 0,
        from,
    };
    let (nodes, after) = parser.nodes(None)?;
    Ok(Stylesheet {
        nodes,
        after,
        from: Some(from.to_path_buf()),
    })
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    from: &'a Path,
}

/// Where a statement stopped.
struct Stop {
    end: usize,
    /// `{`, `;`, `}` or `None` at end of input
    terminator: Option<u8>,
}

/// Outcome of one tokenizer pass over a statement.
enum Scan {
    Stop(Stop),
    /// A `url(` or bracket never closed; rescan from this offset with the
    /// opener treated as plain text.
    Resume(usize),
}

/// What follows the filler at the current position.
enum Next {
    End,
    Close,
    Comment,
    AtRule,
    Statement,
}

/// `raw` ends with an unescaped `close`.
fn closed_by(raw: &str, close: char) -> bool {
    let Some(body) = raw.strip_suffix(close) else {
        return false;
    };
    let escapes = body.len() - body.trim_end_matches('\\').len();
    escapes % 2 == 0
}

impl<'a> Parser<'a> {
    fn error(&self, offset: usize, reason: &str) -> ParseError {
        ParseError::at(self.from, self.src, offset, reason)
    }

    /// Parse nodes until end of input (top level) or the `}` closing the
    /// block opened at `open`. Returns the nodes and the trailing raw text.
    fn nodes(&mut self, open: Option<usize>) -> Result<(Vec<Node>, String), ParseError> {
        let mut nodes = Vec::new();
        loop {
            let start = self.pos;
            let next = self.skip_filler();
            let before = self.src[start..self.pos].to_string();

            match next {
                Next::End => {
                    return match open {
                        Some(offset) => Err(self.error(offset, "Unclosed block")),
                        None => Ok((nodes, before)),
                    };
                }
                Next::Close => {
                    if open.is_none() {
                        return Err(self.error(self.pos, "Unexpected }"));
                    }
                    self.pos += 1;
                    return Ok((nodes, before));
                }
                Next::Comment => nodes.push(Node::Comment(self.comment(before)?)),
                Next::AtRule => nodes.push(Node::AtRule(self.at_rule(before)?)),
                Next::Statement => nodes.push(self.statement(before)?),
            }
        }
    }

    /// Skip whitespace and stray semicolons; classify the token after them.
    fn skip_filler(&mut self) -> Next {
        let src = self.src;
        let mut input = ParserInput::new(&src[self.pos..]);
        let mut tokens = CssParser::new(&mut input);
        loop {
            let start = tokens.position();
            let next = match tokens.next_including_whitespace_and_comments() {
                Err(_) => Next::End,
                Ok(Token::WhiteSpace(_) | Token::Semicolon) => continue,
                Ok(Token::CloseCurlyBracket) => Next::Close,
                Ok(Token::Comment(_)) => Next::Comment,
                Ok(Token::AtKeyword(_) | Token::Delim('@')) => Next::AtRule,
                Ok(_) => Next::Statement,
            };
            self.pos += start.byte_index();
            return next;
        }
    }

    fn comment(&mut self, before: String) -> Result<Comment, ParseError> {
        let offset = self.pos;
        let src = self.src;
        let mut input = ParserInput::new(&src[offset..]);
        let mut tokens = CssParser::new(&mut input);
        let start = tokens.position();
        let text = match tokens.next_including_whitespace_and_comments() {
            Ok(Token::Comment(text)) => *text,
            _ => return Err(self.error(offset, "Expected comment")),
        };
        let raw = tokens.slice_from(start);
        if raw.len() < 4 || !raw.ends_with("*/") {
            return Err(self.error(offset, "Unclosed comment"));
        }
        self.pos = offset + raw.len();
        Ok(Comment {
            before,
            text: text.to_string(),
            offset,
        })
    }

    fn at_rule(&mut self, before: String) -> Result<AtRule, ParseError> {
        let offset = self.pos;
        let name_end = {
            let mut input = ParserInput::new(&self.src[offset..]);
            let mut tokens = CssParser::new(&mut input);
            match tokens.next_including_whitespace_and_comments() {
                Ok(Token::AtKeyword(_)) => offset + tokens.position().byte_index(),
                _ => return Err(self.error(offset, "At-rule without name")),
            }
        };

        let stop = self.stop(name_end)?;
        let raw = &self.src[name_end..stop.end];
        let params_start = raw.len() - raw.trim_start().len();
        let params = raw[params_start..].trim_end();
        let between = &raw[params_start + params.len()..];

        let mut at_rule = AtRule {
            before,
            name: self.src[offset + 1..name_end].to_string(),
            after_name: raw[..params_start].to_string(),
            params: params.to_string(),
            between: between.to_string(),
            block: None,
            semicolon: false,
            offset,
        };

        match stop.terminator {
            Some(b'{') => {
                self.pos = stop.end + 1;
                let (nodes, after) = self.nodes(Some(stop.end))?;
                at_rule.block = Some(Block { nodes, after });
            }
            Some(b';') => {
                self.pos = stop.end + 1;
                at_rule.semicolon = true;
            }
            _ => self.pos = stop.end,
        }
        Ok(at_rule)
    }

    /// A rule or a declaration, depending on what ends it.
    fn statement(&mut self, before: String) -> Result<Node, ParseError> {
        let offset = self.pos;
        let stop = self.stop(offset)?;
        let text = &self.src[offset..stop.end];

        if stop.terminator == Some(b'{') {
            let selector = text.trim_end();
            let between = text[selector.len()..].to_string();
            let selector = selector.to_string();
            self.pos = stop.end + 1;
            let (nodes, after) = self.nodes(Some(stop.end))?;
            return Ok(Node::Rule(Rule {
                before,
                selector,
                between,
                block: Block { nodes, after },
                offset,
            }));
        }

        let colon = self
            .find_colon(offset, stop.end)
            .ok_or_else(|| self.error(offset, "Unknown word"))?;
        let prop = self.src[offset..colon].trim_end();
        if prop.is_empty() {
            return Err(self.error(offset, "Missing property name"));
        }

        let rest = &self.src[colon + 1..stop.end];
        let value_start = rest.len() - rest.trim_start().len();
        let value = rest[value_start..].trim_end();
        let value_end = colon + 1 + value_start + value.len();

        let decl = Declaration {
            before,
            prop: prop.to_string(),
            between: self.src[offset + prop.len()..colon + 1 + value_start].to_string(),
            value: value.to_string(),
            after: self.src[value_end..stop.end].to_string(),
            semicolon: stop.terminator == Some(b';'),
            offset,
        };

        self.pos = match stop.terminator {
            Some(b';') => stop.end + 1,
            _ => stop.end,
        };
        Ok(Node::Decl(decl))
    }

    /// Find the end of the statement starting at `from`.
    fn stop(&self, from: usize) -> Result<Stop, ParseError> {
        let mut at = from;
        loop {
            match self.scan(at)? {
                Scan::Stop(stop) => return Ok(stop),
                Scan::Resume(next) => at = next,
            }
        }
    }

    fn scan(&self, from: usize) -> Result<Scan, ParseError> {
        let mut input = ParserInput::new(&self.src[from..]);
        let mut tokens = CssParser::new(&mut input);
        self.tokens(&mut tokens, from, true)
    }

    /// Walk tokens until a terminator (`top`) or the end of the current
    /// block. `;{}` inside brackets and functions never terminate.
    fn tokens(
        &self,
        tokens: &mut CssParser<'_, '_>,
        base: usize,
        top: bool,
    ) -> Result<Scan, ParseError> {
        loop {
            let start = tokens.position();
            let at = base + start.byte_index();
            let token = match tokens.next_including_whitespace_and_comments() {
                Ok(token) => token.clone(),
                Err(_) => {
                    return Ok(Scan::Stop(Stop {
                        end: base + tokens.position().byte_index(),
                        terminator: None,
                    }));
                }
            };

            let terminator = match token {
                Token::CurlyBracketBlock if top => Some(b'{'),
                Token::Semicolon if top => Some(b';'),
                Token::CloseCurlyBracket if top => Some(b'}'),
                _ => None,
            };
            if terminator.is_some() {
                return Ok(Scan::Stop(Stop { end: at, terminator }));
            }

            match token {
                Token::QuotedString(_) | Token::BadString(_) => {
                    let raw = tokens.slice_from(start);
                    let quote = raw.chars().next().unwrap_or('"');
                    if raw.len() < 2 || !closed_by(raw, quote) {
                        return Err(self.error(at, "Unclosed string"));
                    }
                }
                Token::Comment(_) => {
                    let raw = tokens.slice_from(start);
                    if raw.len() < 4 || !raw.ends_with("*/") {
                        return Err(self.error(at, "Unclosed comment"));
                    }
                }
                Token::UnquotedUrl(_) | Token::BadUrl(_) => {
                    let raw = tokens.slice_from(start);
                    if !closed_by(raw, ')') {
                        let open = raw.find('(').map_or(raw.len(), |i| i + 1);
                        return Ok(Scan::Resume(at + open));
                    }
                }
                Token::Function(_)
                | Token::ParenthesisBlock
                | Token::SquareBracketBlock
                | Token::CurlyBracketBlock => {
                    let opened = base + tokens.position().byte_index();
                    let inner = tokens.parse_nested_block(|block| {
                        let scan = self.tokens(block, base, false);
                        while block.next_including_whitespace_and_comments().is_ok() {}
                        Ok::<_, cssparser::ParseError<'_, ()>>(scan)
                    });
                    match inner {
                        Ok(Ok(Scan::Stop(stop))) => {
                            // an unclosed block ends where its contents end
                            if base + tokens.position().byte_index() <= stop.end {
                                return Ok(Scan::Resume(opened));
                            }
                        }
                        Ok(result) => return result,
                        Err(_) => return Ok(Scan::Resume(opened)),
                    }
                }
                _ => {}
            }
        }
    }

    /// First top-level `:` in `[from, to)`.
    fn find_colon(&self, from: usize, to: usize) -> Option<usize> {
        let mut input = ParserInput::new(&self.src[from..to]);
        let mut tokens = CssParser::new(&mut input);
        loop {
            let start = tokens.position();
            match tokens.next_including_whitespace_and_comments() {
                Ok(Token::Colon) => return Some(from + start.byte_index()),
                Ok(_) => {}
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::printer::print;

    fn roundtrip(source: &str) {
        let sheet = parse(source, Path::new("test.css")).unwrap();
        assert_eq!(print(&sheet), source);
    }

    fn first_decl(sheet: &Stylesheet) -> Declaration {
        let mut decls = Vec::new();
        sheet.walk(|node| {
            if let Node::Decl(decl) = node {
                decls.push(decl.clone());
            }
        });
        decls.remove(0)
    }

    #[test]
    fn test_roundtrip_preserves_bytes() {
        roundtrip("");
        roundtrip("   \n\t");
        roundtrip(".x { background: url(../img/a.png); }\n");
        roundtrip("a{color:red}b  {  color : blue ;; }\n\n");
        roundtrip("@charset \"utf-8\";\n@import url('a.css') screen;\n");
        roundtrip("@media (min-width: 10px) {\n  .a { margin: 0 }\n}\n");
        roundtrip("/* head */\na { /* inner */ color: red; /* tail */ }\n/* end */");
        roundtrip("@font-face{font-family:X;src:url(x.woff2)format('woff2')}");
        roundtrip("a { content: \"}\"; b: ';{' }");
        roundtrip(":root { --x: calc(1px + 2px) }");
        roundtrip("a { color: red !important }\r\n");
    }

    #[test]
    fn test_declaration_raws() {
        let sheet = parse("a {  color :  red  ; }", Path::new("t.css")).unwrap();
        let decl = first_decl(&sheet);
        assert_eq!(decl.before, "  ");
        assert_eq!(decl.prop, "color");
        assert_eq!(decl.between, " :  ");
        assert_eq!(decl.value, "red");
        assert_eq!(decl.after, "  ");
        assert!(decl.semicolon);
    }

    #[test]
    fn test_data_uri_semicolons_stay_in_value() {
        let source = "a { background: url(data:image/png;base64,AAA=); color: red }";
        let sheet = parse(source, Path::new("t.css")).unwrap();
        assert_eq!(
            first_decl(&sheet).value,
            "url(data:image/png;base64,AAA=)"
        );
        roundtrip(source);
    }

    #[test]
    fn test_unquoted_url_may_contain_quote() {
        roundtrip("a { background: url(it's.png) }");
    }

    #[test]
    fn test_unbalanced_url_stays_in_declaration() {
        let source = "a { background: url(foo; color: red }";
        let sheet = parse(source, Path::new("t.css")).unwrap();
        assert_eq!(first_decl(&sheet).value, "url(foo");
        roundtrip(source);
    }

    #[test]
    fn test_at_rule_parts() {
        let sheet = parse("@import   \"a.css\"  ;", Path::new("t.css")).unwrap();
        let Node::AtRule(rule) = &sheet.nodes[0] else {
            panic!("expected at-rule");
        };
        assert_eq!(rule.name, "import");
        assert_eq!(rule.after_name, "   ");
        assert_eq!(rule.params, "\"a.css\"");
        assert_eq!(rule.between, "  ");
        assert!(rule.semicolon);
        assert!(rule.block.is_none());
    }

    #[test]
    fn test_errors_carry_position_and_path() {
        let err = parse("a {\n  color: red;\n", Path::new("css/error.css")).unwrap_err();
        assert_eq!(err.reason, "Unclosed block");
        assert_eq!((err.line, err.column), (1, 3));
        assert!(err.to_string().contains("css/error.css"));

        let err = parse("a { b: c } }", Path::new("x.css")).unwrap_err();
        assert_eq!(err.reason, "Unexpected }");

        let err = parse("a { b: 'c }", Path::new("x.css")).unwrap_err();
        assert_eq!(err.reason, "Unclosed string");

        let err = parse("/* never closed", Path::new("x.css")).unwrap_err();
        assert_eq!(err.reason, "Unclosed comment");

        let err = parse("a { color }", Path::new("x.css")).unwrap_err();
        assert_eq!(err.reason, "Unknown word");

        let err = parse("@ { }", Path::new("x.css")).unwrap_err();
        assert_eq!(err.reason, "At-rule without name");
    }

    #[test]
    fn test_braces_inside_parentheses_do_not_terminate() {
        let source = "a { grid-template-areas: var(--x, {a;b}); color: red }";
        let sheet = parse(source, Path::new("t.css")).unwrap();
        assert_eq!(first_decl(&sheet).value, "var(--x, {a;b})");
        roundtrip(source);
    }

    #[test]
    fn test_unclosed_function_resumes_after_opener() {
        let source = "a { width: calc(1px + ; color: red }";
        let sheet = parse(source, Path::new("t.css")).unwrap();
        assert_eq!(first_decl(&sheet).value, "calc(1px +");
        roundtrip(source);
    }

    #[test]
    fn test_escapes_and_non_ascii_kept_verbatim() {
        roundtrip(".\\31 0 { content: \"\\\"}\"; font-family: \"日本\" }");
        roundtrip("@media screen { .é::before { content: '}' } }");
    }

    #[test]
    fn test_newline_in_string_is_unclosed() {
        let err = parse("a { content: 'x\n' }", Path::new("x.css")).unwrap_err();
        assert_eq!(err.reason, "Unclosed string");
        assert_eq!((err.line, err.column), (1, 14));
    }
}
