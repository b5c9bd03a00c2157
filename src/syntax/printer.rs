//! Tree → text, putting every raw piece back where the parser found it.

use super::{AtRule, Block, Declaration, Node, Rule, Stylesheet};

/// Print a stylesheet.
pub fn print(sheet: &Stylesheet) -> String {
    let mut out = String::new();
    nodes(&sheet.nodes, &mut out);
    out.push_str(&sheet.after);
    out
}

fn nodes(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Rule(rule) => self::rule(rule, out),
            Node::AtRule(at_rule) => self::at_rule(at_rule, out),
            Node::Decl(decl) => declaration(decl, out),
            Node::Comment(comment) => {
                out.push_str(&comment.before);
                out.push_str("/*");
                out.push_str(&comment.text);
                out.push_str("*/");
            }
        }
    }
}

fn rule(rule: &Rule, out: &mut String) {
    out.push_str(&rule.before);
    out.push_str(&rule.selector);
    out.push_str(&rule.between);
    block(&rule.block, out);
}

fn at_rule(at_rule: &AtRule, out: &mut String) {
    out.push_str(&at_rule.before);
    out.push('@');
    out.push_str(&at_rule.name);
    out.push_str(&at_rule.after_name);
    out.push_str(&at_rule.params);
    out.push_str(&at_rule.between);
    if let Some(body) = &at_rule.block {
        block(body, out);
    }
    if at_rule.semicolon {
        out.push(';');
    }
}

fn declaration(decl: &Declaration, out: &mut String) {
    out.push_str(&decl.before);
    out.push_str(&decl.prop);
    out.push_str(&decl.between);
    out.push_str(&decl.value);
    out.push_str(&decl.after);
    if decl.semicolon {
        out.push(';');
    }
}

fn block(block: &Block, out: &mut String) {
    out.push('{');
    nodes(&block.nodes, out);
    out.push_str(&block.after);
    out.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Comment;

    #[test]
    fn test_print_built_tree() {
        let sheet = Stylesheet {
            nodes: vec![
                Node::Comment(Comment {
                    before: String::new(),
                    text: " a ".into(),
                    offset: 0,
                }),
                Node::AtRule(AtRule {
                    before: "\n".into(),
                    name: "import".into(),
                    after_name: " ".into(),
                    params: "'x.css'".into(),
                    between: String::new(),
                    block: None,
                    semicolon: true,
                    offset: 0,
                }),
                Node::Rule(Rule {
                    before: "\n".into(),
                    selector: "p".into(),
                    between: " ".into(),
                    block: Block {
                        nodes: vec![Node::Decl(Declaration {
                            before: " ".into(),
                            prop: "color".into(),
                            between: ": ".into(),
                            value: "red".into(),
                            after: String::new(),
                            semicolon: true,
                            offset: 0,
                        })],
                        after: " ".into(),
                    },
                    offset: 0,
                }),
            ],
            after: "\n".into(),
            from: None,
        };
        assert_eq!(print(&sheet), "/* a */\n@import 'x.css';\np { color: red; }\n");
    }
}
