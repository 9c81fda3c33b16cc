//! Depth-tracking block parser.
//!
//! The source is first cut into text and `{{...}}` tags (a tag ends at the
//! first `}}` after its `{{`). Blocks are then paired recursively, so nested
//! `#if` and `#each` blocks of the same kind close in the right order.
//!
//! Parsing never fails. An opening tag without its closing tag is kept as
//! literal text and a terminator with no open block (`{{/if}}`, `{{#else}}`,
//! `{{/each}}`) is literal text as well. Openers nested deeper than
//! [`MAX_BLOCK_DEPTH`] are kept as text too. [`check_balance`] reports all three.

use crate::ast::{Node, Template};
use crate::constants::{MAX_BLOCK_DEPTH, TAG_CLOSE, TAG_OPEN};
use crate::error::{Error, Result};
use crate::placeholder::{parse_call, split_pipes, unquote, Arg};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static EACH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#each\s+([A-Za-z_$][A-Za-z0-9_$]*)\s+in\s+(\S.*)$").expect("valid each regex")
});

#[derive(Debug, Clone, PartialEq)]
enum Tag {
    If(String),
    Else,
    EndIf,
    Each { var: String, expression: String },
    EndEach,
    Include(String),
    Call { name: String, args: Vec<Arg> },
    Placeholder(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Else,
    EndIf,
    EndEach,
}

#[derive(Debug)]
struct Piece {
    tag: Option<Tag>,
    start: usize,
    end: usize,
}

/// Cuts the source into text pieces and classified tags.
fn scan(source: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut pos = 0;

    while pos < source.len() {
        let Some(open) = source[pos..].find(TAG_OPEN).map(|i| pos + i) else {
            pieces.push(Piece { tag: None, start: pos, end: source.len() });
            break;
        };
        let inner_start = open + TAG_OPEN.len();
        let Some(close) = source[inner_start..].find(TAG_CLOSE).map(|i| inner_start + i) else {
            pieces.push(Piece { tag: None, start: pos, end: source.len() });
            break;
        };
        if open > pos {
            pieces.push(Piece { tag: None, start: pos, end: open });
        }
        let end = close + TAG_CLOSE.len();
        pieces.push(Piece { tag: Some(classify(&source[inner_start..close])), start: open, end });
        pos = end;
    }
    pieces
}

fn classify(inner: &str) -> Tag {
    let trimmed = inner.trim();
    match trimmed {
        "#else" => return Tag::Else,
        "/if" => return Tag::EndIf,
        "/each" => return Tag::EndEach,
        _ => {}
    }
    if let Some(condition) = trimmed.strip_prefix("#if") {
        if condition.is_empty() || condition.starts_with(char::is_whitespace) {
            return Tag::If(condition.trim().to_string());
        }
    }
    if let Some(captures) = EACH_RE.captures(trimmed) {
        return Tag::Each {
            var: captures[1].to_string(),
            expression: captures[2].trim().to_string(),
        };
    }
    if let Some(path) = trimmed.strip_prefix("include").and_then(|rest| {
        rest.starts_with(char::is_whitespace).then(|| unquote(rest.trim())).flatten()
    }) {
        return Tag::Include(path);
    }
    if !trimmed.starts_with('@') && split_pipes(trimmed).len() == 1 {
        if let Some((name, args)) = parse_call(trimmed) {
            return Tag::Call { name: name.to_string(), args };
        }
    }
    Tag::Placeholder(inner.to_string())
}

struct Parser<'s> {
    source: &'s str,
    pieces: Vec<Piece>,
    pos: usize,
    depth: usize,
    /// Opening pieces already known to have no closing tag.
    unclosed: HashSet<usize>,
}

/// Parses a template into its block structure.
pub fn parse(source: &str) -> Template {
    let mut parser =
        Parser { source, pieces: scan(source), pos: 0, depth: 0, unclosed: HashSet::new() };
    let (nodes, _) = parser.parse_until(&[]);
    Template { nodes }
}

impl<'s> Parser<'s> {
    fn raw(&self, index: usize) -> &'s str {
        let piece = &self.pieces[index];
        &self.source[piece.start..piece.end]
    }

    fn span(&self, from: usize, to: usize) -> String {
        self.source[self.pieces[from].start..self.pieces[to].end].to_string()
    }

    fn parse_until(&mut self, stops: &[Stop]) -> (Vec<Node>, Option<Stop>) {
        let mut nodes = Vec::new();

        while self.pos < self.pieces.len() {
            let index = self.pos;
            self.pos += 1;
            let Some(tag) = self.pieces[index].tag.clone() else {
                push_text(&mut nodes, self.raw(index));
                continue;
            };
            let raw = self.raw(index).to_string();

            match tag {
                Tag::Placeholder(expression) => nodes.push(Node::Placeholder { expression, raw }),
                Tag::Include(path) => nodes.push(Node::Include { path, raw }),
                Tag::Call { name, args } => nodes.push(Node::Call { name, args, raw }),
                Tag::Else | Tag::EndIf | Tag::EndEach => {
                    let stop = match tag {
                        Tag::Else => Stop::Else,
                        Tag::EndIf => Stop::EndIf,
                        _ => Stop::EndEach,
                    };
                    if stops.contains(&stop) {
                        return (nodes, Some(stop));
                    }
                    push_text(&mut nodes, &raw);
                }
                Tag::If(_) | Tag::Each { .. } if self.depth >= MAX_BLOCK_DEPTH => {
                    push_text(&mut nodes, &raw);
                }
                Tag::If(_) | Tag::Each { .. } => {
                    self.depth += 1;
                    let block = self.parse_block(index, tag);
                    self.depth -= 1;
                    match block {
                        Some(node) => nodes.push(node),
                        None => {
                            self.unclosed.insert(index);
                            self.pos = index + 1;
                            push_text(&mut nodes, &raw);
                        }
                    }
                }
            }
        }
        (nodes, None)
    }

    /// Parses the block opened at `open`. `None` when it is never closed.
    fn parse_block(&mut self, open: usize, tag: Tag) -> Option<Node> {
        if self.unclosed.contains(&open) {
            return None;
        }
        match tag {
            Tag::If(condition) => {
                let (then_branch, stop) = self.parse_until(&[Stop::Else, Stop::EndIf]);
                let else_branch = match stop? {
                    Stop::Else => match self.parse_until(&[Stop::EndIf]) {
                        (nodes, Some(_)) => nodes,
                        (_, None) => return None,
                    },
                    _ => Vec::new(),
                };
                let raw = self.span(open, self.pos - 1);
                Some(Node::If { condition, then_branch, else_branch, raw })
            }
            Tag::Each { var, expression } => {
                let (body, stop) = self.parse_until(&[Stop::EndEach]);
                stop?;
                let raw = self.span(open, self.pos - 1);
                Some(Node::Each { var, expression, body, raw })
            }
            _ => None,
        }
    }
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    match nodes.last_mut() {
        Some(Node::Text(existing)) => existing.push_str(text),
        _ => nodes.push(Node::Text(text.to_string())),
    }
}

/// Parses only placeholders; block, include and call tags stay literal.
pub fn parse_placeholders(source: &str) -> Vec<Node> {
    let mut nodes = Vec::new();
    for piece in scan(source) {
        let raw = &source[piece.start..piece.end];
        match piece.tag {
            Some(Tag::Placeholder(expression)) => {
                nodes.push(Node::Placeholder { expression, raw: raw.to_string() })
            }
            _ => push_text(&mut nodes, raw),
        }
    }
    nodes
}

/// Reports the first unmatched block tag.
pub fn check_balance(source: &str) -> Result<()> {
    let mut open: Vec<(&str, usize)> = Vec::new();

    for piece in scan(source) {
        let Some(tag) = piece.tag else { continue };
        match tag {
            Tag::If(_) | Tag::Each { .. } if open.len() >= MAX_BLOCK_DEPTH => {
                return Err(Error::Syntax(format!(
                    "blocks nested deeper than {MAX_BLOCK_DEPTH} levels at offset {}",
                    piece.start
                )));
            }
            Tag::If(_) => open.push(("#if", piece.start)),
            Tag::Each { .. } => open.push(("#each", piece.start)),
            Tag::Else => {
                if !matches!(open.last(), Some(("#if", _))) {
                    return Err(unmatched("{{#else}}", piece.start));
                }
            }
            Tag::EndIf => {
                if !matches!(open.pop(), Some(("#if", _))) {
                    return Err(unmatched("{{/if}}", piece.start));
                }
            }
            Tag::EndEach => {
                if !matches!(open.pop(), Some(("#each", _))) {
                    return Err(unmatched("{{/each}}", piece.start));
                }
            }
            _ => {}
        }
    }
    match open.pop() {
        Some((kind, offset)) => {
            Err(Error::Syntax(format!("unclosed {{{{{kind}}}}} block at offset {offset}")))
        }
        None => Ok(()),
    }
}

fn unmatched(tag: &str, offset: usize) -> Error {
    Error::Syntax(format!("unmatched {tag} at offset {offset}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(s: &str) -> Node {
        Node::Text(s.to_string())
    }

    fn placeholder(expression: &str) -> Node {
        Node::Placeholder { expression: expression.into(), raw: format!("{{{{{expression}}}}}") }
    }

    #[test]
    fn text_and_placeholders() {
        let template = parse("Hi {{ name|upper }}!");
        assert_eq!(template.nodes, vec![text("Hi "), placeholder(" name|upper "), text("!")]);
    }

    #[test]
    fn unterminated_tag_is_text() {
        assert_eq!(parse("a {{b").nodes, vec![text("a {{b")]);
    }

    #[test]
    fn tag_ends_at_first_close() {
        let template = parse("{{a}}}");
        assert_eq!(template.nodes, vec![placeholder("a"), text("}")]);
    }

    #[test]
    fn if_else_blocks() {
        let source = "{{#if a > 1}}yes{{#else}}no{{/if}}";
        match &parse(source).nodes[..] {
            [Node::If { condition, then_branch, else_branch, raw }] => {
                assert_eq!(condition, "a > 1");
                assert_eq!(then_branch, &vec![text("yes")]);
                assert_eq!(else_branch, &vec![text("no")]);
                assert_eq!(raw, source);
            }
            other => panic!("unexpected nodes {other:?}"),
        }
    }

    #[test]
    fn nested_same_kind_blocks_pair_by_depth() {
        let source = "{{#if a}}A{{#if b}}B{{#else}}C{{/if}}D{{#else}}E{{/if}}";
        match &parse(source).nodes[..] {
            [Node::If { then_branch, else_branch, .. }] => {
                assert_eq!(then_branch.len(), 3);
                assert!(matches!(&then_branch[1], Node::If { condition, .. } if condition == "b"));
                assert_eq!(else_branch, &vec![text("E")]);
            }
            other => panic!("unexpected nodes {other:?}"),
        }
    }

    #[test]
    fn each_with_nested_if() {
        let source = "{{#each x in items}}{{#if xFirst}}first{{/if}}{{x}}{{/each}}";
        match &parse(source).nodes[..] {
            [Node::Each { var, expression, body, .. }] => {
                assert_eq!(var, "x");
                assert_eq!(expression, "items");
                assert!(matches!(body[0], Node::If { .. }));
                assert_eq!(body[1], placeholder("x"));
            }
            other => panic!("unexpected nodes {other:?}"),
        }
    }

    #[test]
    fn unclosed_block_is_literal() {
        let template = parse("{{#if a}}x{{b}}");
        assert_eq!(template.nodes, vec![text("{{#if a}}x"), placeholder("b")]);
    }

    #[test]
    fn stray_terminators_are_literal() {
        assert_eq!(parse("a{{/if}}b{{#else}}").nodes, vec![text("a{{/if}}b{{#else}}")]);
    }

    #[test]
    fn crossed_blocks_close_the_outer_block() {
        let source = "{{#if a}}{{#each x in xs}}{{/if}}";
        match &parse(source).nodes[..] {
            [Node::If { then_branch, .. }] => {
                assert_eq!(then_branch, &vec![text("{{#each x in xs}}")]);
            }
            other => panic!("unexpected nodes {other:?}"),
        }
    }

    #[test]
    fn many_unclosed_blocks_parse_quickly() {
        let source = "{{#if a}}".repeat(200);
        assert_eq!(parse(&source).nodes, vec![text(&source)]);
    }

    #[test]
    fn over_deep_openers_stay_literal() {
        let n = 3000;
        let source = format!("{}x{}", "{{#if a}}".repeat(n), "{{/if}}".repeat(n));
        let nodes = parse(&source).nodes;
        let extra = n - MAX_BLOCK_DEPTH;
        assert_eq!(nodes[1], text(&"{{/if}}".repeat(extra)));

        let mut depth = 0;
        let mut current = &nodes[..1];
        while let [Node::If { then_branch, .. }] = current {
            depth += 1;
            current = &then_branch[..];
        }
        assert_eq!(depth, MAX_BLOCK_DEPTH);
        assert_eq!(current, &[text(&format!("{}x", "{{#if a}}".repeat(extra)))]);
        assert!(check_balance(&source).is_err());
    }

    #[test]
    fn include_and_calls() {
        let nodes = parse(r#"{{include "partials/a.txt"}}{{sum(1, "two", user.id)}}{{@now()}}"#).nodes;
        assert_eq!(
            nodes[0],
            Node::Include {
                path: "partials/a.txt".into(),
                raw: r#"{{include "partials/a.txt"}}"#.into()
            }
        );
        match &nodes[1] {
            Node::Call { name, args, .. } => {
                assert_eq!(name, "sum");
                assert_eq!(
                    args,
                    &vec![
                        Arg::Literal(json!(1)),
                        Arg::Literal(json!("two")),
                        Arg::Path("user.id".into())
                    ]
                );
            }
            other => panic!("expected call, got {other:?}"),
        }
        assert!(matches!(&nodes[2], Node::Placeholder { .. }));
    }

    #[test]
    fn malformed_each_is_a_placeholder_tag() {
        let nodes = parse("{{#each items}}x{{/each}}").nodes;
        assert!(matches!(&nodes[0], Node::Placeholder { .. }));
        assert_eq!(nodes[1], text("x{{/each}}"));
    }

    #[test]
    fn placeholder_only_parse_keeps_blocks_literal() {
        let nodes = parse_placeholders("{{#if a}}{{b}}{{/if}}");
        assert_eq!(nodes, vec![text("{{#if a}}"), placeholder("b"), text("{{/if}}")]);
    }

    #[test]
    fn balance_errors() {
        assert!(check_balance("{{#if a}}{{#each x in y}}{{/each}}{{/if}}").is_ok());
        assert!(check_balance("{{#if a}}").is_err());
        assert!(check_balance("{{/each}}").is_err());
        assert!(check_balance("{{#each x in y}}{{#else}}{{/each}}").is_err());
        assert!(check_balance("{{#if a}}{{#each x in y}}{{/if}}{{/each}}").is_err());
        let deep = format!("{}{}", "{{#if a}}".repeat(MAX_BLOCK_DEPTH), "{{/if}}".repeat(MAX_BLOCK_DEPTH));
        assert!(check_balance(&deep).is_ok());
    }
}
