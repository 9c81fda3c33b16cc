//! Placeholder expression parsing: `path(args)|t1:args1|t2|default:value`.

use crate::constants::DEFAULT_SEGMENT_PREFIX;
use crate::context::Scope;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(@?[A-Za-z_$][A-Za-z0-9_$.]*)\s*\((.*)\)$").expect("valid call regex")
});

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+(\.[0-9]+)?$").expect("valid number regex"));

/// A transformer applied through the pipe syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformerCall {
    pub name: String,
    /// Raw text after the first `:`, empty when no arguments were given.
    pub args: String,
}

/// An argument of a resolver or function call.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Literal(Value),
    /// A property path resolved against the active scope at call time.
    Path(String),
}

impl Arg {
    /// Parses one raw argument: quoted strings, numbers, `true`/`false`,
    /// `null`/`undefined` are literals, anything else is a property path.
    pub fn parse(raw: &str) -> Arg {
        let raw = raw.trim();
        if let Some(s) = unquote(raw) {
            return Arg::Literal(Value::String(s));
        }
        match raw {
            "true" => Arg::Literal(Value::Bool(true)),
            "false" => Arg::Literal(Value::Bool(false)),
            "null" | "undefined" => Arg::Literal(Value::Null),
            n if NUMBER_RE.is_match(n) => Arg::Literal(
                n.parse::<f64>().map(crate::ext::number_value).unwrap_or(Value::Null),
            ),
            path => Arg::Path(path.to_string()),
        }
    }

    /// Produces the argument's value; unresolved paths become `null`.
    pub fn evaluate(&self, scope: &Scope<'_>) -> Value {
        match self {
            Arg::Literal(value) => value.clone(),
            Arg::Path(path) => scope.resolve(path).unwrap_or(Value::Null),
        }
    }
}

/// The structure of one `{{...}}` placeholder.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedExpression {
    pub path: String,
    pub args: Vec<Arg>,
    pub transformers: Vec<TransformerCall>,
    pub default_value: Option<String>,
}

impl ParsedExpression {
    pub fn parse(expression: &str) -> ParsedExpression {
        let mut segments = split_pipes(expression.trim()).into_iter();
        let head = segments.next().unwrap_or_default();
        let head = head.trim();

        let (path, args) = match parse_call(head) {
            Some((name, args)) => (name.to_string(), args),
            None => (head.to_string(), Vec::new()),
        };

        let mut parsed = ParsedExpression { path, args, ..Default::default() };
        for segment in segments {
            let segment = segment.trim();
            if let Some(default) = segment.strip_prefix(DEFAULT_SEGMENT_PREFIX) {
                parsed.default_value = Some(default.trim().to_string());
                continue;
            }
            let (name, args) = match segment.split_once(':') {
                Some((name, args)) => (name.trim(), args.trim()),
                None => (segment, ""),
            };
            if name.is_empty() {
                continue;
            }
            parsed
                .transformers
                .push(TransformerCall { name: name.to_string(), args: args.to_string() });
        }
        parsed
    }

    /// Whether the path addresses a registered custom resolver (`@name`).
    pub fn resolver_name(&self) -> Option<&str> {
        self.path.strip_prefix('@')
    }
}

/// Matches `name(args)` and parses the argument list.
pub fn parse_call(text: &str) -> Option<(&str, Vec<Arg>)> {
    let captures = CALL_RE.captures(text.trim())?;
    let name = captures.get(1)?.as_str();
    let inner = captures.get(2)?.as_str();
    let args = split_args(inner).iter().map(|raw| Arg::parse(raw)).collect();
    Some((name, args))
}

/// Splits on `|` outside quotes and parentheses. `\|` is a literal pipe.
pub fn split_pipes(input: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('|') => current.push('|'),
                Some(next) => {
                    current.push('\\');
                    current.push(next);
                }
                None => current.push('\\'),
            },
            '\'' | '"' if quote == Some(c) => {
                quote = None;
                current.push(c);
            }
            '\'' | '"' if quote.is_none() => {
                quote = Some(c);
                current.push(c);
            }
            '(' if quote.is_none() => {
                depth += 1;
                current.push(c);
            }
            ')' if quote.is_none() => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            '|' if quote.is_none() && depth == 0 => {
                segments.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
}

/// Splits a comma-separated list, respecting quotes, escapes and nesting.
/// Items are trimmed; quotes are preserved.
pub fn split_args(input: &str) -> Vec<String> {
    let mut items = Vec::new();
    if input.trim().is_empty() {
        return items;
    }
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '\'' | '"' if quote == Some(c) => {
                quote = None;
                current.push(c);
            }
            '\'' | '"' if quote.is_none() => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' if quote.is_none() => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' if quote.is_none() => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if quote.is_none() && depth == 0 => {
                items.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    items.push(current.trim().to_string());
    items
}

/// Parses a transformer's argument string into plain strings, removing
/// surrounding quotes. Unquoted items keep their backslashes.
pub fn transformer_args(args: &str) -> Vec<String> {
    split_args(args)
        .into_iter()
        .map(|item| unquote(&item).unwrap_or(item))
        .collect()
}

/// Strips matching surrounding quotes and resolves backslash escapes.
pub fn unquote(raw: &str) -> Option<String> {
    let mut chars = raw.chars();
    let first = chars.next()?;
    if !(first == '\'' || first == '"') || raw.len() < 2 || !raw.ends_with(first) {
        return None;
    }
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn splits_pipes_outside_quotes() {
        assert_eq!(
            split_pipes(r#"name|replace:"a|b",x|upper"#),
            vec!["name", r#"replace:"a|b",x"#, "upper"]
        );
        assert_eq!(split_pipes(r"a|replace:\|,-"), vec!["a", "replace:|,-"]);
        assert_eq!(split_pipes("@fn(a|b)|lower"), vec!["@fn(a|b)", "lower"]);
    }

    #[test]
    fn parses_transformer_chain_and_default() {
        let parsed = ParsedExpression::parse(" user.name | pad:6,0 | upper | default:N/A ");
        assert_eq!(parsed.path, "user.name");
        assert_eq!(
            parsed.transformers,
            vec![
                TransformerCall { name: "pad".into(), args: "6,0".into() },
                TransformerCall { name: "upper".into(), args: String::new() },
            ]
        );
        assert_eq!(parsed.default_value.as_deref(), Some("N/A"));
    }

    #[test]
    fn default_segment_is_not_parsed_further() {
        let parsed = ParsedExpression::parse("x|default:a:b,c");
        assert_eq!(parsed.default_value.as_deref(), Some("a:b,c"));
        assert!(parsed.transformers.is_empty());
    }

    #[test]
    fn parses_resolver_call() {
        let parsed = ParsedExpression::parse(r#"@lookup(user.id, "a,b", 3, true, inner(1, 2))"#);
        assert_eq!(parsed.resolver_name(), Some("lookup"));
        assert_eq!(
            parsed.args,
            vec![
                Arg::Path("user.id".into()),
                Arg::Literal(json!("a,b")),
                Arg::Literal(json!(3)),
                Arg::Literal(json!(true)),
                Arg::Path("inner(1, 2)".into()),
            ]
        );
    }

    #[test]
    fn transformer_args_unquote() {
        assert_eq!(transformer_args(r#"", ", x"#), vec![", ", "x"]);
        assert_eq!(transformer_args(r"'it\'s'"), vec!["it's"]);
        assert!(transformer_args("").is_empty());
    }

    #[test]
    fn literal_args() {
        assert_eq!(Arg::parse("-1.5"), Arg::Literal(json!(-1.5)));
        assert_eq!(Arg::parse("null"), Arg::Literal(Value::Null));
        assert_eq!(Arg::parse("'x'"), Arg::Literal(json!("x")));
        assert_eq!(Arg::parse("a.b"), Arg::Path("a.b".into()));
    }
}
