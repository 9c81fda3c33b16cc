//! Post-render output formatting.

use crate::options::OutputFormat;
use crate::transformers::to_json_string;
use log::warn;

/// Applies `format` to rendered output. Input that doesn't parse as the
/// requested format is returned unchanged.
pub fn apply(output: String, format: OutputFormat, json_indent: usize) -> String {
    match format {
        OutputFormat::Json => format_json(output, json_indent),
        OutputFormat::Xml => format_xml(&output),
    }
}

fn format_json(output: String, indent: usize) -> String {
    match serde_json::from_str::<serde_json::Value>(&output) {
        Ok(value) => to_json_string(&value, indent.max(1)),
        Err(e) => {
            warn!("Rendered output is not valid JSON, leaving it unformatted: {e}");
            output
        }
    }
}

/// Puts every tag on its own line, indented two spaces per nesting level.
/// Text between an opening and its closing tag stays on the tag's line.
pub fn format_xml(output: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut depth = 0usize;
    let mut rest = output.trim();

    while !rest.is_empty() {
        let Some(start) = rest.find('<') else {
            push_text(&mut lines, rest);
            break;
        };
        if start > 0 {
            push_text(&mut lines, &rest[..start]);
        }
        let Some(len) = rest[start..].find('>') else {
            push_text(&mut lines, &rest[start..]);
            break;
        };
        let tag = &rest[start..start + len + 1];
        rest = &rest[start + len + 1..];

        if tag.starts_with("</") {
            depth = depth.saturating_sub(1);
            lines.push(format!("{}{tag}", "  ".repeat(depth)));
        } else if tag.ends_with("/>") || tag.starts_with("<?") || tag.starts_with("<!") {
            lines.push(format!("{}{tag}", "  ".repeat(depth)));
        } else {
            // <a>text</a> stays on one line.
            let name = tag[1..tag.len() - 1].split_whitespace().next().unwrap_or_default();
            let closing = format!("</{name}>");
            match rest.find('<') {
                Some(next) if rest[next..].starts_with(&closing) => {
                    let text = rest[..next].trim();
                    lines.push(format!("{}{tag}{text}{closing}", "  ".repeat(depth)));
                    rest = &rest[next + closing.len()..];
                }
                _ => {
                    lines.push(format!("{}{tag}", "  ".repeat(depth)));
                    depth += 1;
                }
            }
        }
        rest = rest.trim_start();
    }

    fn push_text(lines: &mut Vec<String>, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            lines.push(text.to_string());
        }
    }

    lines.join("\n")
}

/// Trims the whole output and the trailing whitespace of every line.
pub fn trim_whitespace(output: &str) -> String {
    output.trim().lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_prints_json() {
        let out = apply(r#"{"a":1,"b":[true]}"#.into(), OutputFormat::Json, 2);
        assert_eq!(out, "{\n  \"a\": 1,\n  \"b\": [\n    true\n  ]\n}");
    }

    #[test]
    fn invalid_json_is_unchanged() {
        assert_eq!(apply("{oops".into(), OutputFormat::Json, 2), "{oops");
    }

    #[test]
    fn reindents_xml() {
        let out = format_xml("<?xml version=\"1.0\"?><root><a>1</a><b><c/></b></root>");
        assert_eq!(
            out,
            "<?xml version=\"1.0\"?>\n<root>\n  <a>1</a>\n  <b>\n    <c/>\n  </b>\n</root>"
        );
    }

    #[test]
    fn trims_lines() {
        assert_eq!(trim_whitespace("\n  a  \n b \t\n\n"), "a\n b");
    }
}
