//! Transformers applied to placeholder values through the pipe syntax.
//!
//! Every built-in is total over the value domain: degenerate input such as
//! an empty string, an empty array or `null` produces a value, never an error.

use crate::constants::MAX_DECIMALS;
use crate::date::{format_datetime, parse_datetime, relative_time};
use crate::error::{Error, Result};
use crate::ext::{format_number, number_value, ValueExt};
use crate::placeholder::transformer_args;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use cruet::case::{
    camel::to_camel_case, kebab::to_kebab_case, pascal::to_pascal_case, snake::to_snake_case,
};
use indexmap::IndexMap;
use log::warn;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use serde_json::Value;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Characters left unescaped by URI-component encoding.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A transformer receives the current value and its parsed arguments.
pub type TransformerFn = Arc<dyn Fn(&Value, &[String]) -> Result<Value> + Send + Sync>;

/// Named transformers available to placeholders.
#[derive(Clone)]
pub struct TransformerRegistry {
    transformers: IndexMap<String, TransformerFn>,
}

impl TransformerRegistry {
    /// Creates a registry without any transformers.
    pub fn empty() -> Self {
        Self { transformers: IndexMap::new() }
    }

    /// Creates a registry holding every built-in transformer.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.add_builtins();
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, transformer: F)
    where
        F: Fn(&Value, &[String]) -> Result<Value> + Send + Sync + 'static,
    {
        self.transformers.insert(name.into(), Arc::new(transformer));
    }

    fn add<F>(&mut self, name: &str, transformer: F)
    where
        F: Fn(&Value, &[String]) -> Value + Send + Sync + 'static,
    {
        self.register(name, move |value: &Value, args: &[String]| Ok(transformer(value, args)));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transformers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.transformers.keys().map(String::as_str)
    }

    /// Applies the transformer `name` with its raw argument string.
    pub fn apply(&self, name: &str, value: &Value, args: &str) -> Result<Value> {
        let transformer = self
            .transformers
            .get(name)
            .ok_or_else(|| Error::UnknownTransformer(name.to_string()))?;
        transformer(value, &transformer_args(args))
    }

    fn add_builtins(&mut self) {
        // Strings
        self.add("upper", |v, _| map_text(v, |s| s.to_uppercase()));
        self.add("uppercase", |v, _| map_text(v, |s| s.to_uppercase()));
        self.add("lower", |v, _| map_text(v, |s| s.to_lowercase()));
        self.add("lowercase", |v, _| map_text(v, |s| s.to_lowercase()));
        self.add("capitalize", |v, _| map_text(v, capitalize));
        self.add("title", |v, _| {
            map_text(v, |s| s.split(' ').map(capitalize).collect::<Vec<_>>().join(" "))
        });
        self.add("trim", |v, _| map_text(v, |s| s.trim().to_string()));
        self.add("camelCase", |v, _| map_text(v, to_camel_case));
        self.add("snakeCase", |v, _| map_text(v, to_snake_case));
        self.add("kebabCase", |v, _| map_text(v, to_kebab_case));
        self.add("pascalCase", |v, _| map_text(v, to_pascal_case));
        self.add("pad", |v, args| pad(v, args, true));
        self.add("padLeft", |v, args| pad(v, args, true));
        self.add("padRight", |v, args| pad(v, args, false));
        self.add("truncate", truncate);
        self.add("substring", substring);
        self.add("replace", |v, args| match args {
            [from, to, ..] if !from.is_empty() => map_text(v, |s| s.replace(from.as_str(), to)),
            [from] if !from.is_empty() => map_text(v, |s| s.replace(from.as_str(), "")),
            _ => v.clone(),
        });
        self.add("regexReplace", regex_replace);
        self.add("matches", |v, args| match args.first() {
            Some(pattern) => Value::Bool(regex_filter(&text(v), pattern)),
            None => Value::Bool(false),
        });
        self.add("split", |v, args| {
            let s = text(v);
            let sep = args.first().map(String::as_str).unwrap_or(",");
            let parts: Vec<Value> = if s.is_empty() {
                Vec::new()
            } else if sep.is_empty() {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                s.split(sep).map(|p| Value::String(p.to_string())).collect()
            };
            Value::Array(parts)
        });
        self.add("length", |v, _| Value::from(count(v)));
        self.add("string", |v, _| Value::String(text(v)));

        // Numbers
        self.add("number", format_number_transformer);
        self.add("round", |v, args| {
            let decimals = arg_decimals(args, 0).unwrap_or(0);
            numeric(v, |f| round_half_up(f, decimals))
        });
        self.add("floor", |v, _| numeric(v, f64::floor));
        self.add("ceil", |v, _| numeric(v, f64::ceil));
        self.add("abs", |v, _| numeric(v, f64::abs));
        self.add("int", |v, _| numeric(v, f64::trunc));
        self.add("float", |v, _| numeric(v, |f| f));
        self.add("fixed", |v, args| {
            let decimals = arg_decimals(args, 0).unwrap_or(2);
            Value::String(format!("{:.*}", decimals, v.to_number()))
        });
        self.add("percent", |v, args| {
            let decimals = arg_decimals(args, 0).unwrap_or(0);
            Value::String(format!("{:.*}%", decimals, v.to_number() * 100.0))
        });
        self.add("currency", |v, args| {
            let symbol = args.first().map(String::as_str).unwrap_or("$");
            let decimals = arg_decimals(args, 1).unwrap_or(2);
            let f = v.to_number();
            let formatted = group_number(f.abs(), Some(decimals), ",", ".");
            let sign = if f < 0.0 { "-" } else { "" };
            Value::String(format!("{sign}{symbol}{formatted}"))
        });

        // Dates
        self.add("date", |v, args| {
            let format = args.first().map(String::as_str).unwrap_or(crate::constants::DEFAULT_DATE_FORMAT);
            match parse_datetime(v) {
                Some(dt) => Value::String(format_datetime(&dt, format)),
                None => v.clone(),
            }
        });
        self.add("fromNow", |v, _| match parse_datetime(v) {
            Some(dt) => Value::String(relative_time(&dt, &Utc::now())),
            None => v.clone(),
        });

        // Collections
        self.add("join", |v, args| {
            let sep = args.first().map(String::as_str).unwrap_or(",");
            match v {
                Value::Array(items) => Value::String(
                    items.iter().map(text).collect::<Vec<_>>().join(sep),
                ),
                other => Value::String(text(other)),
            }
        });
        self.add("first", |v, _| match v {
            Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
            Value::String(s) => s.chars().next().map_or(Value::Null, |c| c.to_string().into()),
            other => other.clone(),
        });
        self.add("last", |v, _| match v {
            Value::Array(items) => items.last().cloned().unwrap_or(Value::Null),
            Value::String(s) => s.chars().last().map_or(Value::Null, |c| c.to_string().into()),
            other => other.clone(),
        });
        self.add("reverse", |v, _| match v {
            Value::Array(items) => Value::Array(items.iter().rev().cloned().collect()),
            Value::String(s) => Value::String(s.chars().rev().collect()),
            other => other.clone(),
        });
        self.add("sort", |v, _| match v {
            Value::Array(items) => Value::Array(sorted(items)),
            other => other.clone(),
        });
        self.add("unique", |v, _| match v {
            Value::Array(items) => {
                let mut seen: Vec<Value> = Vec::with_capacity(items.len());
                for item in items {
                    if !seen.contains(item) {
                        seen.push(item.clone());
                    }
                }
                Value::Array(seen)
            }
            other => other.clone(),
        });
        self.add("count", |v, _| Value::from(count(v)));
        self.add("keys", |v, _| match v {
            Value::Object(map) => Value::Array(map.keys().cloned().map(Value::String).collect()),
            Value::Array(items) => Value::Array((0..items.len()).map(Value::from).collect()),
            _ => Value::Array(Vec::new()),
        });
        self.add("values", |v, _| match v {
            Value::Object(map) => Value::Array(map.values().cloned().collect()),
            Value::Array(items) => Value::Array(items.clone()),
            _ => Value::Array(Vec::new()),
        });
        self.add("entries", |v, _| match v {
            Value::Object(map) => Value::Array(
                map.iter()
                    .map(|(k, v)| Value::Array(vec![Value::String(k.clone()), v.clone()]))
                    .collect(),
            ),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| Value::Array(vec![Value::from(i), v.clone()]))
                    .collect(),
            ),
            _ => Value::Array(Vec::new()),
        });

        // Booleans
        self.add("bool", |v, _| Value::Bool(to_bool(v)));
        self.add("boolean", |v, _| Value::Bool(to_bool(v)));
        self.add("not", |v, _| Value::Bool(!to_bool(v)));

        // Encoding
        self.add("base64", |v, _| Value::String(BASE64.encode(text(v).as_bytes())));
        self.add("base64Decode", |v, _| {
            let decoded = BASE64
                .decode(text(v).trim())
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok());
            decoded.map_or_else(|| v.clone(), Value::String)
        });
        self.add("urlEncode", |v, _| {
            Value::String(utf8_percent_encode(&text(v), URI_COMPONENT).to_string())
        });
        self.add("urlDecode", |v, _| {
            let s = text(v);
            match percent_decode_str(&s).decode_utf8() {
                Ok(decoded) => Value::String(decoded.into_owned()),
                Err(_) => v.clone(),
            }
        });
        self.add("htmlEscape", |v, _| map_text(v, html_escape));
        self.add("htmlUnescape", |v, _| map_text(v, html_unescape));
        self.add("json", |v, args| {
            let indent = arg_usize(args, 0).unwrap_or(0);
            Value::String(to_json_string(v, indent))
        });
        self.add("parseJson", |v, _| match v {
            Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| v.clone()),
            other => other.clone(),
        });

        // Hashing
        self.add("md5", |v, _| Value::String(format!("{:x}", md5::compute(text(v).as_bytes()))));
        self.add("sha1", |v, _| Value::String(hex::encode(Sha1::digest(text(v).as_bytes()))));
        self.add("sha256", |v, _| {
            Value::String(hex::encode(Sha256::digest(text(v).as_bytes())))
        });

        // Introspection
        self.add("type", |v, _| Value::String(v.type_name().to_string()));
    }
}

impl Default for TransformerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// String form used by string transformers; `null` reads as empty.
fn text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_display_string(),
    }
}

fn map_text(value: &Value, f: impl Fn(&str) -> String) -> Value {
    Value::String(f(&text(value)))
}

fn numeric(value: &Value, f: impl Fn(f64) -> f64) -> Value {
    number_value(f(value.to_number()))
}

fn arg_usize(args: &[String], index: usize) -> Option<usize> {
    args.get(index).and_then(|a| a.trim().parse().ok())
}

/// A decimals argument, saturated at [`MAX_DECIMALS`].
fn arg_decimals(args: &[String], index: usize) -> Option<usize> {
    let raw = args.get(index)?.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(raw.parse::<usize>().map_or(MAX_DECIMALS, |d| d.min(MAX_DECIMALS)))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn pad(value: &Value, args: &[String], left: bool) -> Value {
    let s = text(value);
    let Some(width) = arg_usize(args, 0) else {
        return Value::String(s);
    };
    let fill = match args.get(1).map(String::as_str) {
        Some("") | None => " ",
        Some(fill) => fill,
    };
    let len = s.chars().count();
    if len >= width {
        return Value::String(s);
    }
    let padding: String = fill.chars().cycle().take(width - len).collect();
    Value::String(if left { padding + &s } else { s + &padding })
}

fn truncate(value: &Value, args: &[String]) -> Value {
    let s = text(value);
    let Some(limit) = arg_usize(args, 0) else {
        return Value::String(s);
    };
    let suffix = args.get(1).map(String::as_str).unwrap_or("...");
    if s.chars().count() <= limit {
        return Value::String(s);
    }
    Value::String(s.chars().take(limit).collect::<String>() + suffix)
}

/// Character-based substring with swapped bounds when start > end.
fn substring(value: &Value, args: &[String]) -> Value {
    let chars: Vec<char> = text(value).chars().collect();
    let clamp = |i: Option<f64>, default: usize| match i {
        Some(f) if f.is_nan() || f < 0.0 => 0,
        Some(f) => (f as usize).min(chars.len()),
        None => default,
    };
    let parse = |i: usize| args.get(i).map(|a| a.trim().parse::<f64>().unwrap_or(f64::NAN));
    let start = clamp(parse(0), 0);
    let end = clamp(parse(1), chars.len());
    let (start, end) = if start > end { (end, start) } else { (start, end) };
    Value::String(chars[start..end].iter().collect())
}

/// Tests if a string matches a given regular expression pattern. An invalid
/// pattern is logged and never matches.
pub fn regex_filter(val: &str, re: &str) -> bool {
    match Regex::new(re) {
        Ok(re) => re.is_match(val),
        Err(err) => {
            warn!("Invalid regex '{re}': {err}");
            false
        }
    }
}

fn regex_replace(value: &Value, args: &[String]) -> Value {
    let Some(pattern) = args.first() else {
        return value.clone();
    };
    let replacement = args.get(1).map(String::as_str).unwrap_or("");
    match Regex::new(pattern) {
        Ok(re) => map_text(value, |s| re.replace_all(s, replacement).into_owned()),
        Err(err) => {
            warn!("Invalid regex '{pattern}': {err}");
            value.clone()
        }
    }
}

fn count(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(s) => s.chars().count(),
        Value::Bool(_) | Value::Number(_) => 1,
    }
}

fn sorted(items: &[Value]) -> Vec<Value> {
    let mut items = items.to_vec();
    if items.iter().all(Value::is_number) {
        items.sort_by(|a, b| a.to_number().total_cmp(&b.to_number()));
    } else {
        items.sort_by_key(text);
    }
    items
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::String(s) => !matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "" | "false" | "0" | "no" | "off"
        ),
        other => other.is_truthy(),
    }
}

/// Rounds half away from negative infinity, like `Math.round`.
fn round_half_up(f: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals.min(MAX_DECIMALS) as i32);
    let rounded = (f * factor + 0.5).floor() / factor;
    if rounded.is_finite() {
        rounded
    } else {
        f
    }
}

/// `number:decimals,thousandsSeparator,decimalSeparator`
fn format_number_transformer(value: &Value, args: &[String]) -> Value {
    let f = value.to_number();
    if !f.is_finite() {
        return Value::String(format_number(f));
    }
    let decimals = arg_decimals(args, 0);
    let thousands = args.get(1).map(String::as_str).unwrap_or(",");
    let decimal = args.get(2).map(String::as_str).unwrap_or(".");
    let sign = if f < 0.0 { "-" } else { "" };
    Value::String(format!("{sign}{}", group_number(f.abs(), decimals, thousands, decimal)))
}

/// Formats a non-negative number with grouped thousands.
fn group_number(f: f64, decimals: Option<usize>, thousands: &str, decimal: &str) -> String {
    let plain = match decimals {
        Some(d) => format!("{f:.d$}"),
        None => format_number(f),
    };
    let (int_part, frac_part) = match plain.split_once('.') {
        Some((i, fr)) => (i.to_string(), Some(fr.to_string())),
        None => (plain, None),
    };
    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::new();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push_str(thousands);
        }
        grouped.push(*c);
    }
    match frac_part {
        Some(frac) => format!("{grouped}{decimal}{frac}"),
        None => grouped,
    }
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn html_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// Serialises a value as JSON, pretty-printed when `indent > 0`.
pub fn to_json_string(value: &Value, indent: usize) -> String {
    if indent == 0 {
        return value.to_string();
    }
    let indent = " ".repeat(indent);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    match serde::Serialize::serialize(value, &mut serializer) {
        Ok(()) => String::from_utf8(buf).unwrap_or_else(|_| value.to_string()),
        Err(_) => value.to_string(),
    }
}
