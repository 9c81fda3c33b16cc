//! Template context, loop scopes and property-path resolution.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// The data environment a template is rendered against.
///
/// An ordered mapping from names to values. Rendering never mutates a
/// context; loops derive child [`Scope`]s instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateContext {
    values: Map<String, Value>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            Value::Null => Ok(Self::default()),
            other => Err(Error::Config(format!(
                "template context must be an object, got {}",
                crate::ext::ValueExt::type_name(&other)
            ))),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.shift_remove(key)
    }

    /// Shallow merge: keys of `other` override keys of `self`.
    pub fn merged_with(&self, other: &TemplateContext) -> TemplateContext {
        let mut values = self.values.clone();
        for (key, value) in &other.values {
            values.insert(key.clone(), value.clone());
        }
        TemplateContext { values }
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}

impl From<Map<String, Value>> for TemplateContext {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for TemplateContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

/// A lexical scope used while rendering.
///
/// The root scope borrows the render context. Each loop iteration pushes a
/// child scope holding only the loop variables; it is dropped at the end of
/// the iteration so shadowed names cannot leak into the next one.
#[derive(Debug)]
pub struct Scope<'a> {
    locals: Cow<'a, Map<String, Value>>,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    pub fn new(context: &'a TemplateContext) -> Self {
        Scope { locals: Cow::Borrowed(&context.values), parent: None }
    }

    pub fn child<'b>(&'b self, locals: Map<String, Value>) -> Scope<'b>
    where
        'a: 'b,
    {
        Scope { locals: Cow::Owned(locals), parent: Some(self) }
    }

    /// Looks up a top-level name, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        match self.locals.get(name) {
            Some(value) => Some(value),
            None => self.parent.and_then(|parent| parent.lookup(name)),
        }
    }

    /// Resolves a property path such as `a.b[2]['c d']`. Misses yield `None`.
    pub fn resolve(&self, path: &str) -> Option<Value> {
        let segments = parse_path(path)?;
        let (first, rest) = segments.split_first()?;
        let root = match first {
            Segment::Key(name) => self.lookup(name)?,
            Segment::Index(_) => return None,
        };
        resolve_segments(root, rest).map(Cow::into_owned)
    }

    /// Collapses the scope chain into one map, inner names winning.
    pub fn flatten(&self) -> Map<String, Value> {
        let mut values = match self.parent {
            Some(parent) => parent.flatten(),
            None => Map::new(),
        };
        for (key, value) in self.locals.iter() {
            values.insert(key.clone(), value.clone());
        }
        values
    }

    pub fn keys(&self) -> Vec<String> {
        self.flatten().keys().cloned().collect()
    }
}

/// One step of a property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Splits a property path into segments.
///
/// Supports dot chains (`a.b`), numeric indexing (`a[3]`) and quoted
/// bracket keys (`a['key']`). Returns `None` for a malformed path.
pub fn parse_path(path: &str) -> Option<Vec<Segment>> {
    let chars: Vec<char> = path.trim().chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                if !current.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut current)));
                } else if segments.is_empty() {
                    return None;
                }
                i += 1;
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(Segment::Key(std::mem::take(&mut current)));
                }
                let close = chars[i + 1..].iter().position(|&c| c == ']')? + i + 1;
                let inner: String = chars[i + 1..close].iter().collect();
                segments.push(bracket_segment(inner.trim()));
                i = close + 1;
            }
            c => {
                current.push(c);
                i += 1;
            }
        }
    }
    if !current.is_empty() {
        segments.push(Segment::Key(current));
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}

fn bracket_segment(inner: &str) -> Segment {
    let quoted = inner.len() >= 2
        && ((inner.starts_with('\'') && inner.ends_with('\''))
            || (inner.starts_with('"') && inner.ends_with('"')));
    if quoted {
        return Segment::Key(inner[1..inner.len() - 1].to_string());
    }
    match inner.parse::<usize>() {
        Ok(index) => Segment::Index(index),
        Err(_) => Segment::Key(inner.to_string()),
    }
}

fn resolve_segments<'v>(value: &'v Value, segments: &[Segment]) -> Option<Cow<'v, Value>> {
    let mut current = Cow::Borrowed(value);
    for segment in segments {
        current = match current {
            Cow::Borrowed(value) => step(value, segment)?,
            Cow::Owned(value) => Cow::Owned(step(&value, segment)?.into_owned()),
        };
    }
    Some(current)
}

fn step<'v>(value: &'v Value, segment: &Segment) -> Option<Cow<'v, Value>> {
    match (value, segment) {
        (Value::Object(map), Segment::Key(key)) => map.get(key).map(Cow::Borrowed),
        (Value::Object(map), Segment::Index(index)) => {
            map.get(&index.to_string()).map(Cow::Borrowed)
        }
        (Value::Array(items), Segment::Index(index)) => items.get(*index).map(Cow::Borrowed),
        (Value::Array(items), Segment::Key(key)) if key == "length" => {
            Some(Cow::Owned(Value::from(items.len())))
        }
        (Value::Array(items), Segment::Key(key)) => {
            key.parse::<usize>().ok().and_then(|index| items.get(index)).map(Cow::Borrowed)
        }
        (Value::String(s), Segment::Key(key)) if key == "length" => {
            Some(Cow::Owned(Value::from(s.chars().count())))
        }
        (Value::String(s), Segment::Index(index)) => {
            s.chars().nth(*index).map(|c| Cow::Owned(Value::String(c.to_string())))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(value: Value) -> TemplateContext {
        TemplateContext::from_value(value).unwrap()
    }

    #[test]
    fn parses_mixed_paths() {
        assert_eq!(
            parse_path("a.b[2]['c d']").unwrap(),
            vec![
                Segment::Key("a".into()),
                Segment::Key("b".into()),
                Segment::Index(2),
                Segment::Key("c d".into()),
            ]
        );
        assert!(parse_path("a[1").is_none());
        assert!(parse_path("").is_none());
    }

    #[test]
    fn resolves_indexed_suffix() {
        let ctx = context(json!({"a": [{"b": 1}, {"b": 2}]}));
        let scope = Scope::new(&ctx);
        assert_eq!(scope.resolve("a[1].b"), Some(json!(2)));
        assert_eq!(scope.resolve("a.0.b"), Some(json!(1)));
        assert_eq!(scope.resolve("a.length"), Some(json!(2)));
    }

    #[test]
    fn misses_are_none() {
        let ctx = context(json!({"a": {"b": null}}));
        let scope = Scope::new(&ctx);
        assert_eq!(scope.resolve("a.b"), Some(Value::Null));
        assert_eq!(scope.resolve("a.b.c"), None);
        assert_eq!(scope.resolve("missing.deep[3]"), None);
        assert_eq!(scope.resolve("a[9]"), None);
    }

    #[test]
    fn child_scope_shadows_without_leaking() {
        let ctx = context(json!({"item": "outer", "other": 1}));
        let root = Scope::new(&ctx);
        {
            let mut locals = Map::new();
            locals.insert("item".into(), json!("inner"));
            let child = root.child(locals);
            assert_eq!(child.resolve("item"), Some(json!("inner")));
            assert_eq!(child.resolve("other"), Some(json!(1)));
        }
        assert_eq!(root.resolve("item"), Some(json!("outer")));
    }

    #[test]
    fn merge_overrides_shallowly() {
        let global = context(json!({"a": 1, "b": {"x": 1}}));
        let local = context(json!({"b": {"y": 2}}));
        let merged = global.merged_with(&local);
        assert_eq!(merged.get("a"), Some(&json!(1)));
        assert_eq!(merged.get("b"), Some(&json!({"y": 2})));
    }

    #[test]
    fn rejects_non_object_context() {
        assert!(TemplateContext::from_value(json!([1, 2])).is_err());
        assert!(TemplateContext::from_value(Value::Null).unwrap().is_empty());
    }
}
