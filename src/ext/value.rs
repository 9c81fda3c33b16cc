use serde_json::{Number, Value};

/// Dynamic-language conversions over the closed template value domain.
///
/// Templates are written against loosely typed data, so comparisons,
/// conditions and stringification need the usual coercion rules. These are
/// spelled out here as exhaustive matches instead of being left implicit.
pub trait ValueExt {
    /// Truthiness: `null`, `false`, `0`, `NaN` and `""` are falsy, everything
    /// else (including empty arrays and objects) is truthy.
    fn is_truthy(&self) -> bool;

    /// Numeric coercion. Values with no numeric reading become `NaN`.
    ///
    /// # Examples
    /// ```
    /// use stencil::ext::ValueExt;
    /// use serde_json::json;
    ///
    /// assert_eq!(json!("42").to_number(), 42.0);
    /// assert_eq!(json!(true).to_number(), 1.0);
    /// assert!(json!("abc").to_number().is_nan());
    /// ```
    fn to_number(&self) -> f64;

    /// Generic string conversion: arrays join their elements with `,` and
    /// objects render as `[object Object]`.
    fn to_display_string(&self) -> String;

    /// Name of the value's type as reported by the `type` transformer.
    fn type_name(&self) -> &'static str;
}

impl ValueExt for Value {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            Value::String(s) => parse_number(s),
            Value::Array(items) => match items.as_slice() {
                [] => 0.0,
                [single] => parse_number(&single.to_display_string()),
                _ => f64::NAN,
            },
            Value::Object(_) => f64::NAN,
        }
    }

    fn to_display_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Null => String::new(),
                    other => other.to_display_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust accepts "inf" and "nan" spellings that have no numeric reading here.
        t if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        t => t.parse::<f64>().unwrap_or(f64::NAN),
    }
}

fn number_to_string(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else {
        format_number(n.as_f64().unwrap_or(f64::NAN))
    }
}

/// Formats a float the way a dynamic language prints it: integral values
/// have no fractional part and negative zero prints as `0`.
pub fn format_number(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        let text = if f > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if f == 0.0 {
        "0".to_string()
    } else {
        format!("{f}")
    }
}

/// Builds a number value, storing integral results as integers.
/// Non-finite results have no JSON representation and become `null`.
pub fn number_value(f: f64) -> Value {
    if !f.is_finite() {
        return Value::Null;
    }
    if f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 {
        return Value::Number(Number::from(f as i64));
    }
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}
