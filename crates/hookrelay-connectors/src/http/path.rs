//! Dot/bracket path lookup into JSON documents.

use serde_json::Value as JsonValue;

/// Resolve `path` (`data.items[0].name` style) against `value`.
///
/// `[N]` is read as `.N`. A segment indexes arrays when it is a canonical
/// decimal index and looks up object keys otherwise. Returns `None` as soon as a
/// segment is missing or an intermediate value is `null` or a scalar.
pub fn extract<'a>(value: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let normalized = normalize(path);
    let mut current = value;
    for segment in normalized.split('.') {
        current = match current {
            JsonValue::Object(map) => map.get(segment)?,
            JsonValue::Array(items) => items.get(array_index(segment)?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Plain digits without sign or leading zero; `+1` and `01` are not indexes.
fn array_index(segment: &str) -> Option<usize> {
    let digits_only = !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit());
    if !digits_only || (segment.len() > 1 && segment.starts_with('0')) {
        return None;
    }
    segment.parse().ok()
}

fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '[' {
            out.push(c);
            continue;
        }
        let mut digits = String::new();
        while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(d);
            chars.next();
        }
        if !digits.is_empty() && chars.peek() == Some(&']') {
            chars.next();
            out.push('.');
            out.push_str(&digits);
        } else {
            out.push('[');
            out.push_str(&digits);
        }
    }
    out
}

/// Render a resolved value the way return values carry it: strings as-is,
/// other scalars via their display form, containers as compact JSON.
pub fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => number_text(n),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Integral floats drop the fraction (`10.0` is `10`).
fn number_text(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f + 0.0),
        _ => n.to_string(),
    }
}
