//! Deterministic cache-key derivation.
//!
//! A key is built from an operation name and a flat parameter bag:
//! parameter names are sorted, rendered as `name:value` pairs joined with
//! `&`, prefixed with the operation (and an optional scope such as a user
//! id), then base64url-encoded. Separator characters inside names, values,
//! the operation and the scope are backslash-escaped first, so the raw form
//! parses back into exactly one input. The encoding keeps keys safe as
//! storage keys.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

/// Separator between the scope, operation, and parameter sections.
const SECTION_SEPARATOR: char = '|';

/// Separator between `name:value` pairs.
const PAIR_SEPARATOR: char = '&';

/// A primitive parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Rendered as a comma-joined list, in the given order.
    List(Vec<String>),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::Int(n) => write!(f, "{n}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::List(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Str(s)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Int(n)
    }
}

impl From<u32> for ParamValue {
    fn from(n: u32) -> Self {
        ParamValue::Int(i64::from(n))
    }
}

impl From<f64> for ParamValue {
    fn from(x: f64) -> Self {
        ParamValue::Float(x)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(items: Vec<String>) -> Self {
        ParamValue::List(items)
    }
}

/// Derive an unscoped cache key for `operation` and `params`.
///
/// ```rust
/// # use larder::cache::{derive_key, ParamValue};
/// let a = derive_key("search", [("b", ParamValue::Int(2)), ("a", ParamValue::Int(1))]);
/// let b = derive_key("search", [("a", ParamValue::Int(1)), ("b", ParamValue::Int(2))]);
/// assert_eq!(a, b);
/// ```
pub fn derive_key<I, K, V>(operation: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: fmt::Display,
{
    derive_scoped_key(None, operation, params)
}

/// Derive a cache key scoped to `scope` (typically a user id).
///
/// Results for different scopes never share a key, even with identical
/// parameters.
pub fn derive_scoped_key<I, K, V>(scope: Option<&str>, operation: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: fmt::Display,
{
    let mut pairs: Vec<(String, String)> = params
        .into_iter()
        .map(|(k, v)| (escape(k.as_ref()), escape(&v.to_string())))
        .collect();
    pairs.sort();

    let joined = pairs
        .iter()
        .map(|(k, v)| format!("{k}:{v}"))
        .collect::<Vec<_>>()
        .join(&PAIR_SEPARATOR.to_string());

    let operation = escape(operation);
    let raw = match scope {
        Some(scope) => format!(
            "{}{SECTION_SEPARATOR}{operation}{SECTION_SEPARATOR}{joined}",
            escape(scope)
        ),
        None => format!("{operation}{SECTION_SEPARATOR}{joined}"),
    };
    URL_SAFE_NO_PAD.encode(raw.as_bytes())
}

/// Backslash-escape the separators and the escape character itself.
fn escape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars() {
        if matches!(c, '\\' | ':' | PAIR_SEPARATOR | SECTION_SEPARATOR) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
