//! The universal datum: an immutable, optionally-named value shared by
//! reference across evaluation slots (spec §3 "Value").

use std::fmt;
use std::sync::Arc;

/// An interned byte-string name. Comparisons are case-sensitive; operators
/// that want a case-insensitive comparison (the `-i` convention in spec
/// §3) do so explicitly by lower-casing before comparing, not by changing
/// this type's `PartialEq`.
pub type Name = Arc<[u8]>;

/// The tagged payload of a [`Value`]. `Value`s are reference-shared (the
/// string/list payloads are `Arc`-backed) so that aliasing a slot's value
/// elsewhere in the graph never copies bytes, matching the "arena" sharing
/// spec §3 and §5 describe. We use `Arc` rather than a borrowed
/// `Bump`-arena lifetime because the DAG is built from `Box<dyn Node>`
/// trait objects threaded through a single non-generic `MergeGraph`; giving
/// `Value` a lifetime parameter would force that lifetime onto every trait
/// object in the engine. `Arc` gives the same "immutable, shared, freed when
/// the last reference drops" behaviour without that cost (see DESIGN.md).
#[derive(Clone, Debug)]
pub enum Payload {
    /// A byte string.
    String(Arc<[u8]>),
    /// A signed 64-bit integer.
    Number(i64),
    /// An IEEE double.
    Float(f64),
    /// An ordered sequence of values.
    List(Arc<[Value]>),
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Payload::String(a), Payload::String(b)) => a.as_ref() == b.as_ref(),
            (Payload::Number(a), Payload::Number(b)) => a == b,
            (Payload::Float(a), Payload::Float(b)) => a.to_bits() == b.to_bits(),
            (Payload::List(a), Payload::List(b)) => a.as_ref() == b.as_ref(),
            _ => false,
        }
    }
}

/// An immutable datum with an optional name.
///
/// The "singular"/absent value described in spec §3 (denoted `:`) is *not*
/// a variant of `Value` — it is the absence of a `Value` altogether, and is
/// represented throughout the engine as `Option<Value>::None`. See
/// [`is_truthy`] for the one place this distinction, and the `[]`-vs-`:`
/// wrinkle from the glossary, are reconciled.
#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    name: Option<Name>,
    payload: Payload,
}

impl Value {
    /// Build an unnamed string value.
    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: None,
            payload: Payload::String(Arc::from(bytes.into().into_boxed_slice())),
        }
    }

    /// Build an unnamed number value.
    pub fn number(n: i64) -> Self {
        Self {
            name: None,
            payload: Payload::Number(n),
        }
    }

    /// Build an unnamed float value.
    pub fn float(f: f64) -> Self {
        Self {
            name: None,
            payload: Payload::Float(f),
        }
    }

    /// Build an unnamed list value.
    pub fn list(items: impl Into<Vec<Value>>) -> Self {
        Self {
            name: None,
            payload: Payload::List(Arc::from(items.into().into_boxed_slice())),
        }
    }

    /// The empty list literal `[]`. Used pervasively as the canonical
    /// constant-folded "falsy" result (spec §4.5's built-in rewrites).
    pub fn empty_list() -> Self {
        Self::list(Vec::new())
    }

    /// The canonical truthy literal `''` (an unnamed, empty string).
    pub fn truthy_literal() -> Self {
        Self::string(Vec::new())
    }

    /// Attach (or replace) this value's name, returning a new `Value` — a
    /// `Value`'s fields are never mutated in place once constructed.
    pub fn with_name(mut self, name: impl Into<Vec<u8>>) -> Self {
        self.name = Some(Arc::from(name.into().into_boxed_slice()));
        self
    }

    /// Strip any name, returning a new, unnamed `Value`.
    pub fn unnamed(mut self) -> Self {
        self.name = None;
        self
    }

    /// This value's name, if any.
    pub fn name(&self) -> Option<&[u8]> {
        self.name.as_deref()
    }

    /// The underlying payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// True if this value's payload is a list.
    pub fn is_list(&self) -> bool {
        matches!(self.payload, Payload::List(_))
    }

    /// True if this value's payload is the empty list.
    pub fn is_empty_list(&self) -> bool {
        matches!(&self.payload, Payload::List(l) if l.is_empty())
    }

    /// The list payload, if this value is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match &self.payload {
            Payload::List(l) => Some(l),
            _ => None,
        }
    }

    /// The string payload's bytes, if this value is a string.
    pub fn as_string(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }

    /// The number payload, if this value is a number.
    pub fn as_number(&self) -> Option<i64> {
        match self.payload {
            Payload::Number(n) => Some(n),
            _ => None,
        }
    }

    /// The float payload, if this value is a float.
    pub fn as_float(&self) -> Option<f64> {
        match self.payload {
            Payload::Float(f) => Some(f),
            _ => None,
        }
    }

    /// Numeric value regardless of whether this is an int or a float,
    /// widened to `f64`. Used by the math call library's mixed arithmetic.
    pub fn as_numeric(&self) -> Option<f64> {
        match self.payload {
            Payload::Number(n) => Some(n as f64),
            Payload::Float(f) => Some(f),
            _ => None,
        }
    }

    /// Byte length of this value's payload, as used by the `length` call:
    /// strings measure their bytes, numbers/floats measure their canonical
    /// textual form, lists measure their rendered form.
    pub fn byte_len(&self) -> usize {
        match &self.payload {
            Payload::String(s) => s.len(),
            Payload::Number(_) | Payload::Float(_) | Payload::List(_) => {
                self.to_string().len() - self.name_prefix_len()
            }
        }
    }

    fn name_prefix_len(&self) -> usize {
        match &self.name {
            Some(n) => n.len() + 1,
            None => 0,
        }
    }
}

/// Truthiness per spec §3/§4.7/GLOSSARY: absent (`None`) is falsy; a
/// present empty list is *also* falsy (the glossary's "`[]` ... falsy when
/// used as the absent singular"); every other present value is truthy.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None => false,
        Some(v) if v.is_empty_list() => false,
        Some(_) => true,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{}:", String::from_utf8_lossy(name))?;
        }
        match &self.payload {
            Payload::String(s) => write!(f, "'{}'", escape_string(s)),
            Payload::Number(n) => write!(f, "{n}"),
            Payload::Float(fl) => write!(f, "{}", format_float(*fl)),
            Payload::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Formats a float preserving at least six significant digits, per the
/// external-interface round-trip contract in spec §6. Six *decimal
/// places* would truncate anything smaller than 1.0 well before its sixth
/// significant digit (`0.000123456789` -> `0.000123`), so the decimal
/// count is derived from the value's order of magnitude instead, always
/// keeping at least one so the result round-trips as a float rather than
/// an integer literal.
fn format_float(f: f64) -> String {
    let exp: i32 = format!("{f:e}")
        .split_once('e')
        .expect("scientific notation always has an exponent")
        .1
        .parse()
        .expect("exponent is a valid integer");
    let decimals = (5 - exp).max(1) as usize;
    let s = format!("{f:.decimals$}");
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0');
        let trimmed = trimmed.trim_end_matches('.');
        if trimmed.is_empty() || trimmed == "-" {
            "0.0".to_string()
        } else if trimmed.contains('.') {
            trimmed.to_string()
        } else {
            format!("{trimmed}.0")
        }
    } else {
        s
    }
}

fn escape_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            _ => out.push(b as char),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_rules() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&Value::empty_list())));
        assert!(is_truthy(Some(&Value::truthy_literal())));
        assert!(is_truthy(Some(&Value::number(0))));
        assert!(is_truthy(Some(&Value::list(vec![Value::number(1)]))));
    }

    #[test]
    fn display_named_literal() {
        let v = Value::number(42).with_name("foo");
        assert_eq!(v.to_string(), "foo:42");
    }

    #[test]
    fn display_list() {
        let v = Value::list(vec![Value::number(1), Value::string(*b"bar")]);
        assert_eq!(v.to_string(), "[1 'bar']");
    }

    #[test]
    fn float_formatting_preserves_precision() {
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.000123456789), "0.000123457");
        assert_eq!(format_float(123456789.0), "123456789.0");
    }
}
