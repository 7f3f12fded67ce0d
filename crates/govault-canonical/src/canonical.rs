//! Canonical JSON serialization.
//!
//! Produces a single byte sequence for every structurally distinct value:
//! - object keys sorted by raw UTF-8 bytes at every nesting level
//! - arrays kept in input order
//! - no insignificant whitespace
//! - integer-valued floats rendered as integers; NaN/Infinity rejected
//!
//! Every hash in the system is computed over this form.

use serde::Serialize;
use serde_json::{Number, Value};

use crate::error::{CanonicalError, CanonicalResult};

/// Maximum nesting depth accepted before failing with [`CanonicalError::TooDeep`].
pub const MAX_DEPTH: usize = 128;

/// Location inside the value tree, used for error messages.
struct Cursor {
    segments: Vec<String>,
}

impl Cursor {
    fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    fn depth(&self) -> usize {
        self.segments.len()
    }

    fn render(&self) -> String {
        if self.segments.is_empty() {
            "root".to_string()
        } else {
            format!("root.{}", self.segments.join("."))
        }
    }
}

/// Convert any serializable value into the canonical value domain.
///
/// Types that cannot be represented as JSON (maps keyed by non-strings and
/// the like) fail with [`CanonicalError::UnsupportedValue`]. Optional fields
/// should carry `#[serde(skip_serializing_if = "Option::is_none")]` so that an
/// absent field is omitted rather than emitted as `null`.
pub fn to_canonical_value<T: Serialize + ?Sized>(value: &T) -> CanonicalResult<Value> {
    serde_json::to_value(value).map_err(|e| CanonicalError::UnsupportedValue(e.to_string()))
}

/// Canonicalize a JSON value into its unique string form.
pub fn canonicalize(value: &Value) -> CanonicalResult<String> {
    let mut out = String::new();
    let mut cursor = Cursor::root();
    write_value(value, &mut cursor, &mut out)?;
    Ok(out)
}

/// Canonicalize a JSON value into UTF-8 bytes.
pub fn canonical_bytes(value: &Value) -> CanonicalResult<Vec<u8>> {
    canonicalize(value).map(String::into_bytes)
}

/// Canonicalize any serializable value.
pub fn canonicalize_serializable<T: Serialize + ?Sized>(value: &T) -> CanonicalResult<String> {
    canonicalize(&to_canonical_value(value)?)
}

fn write_value(value: &Value, cursor: &mut Cursor, out: &mut String) -> CanonicalResult<()> {
    if cursor.depth() > MAX_DEPTH {
        return Err(CanonicalError::TooDeep {
            limit: MAX_DEPTH,
            path: cursor.render(),
        });
    }

    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(n, cursor, out)?,
        Value::String(s) => write_string(s, out)?,
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                cursor.segments.push(format!("[{}]", index));
                let written = write_value(item, cursor, out);
                cursor.segments.pop();
                written?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));

            out.push('{');
            for (index, (key, item)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_string(key, out)?;
                out.push(':');
                cursor.segments.push(key.clone());
                let written = write_value(item, cursor, out);
                cursor.segments.pop();
                written?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_number(n: &Number, cursor: &Cursor, out: &mut String) -> CanonicalResult<()> {
    if n.is_i64() || n.is_u64() {
        out.push_str(&n.to_string());
        return Ok(());
    }

    match n.as_f64() {
        Some(f) if !f.is_finite() => Err(CanonicalError::NonFiniteNumber {
            path: cursor.render(),
        }),
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
            out.push_str(&(f as i64).to_string());
            Ok(())
        }
        Some(_) => {
            out.push_str(&n.to_string());
            Ok(())
        }
        None => Err(CanonicalError::UnsupportedValue(format!(
            "number {} at {} has no finite representation",
            n,
            cursor.render()
        ))),
    }
}

fn write_string(s: &str, out: &mut String) -> CanonicalResult<()> {
    out.push_str(&serde_json::to_string(s)?);
    Ok(())
}

/// Build a JSON number from a float, rejecting NaN and infinities.
///
/// `serde_json` silently maps non-finite floats to `null`; producers that
/// carry floats go through here instead.
pub fn finite_number(value: f64) -> CanonicalResult<Value> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| CanonicalError::NonFiniteNumber {
            path: format!("float literal {}", value),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonicalize_sorts_top_level_keys() {
        let canonical = canonicalize(&json!({"b": 2, "a": 1})).expect("canonicalize");
        assert_eq!(canonical, r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn test_canonicalize_sorts_nested_keys() {
        let canonical =
            canonicalize(&json!({"z": {"b": 2, "a": 1}, "a": 1})).expect("canonicalize");
        assert_eq!(canonical, r#"{"a":1,"z":{"a":1,"b":2}}"#);
    }

    #[test]
    fn test_canonicalize_preserves_array_order() {
        let canonical =
            canonicalize(&json!({"arr": [3, 1, 2], "name": "test"})).expect("canonicalize");
        assert_eq!(canonical, r#"{"arr":[3,1,2],"name":"test"}"#);
    }

    #[test]
    fn test_canonicalize_sorts_by_bytes_not_locale() {
        // 'B' (0x42) sorts before 'a' (0x61); 'é' (0xC3 0xA9) after 'z'.
        let canonical = canonicalize(&json!({"a": 1, "é": 3, "B": 2, "z": 4})).expect("canon");
        assert_eq!(canonical, r#"{"B":2,"a":1,"z":4,"é":3}"#);
    }

    #[test]
    fn test_canonicalize_scalars() {
        assert_eq!(canonicalize(&json!(null)).expect("null"), "null");
        assert_eq!(canonicalize(&json!(true)).expect("true"), "true");
        assert_eq!(canonicalize(&json!(false)).expect("false"), "false");
        assert_eq!(canonicalize(&json!("x\"y")).expect("str"), r#""x\"y""#);
        assert_eq!(canonicalize(&json!(-42)).expect("int"), "-42");
    }

    #[test]
    fn test_canonicalize_integer_valued_float() {
        assert_eq!(canonicalize(&json!({"v": 1.0})).expect("c"), r#"{"v":1}"#);
        assert_eq!(canonicalize(&json!({"v": -0.0})).expect("c"), r#"{"v":0}"#);
        assert_eq!(canonicalize(&json!({"v": 1.5})).expect("c"), r#"{"v":1.5}"#);
    }

    #[test]
    fn test_canonicalize_empty_containers() {
        assert_eq!(canonicalize(&json!({})).expect("obj"), "{}");
        assert_eq!(canonicalize(&json!([])).expect("arr"), "[]");
    }

    #[test]
    fn test_canonicalize_rejects_excessive_depth() {
        let mut value = json!(0);
        for _ in 0..(MAX_DEPTH + 5) {
            value = json!([value]);
        }
        match canonicalize(&value) {
            Err(CanonicalError::TooDeep { limit, .. }) => assert_eq!(limit, MAX_DEPTH),
            other => panic!("expected TooDeep, got {other:?}"),
        }
    }

    #[test]
    fn test_canonicalize_accepts_depth_at_limit() {
        let mut value = json!(0);
        for _ in 0..MAX_DEPTH {
            value = json!([value]);
        }
        assert!(canonicalize(&value).is_ok());
    }

    #[test]
    fn test_finite_number_rejects_nan_and_infinity() {
        assert!(matches!(
            finite_number(f64::NAN),
            Err(CanonicalError::NonFiniteNumber { .. })
        ));
        assert!(finite_number(f64::INFINITY).is_err());
        assert_eq!(finite_number(2.5).expect("finite"), json!(2.5));
    }

    #[test]
    fn test_to_canonical_value_rejects_non_string_keys() {
        let mut map = std::collections::HashMap::new();
        map.insert(vec![1u8], 1);
        assert!(matches!(
            to_canonical_value(&map),
            Err(CanonicalError::UnsupportedValue(_))
        ));
    }

    #[test]
    fn test_absent_optional_fields_are_omitted() {
        #[derive(Serialize)]
        struct Sample {
            name: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            note: Option<String>,
        }

        let canonical = canonicalize_serializable(&Sample {
            name: "n".to_string(),
            note: None,
        })
        .expect("canonicalize");
        assert_eq!(canonical, r#"{"name":"n"}"#);
    }
}
