//! Typed defaults for configuration lookups.
//!
//! Every lookup takes a default of the caller's type and converts whatever is
//! stored into that type. Scalars follow a fixed coercion table (text, numbers
//! and booleans convert into each other); vectors and maps are shallow-unioned
//! with the default, so the default only fills in what the stored value lacks.

use serde_json::{Map, Number, Value};

/// Conversion from a stored configuration value into a typed result.
pub trait Coerce: Sized {
    /// Strict conversion. Returns `None` when the value cannot represent `Self`.
    fn coerce(value: &Value) -> Option<Self>;

    /// Converts `value`, falling back to `default` when conversion fails.
    fn with_default(value: &Value, default: Self) -> Self {
        match Self::coerce(value) {
            Some(converted) => converted,
            None => {
                tracing::debug!(
                    ?value,
                    expected = std::any::type_name::<Self>(),
                    "stored value not coercible, using default"
                );
                default
            }
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    const TRUTHY: [&str; 4] = ["true", "1", "yes", "on"];
    const FALSY: [&str; 5] = ["false", "0", "no", "off", ""];

    if TRUTHY.iter().any(|t| s.eq_ignore_ascii_case(t)) {
        Some(true)
    } else if FALSY.iter().any(|f| s.eq_ignore_ascii_case(f)) {
        Some(false)
    } else {
        None
    }
}

/// Integral view of a value; floats are truncated toward zero.
fn integral(value: &Value) -> Option<i128> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i128::from(i))
            } else if let Some(u) = n.as_u64() {
                Some(i128::from(u))
            } else {
                n.as_f64().and_then(truncate)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i128>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate))
        }
        Value::Bool(b) => Some(i128::from(*b)),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn truncate(f: f64) -> Option<i128> {
    f.is_finite().then(|| f.trunc() as i128)
}

impl Coerce for bool {
    fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_f64().map(|f| f != 0.0),
            Value::String(s) => parse_bool(s.trim()),
            _ => None,
        }
    }
}

macro_rules! coerce_integer {
    ($($t:ty),*) => {
        $(
            impl Coerce for $t {
                fn coerce(value: &Value) -> Option<Self> {
                    integral(value).and_then(|i| <$t>::try_from(i).ok())
                }
            }
        )*
    };
}

coerce_integer!(i64, i32, u16, u32, u64, usize);

impl Coerce for f64 {
    fn coerce(value: &Value) -> Option<Self> {
        let f = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }?;
        f.is_finite().then_some(f)
    }
}

impl Coerce for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn coerce(value: &Value) -> Option<Self> {
        f64::coerce(value)
            .map(|f| f as f32)
            .filter(|f| f.is_finite())
    }
}

impl Coerce for String {
    fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl<T: Coerce> Coerce for Vec<T> {
    fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => items.iter().map(T::coerce).collect(),
            Value::Object(_) | Value::Null => None,
            scalar => T::coerce(scalar).map(|v| vec![v]),
        }
    }

    fn with_default(value: &Value, default: Self) -> Self {
        match Self::coerce(value) {
            Some(mut stored) => {
                let len = stored.len();
                stored.extend(default.into_iter().skip(len));
                stored
            }
            None => default,
        }
    }
}

impl Coerce for Map<String, Value> {
    fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::Object(_) | Value::Array(_) => Some(into_map(value.clone())),
            _ => None,
        }
    }

    fn with_default(value: &Value, default: Self) -> Self {
        match Self::coerce(value) {
            Some(mut stored) => {
                fill_missing(&mut stored, default);
                stored
            }
            None => default,
        }
    }
}

impl Coerce for Value {
    fn coerce(value: &Value) -> Option<Self> {
        Some(value.clone())
    }

    fn with_default(value: &Value, default: Self) -> Self {
        if default.is_array() || default.is_object() {
            return union_composite(value, default);
        }

        let converted = match &default {
            Value::Null | Value::Array(_) | Value::Object(_) => Some(value.clone()),
            Value::Bool(_) => bool::coerce(value).map(Value::Bool),
            Value::Number(n) if n.is_f64() => {
                f64::coerce(value).and_then(Number::from_f64).map(Value::Number)
            }
            Value::Number(_) => i64::coerce(value)
                .map(Value::from)
                .or_else(|| u64::coerce(value).map(Value::from)),
            Value::String(_) => String::coerce(value).map(Value::String),
        };
        converted.unwrap_or(default)
    }
}

/// Shallow union of a stored value with a composite default. Existing keys
/// (or indices) win; the default contributes only what is missing.
fn union_composite(value: &Value, default: Value) -> Value {
    let stored = match value {
        Value::Null => return default,
        Value::Array(_) | Value::Object(_) => value.clone(),
        scalar => Value::Array(vec![scalar.clone()]),
    };

    match (stored, default) {
        (Value::Array(mut items), Value::Array(extra)) => {
            let len = items.len();
            items.extend(extra.into_iter().skip(len));
            Value::Array(items)
        }
        (stored, default @ (Value::Array(_) | Value::Object(_))) => {
            let mut map = into_map(stored);
            fill_missing(&mut map, into_map(default));
            Value::Object(map)
        }
        (stored, _) => stored,
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Map::new(),
    }
}

fn fill_missing(stored: &mut Map<String, Value>, default: Map<String, Value>) {
    for (key, value) in default {
        stored.entry(key).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_to_integer() {
        assert_eq!(i64::with_default(&json!("42"), 0), 42);
        assert_eq!(u16::with_default(&json!(" 5432 "), 0), 5432);
        assert_eq!(i32::with_default(&json!("7.9"), 0), 7);
        assert_eq!(i64::with_default(&json!(true), 0), 1);
    }

    #[test]
    fn test_integer_out_of_range_uses_default() {
        assert_eq!(u16::with_default(&json!(70000), 9), 9);
        assert_eq!(u32::with_default(&json!("-1"), 3), 3);
    }

    #[test]
    fn test_string_to_bool() {
        assert!(bool::with_default(&json!("true"), false));
        assert!(bool::with_default(&json!("On"), false));
        assert!(!bool::with_default(&json!("0"), true));
        assert!(bool::with_default(&json!("maybe"), true));
        assert!(bool::with_default(&json!(2), false));
    }

    #[test]
    fn test_float_and_string() {
        assert!((f64::with_default(&json!("2.5"), 0.0) - 2.5).abs() < f64::EPSILON);
        assert_eq!(String::with_default(&json!(8080), String::new()), "8080");
        assert_eq!(String::with_default(&json!({"a": 1}), "x".into()), "x");
    }

    #[test]
    fn test_f32_overflow_uses_default() {
        assert_eq!(f32::with_default(&json!(1e300), 1.5), 1.5);
        assert_eq!(f32::with_default(&json!("-1e39"), 0.0), 0.0);
        assert_eq!(f32::with_default(&json!(0.25), 0.0), 0.25);
    }

    #[test]
    fn test_map_union_keeps_existing_keys() {
        let mut default = Map::new();
        default.insert("a".into(), json!(0));
        default.insert("b".into(), json!(2));

        let merged = Map::<String, Value>::with_default(&json!({"a": 1}), default);
        assert_eq!(Value::Object(merged), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_union_is_shallow() {
        let default = json!({"db": {"host": "h", "port": 1}});
        let merged = Value::with_default(&json!({"db": {"host": "x"}}), default);
        assert_eq!(merged, json!({"db": {"host": "x"}}));
    }

    #[test]
    fn test_object_with_empty_array_default() {
        let merged = Value::with_default(&json!({"a": 1}), json!([]));
        assert_eq!(merged, json!({"a": 1}));
    }

    #[test]
    fn test_vec_index_union() {
        let merged = Vec::<String>::with_default(
            &json!(["x"]),
            vec!["a".to_string(), "b".to_string()],
        );
        assert_eq!(merged, vec!["x", "b"]);

        let single = Vec::<i64>::with_default(&json!("3"), Vec::new());
        assert_eq!(single, vec![3]);
    }

    #[test]
    fn test_value_scalar_default_picks_kind() {
        assert_eq!(Value::with_default(&json!("42"), json!(0)), json!(42));
        assert_eq!(Value::with_default(&json!("true"), json!(false)), json!(true));
        assert_eq!(Value::with_default(&json!(5), json!("")), json!("5"));
        assert_eq!(Value::with_default(&json!("abc"), json!(1)), json!(1));
        assert_eq!(Value::with_default(&json!([1]), Value::Null), json!([1]));
    }
}
