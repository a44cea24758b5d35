//! Conversion between Firestore typed values and plain JSON.
//!
//! Firestore wraps every value in a one-key object naming its type
//! (`{"integerValue": "42"}`); the core schema works on plain JSON.

use serde_json::{Map, Number, Value};

/// Decodes a document's `fields` object.
pub fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), decode_value(value)))
        .collect()
}

/// Decodes one typed value. Unknown shapes decode to `null`.
pub fn decode_value(value: &Value) -> Value {
    let Some(object) = value.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = object.iter().next() else {
        return Value::Null;
    };

    match kind.as_str() {
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "booleanValue" => inner.clone(),
        // int64 travels as a decimal string
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            Value::Number(_) => inner.clone(),
            _ => Value::Null,
        },
        "doubleValue" => match inner {
            Value::Number(_) => inner.clone(),
            // NaN and the infinities are sent as strings
            _ => Value::Null,
        },
        "mapValue" => inner
            .get("fields")
            .and_then(Value::as_object)
            .map(|fields| Value::Object(decode_fields(fields)))
            .unwrap_or_else(|| Value::Object(Map::new())),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}

/// Encodes plain JSON as a typed value.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json_object("nullValue", Value::Null),
        Value::Bool(b) => json_object("booleanValue", Value::Bool(*b)),
        Value::Number(n) => encode_number(n),
        Value::String(s) => json_object("stringValue", Value::String(s.clone())),
        Value::Array(values) => {
            let values: Vec<Value> = values.iter().map(encode_value).collect();
            json_object("arrayValue", json_object("values", Value::Array(values)))
        }
        Value::Object(fields) => {
            let fields: Map<String, Value> = fields
                .iter()
                .map(|(name, value)| (name.clone(), encode_value(value)))
                .collect();
            json_object("mapValue", json_object("fields", Value::Object(fields)))
        }
    }
}

fn encode_number(n: &Number) -> Value {
    match n.as_i64() {
        Some(i) => json_object("integerValue", Value::String(i.to_string())),
        None => json_object("doubleValue", Value::Number(n.clone())),
    }
}

/// Typed double, used for prices so the dashboard always reads a number.
pub fn double_value(value: f64) -> Value {
    match Number::from_f64(value) {
        Some(n) => json_object("doubleValue", Value::Number(n)),
        None => json_object("nullValue", Value::Null),
    }
}

fn json_object(key: &str, value: Value) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// Quotes a field name for use in a field path (`updateMask`, transforms).
///
/// Simple names (letters, digits, underscores, not starting with a digit)
/// pass through; anything else is wrapped in backticks.
pub fn field_path(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}
