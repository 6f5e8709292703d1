//! Request body serialization.

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::SerializationError;
use crate::Result;

/// Encodes `value` as JSON.
///
/// # Errors
///
/// Returns [`SerializationError::ToJson`] carrying the encoder error.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| SerializationError::ToJson(e).into())
}

/// Encodes an already generic JSON value.
pub fn from_json_value(value: &Value) -> Result<Bytes> {
    to_json(value)
}

/// Encodes a string-keyed mapping as `application/x-www-form-urlencoded`.
///
/// Each pair becomes `key=value`, nested mappings become `parent[child]=value`
/// and array items become `key[]=item`. Keys and values are percent-encoded,
/// brackets are kept literal.
///
/// # Errors
///
/// Returns [`SerializationError::ToFormUrlEncoded`] if `value` does not
/// serialize to a JSON object.
///
/// # Examples
///
/// ```
/// use tracewire::serialize::to_form_urlencoded;
/// use serde_json::json;
///
/// let body = to_form_urlencoded(&json!({ "user": { "name": "Ada L" }, "admin": true })).unwrap();
/// assert_eq!(&body[..], b"admin=true&user[name]=Ada+L");
/// ```
pub fn to_form_urlencoded<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    let Ok(Value::Object(map)) = serde_json::to_value(value) else {
        return Err(SerializationError::ToFormUrlEncoded.into());
    };

    let mut encoded = String::new();
    append_pairs(&mut encoded, &map, None);

    // Every pair is written with a leading separator, the first one included.
    if encoded.starts_with('&') {
        encoded.remove(0);
    }
    Ok(Bytes::from(encoded))
}

fn append_pairs(encoded: &mut String, map: &Map<String, Value>, parent: Option<&str>) {
    for (key, value) in map {
        let name = match parent {
            Some(parent) => format!("{}[{}]", parent, form_encode(key)),
            None => form_encode(key),
        };
        append_value(encoded, &name, value);
    }
}

fn append_value(encoded: &mut String, name: &str, value: &Value) {
    match value {
        Value::Object(nested) => append_pairs(encoded, nested, Some(name)),
        Value::Array(items) => {
            let item_name = format!("{}[]", name);
            for item in items {
                append_value(encoded, &item_name, item);
            }
        }
        scalar => {
            encoded.push('&');
            encoded.push_str(name);
            encoded.push('=');
            encoded.push_str(&form_encode(&scalar_text(scalar)));
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn form_encode(text: &str) -> String {
    url::form_urlencoded::byte_serialize(text.as_bytes()).collect()
}
