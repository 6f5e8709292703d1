//! Response body deserialization.
//!
//! Shape-checking decoders report [`DeserializationError`] variants that name the
//! expected shape. They hold the parser error when the bytes were not JSON at
//! all and `None` when the JSON had the wrong shape.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::DeserializationError;
use crate::Result;

/// Accepts any body.
pub fn ignored(_bytes: &[u8]) -> Result<()> {
    Ok(())
}

/// Parses any JSON value, scalars included.
pub fn to_any_json(bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice(bytes).map_err(|e| DeserializationError::ToAny(e).into())
}

/// Parses a JSON object.
pub fn to_dict_json(bytes: &[u8]) -> Result<Map<String, Value>> {
    match serde_json::from_slice(bytes) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(DeserializationError::ToDict(None).into()),
        Err(e) => Err(DeserializationError::ToDict(Some(e)).into()),
    }
}

/// Parses a JSON array.
pub fn to_array_json(bytes: &[u8]) -> Result<Vec<Value>> {
    match serde_json::from_slice(bytes) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) => Err(DeserializationError::ToArray(None).into()),
        Err(e) => Err(DeserializationError::ToArray(Some(e)).into()),
    }
}

/// Parses a JSON array whose elements are all objects.
pub fn to_dict_array_json(bytes: &[u8]) -> Result<Vec<Map<String, Value>>> {
    to_array_json(bytes)?
        .into_iter()
        .map(|item| match item {
            Value::Object(object) => Ok(object),
            _ => Err(DeserializationError::ToArray(None).into()),
        })
        .collect()
}

/// Decodes UTF-8 text.
pub fn to_string(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| DeserializationError::ToString(e).into())
}

/// Decodes JSON into a concrete type.
pub fn to_typed<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|source| {
        DeserializationError::ToType {
            type_name: std::any::type_name::<T>(),
            source,
        }
        .into()
    })
}
