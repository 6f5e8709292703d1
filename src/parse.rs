//! Structured access into parsed JSON output.
//!
//! [`JsonPath`] addresses a value inside nested objects and arrays with a
//! dot/bracket syntax such as `error.details[0].message`. The accessor functions
//! turn a missing value into the matching [`Error`] kind.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// One step of a [`JsonPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A path through nested JSON objects and arrays.
///
/// # Examples
///
/// ```
/// use tracewire::parse::JsonPath;
/// use serde_json::json;
///
/// let path: JsonPath = "errors[1].message".parse().unwrap();
/// let body = json!({ "errors": [{ "message": "a" }, { "message": "b" }] });
///
/// assert_eq!(path.resolve(&body), Some(&json!("b")));
/// assert_eq!(path.to_string(), "errors[1].message");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JsonPath {
    segments: Vec<PathSegment>,
}

/// A path string that could not be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid JSON path: {0:?}")]
pub struct InvalidPath(pub String);

impl From<InvalidPath> for Error {
    fn from(error: InvalidPath) -> Self {
        Error::Undefined(Box::new(error))
    }
}

impl JsonPath {
    /// Builds a path from segments. It must start with a key.
    pub fn from_segments(segments: Vec<PathSegment>) -> std::result::Result<Self, InvalidPath> {
        match segments.first() {
            Some(PathSegment::Key(_)) => Ok(Self { segments }),
            _ => Err(InvalidPath(format!("{:?}", segments))),
        }
    }

    /// A single-key path.
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            segments: vec![PathSegment::Key(key.into())],
        }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Follows the path from `value`.
    pub fn resolve<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(value, |current, segment| match segment {
                PathSegment::Key(key) => current.as_object()?.get(key),
                PathSegment::Index(index) => current.as_array()?.get(*index),
            })
    }

    /// Follows the path from a JSON object.
    pub fn resolve_in<'a>(&self, object: &'a Map<String, Value>) -> Option<&'a Value> {
        let (first, rest) = self.segments.split_first()?;
        let PathSegment::Key(key) = first else {
            return None;
        };

        rest.iter()
            .try_fold(object.get(key)?, |current, segment| match segment {
                PathSegment::Key(key) => current.as_object()?.get(key),
                PathSegment::Index(index) => current.as_array()?.get(*index),
            })
    }
}

impl FromStr for JsonPath {
    type Err = InvalidPath;

    fn from_str(path: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || InvalidPath(path.to_string());
        let mut segments = Vec::new();

        for part in path.split('.') {
            let split = part.find('[').unwrap_or(part.len());
            let (key, mut rest) = part.split_at(split);

            // Every dot-separated part starts with a key.
            if key.is_empty() || key.contains(']') {
                return Err(invalid());
            }
            segments.push(PathSegment::Key(key.to_string()));

            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(invalid)?;
                let index = rest
                    .get(1..close)
                    .filter(|digits| !digits.is_empty() && rest.starts_with('['))
                    .and_then(|digits| digits.parse::<usize>().ok())
                    .ok_or_else(invalid)?;
                segments.push(PathSegment::Index(index));
                rest = &rest[close + 1..];
            }
        }

        Ok(Self { segments })
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if position == 0 => f.write_str(key)?,
                PathSegment::Key(key) => write!(f, ".{}", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// Returns the value at `path`, or [`Error::NoValueAtPath`].
pub fn get_element<'a>(object: &'a Map<String, Value>, path: &JsonPath) -> Result<&'a Value> {
    path.resolve_in(object)
        .ok_or_else(|| Error::NoValueAtPath(path.clone()))
}

/// Decodes the value at `path` as `T`.
///
/// A value of the wrong type is reported the same way as a missing one.
///
/// # Examples
///
/// ```
/// use tracewire::parse::get_typed;
/// use serde_json::json;
///
/// let body = json!({ "user": { "id": 7 } });
/// let id: u64 = get_typed(body.as_object().unwrap(), &"user.id".parse().unwrap()).unwrap();
/// assert_eq!(id, 7);
/// ```
pub fn get_typed<T: DeserializeOwned>(object: &Map<String, Value>, path: &JsonPath) -> Result<T> {
    let value = get_element(object, path)?;
    T::deserialize(value).map_err(|_| Error::NoValueAtPath(path.clone()))
}

/// Returns the element at `index`, or [`Error::NoValueInArray`].
pub fn get_index<T>(items: &[T], index: usize) -> Result<&T> {
    items.get(index).ok_or(Error::NoValueInArray { index })
}

/// Passes `items` through unless it is empty, which is [`Error::NoResults`].
pub fn non_empty<T>(items: Vec<T>) -> Result<Vec<T>> {
    if items.is_empty() {
        Err(Error::NoResults)
    } else {
        Ok(items)
    }
}

/// Fails with [`Error::ErrorMessage`] when `text` is exactly `expected`.
pub fn check_message<'a>(text: &'a str, expected: &str) -> Result<&'a str> {
    if text == expected {
        Err(Error::ErrorMessage(text.to_string()))
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_keys_and_indices() {
        let path: JsonPath = "a.b[2][0].c".parse().unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("a".to_string()),
                PathSegment::Key("b".to_string()),
                PathSegment::Index(2),
                PathSegment::Index(0),
                PathSegment::Key("c".to_string()),
            ]
        );
        assert_eq!(path.to_string(), "a.b[2][0].c");
    }

    #[test]
    fn rejects_malformed_paths() {
        for path in ["", "a..b", "a[", "a[x]", "a[]", "[0]", "a]b", "a[1]b"] {
            assert!(path.parse::<JsonPath>().is_err(), "{path} should be rejected");
        }
    }

    #[test]
    fn missing_values_are_reported_with_their_path() {
        let body = json!({ "error": { "message": "boom" } });
        let object = body.as_object().unwrap();

        let found = get_element(object, &"error.message".parse().unwrap()).unwrap();
        assert_eq!(found, &json!("boom"));

        let missing: JsonPath = "error.code".parse().unwrap();
        match get_element(object, &missing) {
            Err(Error::NoValueAtPath(path)) => assert_eq!(path, missing),
            other => panic!("Expected NoValueAtPath, got {:?}", other),
        }

        let wrong_type = get_typed::<u32>(object, &"error.message".parse().unwrap());
        assert!(matches!(wrong_type, Err(Error::NoValueAtPath(_))));
    }

    #[test]
    fn index_and_result_set_checks() {
        let items = vec!["a", "b"];
        assert_eq!(get_index(&items, 1).unwrap(), &"b");
        assert!(matches!(get_index(&items, 2), Err(Error::NoValueInArray { index: 2 })));

        assert!(matches!(non_empty(Vec::<u8>::new()), Err(Error::NoResults)));
        assert_eq!(non_empty(vec![1]).unwrap(), vec![1]);
    }

    #[test]
    fn exact_message_check() {
        assert_eq!(check_message("fine", "KO").unwrap(), "fine");
        assert!(matches!(check_message("KO", "KO"), Err(Error::ErrorMessage(m)) if m == "KO"));
    }
}
