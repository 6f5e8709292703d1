//! Structured error extraction from JSON bodies.
//!
//! An [`ErrorStrategy`] recognizes one error shape inside a parsed JSON object.
//! An [`ErrorChain`] evaluates strategies in the order they were added and stops
//! at the first one that matches. A strategy that does not find its key, or finds
//! a value of another shape, lets the object through unchanged.

use serde_json::{Map, Value};

use crate::parse::JsonPath;
use crate::{Error, Result};

/// A recognizable error shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorStrategy {
    /// `key` holds a string equal to `expected`.
    ExactMessage { key: String, expected: String },

    /// `key` holds a string.
    MessageForKey(String),

    /// The path resolves to a string.
    MessageForPath(JsonPath),

    /// `errors_key` holds an array of objects; `message_key` is read from each.
    MessagesInArray { errors_key: String, message_key: String },

    /// `errors_key` holds an object whose values are all objects; `message_key`
    /// is read from each value.
    MessagesInDictionary { errors_key: String, message_key: String },

    /// `errors_key` holds an array of single-entry wrapper objects; `message_key`
    /// is read from the object each wrapper holds.
    MessagesInWrappedArray { errors_key: String, message_key: String },

    /// `errors_key` holds an object with values of any type; `message_key` is
    /// read from the values that are objects.
    MessagesInLooseDictionary { errors_key: String, message_key: String },

    /// `key` holds an array of strings.
    ArrayForKey(String),

    /// `key` holds an object, reported whole.
    ObjectForKey(String),
}

impl ErrorStrategy {
    /// Matches when `key` holds exactly `expected`.
    pub fn exact_message(key: impl Into<String>, expected: impl Into<String>) -> Self {
        ErrorStrategy::ExactMessage {
            key: key.into(),
            expected: expected.into(),
        }
    }

    /// Matches when `key` holds a string.
    pub fn message_for_key(key: impl Into<String>) -> Self {
        ErrorStrategy::MessageForKey(key.into())
    }

    /// Matches when `path` resolves to a string.
    pub fn message_for_path(path: JsonPath) -> Self {
        ErrorStrategy::MessageForPath(path)
    }

    /// Collects `message_key` from an array of objects at `errors_key`.
    pub fn messages_in_array(errors_key: impl Into<String>, message_key: impl Into<String>) -> Self {
        ErrorStrategy::MessagesInArray {
            errors_key: errors_key.into(),
            message_key: message_key.into(),
        }
    }

    /// Collects `message_key` from an object of objects at `errors_key`.
    pub fn messages_in_dictionary(
        errors_key: impl Into<String>,
        message_key: impl Into<String>,
    ) -> Self {
        ErrorStrategy::MessagesInDictionary {
            errors_key: errors_key.into(),
            message_key: message_key.into(),
        }
    }

    /// Collects `message_key` from single-entry wrappers in an array at `errors_key`.
    pub fn messages_in_wrapped_array(
        errors_key: impl Into<String>,
        message_key: impl Into<String>,
    ) -> Self {
        ErrorStrategy::MessagesInWrappedArray {
            errors_key: errors_key.into(),
            message_key: message_key.into(),
        }
    }

    /// Collects `message_key` from the object values at `errors_key`, skipping other values.
    pub fn messages_in_loose_dictionary(
        errors_key: impl Into<String>,
        message_key: impl Into<String>,
    ) -> Self {
        ErrorStrategy::MessagesInLooseDictionary {
            errors_key: errors_key.into(),
            message_key: message_key.into(),
        }
    }

    /// Matches when `key` holds an array of strings.
    pub fn array_for_key(key: impl Into<String>) -> Self {
        ErrorStrategy::ArrayForKey(key.into())
    }

    /// Matches when `key` holds an object.
    pub fn object_for_key(key: impl Into<String>) -> Self {
        ErrorStrategy::ObjectForKey(key.into())
    }

    /// Fails with the matching error kind if `object` has this strategy's shape.
    pub fn check(&self, object: &Map<String, Value>) -> Result<()> {
        match self.extract(object) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn extract(&self, object: &Map<String, Value>) -> Option<Error> {
        match self {
            ErrorStrategy::ExactMessage { key, expected } => object
                .get(key)
                .and_then(Value::as_str)
                .filter(|message| *message == expected.as_str())
                .map(|message| Error::ErrorMessage(message.to_string())),

            ErrorStrategy::MessageForKey(key) => object
                .get(key)
                .and_then(Value::as_str)
                .map(|message| Error::ErrorMessage(message.to_string())),

            ErrorStrategy::MessageForPath(path) => path
                .resolve_in(object)
                .and_then(Value::as_str)
                .map(|message| Error::ErrorMessage(message.to_string())),

            ErrorStrategy::MessagesInArray {
                errors_key,
                message_key,
            } => {
                let entries = all_objects(object.get(errors_key)?.as_array()?)?;
                messages(entries.into_iter(), message_key)
            }

            ErrorStrategy::MessagesInDictionary {
                errors_key,
                message_key,
            } => {
                let values: Vec<&Value> = object.get(errors_key)?.as_object()?.values().collect();
                let entries = all_objects(values)?;
                messages(entries.into_iter(), message_key)
            }

            ErrorStrategy::MessagesInWrappedArray {
                errors_key,
                message_key,
            } => {
                let wrappers = all_objects(object.get(errors_key)?.as_array()?)?;
                let inner = wrappers.into_iter().filter_map(|wrapper| {
                    if wrapper.len() != 1 {
                        return None;
                    }
                    wrapper.values().next()?.as_object()
                });
                messages(inner, message_key)
            }

            ErrorStrategy::MessagesInLooseDictionary {
                errors_key,
                message_key,
            } => {
                let entries = object
                    .get(errors_key)?
                    .as_object()?
                    .values()
                    .filter_map(Value::as_object);
                messages(entries, message_key)
            }

            ErrorStrategy::ArrayForKey(key) => object
                .get(key)?
                .as_array()?
                .iter()
                .map(|value| value.as_str().map(str::to_string))
                .collect::<Option<Vec<String>>>()
                .map(Error::ErrorMessages),

            ErrorStrategy::ObjectForKey(key) => object
                .get(key)
                .and_then(Value::as_object)
                .map(|errors| Error::ErrorObject(errors.clone())),
        }
    }
}

/// Every value as an object, or `None` if any value is not an object.
fn all_objects<'a>(
    values: impl IntoIterator<Item = &'a Value>,
) -> Option<Vec<&'a Map<String, Value>>> {
    values.into_iter().map(Value::as_object).collect()
}

/// Collects `message_key` strings, skipping entries without one. `None` if empty.
fn messages<'a>(
    entries: impl Iterator<Item = &'a Map<String, Value>>,
    message_key: &str,
) -> Option<Error> {
    let found: Vec<String> = entries
        .filter_map(|entry| entry.get(message_key)?.as_str().map(str::to_string))
        .collect();

    if found.is_empty() {
        None
    } else {
        Some(Error::ErrorMessages(found))
    }
}

/// An ordered list of [`ErrorStrategy`] values.
///
/// # Examples
///
/// ```
/// use tracewire::{Error, ErrorChain, ErrorStrategy};
/// use serde_json::json;
///
/// let chain = ErrorChain::new()
///     .then(ErrorStrategy::exact_message("status", "nope"))
///     .then(ErrorStrategy::array_for_key("errors"));
///
/// let body = json!({ "errors": ["x", "y"] });
/// match chain.check(body.as_object().unwrap()) {
///     Err(Error::ErrorMessages(messages)) => assert_eq!(messages, vec!["x", "y"]),
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorChain {
    strategies: Vec<ErrorStrategy>,
}

impl ErrorChain {
    /// An empty chain, which accepts every object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a strategy, evaluated after those already present.
    pub fn then(mut self, strategy: ErrorStrategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// The strategies in evaluation order.
    pub fn strategies(&self) -> &[ErrorStrategy] {
        &self.strategies
    }

    /// Returns `true` if the chain has no strategies.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Runs the strategies in order; the first match fails the check.
    pub fn check(&self, object: &Map<String, Value>) -> Result<()> {
        for strategy in &self.strategies {
            if let Some(error) = strategy.extract(object) {
                tracing::debug!(strategy = ?strategy, error = %error, "Error shape found in body");
                return Err(error);
            }
        }
        Ok(())
    }

    /// Like [`ErrorChain::check`], passing the object through on success.
    pub fn apply(&self, object: Map<String, Value>) -> Result<Map<String, Value>> {
        self.check(&object)?;
        Ok(object)
    }
}

impl FromIterator<ErrorStrategy> for ErrorChain {
    fn from_iter<I: IntoIterator<Item = ErrorStrategy>>(iter: I) -> Self {
        Self {
            strategies: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<ErrorStrategy>> for ErrorChain {
    fn from(strategies: Vec<ErrorStrategy>) -> Self {
        Self { strategies }
    }
}
