//! The raw, unvalidated inputs handed over by the hosting framework.
//!
//! Route parameters and query parameters travel over the wire as strings: a key either
//! maps to a single string, to a list of strings (e.g. a repeated query key or a catch-all
//! route segment) or it's there with no value at all.
//! [`RawInput`] captures exactly that, nothing more.
use std::borrow::Cow;

use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use indexmap::map::Entry;
use percent_encoding::percent_decode_str;

use crate::errors::InvalidUtf8InRouteParam;

/// A value that is not available yet.
///
/// Deferred inputs are owned and produced by the hosting framework.
pub type Deferred<T> = BoxFuture<'static, T>;

/// The value associated with a key in a [`RawInput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// The key appeared once.
    Single(String),
    /// The key appeared multiple times, or it's a catch-all route segment.
    Multiple(Vec<String>),
    /// The key is present, but it carries no value.
    Absent,
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Single(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Single(value.to_owned())
    }
}

impl From<Vec<String>> for RawValue {
    fn from(values: Vec<String>) -> Self {
        RawValue::Multiple(values)
    }
}

impl<const N: usize> From<[&str; N]> for RawValue {
    fn from(values: [&str; N]) -> Self {
        RawValue::Multiple(values.iter().map(|v| (*v).to_owned()).collect())
    }
}

impl<T> From<Option<T>> for RawValue
where
    T: Into<RawValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => RawValue::Absent,
        }
    }
}

/// Raw route or query parameters, keyed by name.
///
/// Keys are kept in insertion order.
///
/// # Example
///
/// ```rust
/// use safe_page::input::{RawInput, RawValue};
///
/// let query = RawInput::from_query("tags=rust&tags=web&theme=dark");
/// assert_eq!(query.get("theme"), Some(&RawValue::Single("dark".into())));
/// assert_eq!(query.get("tags"), Some(&RawValue::from(["rust", "web"])));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawInput(IndexMap<String, RawValue>);

impl RawInput {
    /// An empty input, e.g. a request without a query string.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value for `key`, replacing whatever was there before.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Add a value for `key`.
    ///
    /// If `key` already has a value, the two are merged into a [`RawValue::Multiple`].
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        match self.0.entry(key.into()) {
            Entry::Vacant(e) => {
                e.insert(RawValue::Single(value));
            }
            Entry::Occupied(mut e) => {
                let merged = match std::mem::replace(e.get_mut(), RawValue::Absent) {
                    RawValue::Single(first) => RawValue::Multiple(vec![first, value]),
                    RawValue::Multiple(mut values) => {
                        values.push(value);
                        RawValue::Multiple(values)
                    }
                    RawValue::Absent => RawValue::Single(value),
                };
                *e.get_mut() = merged;
            }
        }
    }

    /// Returns the value registered under the given key.
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.0.get(key)
    }

    /// Returns an iterator over the keys and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a URL query string (without the leading `?`).
    ///
    /// Percent-encoded sequences and `+` are decoded.
    /// Repeated keys are collected into a [`RawValue::Multiple`], in order of appearance.
    pub fn from_query(query: &str) -> Self {
        let mut input = Self::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            input.append(key, value);
        }
        input
    }

    /// Build the input from route parameters as they appear in the URL, i.e. percent-encoded.
    ///
    /// Each value is percent-decoded.
    /// If decoding fails, an [`InvalidUtf8InRouteParam`] is returned.
    pub fn from_encoded_route_params<'a, I>(params: I) -> Result<Self, InvalidUtf8InRouteParam>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut input = Self::new();
        for (key, value) in params {
            let decoded: Cow<'_, str> = percent_decode_str(value).decode_utf8().map_err(|e| {
                InvalidUtf8InRouteParam {
                    invalid_key: key.into(),
                    invalid_raw_segment: value.into(),
                    source: e,
                }
            })?;
            input.0.insert(key.to_owned(), RawValue::Single(decoded.into_owned()));
        }
        Ok(input)
    }
}

impl<K, V> FromIterator<(K, V)> for RawInput
where
    K: Into<String>,
    V: Into<RawValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
