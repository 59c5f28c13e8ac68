use std::collections::BTreeMap;

use super::value::Value;

/// A string-keyed bag of raw field values.
///
/// Used for submitted form data, the redirect bridge contents, and the data
/// carried by notifications. Keys iterate in sorted order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    data: BTreeMap<String, Value>,
}

impl Payload {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, builder style.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Look up a raw value. A key explicitly holding `Null` returns `Some(&Null)`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Look up a value, falling back to `default` when the key is absent or
    /// holds `Null`.
    #[must_use]
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        match self.data.get(key) {
            Some(value) if !value.is_null() => value.clone(),
            _ => default,
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.data.insert(key.to_owned(), value.into());
        self
    }

    /// Append to the list stored under `key`. A missing or non-list entry is
    /// replaced by a one-element list.
    pub fn push(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        match self.data.get_mut(key) {
            Some(Value::List(items)) => items.push(value),
            _ => {
                self.data.insert(key.to_owned(), Value::List(vec![value]));
            }
        }
        self
    }

    /// Whether `key` is present, even if it holds `Null`.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    #[must_use]
    pub fn all(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<BTreeMap<String, Value>> for Payload {
    fn from(data: BTreeMap<String, Value>) -> Self {
        Self { data }
    }
}
