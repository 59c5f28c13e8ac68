use std::collections::BTreeMap;

use super::value::Value;

/// The resolved value of every monitored parent at the time a form was built.
///
/// Embedded as JSON into the hidden state field so a later request can tell
/// which parent values the rendered form was built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    values: BTreeMap<String, Value>,
}

impl StateSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, parent: &str, value: Value) {
        self.values.insert(parent.to_owned(), value);
    }

    #[must_use]
    pub fn get(&self, parent: &str) -> Option<&Value> {
        self.values.get(parent)
    }

    #[must_use]
    pub fn contains(&self, parent: &str) -> bool {
        self.values.contains_key(parent)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Encode as a compact JSON object.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if encoding fails.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let map: serde_json::Map<String, serde_json::Value> = self
            .values
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        serde_json::to_string(&map)
    }

    /// Decode a snapshot produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if `encoded` is not a JSON object.
    pub fn decode(encoded: &str) -> Result<Self, serde_json::Error> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(encoded)?;
        Ok(Self {
            values: map
                .iter()
                .map(|(name, json)| (name.clone(), Value::from_json(json)))
                .collect(),
        })
    }
}
