use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::constants::{ATTR_CATEGORY, ATTR_NAME};
use crate::error::TraceError;

/// Free-form product attributes carried by `create` and `amend` records.
///
/// Keys are compared exactly; merging is shallow, so a nested object in a
/// later patch replaces the earlier one wholesale.
#[derive(Clone, PartialEq, Default, Serialize, Deserialize, Debug)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of `key`, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str(ATTR_NAME)
    }

    pub fn category(&self) -> Option<&str> {
        self.get_str(ATTR_CATEGORY)
    }

    /// Require a non-blank string `name`; returns it trimmed.
    pub fn require_name(&self) -> Result<&str, TraceError> {
        match self.name().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(TraceError::MissingProductName),
        }
    }

    /// Overwrite same-named fields with those from `patch` (last write wins).
    pub fn merge_from(&mut self, patch: &Attributes) {
        for (key, value) in &patch.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_is_shallow_last_write_wins() {
        let mut base = Attributes::new()
            .with("a", 1)
            .with("b", 2)
            .with("origin", json!({"province": "Shandong", "city": "Shouguang"}));
        let patch = Attributes::new()
            .with("b", 3)
            .with("origin", json!({"province": "Hebei"}));

        base.merge_from(&patch);

        assert_eq!(base.get("a"), Some(&json!(1)));
        assert_eq!(base.get("b"), Some(&json!(3)));
        assert_eq!(base.get("origin"), Some(&json!({"province": "Hebei"})));
    }

    #[test]
    fn require_name_rejects_blank_and_non_string() {
        assert!(Attributes::new().require_name().is_err());
        assert!(Attributes::new().with("name", "   ").require_name().is_err());
        assert!(Attributes::new().with("name", 7).require_name().is_err());
        assert_eq!(
            Attributes::new().with("name", " Tomato ").require_name().unwrap(),
            "Tomato"
        );
    }

    #[test]
    fn serializes_as_plain_object() {
        let attrs = Attributes::new().with("name", "Tomato").with("quantity", 500);
        let v = serde_json::to_value(&attrs).unwrap();
        assert_eq!(v, json!({"name": "Tomato", "quantity": 500}));
    }
}
