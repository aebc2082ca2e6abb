//! Contract context consumed by condition evaluation
//!
//! The engine never stores or edits contracts; it reads this snapshot
//! from the contract store when it needs to evaluate a condition or
//! match a definition. The attribute bag is free-form JSON, looked up
//! by dotted path.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A read-only snapshot of the contract attributes the engine can see
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractSummary {
    #[serde(rename = "type")]
    pub contract_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub amount: f64,
    /// Arbitrary key/value attributes, traversed by dotted path
    #[serde(default)]
    pub attributes: Value,
}

impl ContractSummary {
    pub fn new(contract_type: impl Into<String>, amount: f64) -> Self {
        Self {
            contract_type: contract_type.into(),
            subtype: None,
            amount,
            attributes: Value::Null,
        }
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        if !self.attributes.is_object() {
            self.attributes = Value::Object(serde_json::Map::new());
        }
        if let Some(map) = self.attributes.as_object_mut() {
            map.insert(key.into(), value);
        }
        self
    }

    /// Look up an attribute by dotted path, e.g. `"vendor.rating"`.
    ///
    /// Returns `None` for a missing segment or a non-object midway.
    pub fn attribute(&self, path: &str) -> Option<&Value> {
        let mut current = &self.attributes;
        for segment in path.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_lookup() {
        let contract = ContractSummary::new("MAINTENANCE_SERVICE", 50_000.0)
            .with_subtype("B1")
            .with_attribute("urgent", json!(true))
            .with_attribute("vendor", json!({ "rating": 4, "name": "Acme" }));

        assert_eq!(contract.attribute("urgent"), Some(&json!(true)));
        assert_eq!(contract.attribute("vendor.rating"), Some(&json!(4)));
        assert!(contract.attribute("vendor.missing").is_none());
        assert!(contract.attribute("missing").is_none());
        // traversal through a scalar is a miss, not a panic
        assert!(contract.attribute("urgent.deeper").is_none());
    }

    #[test]
    fn test_empty_bag() {
        let contract = ContractSummary::new("EQUIPMENT_PURCHASE", 10.0);
        assert!(contract.attribute("anything").is_none());
    }
}
