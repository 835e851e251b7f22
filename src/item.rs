//! Item payloads and their stored encoding
//!
//! Items are opaque to the engine: they only need to round-trip through the
//! codec without loss. A payload that fails to decode during a bulk load is
//! replaced by [`Item::empty`] so a single corrupt row cannot take the rest
//! of the container with it.

use crate::Result;
use serde::{Deserialize, Serialize};

/// A single item payload stored inside a chest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub material: String,
    pub amount: u32,
    /// Free-form attachment carried through serialization untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl Item {
    pub fn new(material: impl Into<String>, amount: u32) -> Self {
        Self {
            material: material.into(),
            amount,
            meta: None,
        }
    }

    /// Placeholder substituted for a stored payload that fails to decode
    pub fn empty() -> Self {
        Self::new("air", 0)
    }

    pub fn is_empty(&self) -> bool {
        self.material == "air" && self.amount == 0
    }
}

/// Encodes items to and from their stored text form.
pub trait ItemCodec: Send + Sync {
    fn encode(&self, item: &Item) -> Result<String>;
    fn decode(&self, raw: &str) -> Result<Item>;
}

/// JSON-backed codec used by default.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonItemCodec;

impl ItemCodec for JsonItemCodec {
    fn encode(&self, item: &Item) -> Result<String> {
        Ok(serde_json::to_string(item)?)
    }

    fn decode(&self, raw: &str) -> Result<Item> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_roundtrip() {
        let codec = JsonItemCodec;
        let item = Item {
            material: "diamond_sword".to_string(),
            amount: 1,
            meta: Some(serde_json::json!({"enchant": "sharpness", "level": 5})),
        };

        let encoded = codec.encode(&item).unwrap();
        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(item, decoded);
    }

    #[test]
    fn test_corrupt_payload_is_an_error() {
        let codec = JsonItemCodec;
        assert!(codec.decode("{not json").is_err());
    }

    #[test]
    fn test_placeholder_is_empty() {
        assert!(Item::empty().is_empty());
        assert!(!Item::new("stone", 1).is_empty());
    }
}
