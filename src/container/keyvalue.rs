//! Key/value metadata block

use rkyv::{Archive, Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Archive, Deserialize, Serialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
}

/// Ordered provenance pairs
#[derive(Clone, Debug, Default, PartialEq, Eq, Archive, Deserialize, Serialize)]
pub struct KeyValueBlock {
    pub pairs: Vec<KeyValuePair>,
}

impl KeyValueBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair; returns false if `key` is already present
    pub fn add_pair(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.get(&key).is_some() {
            return false;
        }
        self.pairs.push(KeyValuePair { key, value: value.into() });
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|pair| pair.key == key)
            .map(|pair| pair.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_keep_order() {
        let mut block = KeyValueBlock::new();
        assert!(block.add_pair("Data Source", "volsynth"));
        assert!(block.add_pair("Source Type", "integer"));
        assert!(!block.add_pair("Data Source", "other"));

        assert_eq!(block.len(), 2);
        assert_eq!(block.get("Data Source"), Some("volsynth"));
        assert_eq!(block.pairs[1].key, "Source Type");
        assert_eq!(block.get("missing"), None);
    }
}
