use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::btree::{BPlusTreeError, BPlusTreeResult, DEFAULT_ORDER};

/// Tree construction settings, loadable from JSON
///
/// Missing fields fall back to their defaults, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BPlusTreeConfig {
    /// Tree order: max keys per node is `order - 1`
    pub order: usize,
}

impl Default for BPlusTreeConfig {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
        }
    }
}

impl BPlusTreeConfig {
    pub fn new(order: usize) -> Self {
        Self { order }
    }

    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> BPlusTreeResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> BPlusTreeResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> BPlusTreeResult<()> {
        if self.order < 3 {
            return Err(BPlusTreeError::InvalidOrder(self.order));
        }
        Ok(())
    }

    pub fn to_json_string(&self) -> BPlusTreeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
