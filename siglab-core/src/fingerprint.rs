//! Run fingerprinting — deterministic identification of a pipeline
//! configuration.
//!
//! Canonical serialization: weight maps are `BTreeMap`s, so serde_json
//! produces deterministic key order and the hash is stable across runs.

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;

/// blake3 hash of the canonical JSON form of a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(String);

impl ConfigHash {
    /// Hash a configuration. Two configs hash equal iff every parameter
    /// matches.
    pub fn of(config: &PipelineConfig) -> Self {
        let json = serde_json::to_string(config).expect("PipelineConfig must serialize");
        Self(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
