//! Candidate strategy definitions.
//!
//! A definition is an opaque value object: an identifier, a family tag and a
//! parameter mapping that the compiler collaborator uses to regenerate the
//! executable artifact. The evaluation engine never interprets the params.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything needed to regenerate a candidate's artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDefinition {
    /// Short unique identifier (e.g. "V3").
    pub id: String,
    /// Strategy family tag (e.g. "VolResponsive").
    pub family: String,
    /// Named parameters, kept sorted so the fingerprint is canonical.
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

impl CandidateDefinition {
    pub fn new(id: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            family: family.into(),
            params: BTreeMap::new(),
        }
    }

    /// Builder-style parameter insertion.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// BLAKE3 hex digest of the canonical JSON form (object keys sorted).
    ///
    /// Definitions with equal content share a fingerprint regardless of the
    /// order their params were inserted in.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::json!({
            "id": self.id,
            "family": self.family,
            "params": self.params,
        });
        blake3::hash(canonical.to_string().as_bytes())
            .to_hex()
            .to_string()
    }
}
