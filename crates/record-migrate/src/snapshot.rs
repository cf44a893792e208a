//! Persisted document shape: records plus the writer's schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::SequenceId;
use crate::record::Record;

/// Format version of [`SerializedSchema`] itself.
pub const SCHEMA_FORMAT_VERSION: u32 = 1;

/// The per-sequence versions a build knew when it wrote a document.
///
/// ```json
/// { "schemaVersion": 1, "sequences": { "com.shape": 3, "com.shape.geo": 10 } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedSchema {
    /// Layout version of this struct.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Latest applied version per sequence.
    pub sequences: BTreeMap<SequenceId, u32>,
}

fn default_schema_version() -> u32 {
    SCHEMA_FORMAT_VERSION
}

impl SerializedSchema {
    pub fn new(sequences: impl IntoIterator<Item = (SequenceId, u32)>) -> Self {
        Self {
            schema_version: SCHEMA_FORMAT_VERSION,
            sequences: sequences.into_iter().collect(),
        }
    }

    /// Version recorded for `sequence`; 0 when the writer did not know it.
    pub fn version_of(&self, sequence: &SequenceId) -> u32 {
        self.sequences.get(sequence).copied().unwrap_or(0)
    }
}

/// A whole persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    /// What the writing build knew.
    pub schema: SerializedSchema,
    /// Every record in the document.
    pub records: Vec<Record>,
}

impl DocumentSnapshot {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
