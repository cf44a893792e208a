use serde::{Deserialize, Serialize};

use crate::id::VersionStamp;
use crate::value::PropertyBag;

/// A persisted, versioned property bag.
///
/// The engine never looks at `id` or `kind`; they are carried so loaders
/// and diagnostics can name the record that failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier unique within its document.
    pub id: String,
    /// Record kind, used to pick the sequences and schema that apply.
    pub kind: String,
    /// Which steps have been applied.
    #[serde(default)]
    pub stamp: VersionStamp,
    /// The record's fields.
    #[serde(default)]
    pub props: PropertyBag,
}

impl Record {
    /// A record that pre-dates every migration step.
    pub fn unversioned(id: impl Into<String>, kind: impl Into<String>, props: PropertyBag) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            stamp: VersionStamp::Unversioned,
            props,
        }
    }

    /// Same record, re-stamped.
    pub fn at(mut self, stamp: impl Into<VersionStamp>) -> Self {
        self.stamp = stamp.into();
        self
    }
}
