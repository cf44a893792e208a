//! Sequence ids, step ids and version stamps.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error parsing a [`SequenceId`], [`StepId`] or [`VersionStamp`] from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    /// Sequence ids must not be empty.
    #[error("sequence id is empty")]
    EmptySequence,
    /// `/` separates the sequence from the version and may not appear in it.
    #[error("sequence id {0:?} contains '/'")]
    SlashInSequence(String),
    /// A step id needs a `/<version>` suffix.
    #[error("step id {0:?} has no '/<version>' suffix")]
    MissingVersion(String),
    /// The version part is not a positive integer.
    #[error("step id {0:?} has an invalid version (expected an integer >= 1)")]
    InvalidVersion(String),
}

/// Names a migration namespace, usually one per record kind or one per
/// cross-cutting concern (e.g. `com.shape.geo`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceId(String);

impl SequenceId {
    /// Validate and wrap a namespace name.
    pub fn new(id: impl Into<String>) -> Result<Self, IdParseError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdParseError::EmptySequence);
        }
        if id.contains('/') {
            return Err(IdParseError::SlashInSequence(id));
        }
        Ok(Self(id))
    }

    /// For names checked elsewhere (the `#[migration_ids]` macro rejects bad
    /// ones at compile time).
    pub(crate) fn from_static(id: &'static str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id of step `version` in this namespace.
    pub fn step(&self, version: u32) -> StepId {
        StepId {
            sequence: self.clone(),
            version,
        }
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SequenceId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for SequenceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SequenceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

/// One step in one sequence: `(sequence, version)`, written `sequence/version`.
///
/// Versions start at 1. Within a sequence, step ids order by version. Across
/// sequences there is no intrinsic order: the
/// [`MigrationEngine`](crate::MigrationEngine) imposes one when the sequences
/// are registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepId {
    /// Owning namespace.
    pub sequence: SequenceId,
    /// Position inside the namespace, starting at 1.
    pub version: u32,
}

impl StepId {
    /// Build a step id, rejecting version 0.
    pub fn new(sequence: SequenceId, version: u32) -> Result<Self, IdParseError> {
        if version == 0 {
            return Err(IdParseError::InvalidVersion(format!("{sequence}/0")));
        }
        Ok(Self { sequence, version })
    }

    /// The step directly before this one in the same sequence, if any.
    pub fn previous(&self) -> Option<StepId> {
        (self.version > 1).then(|| self.sequence.step(self.version - 1))
    }

    /// Compare two steps of the same sequence. `None` across sequences.
    pub fn cmp_in_sequence(&self, other: &StepId) -> Option<Ordering> {
        (self.sequence == other.sequence).then(|| self.version.cmp(&other.version))
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.sequence, self.version)
    }
}

impl FromStr for StepId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sequence, version) = s
            .rsplit_once('/')
            .ok_or_else(|| IdParseError::MissingVersion(s.to_string()))?;
        let sequence = SequenceId::new(sequence)?;
        let version: u32 = version
            .parse()
            .map_err(|_| IdParseError::InvalidVersion(s.to_string()))?;
        Self::new(sequence, version)
    }
}

impl Serialize for StepId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StepId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The version marker stored on a record: every step up to and including
/// this one has been applied.
///
/// Serialized as `null` for [`VersionStamp::Unversioned`] and as the step id
/// string otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum VersionStamp {
    /// Pre-dates every known step.
    #[default]
    Unversioned,
    /// All steps up to and including this one are applied.
    At(StepId),
}

impl VersionStamp {
    /// The step this stamp points at, if any.
    pub fn step(&self) -> Option<&StepId> {
        match self {
            Self::Unversioned => None,
            Self::At(id) => Some(id),
        }
    }

    pub fn is_unversioned(&self) -> bool {
        matches!(self, Self::Unversioned)
    }
}

impl From<StepId> for VersionStamp {
    fn from(id: StepId) -> Self {
        Self::At(id)
    }
}

impl fmt::Display for VersionStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unversioned => f.write_str("(unversioned)"),
            Self::At(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for VersionStamp {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == "0" {
            return Ok(Self::Unversioned);
        }
        s.parse().map(Self::At)
    }
}

impl Serialize for VersionStamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unversioned => serializer.serialize_none(),
            Self::At(id) => serializer.collect_str(id),
        }
    }
}

impl<'de> Deserialize<'de> for VersionStamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(Self::Unversioned),
            Some(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
