use std::fmt;

use thiserror::Error;

use crate::id::{IdParseError, SequenceId, StepId};
use crate::step::StepError;
use crate::value::PropertyBag;

/// Which way a migration runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards newer steps, applying `up` functions.
    Up,
    /// Towards older steps, applying `down` functions in reverse order.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

/// The schema history itself is malformed.
///
/// Raised while ids, sequences or the engine are being built, never while
/// records are migrated. A process that hits one of these must not start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceIntegrityError {
    /// A sequence was built with no steps.
    #[error("sequence {sequence} has no steps")]
    Empty { sequence: SequenceId },

    /// A step id came after a higher one.
    #[error("sequence {sequence}: step {found} is out of order after step {previous}")]
    OutOfOrder {
        sequence: SequenceId,
        found: u32,
        previous: u32,
    },

    /// The same step id appeared twice.
    #[error("duplicate step {step}")]
    Duplicate { step: StepId },

    /// A version was skipped.
    #[error("sequence {sequence}: expected step {expected}, found {found}")]
    Gap {
        sequence: SequenceId,
        expected: u32,
        found: u32,
    },

    /// A step id names another namespace.
    #[error("step {step} does not belong to sequence {sequence}")]
    ForeignStep { sequence: SequenceId, step: StepId },

    /// Two sequences with the same id were registered with one engine.
    #[error("sequence {sequence} registered twice")]
    DuplicateSequence { sequence: SequenceId },

    /// A step depends on a step no registered sequence provides.
    #[error("step {step} depends on unknown step {dependency}")]
    UnknownDependency { step: StepId, dependency: StepId },

    /// Dependencies between sequences form a cycle; no total order exists.
    #[error("dependency cycle between steps: {}", join_steps(.steps))]
    DependencyCycle { steps: Vec<StepId> },

    /// A registered step name was re-registered with another ordinal.
    #[error("{sequence}: step {name:?} already registered as {existing}, refusing {requested}")]
    NameConflict {
        sequence: SequenceId,
        name: String,
        existing: u32,
        requested: u32,
    },

    /// Ordinals must climb strictly above everything registered before.
    #[error("{sequence}: step {name:?} has ordinal {ordinal}, must be greater than {floor}")]
    NonIncreasing {
        sequence: SequenceId,
        name: String,
        ordinal: u32,
        floor: u32,
    },

    /// A sequence or step name could not be turned into an id.
    #[error(transparent)]
    InvalidId(#[from] IdParseError),
}

fn join_steps(steps: &[StepId]) -> String {
    steps
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why a record could not be brought to the requested version.
///
/// Every variant is a distinct, inspectable outcome. There is no fallback
/// record: the caller decides how to surface each kind.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MigrationError {
    /// The stamp is newer than anything this build knows about.
    #[error("version {stamp} is newer than the latest known step {latest}")]
    UnknownFutureVersion { stamp: StepId, latest: StepId },

    /// The stamp is older than the first step this build still carries.
    #[error("version {stamp} is older than the oldest supported version {oldest}")]
    UnsupportedOldVersion { stamp: StepId, oldest: StepId },

    /// The stamp names a namespace this build never registered.
    #[error("unknown migration sequence {sequence}")]
    UnknownSequence { sequence: SequenceId },

    /// A down migration would have to cross a step that cannot be undone.
    #[error("cannot migrate down across irreversible step {step}")]
    IrreversibleMigration { step: StepId },

    /// A step function rejected its input.
    #[error("step {step} failed while migrating {direction}: {source}")]
    StepApplicationFailed {
        step: StepId,
        direction: Direction,
        /// The bag the caller asked to migrate. Still valid for a retry.
        original: PropertyBag,
        /// The bag handed to the failing step. Differs from `original` when
        /// earlier steps of the same call already ran.
        step_input: PropertyBag,
        #[source]
        source: StepError,
    },
}

impl MigrationError {
    /// The step the failure is attributed to, if any.
    pub fn step(&self) -> Option<&StepId> {
        match self {
            Self::UnknownFutureVersion { stamp, .. }
            | Self::UnsupportedOldVersion { stamp, .. } => Some(stamp),
            Self::IrreversibleMigration { step } | Self::StepApplicationFailed { step, .. } => {
                Some(step)
            }
            Self::UnknownSequence { .. } => None,
        }
    }
}
