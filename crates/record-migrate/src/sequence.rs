use crate::error::SequenceIntegrityError;
use crate::id::{SequenceId, StepId};
use crate::step::MigrationStep;

/// The ordered, frozen history of one namespace.
///
/// Built once at startup through [`MigrationSequence::builder`]. Construction
/// checks that step versions run `first..=last` with no gaps, duplicates or
/// reordering, so a broken history fails the build instead of corrupting
/// documents at load time.
///
/// # Example
///
/// ```
/// use record_migrate::{Down, MigrationSequence, PropertyBag, SequenceId};
///
/// let id = SequenceId::new("com.shape.note").unwrap();
/// let seq = MigrationSequence::builder(id.clone())
///     .step(id.step(1), |p: PropertyBag| Ok(p.with("url", "")), Down::NotReversible)
///     .step(
///         id.step(2),
///         |p: PropertyBag| Ok(p.with("scale", 1)),
///         Down::reversible(|p: PropertyBag| Ok(p.without("scale"))),
///     )
///     .build()
///     .unwrap();
///
/// assert_eq!(seq.min_version(), 1);
/// assert_eq!(seq.max_version(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MigrationSequence {
    id: SequenceId,
    steps: Vec<MigrationStep>,
}

impl MigrationSequence {
    /// Start building the sequence for `id`.
    pub fn builder(id: SequenceId) -> MigrationSequenceBuilder {
        MigrationSequenceBuilder {
            id,
            previous_max: 0,
            steps: Vec::new(),
        }
    }

    pub fn id(&self) -> &SequenceId {
        &self.id
    }

    /// Steps in version order.
    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Lowest version this sequence knows.
    pub fn min_version(&self) -> u32 {
        self.steps.first().map_or(0, |s| s.id().version)
    }

    /// Highest version this sequence knows.
    pub fn max_version(&self) -> u32 {
        self.steps.last().map_or(0, |s| s.id().version)
    }

    /// Id of the newest step.
    pub fn latest(&self) -> StepId {
        self.id.step(self.max_version())
    }

    /// Look up a step by version.
    pub fn step(&self, version: u32) -> Option<&MigrationStep> {
        let first = self.min_version();
        if version < first {
            return None;
        }
        self.steps.get((version - first) as usize)
    }

    pub fn contains(&self, step: &StepId) -> bool {
        step.sequence == self.id && self.step(step.version).is_some()
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Collects steps for a [`MigrationSequence`]; validation happens in
/// [`build`](Self::build).
#[derive(Debug)]
pub struct MigrationSequenceBuilder {
    id: SequenceId,
    previous_max: u32,
    steps: Vec<MigrationStep>,
}

impl MigrationSequenceBuilder {
    /// Continue a namespace whose history already reached `previous_max`:
    /// the first step must then be `previous_max + 1`.
    pub fn starting_after(mut self, previous_max: u32) -> Self {
        self.previous_max = previous_max;
        self
    }

    /// Append a step built from its parts.
    pub fn step<F>(self, id: StepId, up: F, down: crate::Down) -> Self
    where
        F: Fn(crate::PropertyBag) -> Result<crate::PropertyBag, crate::StepError>
            + Send
            + Sync
            + 'static,
    {
        self.with_step(MigrationStep::new(id, up, down))
    }

    /// Append an already constructed step (e.g. one carrying dependencies).
    pub fn with_step(mut self, step: MigrationStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Validate and freeze.
    pub fn build(self) -> Result<MigrationSequence, SequenceIntegrityError> {
        if self.steps.is_empty() {
            return Err(SequenceIntegrityError::Empty { sequence: self.id });
        }

        let mut previous = self.previous_max;
        for step in &self.steps {
            let id = step.id();
            if id.sequence != self.id {
                return Err(SequenceIntegrityError::ForeignStep {
                    sequence: self.id.clone(),
                    step: id.clone(),
                });
            }
            let expected = previous + 1;
            if id.version == previous && previous > self.previous_max {
                return Err(SequenceIntegrityError::Duplicate { step: id.clone() });
            }
            if id.version < expected {
                return Err(SequenceIntegrityError::OutOfOrder {
                    sequence: self.id.clone(),
                    found: id.version,
                    previous,
                });
            }
            if id.version > expected {
                return Err(SequenceIntegrityError::Gap {
                    sequence: self.id.clone(),
                    expected,
                    found: id.version,
                });
            }
            previous = id.version;
        }

        Ok(MigrationSequence {
            id: self.id,
            steps: self.steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Down, PropertyBag};

    fn seq_id() -> SequenceId {
        SequenceId::new("shape-kind-x").unwrap()
    }

    fn noop(id: StepId) -> MigrationStep {
        MigrationStep::new(id, Ok, Down::identity())
    }

    fn build(versions: &[u32]) -> Result<MigrationSequence, SequenceIntegrityError> {
        let id = seq_id();
        versions
            .iter()
            .fold(MigrationSequence::builder(id.clone()), |b, v| {
                b.with_step(noop(id.step(*v)))
            })
            .build()
    }

    #[test]
    fn contiguous_sequence_builds() {
        let seq = build(&[1, 2, 3]).unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.min_version(), 1);
        assert_eq!(seq.max_version(), 3);
        assert_eq!(seq.latest(), seq_id().step(3));
        assert!(seq.contains(&seq_id().step(2)));
        assert!(!seq.contains(&seq_id().step(4)));
    }

    #[test]
    fn empty_sequence_fails() {
        assert_eq!(
            build(&[]).unwrap_err(),
            SequenceIntegrityError::Empty { sequence: seq_id() }
        );
    }

    #[test]
    fn gap_fails() {
        assert_eq!(
            build(&[1, 3]).unwrap_err(),
            SequenceIntegrityError::Gap {
                sequence: seq_id(),
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn must_start_at_one() {
        assert_eq!(
            build(&[2, 3]).unwrap_err(),
            SequenceIntegrityError::Gap {
                sequence: seq_id(),
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn duplicate_fails() {
        assert_eq!(
            build(&[1, 2, 2]).unwrap_err(),
            SequenceIntegrityError::Duplicate {
                step: seq_id().step(2)
            }
        );
    }

    #[test]
    fn out_of_order_fails() {
        assert_eq!(
            build(&[1, 2, 1]).unwrap_err(),
            SequenceIntegrityError::OutOfOrder {
                sequence: seq_id(),
                found: 1,
                previous: 2
            }
        );
    }

    #[test]
    fn foreign_step_fails() {
        let other = SequenceId::new("other").unwrap();
        let err = MigrationSequence::builder(seq_id())
            .with_step(noop(other.step(1)))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SequenceIntegrityError::ForeignStep {
                sequence: seq_id(),
                step: other.step(1)
            }
        );
    }

    #[test]
    fn continuation_must_follow_previous_max() {
        let id = seq_id();
        let seq = MigrationSequence::builder(id.clone())
            .starting_after(4)
            .with_step(noop(id.step(5)))
            .with_step(noop(id.step(6)))
            .build()
            .unwrap();
        assert_eq!(seq.min_version(), 5);
        assert_eq!(seq.step(6).map(|s| s.id().version), Some(6));
        assert!(seq.step(4).is_none());

        let err = MigrationSequence::builder(id.clone())
            .starting_after(4)
            .with_step(noop(id.step(4)))
            .build()
            .unwrap_err();
        assert!(matches!(err, SequenceIntegrityError::OutOfOrder { .. }));
    }

    #[test]
    fn step_lookup_by_version() {
        let id = seq_id();
        let seq = MigrationSequence::builder(id.clone())
            .step(id.step(1), |p: PropertyBag| Ok(p.with("url", "")), Down::NotReversible)
            .build()
            .unwrap();
        assert!(!seq.step(1).unwrap().is_reversible());
        assert!(seq.step(0).is_none());
        assert!(seq.step(2).is_none());
    }
}
