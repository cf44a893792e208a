use std::collections::BTreeMap;

use crate::error::SequenceIntegrityError;
use crate::id::{SequenceId, StepId};

/// A set of named steps for one sequence, usually generated by
/// `#[migration_ids]`.
///
/// Lets migration authors say `GeoVersions::AddScale` where the engine only
/// deals in [`StepId`]s.
pub trait MigrationIds: Copy + 'static {
    /// The namespace these names belong to.
    const SEQUENCE: &'static str;

    /// Every name, in ordinal order.
    const ALL: &'static [Self];

    /// The integer the engine sees.
    fn ordinal(self) -> u32;

    /// The name the author wrote.
    fn name(self) -> &'static str;

    /// The namespace as an id.
    fn sequence_id() -> SequenceId {
        SequenceId::from_static(Self::SEQUENCE)
    }

    /// This name as a step id.
    fn step_id(self) -> StepId {
        Self::sequence_id().step(self.ordinal())
    }
}

/// Maps step names to [`StepId`]s, per sequence.
///
/// History only grows: every new name must take an ordinal above everything
/// registered for its sequence so far, and a name can never move.
///
/// ```
/// use record_migrate::VersionRegistry;
///
/// let mut registry = VersionRegistry::new();
/// let ids = registry
///     .register("com.shape.geo", [("AddUrlProp", 1), ("AddLabelColor", 2)])
///     .unwrap();
/// assert_eq!(ids["AddLabelColor"].to_string(), "com.shape.geo/2");
///
/// // Re-registering a name under another ordinal is refused.
/// assert!(registry.register("com.shape.geo", [("AddUrlProp", 3)]).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct VersionRegistry {
    sequences: BTreeMap<SequenceId, BTreeMap<String, u32>>,
}

impl VersionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `(name, ordinal)` pairs for `sequence`.
    ///
    /// Nothing is recorded unless every pair is accepted.
    pub fn register<'a, I>(
        &mut self,
        sequence: &str,
        steps: I,
    ) -> Result<BTreeMap<String, StepId>, SequenceIntegrityError>
    where
        I: IntoIterator<Item = (&'a str, u32)>,
    {
        let sequence = SequenceId::new(sequence)?;
        let known = self.sequences.get(&sequence);
        let mut floor = known.and_then(|m| m.values().max().copied()).unwrap_or(0);
        let mut staged: BTreeMap<String, u32> = BTreeMap::new();
        let mut ids = BTreeMap::new();

        for (name, ordinal) in steps {
            let existing = known
                .and_then(|m| m.get(name))
                .or_else(|| staged.get(name))
                .copied();
            match existing {
                Some(existing) if existing == ordinal => {}
                Some(existing) => {
                    return Err(SequenceIntegrityError::NameConflict {
                        sequence,
                        name: name.to_string(),
                        existing,
                        requested: ordinal,
                    });
                }
                None => {
                    if ordinal <= floor {
                        return Err(SequenceIntegrityError::NonIncreasing {
                            sequence,
                            name: name.to_string(),
                            ordinal,
                            floor,
                        });
                    }
                    floor = ordinal;
                    staged.insert(name.to_string(), ordinal);
                }
            }
            ids.insert(name.to_string(), StepId::new(sequence.clone(), ordinal)?);
        }

        self.sequences.entry(sequence).or_default().extend(staged);
        Ok(ids)
    }

    /// Register every name of a [`MigrationIds`] type.
    pub fn register_ids<T: MigrationIds>(
        &mut self,
    ) -> Result<BTreeMap<String, StepId>, SequenceIntegrityError> {
        self.register(T::SEQUENCE, T::ALL.iter().map(|id| (id.name(), id.ordinal())))
    }

    /// Look a step up by name.
    pub fn lookup(&self, sequence: &SequenceId, name: &str) -> Option<StepId> {
        let ordinal = *self.sequences.get(sequence)?.get(name)?;
        Some(sequence.step(ordinal))
    }

    /// Reverse lookup: the name registered for `step`.
    pub fn name_of(&self, step: &StepId) -> Option<&str> {
        self.sequences
            .get(&step.sequence)?
            .iter()
            .find(|(_, ordinal)| **ordinal == step.version)
            .map(|(name, _)| name.as_str())
    }

    /// Highest ordinal registered for `sequence`, 0 if none.
    pub fn max_version(&self, sequence: &SequenceId) -> u32 {
        self.sequences
            .get(sequence)
            .and_then(|m| m.values().max().copied())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_map_to_step_ids() {
        let mut registry = VersionRegistry::new();
        let ids = registry
            .register("geo", [("AddUrlProp", 1), ("AddLabelColor", 2), ("RemoveJustify", 3)])
            .unwrap();
        let geo = SequenceId::new("geo").unwrap();
        assert_eq!(ids["RemoveJustify"], geo.step(3));
        assert_eq!(registry.lookup(&geo, "AddUrlProp"), Some(geo.step(1)));
        assert_eq!(registry.max_version(&geo), 3);
        assert_eq!(registry.name_of(&geo.step(2)), Some("AddLabelColor"));
        assert_eq!(registry.name_of(&geo.step(9)), None);
    }

    #[test]
    fn continuing_must_climb() {
        let mut registry = VersionRegistry::new();
        registry.register("geo", [("A", 1), ("B", 2)]).unwrap();

        let err = registry.register("geo", [("C", 2)]).unwrap_err();
        assert_eq!(
            err,
            SequenceIntegrityError::NonIncreasing {
                sequence: SequenceId::new("geo").unwrap(),
                name: "C".into(),
                ordinal: 2,
                floor: 2,
            }
        );

        let ids = registry.register("geo", [("C", 3)]).unwrap();
        assert_eq!(ids["C"].version, 3);
    }

    #[test]
    fn same_name_same_ordinal_is_idempotent() {
        let mut registry = VersionRegistry::new();
        registry.register("geo", [("A", 1), ("B", 2)]).unwrap();
        let ids = registry.register("geo", [("A", 1), ("B", 2), ("C", 3)]).unwrap();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn moving_a_name_is_refused() {
        let mut registry = VersionRegistry::new();
        registry.register("geo", [("A", 1)]).unwrap();
        let err = registry.register("geo", [("A", 5)]).unwrap_err();
        assert!(matches!(
            err,
            SequenceIntegrityError::NameConflict {
                existing: 1,
                requested: 5,
                ..
            }
        ));
    }

    #[test]
    fn zero_and_unordered_ordinals_are_refused() {
        let mut registry = VersionRegistry::new();
        assert!(matches!(
            registry.register("geo", [("A", 0)]),
            Err(SequenceIntegrityError::NonIncreasing { ordinal: 0, .. })
        ));
        assert!(matches!(
            registry.register("geo", [("A", 2), ("B", 1)]),
            Err(SequenceIntegrityError::NonIncreasing { ordinal: 1, floor: 2, .. })
        ));
        // Failed calls leave nothing behind.
        assert_eq!(registry.max_version(&SequenceId::new("geo").unwrap()), 0);
    }

    #[test]
    fn duplicate_names_in_one_call() {
        let mut registry = VersionRegistry::new();
        assert!(matches!(
            registry.register("geo", [("A", 1), ("A", 2)]),
            Err(SequenceIntegrityError::NameConflict { .. })
        ));
    }

    #[test]
    fn bad_sequence_name() {
        let mut registry = VersionRegistry::new();
        assert!(matches!(
            registry.register("a/b", [("A", 1)]),
            Err(SequenceIntegrityError::InvalidId(_))
        ));
    }
}
