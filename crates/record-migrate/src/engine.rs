use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};

use tracing::{debug, trace};

use crate::error::{Direction, MigrationError, SequenceIntegrityError};
use crate::id::{SequenceId, StepId, VersionStamp};
use crate::record::Record;
use crate::sequence::MigrationSequence;
use crate::snapshot::SerializedSchema;
use crate::step::{Down, MigrationStep};
use crate::value::PropertyBag;

/// `(registration number, version)`: the tie-break key of a step.
type StepKey = (usize, u32);

/// Applies migration steps drawn from several sequences in one global order.
///
/// Sequences are registered once through [`MigrationEngine::builder`]. Each
/// one receives a registration number in builder order. The global order is
/// a topological order over "previous step in the same sequence" and
/// [`MigrationStep::depends_on`] edges; whenever several steps are free to
/// run next, the one with the lowest `(registration number, version)` wins.
/// The resulting 1-based positions are visible through
/// [`position`](Self::position), and position 0 stands for
/// [`VersionStamp::Unversioned`].
///
/// The engine is immutable once built and holds no per-call state, so one
/// instance can serve any number of threads.
///
/// # Example
///
/// ```
/// use record_migrate::{
///     Down, MigrationEngine, MigrationSequence, PropertyBag, Record, SequenceId, VersionStamp,
/// };
///
/// let geo = SequenceId::new("geo").unwrap();
/// let seq = MigrationSequence::builder(geo.clone())
///     .step(geo.step(1), |p: PropertyBag| Ok(p.with("url", "")), Down::NotReversible)
///     .build()
///     .unwrap();
/// let engine = MigrationEngine::builder().sequence(seq).build().unwrap();
///
/// let record = Record::unversioned("shape:1", "geo", PropertyBag::new());
/// let migrated = engine
///     .migrate(&record, &VersionStamp::At(geo.step(1)), &[geo])
///     .unwrap();
/// assert_eq!(migrated.props.get_str("url"), Some(""));
/// ```
#[derive(Debug, Clone)]
pub struct MigrationEngine {
    sequences: Vec<MigrationSequence>,
    index: HashMap<SequenceId, usize>,
    order: Vec<StepKey>,
    positions: HashMap<StepKey, usize>,
}

/// Collects sequences for a [`MigrationEngine`].
#[derive(Debug, Default)]
pub struct MigrationEngineBuilder {
    sequences: Vec<MigrationSequence>,
}

impl MigrationEngineBuilder {
    /// Register the next sequence. Registration order is the tie-break.
    pub fn sequence(mut self, sequence: MigrationSequence) -> Self {
        self.sequences.push(sequence);
        self
    }

    /// Compute the global order and freeze the engine.
    pub fn build(self) -> Result<MigrationEngine, SequenceIntegrityError> {
        let mut index = HashMap::with_capacity(self.sequences.len());
        for (reg, seq) in self.sequences.iter().enumerate() {
            if index.insert(seq.id().clone(), reg).is_some() {
                return Err(SequenceIntegrityError::DuplicateSequence {
                    sequence: seq.id().clone(),
                });
            }
        }

        let mut indegree: HashMap<StepKey, usize> = HashMap::new();
        let mut dependents: HashMap<StepKey, Vec<StepKey>> = HashMap::new();

        for (reg, seq) in self.sequences.iter().enumerate() {
            for step in seq.steps() {
                let key = (reg, step.id().version);
                let mut incoming = 0;
                if step.id().version > seq.min_version() {
                    dependents
                        .entry((reg, step.id().version - 1))
                        .or_default()
                        .push(key);
                    incoming += 1;
                }
                for dep in step.dependencies() {
                    let dep_key = index
                        .get(&dep.sequence)
                        .copied()
                        .filter(|r| self.sequences[*r].contains(dep))
                        .map(|r| (r, dep.version))
                        .ok_or_else(|| SequenceIntegrityError::UnknownDependency {
                            step: step.id().clone(),
                            dependency: dep.clone(),
                        })?;
                    dependents.entry(dep_key).or_default().push(key);
                    incoming += 1;
                }
                indegree.insert(key, incoming);
            }
        }

        let mut ready: BinaryHeap<Reverse<StepKey>> = indegree
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(k, _)| Reverse(*k))
            .collect();
        let mut order = Vec::with_capacity(indegree.len());

        while let Some(Reverse(key)) = ready.pop() {
            order.push(key);
            for next in dependents.get(&key).into_iter().flatten() {
                if let Some(n) = indegree.get_mut(next) {
                    *n -= 1;
                    if *n == 0 {
                        ready.push(Reverse(*next));
                    }
                }
            }
        }

        if order.len() < indegree.len() {
            let placed: HashSet<StepKey> = order.iter().copied().collect();
            let stuck: BTreeSet<StepKey> = indegree
                .keys()
                .filter(|k| !placed.contains(k))
                .copied()
                .collect();
            return Err(SequenceIntegrityError::DependencyCycle {
                steps: stuck
                    .into_iter()
                    .map(|(reg, v)| self.sequences[reg].id().step(v))
                    .collect(),
            });
        }

        let positions = order
            .iter()
            .enumerate()
            .map(|(i, key)| (*key, i + 1))
            .collect();

        Ok(MigrationEngine {
            sequences: self.sequences,
            index,
            order,
            positions,
        })
    }
}

impl MigrationEngine {
    /// Start registering sequences.
    pub fn builder() -> MigrationEngineBuilder {
        MigrationEngineBuilder::default()
    }

    /// All sequences in registration order.
    pub fn sequences(&self) -> &[MigrationSequence] {
        &self.sequences
    }

    pub fn sequence(&self, id: &SequenceId) -> Option<&MigrationSequence> {
        self.index.get(id).map(|reg| &self.sequences[*reg])
    }

    /// The registration number given to `id`.
    pub fn registration_number(&self, id: &SequenceId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// 1-based position of `step` in the global order.
    pub fn position(&self, step: &StepId) -> Option<usize> {
        let reg = *self.index.get(&step.sequence)?;
        self.positions.get(&(reg, step.version)).copied()
    }

    /// Every step, in the order an unversioned record would see them.
    pub fn ordered_steps(&self) -> impl Iterator<Item = &MigrationStep> + '_ {
        self.order.iter().map(move |key| self.step_at(*key))
    }

    /// Every step id, in global order.
    pub fn registered_steps(&self) -> Vec<StepId> {
        self.ordered_steps().map(|s| s.id().clone()).collect()
    }

    /// The newest stamp reachable with `sequences`.
    pub fn latest_stamp(&self, sequences: &[SequenceId]) -> Result<VersionStamp, MigrationError> {
        let regs = self.resolve_sequences(sequences)?;
        Ok(self
            .order
            .iter()
            .rev()
            .find(|(reg, _)| regs.contains(reg))
            .map_or(VersionStamp::Unversioned, |key| {
                VersionStamp::At(self.step_at(*key).id().clone())
            }))
    }

    /// True if a record at `stamp` is behind the latest stamp for `sequences`.
    pub fn needs_migration(
        &self,
        stamp: &VersionStamp,
        sequences: &[SequenceId],
    ) -> Result<bool, MigrationError> {
        let latest = self.latest_stamp(sequences)?;
        Ok(self.resolve_stamp(stamp)? != self.resolve_stamp(&latest)?)
    }

    /// Steps of `sequences` that a record at `stamp`, written by a build with
    /// schema `writer`, has not seen yet. Returned in global order.
    ///
    /// A step counts as seen when it sits at or before the stamp's position
    /// and the writer knew its version. The stamp's own sequence is known at
    /// least up to the stamp. This catches steps that a newer build appended
    /// to a sequence registered before the one the record is stamped in.
    pub fn pending_steps(
        &self,
        stamp: &VersionStamp,
        writer: &SerializedSchema,
        sequences: &[SequenceId],
    ) -> Result<Vec<&MigrationStep>, MigrationError> {
        let regs = self.resolve_sequences(sequences)?;
        let at = self.resolve_stamp(stamp)?;

        let mut known: HashMap<usize, u32> = HashMap::with_capacity(regs.len());
        for reg in &regs {
            let seq = &self.sequences[*reg];
            let version = writer.version_of(seq.id());
            if version > seq.max_version() {
                return Err(MigrationError::UnknownFutureVersion {
                    stamp: seq.id().step(version),
                    latest: seq.latest(),
                });
            }
            known.insert(*reg, version);
        }
        if let VersionStamp::At(step) = stamp {
            if let Some(version) = self.index.get(&step.sequence).and_then(|r| known.get_mut(r)) {
                *version = (*version).max(step.version);
            }
        }

        Ok(self
            .order
            .iter()
            .enumerate()
            .filter(|(_, (reg, _))| regs.contains(reg))
            .filter(|(i, (reg, version))| i + 1 > at || *version > known[reg])
            .map(|(_, key)| self.step_at(*key))
            .collect())
    }

    /// Bring `record`, written by a build with schema `writer`, to the latest
    /// stamp for `sequences` by applying exactly its
    /// [`pending_steps`](Self::pending_steps).
    pub fn catch_up(
        &self,
        record: &Record,
        writer: &SerializedSchema,
        sequences: &[SequenceId],
    ) -> Result<Record, MigrationError> {
        let plan = self.pending_steps(&record.stamp, writer, sequences)?;
        let target = self.latest_stamp(sequences)?;
        debug!(
            from = %record.stamp,
            to = %target,
            steps = plan.len(),
            "catching up record"
        );
        let props = self.run(&plan, Direction::Up, &record.props)?;
        Ok(Record {
            id: record.id.clone(),
            kind: record.kind.clone(),
            stamp: target,
            props,
        })
    }

    /// The current per-sequence versions, as written next to documents.
    pub fn serialize_schema(&self) -> SerializedSchema {
        SerializedSchema::new(
            self.sequences
                .iter()
                .map(|s| (s.id().clone(), s.max_version())),
        )
    }

    /// The newest stamp whose steps (restricted to `sequences`) all exist in
    /// `schema`. Used to bring records down to what an older build knows.
    pub fn stamp_for_schema(
        &self,
        schema: &SerializedSchema,
        sequences: &[SequenceId],
    ) -> Result<VersionStamp, MigrationError> {
        let regs = self.resolve_sequences(sequences)?;
        for reg in &regs {
            let seq = &self.sequences[*reg];
            let wanted = schema.version_of(seq.id());
            if wanted > seq.max_version() {
                return Err(MigrationError::UnknownFutureVersion {
                    stamp: seq.id().step(wanted),
                    latest: seq.latest(),
                });
            }
        }

        let mut stamp = VersionStamp::Unversioned;
        for key in self.order.iter().filter(|(reg, _)| regs.contains(reg)) {
            let step = self.step_at(*key);
            if step.id().version > schema.version_of(&step.id().sequence) {
                break;
            }
            stamp = VersionStamp::At(step.id().clone());
        }
        Ok(stamp)
    }

    /// Bring `record` to `target`, stamping the result with `target`.
    ///
    /// Only steps belonging to `sequences` are applied; steps of other
    /// sequences that fall inside the range are skipped.
    pub fn migrate(
        &self,
        record: &Record,
        target: &VersionStamp,
        sequences: &[SequenceId],
    ) -> Result<Record, MigrationError> {
        let props = self.migrate_props(&record.props, &record.stamp, target, sequences)?;
        Ok(Record {
            id: record.id.clone(),
            kind: record.kind.clone(),
            stamp: target.clone(),
            props,
        })
    }

    /// Bring `record` to the latest stamp for `sequences`.
    pub fn migrate_to_latest(
        &self,
        record: &Record,
        sequences: &[SequenceId],
    ) -> Result<Record, MigrationError> {
        let target = self.latest_stamp(sequences)?;
        self.migrate(record, &target, sequences)
    }

    /// Core algorithm on a bare property bag.
    ///
    /// The input is never modified. Steps run against a working copy that is
    /// only returned once every step succeeded.
    pub fn migrate_props(
        &self,
        props: &PropertyBag,
        current: &VersionStamp,
        target: &VersionStamp,
        sequences: &[SequenceId],
    ) -> Result<PropertyBag, MigrationError> {
        let from = self.resolve_stamp(current)?;
        let to = self.resolve_stamp(target)?;
        if from == to {
            return Ok(props.clone());
        }

        let regs = self.resolve_sequences(sequences)?;
        let (direction, plan) = if from < to {
            let plan: Vec<&MigrationStep> = self.order[from..to]
                .iter()
                .filter(|(reg, _)| regs.contains(reg))
                .map(|key| self.step_at(*key))
                .collect();
            (Direction::Up, plan)
        } else {
            let plan: Vec<&MigrationStep> = self.order[to..from]
                .iter()
                .rev()
                .filter(|(reg, _)| regs.contains(reg))
                .map(|key| self.step_at(*key))
                .collect();
            if let Some(blocked) = plan
                .iter()
                .find(|step| matches!(step.down(), Down::NotReversible))
            {
                return Err(MigrationError::IrreversibleMigration {
                    step: blocked.id().clone(),
                });
            }
            (Direction::Down, plan)
        };

        debug!(
            from = %current,
            to = %target,
            %direction,
            steps = plan.len(),
            "migrating record"
        );

        self.run(&plan, direction, props)
    }

    /// Apply `plan` in order to a copy of `props`.
    fn run(
        &self,
        plan: &[&MigrationStep],
        direction: Direction,
        props: &PropertyBag,
    ) -> Result<PropertyBag, MigrationError> {
        let mut working = props.clone();
        for step in plan {
            trace!(step = %step.id(), %direction, "applying step");
            let step_input = working.clone();
            let result = match direction {
                Direction::Up => step.apply_up(working),
                Direction::Down => match step.apply_down(working) {
                    Some(result) => result,
                    None => {
                        return Err(MigrationError::IrreversibleMigration {
                            step: step.id().clone(),
                        })
                    }
                },
            };
            working = result.map_err(|source| MigrationError::StepApplicationFailed {
                step: step.id().clone(),
                direction,
                original: props.clone(),
                step_input,
                source,
            })?;
        }

        Ok(working)
    }

    fn step_at(&self, (reg, version): StepKey) -> &MigrationStep {
        let seq = &self.sequences[reg];
        &seq.steps()[(version - seq.min_version()) as usize]
    }

    fn resolve_sequences(&self, sequences: &[SequenceId]) -> Result<HashSet<usize>, MigrationError> {
        sequences
            .iter()
            .map(|id| {
                self.index
                    .get(id)
                    .copied()
                    .ok_or_else(|| MigrationError::UnknownSequence {
                        sequence: id.clone(),
                    })
            })
            .collect()
    }

    /// Global position a stamp stands for.
    fn resolve_stamp(&self, stamp: &VersionStamp) -> Result<usize, MigrationError> {
        let step = match stamp {
            VersionStamp::Unversioned => return Ok(0),
            VersionStamp::At(step) => step,
        };
        let reg = *self
            .index
            .get(&step.sequence)
            .ok_or_else(|| MigrationError::UnknownSequence {
                sequence: step.sequence.clone(),
            })?;
        let seq = &self.sequences[reg];

        if step.version > seq.max_version() {
            return Err(MigrationError::UnknownFutureVersion {
                stamp: step.clone(),
                latest: seq.latest(),
            });
        }
        if step.version >= seq.min_version() {
            return Ok(self.positions[&(reg, step.version)]);
        }
        // A continued sequence: its pre-history ended right before its first step.
        let oldest = seq.min_version() - 1;
        if step.version == oldest {
            return Ok(self.positions[&(reg, seq.min_version())] - 1);
        }
        Err(MigrationError::UnsupportedOldVersion {
            stamp: step.clone(),
            oldest: seq.id().step(oldest),
        })
    }
}
