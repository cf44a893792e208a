//! Document load pipeline: migrate every record, then validate it.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::MigrationConfig;
use crate::engine::MigrationEngine;
use crate::error::MigrationError;
use crate::id::SequenceId;
use crate::record::Record;
use crate::snapshot::{DocumentSnapshot, SerializedSchema};
use crate::validate::{KindSchema, SchemaValidator, StyleAwareValidator, ValidationError};

/// Broad recovery class for a failed load, for choosing what to tell the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    /// The document comes from a newer build.
    UpgradeApp,
    /// The document content is broken.
    Corrupted,
    /// The operation is not possible for this document.
    Unsupported,
}

impl MigrationError {
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::UnknownFutureVersion { .. } | Self::UnknownSequence { .. } => {
                FailureCategory::UpgradeApp
            }
            Self::StepApplicationFailed { .. } => FailureCategory::Corrupted,
            Self::UnsupportedOldVersion { .. } | Self::IrreversibleMigration { .. } => {
                FailureCategory::Unsupported
            }
        }
    }
}

/// Why a document could not be opened.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    /// The writer's schema is not usable by this build.
    #[error("document schema: {0}")]
    Schema(#[source] MigrationError),

    /// A record could not be migrated.
    #[error("record {record}: {source}")]
    Migration {
        record: String,
        #[source]
        source: MigrationError,
    },

    /// A migrated record does not match its kind's schema.
    #[error("record {record}: {source}")]
    Validation {
        record: String,
        #[source]
        source: ValidationError,
    },

    /// No sequences or schema are registered for the record's kind.
    #[error("record {record}: unknown kind {kind:?}")]
    UnknownKind { record: String, kind: String },

    /// Downgrades are switched off in the configuration.
    #[error("downgrading documents is disabled")]
    DowngradeDisabled,
}

impl LoadError {
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::Schema(e) | Self::Migration { source: e, .. } => e.category(),
            Self::Validation { .. } => FailureCategory::Corrupted,
            Self::UnknownKind { .. } => FailureCategory::UpgradeApp,
            Self::DowngradeDisabled => FailureCategory::Unsupported,
        }
    }

    /// Id of the record that failed, if the failure is record-specific.
    pub fn record(&self) -> Option<&str> {
        match self {
            Self::Migration { record, .. }
            | Self::Validation { record, .. }
            | Self::UnknownKind { record, .. } => Some(record),
            Self::Schema(_) | Self::DowngradeDisabled => None,
        }
    }
}

/// A document ready for use.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    /// Every record at the latest stamp, with this build's schema.
    pub snapshot: DocumentSnapshot,
    /// How many records had steps applied.
    pub migrated: usize,
}

#[derive(Debug, Clone)]
struct KindEntry {
    sequences: Vec<SequenceId>,
    schema: KindSchema,
}

/// Opens persisted documents: checks the writer's schema, migrates each
/// record to the latest stamp for its kind and validates the result.
///
/// Which steps a record still needs is decided from its stamp together with
/// the writer's schema (see [`MigrationEngine::pending_steps`]).
///
/// Loading is all-or-nothing. The first failing record aborts the load and
/// no partially migrated document is returned.
#[derive(Debug, Clone)]
pub struct DocumentLoader<V = StyleAwareValidator> {
    engine: Arc<MigrationEngine>,
    validator: V,
    config: MigrationConfig,
    kinds: HashMap<String, KindEntry>,
}

impl<V: SchemaValidator> DocumentLoader<V> {
    pub fn new(engine: Arc<MigrationEngine>, validator: V, config: MigrationConfig) -> Self {
        Self {
            engine,
            validator,
            config,
            kinds: HashMap::new(),
        }
    }

    /// Register a record kind: the sequences that apply to it (registration
    /// order is irrelevant here, the engine's global order decides) and its
    /// current schema.
    pub fn kind(
        mut self,
        kind: impl Into<String>,
        sequences: impl IntoIterator<Item = SequenceId>,
        schema: KindSchema,
    ) -> Self {
        self.kinds.insert(
            kind.into(),
            KindEntry {
                sequences: sequences.into_iter().collect(),
                schema,
            },
        );
        self
    }

    pub fn engine(&self) -> &MigrationEngine {
        &self.engine
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Sequences registered for `kind`.
    pub fn sequences_for(&self, kind: &str) -> Option<&[SequenceId]> {
        self.kinds.get(kind).map(|k| k.sequences.as_slice())
    }

    /// Bring every record of `snapshot` to the latest stamp.
    pub fn load(&self, snapshot: &DocumentSnapshot) -> Result<LoadedDocument, LoadError> {
        let result = self.load_inner(snapshot);
        match &result {
            Ok(doc) => info!(
                records = doc.snapshot.records.len(),
                migrated = doc.migrated,
                "document loaded"
            ),
            Err(e) => warn!(error = %e, category = ?e.category(), "document refused"),
        }
        result
    }

    fn load_inner(&self, snapshot: &DocumentSnapshot) -> Result<LoadedDocument, LoadError> {
        self.check_writer_schema(&snapshot.schema)?;

        let mut migrated = 0;
        let records = snapshot
            .records
            .iter()
            .map(|record| {
                let live = self.load_record_from(record, &snapshot.schema)?;
                if live != *record {
                    migrated += 1;
                }
                Ok(live)
            })
            .collect::<Result<Vec<_>, LoadError>>()?;

        Ok(LoadedDocument {
            snapshot: DocumentSnapshot {
                schema: self.engine.serialize_schema(),
                records,
            },
            migrated,
        })
    }

    /// Migrate and validate a single record that carries no writer schema.
    /// Only its stamp decides which steps it has seen.
    pub fn load_record(&self, record: &Record) -> Result<Record, LoadError> {
        let entry = self.entry(record)?;
        let live = self
            .engine
            .migrate_to_latest(record, &entry.sequences)
            .map_err(|source| LoadError::Migration {
                record: record.id.clone(),
                source,
            })?;
        self.checked(record, entry, live)
    }

    /// Migrate and validate a single record of a document written by a build
    /// with schema `writer`.
    pub fn load_record_from(
        &self,
        record: &Record,
        writer: &SerializedSchema,
    ) -> Result<Record, LoadError> {
        let entry = self.entry(record)?;
        let live = self
            .engine
            .catch_up(record, writer, &entry.sequences)
            .map_err(|source| LoadError::Migration {
                record: record.id.clone(),
                source,
            })?;
        self.checked(record, entry, live)
    }

    fn checked(&self, record: &Record, entry: &KindEntry, live: Record) -> Result<Record, LoadError> {
        if self.config.validate_records {
            self.validator
                .validate(&live.props, &entry.schema)
                .map_err(|source| LoadError::Validation {
                    record: record.id.clone(),
                    source,
                })?;
        }
        Ok(live)
    }

    /// Bring every record down (or up) to what a build with `target` knows.
    pub fn downgrade(
        &self,
        snapshot: &DocumentSnapshot,
        target: &SerializedSchema,
    ) -> Result<DocumentSnapshot, LoadError> {
        if !self.config.allow_downgrade {
            return Err(LoadError::DowngradeDisabled);
        }
        self.check_writer_schema(&snapshot.schema)?;

        let records = snapshot
            .records
            .iter()
            .map(|record| {
                let entry = self.entry(record)?;
                let to_migration_error = |source| LoadError::Migration {
                    record: record.id.clone(),
                    source,
                };
                let stamp = self
                    .engine
                    .stamp_for_schema(target, &entry.sequences)
                    .map_err(to_migration_error)?;
                let live = self
                    .engine
                    .catch_up(record, &snapshot.schema, &entry.sequences)
                    .map_err(to_migration_error)?;
                self.engine
                    .migrate(&live, &stamp, &entry.sequences)
                    .map_err(to_migration_error)
            })
            .collect::<Result<Vec<_>, LoadError>>()?;

        info!(records = records.len(), "document downgraded");
        Ok(DocumentSnapshot {
            schema: target.clone(),
            records,
        })
    }

    fn entry(&self, record: &Record) -> Result<&KindEntry, LoadError> {
        self.kinds
            .get(&record.kind)
            .ok_or_else(|| LoadError::UnknownKind {
                record: record.id.clone(),
                kind: record.kind.clone(),
            })
    }

    fn check_writer_schema(&self, schema: &SerializedSchema) -> Result<(), LoadError> {
        for (id, version) in &schema.sequences {
            let sequence = self.engine.sequence(id).ok_or_else(|| {
                LoadError::Schema(MigrationError::UnknownSequence {
                    sequence: id.clone(),
                })
            })?;
            if *version > sequence.max_version() {
                return Err(LoadError::Schema(MigrationError::UnknownFutureVersion {
                    stamp: id.step(*version),
                    latest: sequence.latest(),
                }));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::styles::{EnumStyle, StyleRegistry};
    use crate::validate::FieldRule;
    use crate::{Down, MigrationSequence, PropertyBag, Value, VersionStamp};

    fn note() -> SequenceId {
        SequenceId::new("note").unwrap()
    }

    fn loader(config: MigrationConfig) -> DocumentLoader {
        let seq = MigrationSequence::builder(note())
            .step(note().step(1), |p: PropertyBag| Ok(p.with("url", "")), Down::NotReversible)
            .step(
                note().step(2),
                |p: PropertyBag| Ok(p.with("scale", 1)),
                Down::reversible(|p: PropertyBag| Ok(p.without("scale"))),
            )
            .build()
            .unwrap();
        let engine = Arc::new(MigrationEngine::builder().sequence(seq).build().unwrap());
        let validator = StyleAwareValidator::new(
            StyleRegistry::new().with(EnumStyle::new("color", "black", ["black", "red"])),
        );
        let schema = KindSchema::new("note")
            .field("color", FieldRule::style("color"))
            .field("url", FieldRule::LinkUrl)
            .field("scale", FieldRule::NonZeroNumber);
        DocumentLoader::new(engine, validator, config).kind("note", [note()], schema)
    }

    fn doc(records: Vec<Record>) -> DocumentSnapshot {
        DocumentSnapshot {
            schema: SerializedSchema::new([(note(), 0)]),
            records,
        }
    }

    #[test]
    fn loads_and_counts_migrations() {
        let snapshot = doc(vec![
            Record::unversioned("a", "note", PropertyBag::new().with("color", "red")),
            Record::unversioned("b", "note", PropertyBag::new().with("color", "black"))
                .at(note().step(2))
                .tap_props(|p| p.with("url", "").with("scale", 2)),
        ]);
        let loaded = loader(MigrationConfig::default()).load(&snapshot).unwrap();

        assert_eq!(loaded.migrated, 1);
        assert_eq!(loaded.snapshot.schema.version_of(&note()), 2);
        let a = &loaded.snapshot.records[0];
        assert_eq!(a.stamp, VersionStamp::At(note().step(2)));
        assert_eq!(a.props.get_number("scale"), Some(1.0));
        assert_eq!(loaded.snapshot.records[1].props.get_number("scale"), Some(2.0));
    }

    #[test]
    fn validation_failure_refuses_the_document() {
        let snapshot = doc(vec![Record::unversioned(
            "a",
            "note",
            PropertyBag::new().with("color", "purple"),
        )]);
        let err = loader(MigrationConfig::default()).load(&snapshot).unwrap_err();
        assert!(matches!(err, LoadError::Validation { ref record, .. } if record == "a"));
        assert_eq!(err.category(), FailureCategory::Corrupted);

        let lenient = MigrationConfig {
            validate_records: false,
            ..MigrationConfig::default()
        };
        assert!(loader(lenient).load(&snapshot).is_ok());
    }

    #[test]
    fn future_writer_is_refused_before_touching_records() {
        let mut snapshot = doc(vec![]);
        snapshot.schema = SerializedSchema::new([(note(), 7)]);
        let err = loader(MigrationConfig::default()).load(&snapshot).unwrap_err();
        assert_eq!(
            err,
            LoadError::Schema(MigrationError::UnknownFutureVersion {
                stamp: note().step(7),
                latest: note().step(2),
            })
        );
        assert_eq!(err.category(), FailureCategory::UpgradeApp);
        assert_eq!(err.record(), None);
    }

    #[test]
    fn unknown_kind() {
        let snapshot = doc(vec![Record::unversioned("x", "frame", PropertyBag::new())]);
        let err = loader(MigrationConfig::default()).load(&snapshot).unwrap_err();
        assert_eq!(
            err,
            LoadError::UnknownKind {
                record: "x".into(),
                kind: "frame".into()
            }
        );
    }

    #[test]
    fn downgrade_requires_opt_in() {
        let snapshot = doc(vec![]);
        let target = SerializedSchema::new([(note(), 1)]);
        assert_eq!(
            loader(MigrationConfig::default()).downgrade(&snapshot, &target),
            Err(LoadError::DowngradeDisabled)
        );
    }

    #[test]
    fn downgrade_to_older_schema() {
        let config = MigrationConfig {
            allow_downgrade: true,
            ..MigrationConfig::default()
        };
        let loader = loader(config);
        let current = loader
            .load(&doc(vec![Record::unversioned(
                "a",
                "note",
                PropertyBag::new().with("color", "red"),
            )]))
            .unwrap()
            .snapshot;

        let target = SerializedSchema::new([(note(), 1)]);
        let older = loader.downgrade(&current, &target).unwrap();
        assert_eq!(older.schema, target);
        assert_eq!(older.records[0].stamp, VersionStamp::At(note().step(1)));
        assert!(!older.records[0].props.contains_key("scale"));

        let err = loader
            .downgrade(&current, &SerializedSchema::new([(note(), 0)]))
            .unwrap_err();
        assert_eq!(err.category(), FailureCategory::Unsupported);
        assert_eq!(err.record(), Some("a"));
    }

    /// `shared/2` appended in a later build, ordered before `note/1`.
    fn appended_loader(shared_len: u32, config: MigrationConfig) -> DocumentLoader {
        let shared = SequenceId::new("shared").unwrap();
        let mut builder = MigrationSequence::builder(shared.clone()).step(
            shared.step(1),
            |p: PropertyBag| Ok(p.with("isLocked", false)),
            Down::NotReversible,
        );
        if shared_len >= 2 {
            builder = builder.step(
                shared.step(2),
                |p: PropertyBag| Ok(p.with("meta", PropertyBag::new())),
                Down::reversible(|p: PropertyBag| Ok(p.without("meta"))),
            );
        }
        let kind = MigrationSequence::builder(note())
            .step(note().step(1), |p: PropertyBag| Ok(p.with("url", "")), Down::NotReversible)
            .build()
            .unwrap();
        let engine = MigrationEngine::builder()
            .sequence(builder.build().unwrap())
            .sequence(kind)
            .build()
            .unwrap();

        let mut schema = KindSchema::new("note")
            .field("isLocked", FieldRule::Bool)
            .field("url", FieldRule::LinkUrl);
        if shared_len >= 2 {
            schema = schema.field("meta", FieldRule::Object);
        }
        DocumentLoader::new(Arc::new(engine), StyleAwareValidator::new(StyleRegistry::new()), config)
            .kind("note", [shared, note()], schema)
    }

    #[test]
    fn step_appended_to_earlier_sequence_reaches_stored_records() {
        let old = appended_loader(1, MigrationConfig::default());
        let written = old
            .load(&DocumentSnapshot {
                schema: SerializedSchema::new([]),
                records: vec![Record::unversioned("a", "note", PropertyBag::new())],
            })
            .unwrap()
            .snapshot;
        assert_eq!(written.records[0].stamp, VersionStamp::At(note().step(1)));

        for validate_records in [true, false] {
            let new = appended_loader(
                2,
                MigrationConfig {
                    validate_records,
                    ..MigrationConfig::default()
                },
            );
            let loaded = new.load(&written).unwrap();
            assert_eq!(loaded.migrated, 1);
            let live = &loaded.snapshot.records[0];
            assert_eq!(live.stamp, VersionStamp::At(note().step(1)));
            assert_eq!(live.props.get("meta"), Some(&Value::from(PropertyBag::new())));

            let reloaded = new.load(&loaded.snapshot).unwrap();
            assert_eq!(reloaded.migrated, 0);
            assert_eq!(reloaded.snapshot, loaded.snapshot);
        }
    }

    trait TapProps {
        fn tap_props(self, f: impl FnOnce(PropertyBag) -> PropertyBag) -> Self;
    }

    impl TapProps for Record {
        fn tap_props(mut self, f: impl FnOnce(PropertyBag) -> PropertyBag) -> Self {
            self.props = f(self.props);
            self
        }
    }
}
