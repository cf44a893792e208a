//! # record-migrate
//!
//! Versioned schema migrations for persisted records.
//!
//! Every persisted record carries a typed property bag and a version stamp.
//! When a newer build loads it, `record-migrate` brings the record forward
//! (or, where every step allows it, backward) to the version that build
//! understands. Old documents stay loadable, new fields arrive without
//! breaking old readers, and the order in which steps from different record
//! kinds run is fixed and reproducible.
//!
//! ## How It Works
//!
//! 1. Step names are mapped to integer ids per namespace
//!    ([`VersionRegistry`], `#[migration_ids]`).
//! 2. Each namespace's steps are frozen into a [`MigrationSequence`]; gaps,
//!    duplicates and reordering fail the build.
//! 3. A [`MigrationEngine`] merges all sequences into one global order.
//! 4. [`MigrationEngine::migrate`] applies the steps between a record's stamp
//!    and the target, all-or-nothing.
//! 5. A [`DocumentLoader`] runs that for every record of a document and hands
//!    the result to a [`SchemaValidator`].
//!
//! ## Key Concepts
//!
//! - **Pure steps**: each step maps a bag to a new bag; inputs are never
//!   modified.
//! - **One-way doors**: a step whose [`Down`] is [`Down::NotReversible`]
//!   blocks every down migration across it.
//! - **Deterministic**: two devices migrating the same record produce
//!   identical results.
//! - **Compiled in**: all migrations are part of the binary.
//!
//! ## Example
//!
//! ```
//! use record_migrate::{
//!     Down, MigrationEngine, MigrationSequence, PropertyBag, Record, SequenceId, VersionStamp,
//! };
//!
//! let kind = SequenceId::new("shape-kind-x").unwrap();
//! let seq = MigrationSequence::builder(kind.clone())
//!     .step(kind.step(1), |p: PropertyBag| Ok(p.with("url", "")), Down::NotReversible)
//!     .step(
//!         kind.step(2),
//!         |p: PropertyBag| {
//!             Ok(match p.get_str("align") {
//!                 Some("justify") => p.with("align", "start"),
//!                 _ => p,
//!             })
//!         },
//!         Down::NotReversible,
//!     )
//!     .step(
//!         kind.step(3),
//!         |p: PropertyBag| Ok(p.with("scale", 1)),
//!         Down::reversible(|p: PropertyBag| Ok(p.without("scale"))),
//!     )
//!     .build()
//!     .unwrap();
//! let engine = MigrationEngine::builder().sequence(seq).build().unwrap();
//! let kinds = [kind.clone()];
//!
//! let old = Record::unversioned("r1", "x", PropertyBag::new().with("align", "justify"));
//! let v3 = engine.migrate(&old, &VersionStamp::At(kind.step(3)), &kinds).unwrap();
//! assert_eq!(
//!     v3.props,
//!     PropertyBag::new().with("align", "start").with("url", "").with("scale", 1)
//! );
//!
//! let v2 = engine.migrate(&v3, &VersionStamp::At(kind.step(2)), &kinds).unwrap();
//! assert_eq!(v2.props, PropertyBag::new().with("align", "start").with("url", ""));
//! ```

extern crate self as record_migrate;

mod config;
mod engine;
mod error;
mod id;
mod loader;
mod record;
mod registry;
mod sequence;
mod snapshot;
mod step;
mod styles;
mod validate;
mod value;

pub use config::{ConfigError, MigrationConfig};
pub use engine::{MigrationEngine, MigrationEngineBuilder};
pub use error::{Direction, MigrationError, SequenceIntegrityError};
pub use id::{IdParseError, SequenceId, StepId, VersionStamp};
pub use loader::{DocumentLoader, FailureCategory, LoadError, LoadedDocument};
pub use record::Record;
pub use registry::{MigrationIds, VersionRegistry};
pub use sequence::{MigrationSequence, MigrationSequenceBuilder};
pub use snapshot::{DocumentSnapshot, SerializedSchema, SCHEMA_FORMAT_VERSION};
pub use step::{Down, MigrationStep, StepError, Transform};
pub use styles::{EnumStyle, StyleRegistry};
pub use validate::{
    is_valid_link_url, FieldRule, KindSchema, SchemaValidator, StyleAwareValidator,
    ValidationError,
};
pub use value::{PropertyBag, Value};

// Re-export the proc macro when the `macros` feature is enabled.
#[cfg(feature = "macros")]
pub use record_migrate_macros::migration_ids;
