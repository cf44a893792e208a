//! # shape-schema
//!
//! Shape record kinds for [`record_migrate`]: the shared `com.shape`
//! history, the `geo` props history and the styles they are validated
//! against.
//!
//! ```
//! use record_migrate::{MigrationConfig, PropertyBag, Record};
//!
//! let loader = shape_schema::shape_loader(MigrationConfig::default()).unwrap();
//! let old = Record::unversioned(
//!     "shape:1",
//!     "geo",
//!     PropertyBag::new()
//!         .with("geo", "ellipse")
//!         .with("color", "blue")
//!         .with("fill", "none")
//!         .with("dash", "draw")
//!         .with("size", "m")
//!         .with("font", "draw")
//!         .with("align", "justify")
//!         .with("w", 100)
//!         .with("h", 50)
//!         .with("growY", 0)
//!         .with("text", "hello"),
//! );
//!
//! let live = loader.load_record(&old).unwrap();
//! assert_eq!(live.props.get_str("align"), Some("start-legacy"));
//! assert_eq!(live.props.get_number("scale"), Some(1.0));
//! ```

mod geo;
mod shape;
pub mod styles;

use std::sync::Arc;

use record_migrate::{
    DocumentLoader, MigrationConfig, MigrationEngine, MigrationIds, SequenceId,
    SequenceIntegrityError, StyleAwareValidator, VersionRegistry,
};

pub use geo::{geo_kind_schema, geo_migrations, GeoVersions};
pub use shape::{shape_migrations, with_shape_fields, ShapeVersions};
pub use styles::shape_styles;

/// Sequences that apply to a `geo` record.
pub fn geo_sequences() -> [SequenceId; 2] {
    [ShapeVersions::sequence_id(), GeoVersions::sequence_id()]
}

/// Every step name known to this crate.
pub fn shape_registry() -> Result<VersionRegistry, SequenceIntegrityError> {
    let mut registry = VersionRegistry::new();
    registry.register_ids::<ShapeVersions>()?;
    registry.register_ids::<GeoVersions>()?;
    Ok(registry)
}

/// Engine with `com.shape` registered first, then the per-kind sequences.
pub fn shape_engine() -> Result<MigrationEngine, SequenceIntegrityError> {
    MigrationEngine::builder()
        .sequence(shape_migrations()?)
        .sequence(geo_migrations()?)
        .build()
}

/// Document loader for shape documents.
pub fn shape_loader(config: MigrationConfig) -> Result<DocumentLoader, SequenceIntegrityError> {
    let engine = Arc::new(shape_engine()?);
    let validator = StyleAwareValidator::new(shape_styles().clone());
    Ok(DocumentLoader::new(engine, validator, config).kind(
        "geo",
        geo_sequences(),
        geo_kind_schema(),
    ))
}
