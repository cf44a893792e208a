//! Fields every shape kind carries, and their history.

use record_migrate::{
    migration_ids, Down, FieldRule, KindSchema, MigrationIds, MigrationSequence, PropertyBag,
    SequenceIntegrityError,
};

/// Steps of the `com.shape` sequence.
#[migration_ids(sequence = "com.shape")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeVersions {
    AddIsLocked = 1,
    AddOpacity = 2,
    AddMeta = 3,
}

/// The shared shape history. Registered before any per-kind sequence.
pub fn shape_migrations() -> Result<MigrationSequence, SequenceIntegrityError> {
    MigrationSequence::builder(ShapeVersions::sequence_id())
        .step(
            ShapeVersions::AddIsLocked.step_id(),
            |p: PropertyBag| Ok(p.with("isLocked", false)),
            Down::NotReversible,
        )
        .step(
            ShapeVersions::AddOpacity.step_id(),
            |p: PropertyBag| Ok(p.with("opacity", 1)),
            Down::reversible(|p: PropertyBag| Ok(p.without("opacity"))),
        )
        .step(
            ShapeVersions::AddMeta.step_id(),
            |p: PropertyBag| Ok(p.with("meta", PropertyBag::new())),
            Down::reversible(|p: PropertyBag| Ok(p.without("meta"))),
        )
        .build()
}

/// Add the shared shape fields to a kind schema.
pub fn with_shape_fields(schema: KindSchema) -> KindSchema {
    schema
        .field("isLocked", FieldRule::Bool)
        .field("opacity", FieldRule::Number)
        .field("meta", FieldRule::Object)
}
