//! Integration tests for `#[migration_ids]` and the full pipeline built on
//! the ids it generates.
//!
//! Tests the complete flow: name steps with the macro, register them, build
//! sequences from the generated ids, migrate records across two sequences.

use record_migrate::{
    migration_ids, Down, MigrationEngine, MigrationIds, MigrationSequence, PropertyBag, Record,
    SequenceIntegrityError, VersionRegistry, VersionStamp,
};

// ── Step names using the macro ──────────────────────────────────────

#[migration_ids(sequence = "com.app.note")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoteVersions {
    AddColor = 1,
    AddPinned = 2,
    RenameBody = 3,
}

#[migration_ids(sequence = "com.app.card")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CardVersions {
    AddTitle = 1,
}

#[migration_ids(sequence = "com.app.note")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoteVersionsRenumbered {
    AddColor = 1,
    AddPinned = 3,
}

// ── Tests ─────────────────────────────────────────────────────────────

#[test]
fn migration_ids_generates_impl() {
    assert_eq!(NoteVersions::SEQUENCE, "com.app.note");
    assert_eq!(
        NoteVersions::ALL,
        &[
            NoteVersions::AddColor,
            NoteVersions::AddPinned,
            NoteVersions::RenameBody
        ]
    );
    assert_eq!(NoteVersions::AddPinned.ordinal(), 2);
    assert_eq!(NoteVersions::RenameBody.name(), "RenameBody");
    assert_eq!(
        NoteVersions::RenameBody.step_id().to_string(),
        "com.app.note/3"
    );
}

#[test]
fn registry_accepts_generated_ids() {
    let mut registry = VersionRegistry::new();
    let ids = registry.register_ids::<NoteVersions>().unwrap();
    assert_eq!(ids["AddColor"], NoteVersions::AddColor.step_id());
    assert_eq!(
        registry.lookup(&NoteVersions::sequence_id(), "RenameBody"),
        Some(NoteVersions::RenameBody.step_id())
    );

    // Registering the same enum again is harmless.
    registry.register_ids::<NoteVersions>().unwrap();
}

#[test]
fn registry_refuses_moved_names() {
    let mut registry = VersionRegistry::new();
    registry.register_ids::<NoteVersions>().unwrap();

    let err = registry.register_ids::<NoteVersionsRenumbered>().unwrap_err();
    assert!(matches!(
        err,
        SequenceIntegrityError::NameConflict {
            existing: 2,
            requested: 3,
            ..
        }
    ));
}

fn note_sequence() -> MigrationSequence {
    MigrationSequence::builder(NoteVersions::sequence_id())
        .step(
            NoteVersions::AddColor.step_id(),
            |p: PropertyBag| Ok(p.with("color", "yellow")),
            Down::reversible(|p: PropertyBag| Ok(p.without("color"))),
        )
        .step(
            NoteVersions::AddPinned.step_id(),
            |p: PropertyBag| Ok(p.with("pinned", false)),
            Down::reversible(|p: PropertyBag| Ok(p.without("pinned"))),
        )
        .step(
            NoteVersions::RenameBody.step_id(),
            |p: PropertyBag| {
                let body = p.get("body").cloned().unwrap_or_else(|| "".into());
                Ok(p.without("body").with("text", body))
            },
            Down::reversible(|p: PropertyBag| {
                let text = p.get("text").cloned().unwrap_or_else(|| "".into());
                Ok(p.without("text").with("body", text))
            }),
        )
        .build()
        .unwrap()
}

fn card_sequence() -> MigrationSequence {
    MigrationSequence::builder(CardVersions::sequence_id())
        .step(
            CardVersions::AddTitle.step_id(),
            |p: PropertyBag| Ok(p.with("title", "Untitled")),
            Down::NotReversible,
        )
        .build()
        .unwrap()
}

#[test]
fn full_pipeline_v0_to_latest_and_back() {
    let engine = MigrationEngine::builder()
        .sequence(note_sequence())
        .sequence(card_sequence())
        .build()
        .unwrap();
    let notes = [NoteVersions::sequence_id()];

    let v0 = Record::unversioned("n1", "note", PropertyBag::new().with("body", "buy milk"));
    assert!(engine.needs_migration(&v0.stamp, &notes).unwrap());

    let latest = engine.migrate_to_latest(&v0, &notes).unwrap();
    assert_eq!(
        latest.stamp,
        VersionStamp::At(NoteVersions::RenameBody.step_id())
    );
    assert_eq!(
        latest.props,
        PropertyBag::new()
            .with("color", "yellow")
            .with("pinned", false)
            .with("text", "buy milk")
    );
    assert!(!engine.needs_migration(&latest.stamp, &notes).unwrap());

    // Every note step is reversible, so the note can go all the way back.
    let back = engine
        .migrate(&latest, &VersionStamp::Unversioned, &notes)
        .unwrap();
    assert_eq!(back.props, v0.props);
}

#[test]
fn other_kinds_steps_are_skipped() {
    let engine = MigrationEngine::builder()
        .sequence(card_sequence())
        .sequence(note_sequence())
        .build()
        .unwrap();
    let notes = [NoteVersions::sequence_id()];

    // The card step sits first in the global order but never touches a note,
    // so its irreversibility does not block a note downgrade either.
    let v0 = Record::unversioned("n1", "note", PropertyBag::new().with("body", "x"));
    let latest = engine.migrate_to_latest(&v0, &notes).unwrap();
    assert!(!latest.props.contains_key("title"));
    assert_eq!(
        engine.registered_steps().first(),
        Some(&CardVersions::AddTitle.step_id())
    );

    let back = engine
        .migrate(&latest, &VersionStamp::Unversioned, &notes)
        .unwrap();
    assert_eq!(back.props, v0.props);
}
