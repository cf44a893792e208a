use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use record_migrate::{
    DocumentLoader, DocumentSnapshot, FailureCategory, MigrationConfig, SequenceId,
    SerializedSchema,
};
use shape_schema::{shape_engine, shape_loader, shape_registry};
use tracing::debug;

/// `record-migrate inspect <snapshot>`: writer schema vs. this build, and
/// where the records stand.
pub fn inspect(path: &Path) -> Result<()> {
    let snapshot = read_snapshot(path)?;
    let loader = shape_loader(MigrationConfig::default())?;
    let current = loader.engine().serialize_schema();

    println!("Document: {}", path.display());
    println!("Records: {}", snapshot.records.len());
    println!();

    println!("  {:<24} {:>8} {:>8}", "Sequence", "Writer", "Build");
    println!("  {}", "-".repeat(42));
    let ids: BTreeSet<&SequenceId> = snapshot
        .schema
        .sequences
        .keys()
        .chain(current.sequences.keys())
        .collect();
    for id in ids {
        let writer = version_cell(&snapshot.schema, id);
        let build = version_cell(&current, id);
        let marker = match (snapshot.schema.sequences.get(id), current.sequences.get(id)) {
            (Some(w), Some(b)) if w > b => style(" newer").red().to_string(),
            (Some(_), None) => style(" unknown").red().to_string(),
            (Some(w), Some(b)) if w < b => style(" older").yellow().to_string(),
            _ => String::new(),
        };
        println!("  {:<24} {:>8} {:>8}{marker}", id.as_str(), writer, build);
    }
    println!();

    let status = record_status(&loader, &snapshot);
    println!("  {:<12} {:<28} {:>8}", "Kind", "Stamp", "Records");
    println!("  {}", "-".repeat(50));
    for ((kind, stamp), count) in &status.by_stamp {
        println!("  {:<12} {:<28} {:>8}", truncate(kind, 12), truncate(stamp, 28), count);
    }
    println!();

    println!("  {} record(s) need migration", status.behind);
    if status.unreadable > 0 {
        println!(
            "  {}",
            style(format!("{} record(s) cannot be migrated by this build", status.unreadable))
                .red()
        );
    }
    Ok(())
}

#[derive(Debug, Default)]
struct RecordStatus {
    by_stamp: BTreeMap<(String, String), usize>,
    behind: usize,
    unreadable: usize,
}

fn record_status(loader: &DocumentLoader, snapshot: &DocumentSnapshot) -> RecordStatus {
    let mut status = RecordStatus::default();
    for record in &snapshot.records {
        *status
            .by_stamp
            .entry((record.kind.clone(), record.stamp.to_string()))
            .or_default() += 1;

        let behind = loader
            .sequences_for(&record.kind)
            .map(|seqs| loader.engine().pending_steps(&record.stamp, &snapshot.schema, seqs))
            .map(|pending| pending.map(|steps| !steps.is_empty()));
        match behind {
            Some(Ok(true)) => status.behind += 1,
            Some(Ok(false)) => {}
            Some(Err(_)) | None => status.unreadable += 1,
        }
    }
    status
}

/// `record-migrate migrate <snapshot>`: load (and optionally downgrade) a
/// document, writing the result as JSON.
pub fn migrate(
    path: &Path,
    out: Option<&Path>,
    config: Option<&Path>,
    downgrade_to: Option<&Path>,
    dry_run: bool,
) -> Result<()> {
    let config = match config {
        Some(p) => MigrationConfig::from_path(p)?,
        None => MigrationConfig::default(),
    };
    debug!(?config, "loader configuration");

    let loader = shape_loader(config)?;
    let snapshot = read_snapshot(path)?;
    let loaded = loader.load(&snapshot)?;

    let result = match downgrade_to {
        Some(target_path) => {
            let text = fs::read_to_string(target_path)
                .with_context(|| format!("failed to read {}", target_path.display()))?;
            let target: SerializedSchema = serde_json::from_str(&text)
                .with_context(|| format!("{} is not a serialized schema", target_path.display()))?;
            loader.downgrade(&loaded.snapshot, &target)?
        }
        None => loaded.snapshot,
    };

    eprintln!(
        "{} {} record(s), {} migrated",
        style("ok").green().bold(),
        result.records.len(),
        loaded.migrated
    );
    if dry_run {
        return Ok(());
    }

    let json = result.to_json_pretty()?;
    match out {
        Some(out) => fs::write(out, json + "\n")
            .with_context(|| format!("failed to write {}", out.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

/// `record-migrate steps`: the global step order this build applies.
pub fn steps() -> Result<()> {
    let engine = shape_engine()?;
    let registry = shape_registry()?;

    println!("  {:>3}  {:<22} {:<20} Down", "#", "Step", "Name");
    println!("  {}", "-".repeat(58));
    for step in engine.ordered_steps() {
        let id = step.id();
        let position = engine.position(id).unwrap_or_default();
        let name = registry.name_of(id).unwrap_or("?");
        let down = if step.is_reversible() {
            style("reversible").green()
        } else {
            style("one-way").yellow()
        };
        println!("  {position:>3}  {:<22} {name:<20} {down}", id.to_string());
    }
    Ok(())
}

/// `record-migrate schema`: the schema this build writes next to documents.
pub fn schema() -> Result<()> {
    let schema = shape_engine()?.serialize_schema();
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

/// What to tell the user about a refused document.
pub fn hint(category: FailureCategory) -> &'static str {
    match category {
        FailureCategory::UpgradeApp => "the document was written by a newer version; upgrade to open it",
        FailureCategory::Corrupted => "the document content is damaged",
        FailureCategory::Unsupported => "the document cannot be converted that way",
    }
}

fn read_snapshot(path: &Path) -> Result<DocumentSnapshot> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    DocumentSnapshot::from_json(&text)
        .with_context(|| format!("{} is not a document snapshot", path.display()))
}

fn version_cell(schema: &SerializedSchema, id: &SequenceId) -> String {
    schema
        .sequences
        .get(id)
        .map_or_else(|| "-".to_string(), u32::to_string)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
