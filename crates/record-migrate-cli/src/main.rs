use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use record_migrate::LoadError;
use tracing_subscriber::EnvFilter;

mod commands;

/// record-migrate: Migration tool for versioned shape documents.
///
/// Inspect, migrate, and downgrade JSON document snapshots from the command line.
#[derive(Parser)]
#[command(name = "record-migrate", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a document's writer schema and how far behind its records are.
    Inspect {
        /// Path to the document snapshot (JSON).
        snapshot: PathBuf,
    },

    /// Bring a document up to this build's schema, or down to an older one.
    Migrate {
        /// Path to the document snapshot (JSON).
        snapshot: PathBuf,

        /// Write the result here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Loader configuration (TOML).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Serialized schema (JSON) of the build to downgrade for.
        #[arg(long)]
        downgrade_to: Option<PathBuf>,

        /// Check that the document migrates without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// List every migration step in global order.
    Steps,

    /// Print this build's serialized schema.
    Schema,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect { snapshot } => commands::inspect(&snapshot),
        Commands::Migrate {
            snapshot,
            out,
            config,
            downgrade_to,
            dry_run,
        } => commands::migrate(
            &snapshot,
            out.as_deref(),
            config.as_deref(),
            downgrade_to.as_deref(),
            dry_run,
        ),
        Commands::Steps => commands::steps(),
        Commands::Schema => commands::schema(),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        if let Some(load) = e.downcast_ref::<LoadError>() {
            eprintln!("hint: {}", commands::hint(load.category()));
        }
        process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}
