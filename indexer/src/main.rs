use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docseek_core::{clamp_limit, load_index, FileStore, SharedIndex, SnapshotFormat, SnapshotStore};
use docseek_crawler::{refresh, LockScope};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "docseek-indexer")]
#[command(about = "Build and query the TF-IDF index of a local folder", long_about = None)]
struct Cli {
    /// Snapshot encoding stored next to the indexed documents
    #[arg(long, global = true, default_value_t = SnapshotFormat::Json)]
    format: SnapshotFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a folder, re-index changed files and save the snapshot
    Index {
        folder: PathBuf,
        /// Hold the index lock per file or for the whole walk
        #[arg(long, default_value_t = LockScope::PerFile)]
        lock_scope: LockScope,
    },
    /// Rank the folder's indexed documents against a query
    Search {
        folder: PathBuf,
        /// Query text; several words are joined with spaces
        #[arg(required = true)]
        query: Vec<String>,
        /// Number of results to print (1..=100)
        #[arg(long)]
        limit: Option<usize>,
        /// Print results as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print document and term counts
    Stats { folder: PathBuf },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Index { folder, lock_scope } => index_folder(&folder, cli.format, lock_scope),
        Commands::Search { folder, query, limit, json } => {
            search_folder(&folder, cli.format, &query.join(" "), clamp_limit(limit), json)
        }
        Commands::Stats { folder } => {
            let index = open(&FileStore::in_folder(&folder, cli.format))?;
            println!("{}", serde_json::to_string_pretty(&index.stats())?);
            Ok(())
        }
    }
}

/// Load the snapshot or fail; a snapshot that cannot be read is never
/// silently replaced by an empty index.
fn open(store: &FileStore) -> Result<SharedIndex> {
    let index = load_index(store).with_context(|| format!("could not load index {}", store.path().display()))?;
    Ok(SharedIndex::new(index))
}

fn index_folder(folder: &Path, format: SnapshotFormat, scope: LockScope) -> Result<()> {
    anyhow::ensure!(folder.is_dir(), "{} is not a directory", folder.display());
    let store = FileStore::in_folder(folder, format);
    let index = open(&store)?;
    let mut unsaved = false;
    let report = refresh(folder, &index, &store as &dyn SnapshotStore, scope, &mut unsaved);
    let stats = index.stats();
    println!(
        "indexed={} unchanged={} failed={} pruned={} docs={} terms={}",
        report.indexed, report.unchanged, report.failed, report.pruned, stats.docs_count, stats.terms_count
    );
    if unsaved {
        anyhow::bail!("index updated but the snapshot could not be written to {}", store.path().display());
    }
    Ok(())
}

fn search_folder(folder: &Path, format: SnapshotFormat, query: &str, limit: usize, json: bool) -> Result<()> {
    let index = open(&FileStore::in_folder(folder, format))?;
    let results = index.search(query, limit);
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for hit in &results {
            println!("{:.6}\t{}", hit.rank, hit.path);
        }
    }
    Ok(())
}
