use crate::source::{FsSource, SourceDocument};
use anyhow::Result;
use docseek_core::{Index, SharedIndex, SnapshotStore};
use parking_lot::MutexGuard;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

/// How long a crawl holds the index lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockScope {
    /// Lock for the freshness check and again for each insert. Reading and
    /// extracting files happens unlocked, so queries interleave between files.
    #[default]
    PerFile,
    /// Hold the lock from the first file to the last. Queries wait for the
    /// whole crawl.
    WholeWalk,
}

impl FromStr for LockScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "per-file" => Ok(LockScope::PerFile),
            "whole-walk" => Ok(LockScope::WholeWalk),
            other => Err(format!("unknown lock scope {other:?} (expected per-file or whole-walk)")),
        }
    }
}

impl fmt::Display for LockScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockScope::PerFile => f.write_str("per-file"),
            LockScope::WholeWalk => f.write_str("whole-walk"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Documents the source produced.
    pub seen: usize,
    /// Documents (re-)added to the index.
    pub indexed: usize,
    /// Documents already indexed at their current timestamp.
    pub unchanged: usize,
    /// Documents whose text could not be extracted.
    pub failed: usize,
    /// Errors reported by the source itself.
    pub walk_errors: usize,
    /// Indexed documents no longer present in the source.
    pub pruned: usize,
    pub persisted: bool,
}

impl CrawlReport {
    pub fn changed(&self) -> bool {
        self.indexed > 0 || self.pruned > 0
    }
}

/// Access to the index for one step of a crawl.
trait IndexAccess {
    fn with<R>(&mut self, f: impl FnOnce(&mut Index) -> R) -> R;
}

/// Takes the lock afresh for every step.
struct Relock<'a>(&'a SharedIndex);

impl IndexAccess for Relock<'_> {
    fn with<R>(&mut self, f: impl FnOnce(&mut Index) -> R) -> R {
        let mut index = self.0.lock();
        f(&mut *index)
    }
}

/// Keeps one lock for the whole crawl.
struct Held<'a>(MutexGuard<'a, Index>);

impl IndexAccess for Held<'_> {
    fn with<R>(&mut self, f: impl FnOnce(&mut Index) -> R) -> R {
        f(&mut *self.0)
    }
}

/// Bring `index` up to date with `source`.
///
/// Only documents that [`Index::requires_reindexing`] flags are extracted.
/// Extraction and source errors are logged and skipped. When the source
/// reported no errors it is taken as complete, and indexed paths it did not
/// produce are removed.
pub fn reindex<I, D>(index: &SharedIndex, source: I, scope: LockScope) -> CrawlReport
where
    I: IntoIterator<Item = Result<D>>,
    D: SourceDocument,
{
    match scope {
        LockScope::PerFile => crawl(source, &mut Relock(index)),
        LockScope::WholeWalk => crawl(source, &mut Held(index.lock())),
    }
}

fn crawl<I, D, A>(source: I, access: &mut A) -> CrawlReport
where
    I: IntoIterator<Item = Result<D>>,
    D: SourceDocument,
    A: IndexAccess,
{
    let mut report = CrawlReport::default();
    let mut seen = HashSet::new();

    for item in source {
        let doc = match item {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "source error, continuing");
                report.walk_errors += 1;
                continue;
            }
        };
        report.seen += 1;
        let path = doc.path();
        let last_modified = doc.last_modified();
        seen.insert(path.to_string());

        if !access.with(|index| index.requires_reindexing(path, last_modified)) {
            report.unchanged += 1;
            continue;
        }

        match doc.text() {
            Ok(text) => {
                tracing::info!(path, "indexing");
                access.with(|index| index.add_document(path, last_modified, &text));
                report.indexed += 1;
            }
            Err(e) => {
                tracing::warn!(path, error = %format!("{e:#}"), "could not extract text, skipping");
                report.failed += 1;
            }
        }
    }

    if report.walk_errors == 0 {
        report.pruned = access.with(|index: &mut Index| index.retain_paths(|p| seen.contains(p)));
    } else {
        tracing::warn!(errors = report.walk_errors, "incomplete walk, not pruning missing documents");
    }
    report
}

/// Crawl `root`, update `index`, and save a snapshot to `store` if the
/// index holds changes that are not on disk yet.
///
/// `unsaved` carries that state between passes: a pass that changes the
/// index sets it, a successful write clears it. A failed write is therefore
/// retried on the next pass even when nothing else changed. The snapshot is
/// copied under a short lock and written with the lock released. A failed
/// write is logged; the in-memory index stays authoritative.
pub fn refresh(
    root: &Path,
    index: &SharedIndex,
    store: &dyn SnapshotStore,
    scope: LockScope,
    unsaved: &mut bool,
) -> CrawlReport {
    let started = Instant::now();
    let mut report = reindex(index, FsSource::new(root), scope);
    tracing::info!(
        root = %root.display(),
        seen = report.seen,
        indexed = report.indexed,
        failed = report.failed,
        pruned = report.pruned,
        took_s = started.elapsed().as_secs_f64(),
        "finished indexing"
    );

    *unsaved |= report.changed();
    if *unsaved {
        let snapshot = index.snapshot();
        match store.save(&snapshot) {
            Ok(()) => {
                report.persisted = true;
                *unsaved = false;
            }
            Err(e) => tracing::error!(error = %e, "could not save snapshot, will retry after the next pass"),
        }
    }
    report
}
