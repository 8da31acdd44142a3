use crate::extract::{extract_text, is_supported};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use walkdir::{DirEntry, WalkDir};

/// A `(path, timestamp, text)` triple whose text is only produced on demand,
/// so unchanged files are never read.
pub trait SourceDocument {
    fn path(&self) -> &str;
    fn last_modified(&self) -> OffsetDateTime;
    fn text(&self) -> Result<String>;
}

/// A file discovered under the crawl root.
#[derive(Debug, Clone)]
pub struct FsDocument {
    file: PathBuf,
    path: String,
    last_modified: OffsetDateTime,
}

impl FsDocument {
    pub fn file(&self) -> &Path {
        &self.file
    }
}

impl SourceDocument for FsDocument {
    fn path(&self) -> &str {
        &self.path
    }

    fn last_modified(&self) -> OffsetDateTime {
        self.last_modified
    }

    fn text(&self) -> Result<String> {
        extract_text(&self.file)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

/// Recursive walk yielding supported files in file-name order.
///
/// Hidden entries (leading `.`) are skipped along with everything below
/// them; the root is exempt. Files whose path is not valid UTF-8 are skipped
/// with a warning. Symlinks are not followed. Unreadable
/// directories and metadata come out as `Err` items and the walk carries on.
pub struct FsSource {
    walker: walkdir::FilterEntry<walkdir::IntoIter, fn(&DirEntry) -> bool>,
}

impl FsSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let visible: fn(&DirEntry) -> bool = |entry| entry.depth() == 0 || !is_hidden(entry);
        let walker = WalkDir::new(root).follow_links(false).sort_by_file_name().into_iter().filter_entry(visible);
        Self { walker }
    }

    fn document(entry: &DirEntry, path: &str) -> Result<FsDocument> {
        let metadata = entry.metadata().with_context(|| format!("could not stat {}", entry.path().display()))?;
        let modified = metadata
            .modified()
            .with_context(|| format!("no modification time for {}", entry.path().display()))?;
        Ok(FsDocument {
            file: entry.path().to_path_buf(),
            path: path.to_string(),
            last_modified: OffsetDateTime::from(modified),
        })
    }
}

impl Iterator for FsSource {
    type Item = Result<FsDocument>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(anyhow::Error::new(e).context("could not walk directory"))),
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if !is_supported(entry.path()) {
                tracing::trace!(path = %entry.path().display(), "unsupported file type");
                continue;
            }
            // Index keys are exact UTF-8 paths.
            let Some(path) = entry.path().to_str() else {
                tracing::warn!(path = %entry.path().display(), "path is not valid UTF-8, skipping");
                continue;
            };
            return Some(Self::document(&entry, path));
        }
    }
}
