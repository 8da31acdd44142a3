use crate::error::{PersistError, Result};
use crate::index::{DocFreq, Document, Index, TermFreq};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use time::OffsetDateTime;

/// Persisted form of one [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub tf: TermFreq,
    pub count: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
}

/// Everything needed to rebuild an [`Index`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub docs: HashMap<String, DocumentSnapshot>,
    pub df: DocFreq,
}

impl Index {
    pub fn snapshot(&self) -> IndexSnapshot {
        let docs = self
            .docs
            .iter()
            .map(|(path, doc)| {
                let snap = DocumentSnapshot { tf: doc.tf.clone(), count: doc.count, last_modified: doc.last_modified };
                (path.clone(), snap)
            })
            .collect();
        IndexSnapshot { docs, df: self.df.clone() }
    }

    /// Rebuild an index from `snapshot`, rejecting state that breaks the
    /// index invariants.
    pub fn restore(snapshot: IndexSnapshot) -> Result<Self> {
        let docs = snapshot
            .docs
            .into_iter()
            .map(|(path, snap)| {
                let doc = Document { tf: snap.tf, count: snap.count, last_modified: snap.last_modified };
                (path, doc)
            })
            .collect();
        let index = Index { docs, df: snapshot.df };
        index.check_invariants().map_err(PersistError::Corrupt)?;
        Ok(index)
    }
}

/// Encoding used by [`FileStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotFormat {
    #[default]
    Json,
    Bincode,
}

impl SnapshotFormat {
    pub fn extension(self) -> &'static str {
        match self {
            SnapshotFormat::Json => "json",
            SnapshotFormat::Bincode => "bin",
        }
    }
}

impl FromStr for SnapshotFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(SnapshotFormat::Json),
            "bincode" | "bin" => Ok(SnapshotFormat::Bincode),
            other => Err(format!("unknown snapshot format {other:?} (expected json or bincode)")),
        }
    }
}

impl fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotFormat::Json => f.write_str("json"),
            SnapshotFormat::Bincode => f.write_str("bincode"),
        }
    }
}

/// Somewhere an [`IndexSnapshot`] can be written to and read back from.
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<IndexSnapshot>>;
    fn save(&self, snapshot: &IndexSnapshot) -> Result<()>;
}

/// Single-file snapshot store.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    format: SnapshotFormat,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P, format: SnapshotFormat) -> Self {
        Self { path: path.as_ref().to_path_buf(), format }
    }

    /// Hidden snapshot file inside the indexed folder, e.g. `docs/.docseek.json`.
    pub fn in_folder<P: AsRef<Path>>(folder: P, format: SnapshotFormat) -> Self {
        let name = format!(".docseek.{}", format.extension());
        Self::new(folder.as_ref().join(name), format)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn encode(&self, snapshot: &IndexSnapshot, out: &mut impl Write) -> Result<()> {
        match self.format {
            SnapshotFormat::Json => serde_json::to_writer(out, snapshot)?,
            SnapshotFormat::Bincode => bincode::serialize_into(out, snapshot)?,
        }
        Ok(())
    }
}

impl SnapshotStore for FileStore {
    fn load(&self) -> Result<Option<IndexSnapshot>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistError::io(&self.path, e)),
        };
        let snapshot = match self.format {
            SnapshotFormat::Json => serde_json::from_slice(&bytes)?,
            SnapshotFormat::Bincode => bincode::deserialize(&bytes)?,
        };
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &IndexSnapshot) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| PersistError::io(dir, e))?;
        }
        let tmp = self.temp_path();
        let file = File::create(&tmp).map_err(|e| PersistError::io(&tmp, e))?;
        let mut out = BufWriter::new(file);
        self.encode(snapshot, &mut out)?;
        out.flush().map_err(|e| PersistError::io(&tmp, e))?;
        drop(out);
        fs::rename(&tmp, &self.path).map_err(|e| PersistError::io(&self.path, e))?;
        tracing::info!(path = %self.path.display(), docs = snapshot.docs.len(), "snapshot saved");
        Ok(())
    }
}

/// Restore the index held by `store`, or start empty if it holds nothing.
pub fn load_index(store: &dyn SnapshotStore) -> Result<Index> {
    match store.load()? {
        Some(snapshot) => {
            let index = Index::restore(snapshot)?;
            tracing::info!(docs = index.len(), "index restored from snapshot");
            Ok(index)
        }
        None => Ok(Index::new()),
    }
}
