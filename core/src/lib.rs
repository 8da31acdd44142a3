//! Full-text indexing core: tokenizer, TF-IDF index, ranked search and the
//! lock-guarded handle shared between the crawler and query transports.

pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod shared;
pub mod tokenizer;

pub use error::PersistError;
pub use index::{DocFreq, Document, Index, IndexStats, TermFreq};
pub use persist::{load_index, DocumentSnapshot, FileStore, IndexSnapshot, SnapshotFormat, SnapshotStore};
pub use query::{clamp_limit, SearchResult, DEFAULT_RESULT_LIMIT, MAX_RESULT_LIMIT};
pub use shared::SharedIndex;
