//! Filesystem side of indexing: discovers documents under a root, extracts
//! their text, and feeds changed ones into a [`docseek_core::SharedIndex`].

pub mod extract;
pub mod reindex;
pub mod source;

pub use extract::{extract_text, is_supported, SUPPORTED_EXTENSIONS};
pub use reindex::{refresh, reindex, CrawlReport, LockScope};
pub use source::{FsDocument, FsSource, SourceDocument};
