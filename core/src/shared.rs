use crate::index::{Index, IndexStats};
use crate::persist::IndexSnapshot;
use crate::query::SearchResult;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Cloneable handle to the one index a process serves.
///
/// Every access, read or write, takes the same exclusive lock for its whole
/// duration, so callers never observe a half-applied document.
#[derive(Clone, Default)]
pub struct SharedIndex {
    inner: Arc<Mutex<Index>>,
}

impl SharedIndex {
    pub fn new(index: Index) -> Self {
        Self { inner: Arc::new(Mutex::new(index)) }
    }

    pub fn lock(&self) -> MutexGuard<'_, Index> {
        self.inner.lock()
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, Index>> {
        self.inner.try_lock()
    }

    /// Ranked hits for `query`, cut to the first `limit`.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let mut results = self.lock().search(query);
        results.truncate(limit);
        results
    }

    pub fn stats(&self) -> IndexStats {
        self.lock().stats()
    }

    /// Copy of the current state, taken under the lock. Writing it out is
    /// left to the caller so storage I/O never blocks queries.
    pub fn snapshot(&self) -> IndexSnapshot {
        self.lock().snapshot()
    }
}
