use anyhow::{anyhow, Result};
use docseek_core::{load_index, FileStore, IndexSnapshot, PersistError, SharedIndex, SnapshotFormat, SnapshotStore};
use docseek_crawler::{refresh, reindex, LockScope, SourceDocument};
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, SystemTime};
use time::macros::datetime;
use time::OffsetDateTime;

const T: OffsetDateTime = datetime!(2024-06-01 08:00 UTC);

struct MemDoc {
    path: &'static str,
    last_modified: OffsetDateTime,
    text: Option<&'static str>,
}

impl SourceDocument for MemDoc {
    fn path(&self) -> &str {
        self.path
    }

    fn last_modified(&self) -> OffsetDateTime {
        self.last_modified
    }

    fn text(&self) -> Result<String> {
        self.text.map(str::to_string).ok_or_else(|| anyhow!("unreadable {}", self.path))
    }
}

fn doc(path: &'static str, text: &'static str) -> Result<MemDoc> {
    Ok(MemDoc { path, last_modified: T, text: Some(text) })
}

/// Source that records whether the index was locked each time the crawl
/// asked it for the next document.
struct Probe {
    index: SharedIndex,
    docs: std::vec::IntoIter<Result<MemDoc>>,
    locked: Rc<RefCell<Vec<bool>>>,
}

impl Iterator for Probe {
    type Item = Result<MemDoc>;

    fn next(&mut self) -> Option<Self::Item> {
        let locked = self.index.try_lock().is_none();
        self.locked.borrow_mut().push(locked);
        self.docs.next()
    }
}

fn probe(index: &SharedIndex) -> (Probe, Rc<RefCell<Vec<bool>>>) {
    let locked = Rc::new(RefCell::new(Vec::new()));
    let docs = vec![doc("a.txt", "alpha"), doc("b.txt", "beta"), doc("c.txt", "gamma")];
    let source = Probe { index: index.clone(), docs: docs.into_iter(), locked: locked.clone() };
    (source, locked)
}

#[test]
fn per_file_scope_leaves_index_unlocked_between_files() {
    let index = SharedIndex::default();
    let (source, locked) = probe(&index);
    let report = reindex(&index, source, LockScope::PerFile);
    assert_eq!(report.indexed, 3);
    assert_eq!(*locked.borrow(), vec![false; 4]);
}

#[test]
fn whole_walk_scope_holds_lock_for_entire_crawl() {
    let index = SharedIndex::default();
    let (source, locked) = probe(&index);
    let report = reindex(&index, source, LockScope::WholeWalk);
    assert_eq!(report.indexed, 3);
    assert_eq!(*locked.borrow(), vec![true; 4]);
    assert!(index.try_lock().is_some());
}

#[test]
fn only_stale_documents_are_extracted() {
    let index = SharedIndex::default();
    index.lock().add_document("a.txt", T, "alpha");
    // a.txt would fail extraction if it were read again
    let source = vec![Ok(MemDoc { path: "a.txt", last_modified: T, text: None }), doc("b.txt", "beta")];
    let report = reindex(&index, source, LockScope::PerFile);
    assert_eq!((report.seen, report.unchanged, report.indexed, report.failed), (2, 1, 1, 0));
    assert_eq!(index.stats().docs_count, 2);
}

#[test]
fn extraction_failure_skips_only_that_file() {
    let index = SharedIndex::default();
    let source = vec![doc("a.txt", "alpha"), Ok(MemDoc { path: "bad.txt", last_modified: T, text: None }), doc("c.txt", "gamma")];
    let report = reindex(&index, source, LockScope::PerFile);
    assert_eq!((report.indexed, report.failed), (2, 1));
    assert!(index.lock().document("bad.txt").is_none());
}

#[test]
fn documents_missing_from_a_clean_walk_are_pruned() {
    let index = SharedIndex::default();
    index.lock().add_document("gone.txt", T, "old news");
    let report = reindex(&index, vec![doc("a.txt", "alpha")], LockScope::PerFile);
    assert_eq!(report.pruned, 1);
    assert!(report.changed());
    assert_eq!(index.lock().paths().collect::<Vec<_>>(), vec!["a.txt"]);
    index.lock().check_invariants().unwrap();
}

#[test]
fn walk_errors_disable_pruning() {
    let index = SharedIndex::default();
    index.lock().add_document("gone.txt", T, "old news");
    let source = vec![Err(anyhow!("permission denied")), doc("a.txt", "alpha")];
    let report = reindex(&index, source, LockScope::PerFile);
    assert_eq!((report.walk_errors, report.pruned, report.indexed), (1, 0, 1));
    assert_eq!(index.stats().docs_count, 2);
}

fn set_mtime(path: &Path, ahead: Duration) {
    fs::File::options().write(true).open(path).unwrap().set_modified(SystemTime::now() + ahead).unwrap();
}

#[test]
fn refresh_indexes_persists_and_catches_up() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    fs::write(root.join("a.txt"), "the cat sat").unwrap();
    fs::write(root.join("b.md"), "the dog sat").unwrap();
    fs::create_dir(root.join("pages")).unwrap();
    fs::write(root.join("pages/c.xhtml"), "<html><body><p>a cat &amp; a bird</p></body></html>").unwrap();
    fs::write(root.join("broken.xml"), "<a><b>oops</a>").unwrap();

    let store = FileStore::in_folder(root, SnapshotFormat::Json);
    let index = SharedIndex::default();

    let mut unsaved = false;
    let report = refresh(root, &index, &store, LockScope::PerFile, &mut unsaved);
    assert_eq!((report.seen, report.indexed, report.failed), (4, 3, 1));
    assert!(report.persisted);
    assert!(store.path().exists());
    assert_eq!(index.search("dog", 20)[0].path, root.join("b.md").to_string_lossy());

    let report = refresh(root, &index, &store, LockScope::PerFile, &mut unsaved);
    assert_eq!((report.indexed, report.unchanged), (0, 3));
    assert!(!report.persisted);

    fs::write(root.join("a.txt"), "the fish swam").unwrap();
    set_mtime(&root.join("a.txt"), Duration::from_secs(120));
    fs::remove_file(root.join("b.md")).unwrap();
    let report = refresh(root, &index, &store, LockScope::WholeWalk, &mut unsaved);
    assert_eq!((report.indexed, report.pruned), (1, 1));
    assert!(report.persisted);

    let restored = load_index(&store).unwrap();
    assert_eq!(restored, *index.lock());
    assert_eq!(restored.stats().docs_count, 2);
}

struct FailingStore;

impl SnapshotStore for FailingStore {
    fn load(&self) -> docseek_core::error::Result<Option<IndexSnapshot>> {
        Ok(None)
    }

    fn save(&self, _: &IndexSnapshot) -> docseek_core::error::Result<()> {
        Err(PersistError::Corrupt("disk full".into()))
    }
}

#[test]
fn failed_save_keeps_serving_from_memory() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("a.txt"), "still searchable").unwrap();
    let index = SharedIndex::default();
    let mut unsaved = false;
    let report = refresh(tmp.path(), &index, &FailingStore, LockScope::PerFile, &mut unsaved);
    assert_eq!(report.indexed, 1);
    assert!(!report.persisted);
    assert!(unsaved);
    assert_eq!(index.search("searchable", 20).len(), 1);
}

#[test]
fn failed_save_is_retried_once_storage_recovers() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("a.txt"), "written eventually").unwrap();
    let index = SharedIndex::default();
    let mut unsaved = false;

    let report = refresh(tmp.path(), &index, &FailingStore, LockScope::PerFile, &mut unsaved);
    assert!(!report.persisted);

    let store = FileStore::in_folder(tmp.path(), SnapshotFormat::Json);
    let report = refresh(tmp.path(), &index, &store, LockScope::PerFile, &mut unsaved);
    assert!(!report.changed());
    assert!(report.persisted);
    assert!(!unsaved);
    assert_eq!(load_index(&store).unwrap(), *index.lock());

    let report = refresh(tmp.path(), &index, &store, LockScope::PerFile, &mut unsaved);
    assert!(!report.persisted);
}
