//! The server-side file and test-case cache.
//!
//! Holds one canonical [`FileRecord`] per display path and every known
//! [`TestCaseSpec`]. Cases always reference the canonical record for each of
//! their paths, so content uploaded once reaches every case that shares it.
//!
//! Locking: `files` is taken once per merge batch; `cases` is taken while
//! `files` is still held, so two writers touching the same path are applied
//! in one total order and no case observes half of a batch.

// Lock poisoning is exceptional (requires panic in critical section) - allow expect for internal locks
#![allow(clippy::expect_used)]

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use crate::delta::Delta;
use crate::file_record::{FileRecord, Replacement, decide};
use crate::test_case::TestCaseSpec;

/// What merging one candidate did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeOutcome {
    /// Path was unknown; candidate cached as-is.
    Inserted,
    /// Candidate superseded the cached record.
    Replaced,
    /// Cached loaded record kept over a stale placeholder.
    Rejected,
    Unchanged,
}

/// Cases by id plus the reverse index used for fan-out.
#[derive(Default)]
struct CaseIndex {
    by_id: HashMap<String, TestCaseSpec>,
    by_path: HashMap<String, BTreeSet<String>>,
}

impl CaseIndex {
    fn insert(&mut self, case: TestCaseSpec) {
        if let Some(previous) = self.by_id.remove(&case.id) {
            for path in previous.display_paths() {
                if let Some(ids) = self.by_path.get_mut(path) {
                    ids.remove(&previous.id);
                    if ids.is_empty() {
                        self.by_path.remove(path);
                    }
                }
            }
        }
        for path in case.display_paths() {
            self.by_path
                .entry(path.to_string())
                .or_default()
                .insert(case.id.clone());
        }
        self.by_id.insert(case.id.clone(), case);
    }

    /// Point every case referencing one of `winners` at the winning record.
    fn fan_out(&mut self, winners: &[FileRecord]) -> usize {
        if winners.is_empty() {
            return 0;
        }
        let replacements: HashMap<&str, &FileRecord> = winners
            .iter()
            .map(|record| (record.display_path(), record))
            .collect();
        let affected: BTreeSet<&String> = replacements
            .keys()
            .filter_map(|path| self.by_path.get(*path))
            .flatten()
            .collect();

        let mut updated = 0;
        for id in affected {
            if let Some(case) = self.by_id.get_mut(id) {
                let next = case.with_replacements(&replacements);
                if next != *case {
                    *case = next;
                    updated += 1;
                }
            }
        }
        updated
    }
}

/// Content-versioned store shared by every request handler.
///
/// Construct one per server process and share it behind an [`Arc`].
#[derive(Default)]
pub struct SynchronizationStore {
    files: Mutex<HashMap<String, FileRecord>>,
    cases: RwLock<CaseIndex>,
}

impl SynchronizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or overwrite) a test case and return the content it still
    /// needs uploaded.
    ///
    /// Placeholders for paths the cache already holds loaded are silently
    /// upgraded and left out of the returned delta.
    pub fn add_case(&self, case: TestCaseSpec) -> Delta {
        let mut files = self.files.lock().expect("lock");
        let winners = merge_all(&mut files, case.records());
        let upgraded = canonicalize(&files, &case);

        let mut cases = self.cases.write().expect("lock");
        drop(files);

        let fanned = cases.fan_out(&winners);
        let owed = upgraded.unloaded_delta();
        tracing::debug!(
            case_id = %upgraded.id,
            owed = owed.len(),
            fanned_out = fanned,
            "test case registered"
        );
        cases.insert(upgraded);
        owed
    }

    /// Merge uploaded content and point every case sharing those paths at
    /// the canonical result.
    pub fn apply_delta(&self, delta: &Delta) {
        let mut files = self.files.lock().expect("lock");
        merge_all(&mut files, delta.records());
        let touched: Vec<FileRecord> = delta
            .display_paths()
            .filter_map(|path| files.get(path).cloned())
            .collect();

        let mut cases = self.cases.write().expect("lock");
        drop(files);

        let fanned = cases.fan_out(&touched);
        tracing::debug!(records = delta.len(), fanned_out = fanned, "delta applied");
    }

    pub fn get_case(&self, id: &str) -> Option<TestCaseSpec> {
        self.cases.read().expect("lock").by_id.get(id).cloned()
    }

    /// All known cases, ordered by id.
    pub fn get_cases(&self) -> Vec<TestCaseSpec> {
        let cases = self.cases.read().expect("lock");
        let mut all: Vec<TestCaseSpec> = cases.by_id.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Content of the canonical record for `display_path`, if it is loaded.
    pub fn get_file_content(&self, display_path: &str) -> Option<Arc<str>> {
        self.files
            .lock()
            .expect("lock")
            .get(display_path)
            .and_then(|record| record.data().cloned())
    }

    /// The canonical record for `display_path`.
    pub fn get_file(&self, display_path: &str) -> Option<FileRecord> {
        self.files.lock().expect("lock").get(display_path).cloned()
    }

    /// Ids of the cases referencing `display_path`, sorted.
    pub fn cases_referencing(&self, display_path: &str) -> Vec<String> {
        self.cases
            .read()
            .expect("lock")
            .by_path
            .get(display_path)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn case_count(&self) -> usize {
        self.cases.read().expect("lock").by_id.len()
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().expect("lock").len()
    }
}

/// Merge a batch into the cache; returns the records that replaced an
/// existing cache entry (the ones other cases must converge to).
fn merge_all<'a>(
    files: &mut HashMap<String, FileRecord>,
    records: impl Iterator<Item = &'a FileRecord>,
) -> Vec<FileRecord> {
    records
        .filter(|record| merge(files, record) == MergeOutcome::Replaced)
        .cloned()
        .collect()
}

fn merge(files: &mut HashMap<String, FileRecord>, candidate: &FileRecord) -> MergeOutcome {
    let Some(cached) = files.get(candidate.display_path()) else {
        tracing::debug!("caching new file {candidate}");
        files.insert(candidate.display_path().to_string(), candidate.clone());
        return MergeOutcome::Inserted;
    };
    match decide(cached, candidate) {
        Replacement::Replace => {
            tracing::debug!("replacing {cached} with {candidate}");
            files.insert(candidate.display_path().to_string(), candidate.clone());
            MergeOutcome::Replaced
        }
        Replacement::KeepCached => {
            tracing::debug!("not replacing {cached} (loaded) with {candidate}");
            MergeOutcome::Rejected
        }
        Replacement::Keep => {
            tracing::trace!("files are equal {cached}, {candidate}");
            MergeOutcome::Unchanged
        }
    }
}

/// The case with every record swapped for the cache's canonical version.
fn canonicalize(files: &HashMap<String, FileRecord>, case: &TestCaseSpec) -> TestCaseSpec {
    let canonical: HashMap<&str, &FileRecord> = case
        .display_paths()
        .filter_map(|path| files.get(path).map(|record| (path, record)))
        .collect();
    case.with_replacements(&canonical)
}
