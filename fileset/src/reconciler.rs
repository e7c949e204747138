//! Per-browser diffing: what a browser must fetch or drop to run a test case.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::browser::{BrowserCapability, SlaveBrowser};
use crate::file_record::{FileRecord, decide};
use crate::test_case::TestCaseSpec;

/// Update plan for one browser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserFileSet {
    pub files_to_update: Vec<FileRecord>,
    /// Files the browser holds that the case does not serve.
    pub extra_files: Vec<FileRecord>,
    /// Browser must clear its state before loading `files_to_update`.
    pub should_reset: bool,
}

impl BrowserFileSet {
    pub fn is_empty(&self) -> bool {
        self.files_to_update.is_empty() && self.extra_files.is_empty() && !self.should_reset
    }
}

/// Plan the update for `browser`, or an empty plan when no browser is known.
///
/// Does not touch the browser; callers that act on a reset plan must clear
/// the browser's file set themselves.
pub fn reconcile(browser: Option<&SlaveBrowser>, desired: &TestCaseSpec) -> BrowserFileSet {
    let Some(browser) = browser else {
        tracing::warn!(case_id = %desired.id, "no browser for file check, returning empty set");
        return BrowserFileSet::default();
    };
    let plan = plan(&browser.loaded_files(), browser.capability(), desired);
    if plan.should_reset {
        tracing::info!(
            browser = %browser.id(),
            name = %browser.info().name,
            extra = plan.extra_files.len(),
            "resetting browser file set to ensure proper overwriting"
        );
    }
    plan
}

/// Diff a browser's loaded files against the servable files of `desired`.
pub fn plan(
    loaded: &[FileRecord],
    capability: BrowserCapability,
    desired: &TestCaseSpec,
) -> BrowserFileSet {
    let servable = desired.servable();
    let loaded_by_path: HashMap<&str, &FileRecord> = loaded
        .iter()
        .map(|file| (file.display_path(), file))
        .collect();

    let files_to_update: Vec<FileRecord> = servable
        .iter()
        .filter(|new_file| match loaded_by_path.get(new_file.display_path()) {
            None => true,
            Some(old_file) => decide(old_file, new_file).replaces(),
        })
        .cloned()
        .collect();

    let servable_paths: HashSet<&str> = servable.iter().map(FileRecord::display_path).collect();
    let extra_files: Vec<FileRecord> = loaded
        .iter()
        .filter(|file| !servable_paths.contains(file.display_path()))
        .cloned()
        .collect();

    let changed = !(files_to_update.is_empty() && extra_files.is_empty());
    if changed && !capability.supports_incremental_overwrite {
        return BrowserFileSet {
            files_to_update: servable,
            extra_files,
            should_reset: true,
        };
    }

    tracing::debug!(
        case_id = %desired.id,
        update = files_to_update.len(),
        extra = extra_files.len(),
        "determined files to update"
    );
    BrowserFileSet {
        files_to_update,
        extra_files,
        should_reset: false,
    }
}
