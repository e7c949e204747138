//! Test case definitions: an id plus ordered dependency, test and plugin files.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::delta::Delta;
use crate::file_record::FileRecord;

/// A logical test case as submitted by a client.
///
/// List order is load order. A case without tests is legal and only carries
/// infrastructure files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseSpec {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub dependencies: Vec<FileRecord>,
    #[serde(default)]
    pub tests: Vec<FileRecord>,
    #[serde(default)]
    pub plugins: Vec<FileRecord>,
}

impl TestCaseSpec {
    pub fn new(
        id: impl Into<String>,
        dependencies: Vec<FileRecord>,
        tests: Vec<FileRecord>,
        plugins: Vec<FileRecord>,
    ) -> Self {
        Self {
            id: id.into(),
            dependencies,
            tests,
            plugins,
        }
    }

    /// Every record in the case: dependencies, then tests, then plugins.
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.dependencies
            .iter()
            .chain(self.tests.iter())
            .chain(self.plugins.iter())
    }

    pub fn display_paths(&self) -> impl Iterator<Item = &str> {
        self.records().map(FileRecord::display_path)
    }

    /// All records the case references, plugins included.
    pub fn file_set(&self) -> Vec<FileRecord> {
        self.records().cloned().collect()
    }

    /// Files a browser should hold for this case: dependencies then tests,
    /// excluding remote references. A path listed twice is served once, at
    /// its first position.
    pub fn servable(&self) -> Vec<FileRecord> {
        let mut seen = HashSet::new();
        self.dependencies
            .iter()
            .chain(self.tests.iter())
            .filter(|file| file.can_load() && seen.insert(file.display_path()))
            .cloned()
            .collect()
    }

    /// Loadable records that still lack content.
    pub fn unloaded_delta(&self) -> Delta {
        fn owed(files: &[FileRecord]) -> Vec<FileRecord> {
            files
                .iter()
                .filter(|file| !file.is_loaded() && file.can_load())
                .cloned()
                .collect()
        }
        Delta::new(
            owed(&self.dependencies),
            owed(&self.tests),
            owed(&self.plugins),
        )
    }

    /// Swap in every delta record whose display path this case references.
    /// A path is matched regardless of which list it appears in.
    pub fn apply_delta(&self, delta: &Delta) -> TestCaseSpec {
        let replacements: HashMap<&str, &FileRecord> = delta
            .records()
            .map(|record| (record.display_path(), record))
            .collect();
        self.with_replacements(&replacements)
    }

    pub(crate) fn with_replacements(
        &self,
        replacements: &HashMap<&str, &FileRecord>,
    ) -> TestCaseSpec {
        let swap = |files: &[FileRecord]| -> Vec<FileRecord> {
            files
                .iter()
                .map(|file| {
                    replacements
                        .get(file.display_path())
                        .map_or_else(|| file.clone(), |&record| record.clone())
                })
                .collect()
        };
        TestCaseSpec {
            id: self.id.clone(),
            dependencies: swap(&self.dependencies),
            tests: swap(&self.tests),
            plugins: swap(&self.plugins),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn file(path: &str, version: i64) -> FileRecord {
        FileRecord::placeholder(path, version).with_content("", version)
    }

    #[test]
    fn apply_delta_replaces_matching_plugin() {
        let old = file("foo.js", 1);
        let new = file("foo.js", 2);
        let delta = Delta::new(vec![], vec![], vec![new.clone()]);
        let case = TestCaseSpec::new("", vec![], vec![], vec![old]);

        assert_eq!(
            case.apply_delta(&delta),
            TestCaseSpec::new("", vec![], vec![], vec![new])
        );
    }

    #[test]
    fn apply_delta_matches_across_lists() {
        let old = file("foo.js", 1);
        let new = file("foo.js", 2);
        let delta = Delta::new(vec![], vec![], vec![new.clone()]);
        let case = TestCaseSpec::new("c", vec![old], vec![], vec![]);

        assert_eq!(
            case.apply_delta(&delta),
            TestCaseSpec::new("c", vec![new], vec![], vec![])
        );
    }

    #[test]
    fn apply_delta_merges_into_existing_order() {
        let plugin = file("plugin.js", -1);
        let dep = file("dep.js", -1);
        let test = file("test.js", -1);
        let test_old = file("testone.js", -1);
        let test_new = file("testone.js", 1);
        let delta = Delta::new(vec![], vec![test_new.clone()], vec![]);
        let case = TestCaseSpec::new(
            "",
            vec![dep.clone()],
            vec![test.clone(), test_old],
            vec![plugin.clone()],
        );

        assert_eq!(
            case.apply_delta(&delta),
            TestCaseSpec::new("", vec![dep], vec![test, test_new], vec![plugin])
        );
    }

    #[test]
    fn unloaded_delta_lists_owed_content_only() {
        let loaded = file("dep.js", 1);
        let owed = FileRecord::placeholder("test.js", 1);
        let remote = FileRecord::placeholder("http://cdn.example.com/x.js", -1);
        let case = TestCaseSpec::new(
            "c",
            vec![loaded, remote],
            vec![owed.clone()],
            vec![],
        );

        assert_eq!(case.unloaded_delta(), Delta::new(vec![], vec![owed], vec![]));
    }

    #[test]
    fn servable_skips_plugins_and_remote_files() {
        let dep = FileRecord::placeholder("dep.js", 1);
        let remote = FileRecord::placeholder("https://cdn.example.com/x.js", -1);
        let test = FileRecord::placeholder("test.js", 1);
        let plugin = FileRecord::placeholder("plugin.js", 1);
        let case = TestCaseSpec::new(
            "c",
            vec![dep.clone(), remote],
            vec![test.clone()],
            vec![plugin],
        );

        assert_eq!(case.servable(), vec![dep, test]);
        assert_eq!(case.file_set().len(), 4);
    }

    #[test]
    fn servable_lists_a_path_once() {
        let shared = FileRecord::placeholder("shared.js", 1);
        let test = FileRecord::placeholder("test.js", 1);
        let case = TestCaseSpec::new(
            "c",
            vec![shared.clone()],
            vec![shared.clone().serve_only(true), test.clone()],
            vec![],
        );

        assert_eq!(case.servable(), vec![shared, test]);
    }
}
