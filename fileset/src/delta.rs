//! Partial updates exchanged between clients and the store.

use serde::{Deserialize, Serialize};

use crate::file_record::FileRecord;

/// Records that should replace matching records wherever they appear.
///
/// Used in both directions: the store hands one back from `add_case` as the
/// list of content it still needs, and clients upload one once that content
/// is available.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub dependencies: Vec<FileRecord>,
    #[serde(default)]
    pub tests: Vec<FileRecord>,
    #[serde(default)]
    pub plugins: Vec<FileRecord>,
}

impl Delta {
    pub fn new(
        dependencies: Vec<FileRecord>,
        tests: Vec<FileRecord>,
        plugins: Vec<FileRecord>,
    ) -> Self {
        Self {
            dependencies,
            tests,
            plugins,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty() && self.tests.is_empty() && self.plugins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dependencies.len() + self.tests.len() + self.plugins.len()
    }

    /// Every record in the delta: dependencies, then tests, then plugins.
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.dependencies
            .iter()
            .chain(self.tests.iter())
            .chain(self.plugins.iter())
    }

    pub fn display_paths(&self) -> impl Iterator<Item = &str> {
        self.records().map(FileRecord::display_path)
    }
}
