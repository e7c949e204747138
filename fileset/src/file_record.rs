//! Versioned file records and the replacement policy that picks a winner
//! between two records for the same display path.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Version used for records without a meaningful revision (remote resources).
pub const NO_VERSION: i64 = -1;

fn no_version() -> i64 {
    NO_VERSION
}

fn unknown_length() -> i64 {
    -1
}

/// One versioned file as known to the server, a client, or a browser.
///
/// Records are immutable. A loaded record is derived from a placeholder with
/// [`FileRecord::with_content`]; nothing mutates an existing record.
///
/// Field names on the wire follow the runner clients (`filePath`,
/// `displayPath`, `timestamp`, `serveOnly`, `data`, `length`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    #[serde(rename = "filePath")]
    source_path: String,
    display_path: String,
    #[serde(rename = "timestamp", default = "no_version")]
    version: i64,
    #[serde(default)]
    serve_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Arc<str>>,
    #[serde(default = "unknown_length")]
    length: i64,
}

impl FileRecord {
    /// Create an unloaded placeholder.
    pub fn new(source_path: impl Into<String>, display_path: impl Into<String>, version: i64) -> Self {
        Self {
            source_path: source_path.into(),
            display_path: display_path.into(),
            version,
            serve_only: false,
            data: None,
            length: unknown_length(),
        }
    }

    /// Placeholder whose source and display path are the same.
    pub fn placeholder(path: impl Into<String>, version: i64) -> Self {
        let path = path.into();
        Self::new(path.clone(), path, version)
    }

    pub fn serve_only(mut self, serve_only: bool) -> Self {
        self.serve_only = serve_only;
        self
    }

    pub fn with_length(mut self, length: i64) -> Self {
        self.length = length;
        self
    }

    /// Produce the loaded variant of this record.
    pub fn with_content(&self, data: impl Into<Arc<str>>, version: i64) -> Self {
        Self {
            source_path: self.source_path.clone(),
            display_path: self.display_path.clone(),
            version,
            serve_only: self.serve_only,
            data: Some(data.into()),
            length: self.length,
        }
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    /// Cache key and client-facing identity.
    pub fn display_path(&self) -> &str {
        &self.display_path
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn is_serve_only(&self) -> bool {
        self.serve_only
    }

    pub fn length(&self) -> i64 {
        self.length
    }

    pub fn data(&self) -> Option<&Arc<str>> {
        self.data.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }

    pub fn is_web_address(&self) -> bool {
        self.source_path.starts_with("http://") || self.source_path.starts_with("https://")
    }

    /// Remote references are never fetched or pushed by the server.
    pub fn can_load(&self) -> bool {
        !self.is_web_address()
    }

    /// Two records describe the same file when their display paths match.
    pub fn same_identity(&self, other: &FileRecord) -> bool {
        self.display_path == other.display_path
    }
}

impl PartialEq for FileRecord {
    fn eq(&self, other: &Self) -> bool {
        self.display_path == other.display_path
            && self.version == other.version
            && self.serve_only == other.serve_only
            && self.data == other.data
    }
}

impl Eq for FileRecord {}

impl fmt::Display for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}{}",
            self.display_path,
            self.version,
            if self.is_loaded() { " (loaded)" } else { "" }
        )
    }
}

/// Outcome of comparing a candidate record with the one currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    /// Nothing material differs; keep what is held.
    Keep,
    /// The candidate wins and becomes the held record.
    Replace,
    /// The candidate is a stale placeholder; the held, loaded record is
    /// authoritative and should be reported back to the submitter.
    KeepCached,
}

impl Replacement {
    pub fn replaces(self) -> bool {
        matches!(self, Self::Replace)
    }
}

/// Decide whether `candidate` should supersede `held` for the same display path.
///
/// A different version always wins. At the same version, content beats a
/// placeholder in either direction, and between two loaded records the
/// candidate wins when the content differs (last write wins).
pub fn decide(held: &FileRecord, candidate: &FileRecord) -> Replacement {
    if !held.same_identity(candidate) {
        tracing::trace!("paths differ {} {}", held.display_path, candidate.display_path);
        return Replacement::Keep;
    }
    if held.version != candidate.version {
        return Replacement::Replace;
    }
    match (&held.data, &candidate.data) {
        (None, Some(_)) => Replacement::Replace,
        (Some(_), None) => Replacement::KeepCached,
        (Some(old), Some(new)) if old != new => Replacement::Replace,
        _ if held.serve_only != candidate.serve_only => Replacement::Replace,
        _ => Replacement::Keep,
    }
}
