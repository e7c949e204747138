//! `jstd-fileset`: the server-side file and test-case cache for captured
//! browser test runs.
//!
//! Clients submit [`TestCaseSpec`]s and upload content as [`Delta`]s; the
//! [`SynchronizationStore`] keeps one canonical [`FileRecord`] per display
//! path and converges every case that shares a path. For each captured
//! browser, [`reconcile`] computes the minimal set of files to push or drop.

pub mod browser;
pub mod delta;
pub mod file_record;
pub mod isolation;
pub mod reconciler;
pub mod store;
pub mod test_case;

pub use browser::{BrowserCapability, BrowserInfo, BrowserRegistry, CapabilityTable, SlaveBrowser};
pub use delta::Delta;
pub use file_record::{FileRecord, NO_VERSION, Replacement, decide};
pub use isolation::{IsolationProcessor, TestCaseProcessor, run_processors};
pub use reconciler::{BrowserFileSet, reconcile};
pub use store::SynchronizationStore;
pub use test_case::TestCaseSpec;
