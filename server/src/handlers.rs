//! File-set action handlers.
//!
//! Dispatches `POST /fileSet` actions to the shared store and the browser
//! registry. Payloads are decoded before anything is mutated, so a malformed
//! request never reaches the store.

use std::sync::Arc;

use jstd_fileset::{
    BrowserFileSet, BrowserRegistry, Delta, FileRecord, IsolationProcessor, SlaveBrowser,
    SynchronizationStore, TestCaseProcessor, TestCaseSpec, reconcile, run_processors,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::ServerConfig;
use crate::errors::{HandlerError, Result};
use crate::protocol::{Ack, CaptureResult, FileSetAction};

/// Shared state behind every request.
pub struct FileSetService {
    store: Arc<SynchronizationStore>,
    browsers: Arc<BrowserRegistry>,
    processors: Vec<Box<dyn TestCaseProcessor>>,
}

impl FileSetService {
    pub fn new(store: Arc<SynchronizationStore>, browsers: Arc<BrowserRegistry>) -> Self {
        Self {
            store,
            browsers,
            processors: Vec::new(),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        let service = Self::new(
            Arc::new(SynchronizationStore::new()),
            Arc::new(
                BrowserRegistry::new(config.capability_table())
                    .with_timeout(config.browser_timeout()),
            ),
        );
        if config.isolate_tests {
            service.with_processor(Box::new(IsolationProcessor))
        } else {
            service
        }
    }

    /// Append a processor applied to uploaded cases before they are stored.
    pub fn with_processor(mut self, processor: Box<dyn TestCaseProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    pub fn store(&self) -> &Arc<SynchronizationStore> {
        &self.store
    }

    pub fn browsers(&self) -> &Arc<BrowserRegistry> {
        &self.browsers
    }

    /// Dispatch to the appropriate handler based on the action name.
    pub fn handle(
        &self,
        action: &str,
        browser_id: Option<&str>,
        data: Option<&str>,
    ) -> Result<serde_json::Value> {
        let action = FileSetAction::parse(action)
            .ok_or_else(|| HandlerError::UnknownAction(action.to_string()))?;
        let data = match data {
            Some(data) => data,
            None if action.requires_data() => return Err(HandlerError::MissingField("data")),
            None => "",
        };
        if matches!(
            action,
            FileSetAction::BrowserFileCheck | FileSetAction::BrowserLoaded
        ) {
            self.browsers.expire();
        }
        let browser = browser_id.and_then(|id| self.browsers.get(id));

        match action {
            FileSetAction::ServerFileUpload => encode(&self.upload_test_cases(decode(action, data)?)),
            FileSetAction::DeltaUpdate => {
                let deltas: Vec<Delta> = decode(action, data)?;
                encode(&self.upload_deltas(&deltas))
            }
            FileSetAction::ListCases => encode(&self.store.get_cases()),
            FileSetAction::BrowserFileCheck => {
                encode(&self.browser_file_check(browser.as_deref(), &decode(action, data)?))
            }
            FileSetAction::BrowserLoaded => {
                let loaded: Vec<FileRecord> = decode(action, data)?;
                let browser = browser.ok_or_else(|| {
                    HandlerError::UnknownBrowser(browser_id.unwrap_or_default().to_string())
                })?;
                encode(&self.browser_loaded(&browser, loaded))
            }
        }
    }

    /// Store the submitted cases and answer with the delta owed for each.
    pub fn upload_test_cases(&self, cases: Vec<TestCaseSpec>) -> Vec<Delta> {
        let cases = run_processors(&self.processors, cases);
        let deltas: Vec<Delta> = cases
            .into_iter()
            .map(|case| self.store.add_case(case))
            .collect();
        tracing::debug!(
            cases = deltas.len(),
            owed = deltas.iter().map(Delta::len).sum::<usize>(),
            "test cases uploaded"
        );
        deltas
    }

    pub fn upload_deltas(&self, deltas: &[Delta]) -> Ack {
        for delta in deltas {
            self.store.apply_delta(delta);
        }
        Ack::OK
    }

    /// Plan the browser's update. A reset plan clears the browser's loaded
    /// set, since it is about to reload everything.
    pub fn browser_file_check(
        &self,
        browser: Option<&SlaveBrowser>,
        desired: &TestCaseSpec,
    ) -> BrowserFileSet {
        let plan = reconcile(browser, desired);
        if plan.should_reset
            && let Some(browser) = browser
        {
            browser.reset_file_set();
        }
        plan
    }

    pub fn browser_loaded(&self, browser: &SlaveBrowser, loaded: Vec<FileRecord>) -> Ack {
        tracing::debug!(browser = %browser.id(), files = loaded.len(), "browser loaded files");
        browser.add_files(loaded);
        Ack::OK
    }

    pub fn capture(&self, user_agent: &str) -> CaptureResult {
        CaptureResult::for_browser(&self.browsers.capture(user_agent))
    }

    pub fn heartbeat(&self, browser_id: &str) -> bool {
        self.browsers.heartbeat(browser_id)
    }

    pub fn file_content(&self, display_path: &str) -> Option<Arc<str>> {
        self.store.get_file_content(display_path)
    }
}

fn decode<T: DeserializeOwned>(action: FileSetAction, data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(|source| HandlerError::Malformed {
        action: action.as_str(),
        source,
    })
}

fn encode<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(HandlerError::Encode)
}
