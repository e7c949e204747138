// Lock poisoning is exceptional (requires panic in critical section) - allow expect for internal locks
#![allow(clippy::expect_used)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use super::{BrowserCapability, BrowserInfo, CapabilityTable, UserAgent};
use crate::file_record::FileRecord;

/// How long a browser may go without a heartbeat before it is dropped.
pub const DEFAULT_BROWSER_TIMEOUT: Duration = Duration::from_secs(30);

/// A captured browser and the files it currently holds.
#[derive(Debug)]
pub struct SlaveBrowser {
    info: BrowserInfo,
    capability: BrowserCapability,
    /// Insertion-ordered; at most one record per display path.
    files: Mutex<Vec<FileRecord>>,
    /// Capture time until the first heartbeat arrives.
    last_seen: Mutex<Instant>,
}

impl SlaveBrowser {
    pub fn new(info: BrowserInfo, capability: BrowserCapability) -> Self {
        Self {
            info,
            capability,
            files: Mutex::new(Vec::new()),
            last_seen: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn info(&self) -> &BrowserInfo {
        &self.info
    }

    pub fn capability(&self) -> BrowserCapability {
        self.capability
    }

    /// Record files the browser has loaded, replacing older records with the
    /// same display path.
    pub fn add_files(&self, loaded: impl IntoIterator<Item = FileRecord>) {
        let mut files = self.files.lock().expect("lock");
        for record in loaded {
            files.retain(|held| !held.same_identity(&record));
            files.push(record);
        }
    }

    pub fn loaded_files(&self) -> Vec<FileRecord> {
        self.files.lock().expect("lock").clone()
    }

    pub fn reset_file_set(&self) {
        tracing::debug!(browser = %self.info.id, "resetting file set");
        self.files.lock().expect("lock").clear();
    }

    pub fn heartbeat(&self) {
        *self.last_seen.lock().expect("lock") = Instant::now();
    }

    /// Time since the last heartbeat, or since capture if none arrived.
    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().expect("lock").elapsed()
    }

    pub fn is_alive(&self, timeout: Duration) -> bool {
        self.idle_for() <= timeout
    }
}

/// All browsers captured by this server process.
pub struct BrowserRegistry {
    browsers: RwLock<BTreeMap<String, Arc<SlaveBrowser>>>,
    next_id: AtomicU64,
    capabilities: CapabilityTable,
    timeout: Duration,
}

impl Default for BrowserRegistry {
    fn default() -> Self {
        Self::new(CapabilityTable::default())
    }
}

impl BrowserRegistry {
    pub fn new(capabilities: CapabilityTable) -> Self {
        Self {
            browsers: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            capabilities,
            timeout: DEFAULT_BROWSER_TIMEOUT,
        }
    }

    /// Drop browsers silent for longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Register a browser from its User-Agent and resolve its capability.
    pub fn capture(&self, user_agent: &str) -> Arc<SlaveBrowser> {
        self.expire();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let parsed = UserAgent::parse(user_agent);
        let capability = self.capabilities.resolve(&parsed.name);
        let info = BrowserInfo {
            id: id.clone(),
            name: parsed.name,
            version: parsed.version,
            os: parsed.os,
            user_agent: user_agent.to_string(),
        };
        tracing::info!(
            browser = %id,
            name = %info.name,
            version = %info.version,
            os = %info.os,
            incremental = capability.supports_incremental_overwrite,
            "browser captured"
        );

        let browser = Arc::new(SlaveBrowser::new(info, capability));
        self.browsers
            .write()
            .expect("lock")
            .insert(id, Arc::clone(&browser));
        browser
    }

    pub fn get(&self, id: &str) -> Option<Arc<SlaveBrowser>> {
        self.browsers.read().expect("lock").get(id).cloned()
    }

    /// Returns false when the id is unknown or the browser already expired.
    pub fn heartbeat(&self, id: &str) -> bool {
        self.expire();
        match self.get(id) {
            Some(browser) => {
                browser.heartbeat();
                true
            }
            None => false,
        }
    }

    /// Remove every browser that missed its heartbeat window.
    pub fn expire(&self) -> Vec<Arc<SlaveBrowser>> {
        let mut browsers = self.browsers.write().expect("lock");
        let expired: Vec<String> = browsers
            .iter()
            .filter(|(_, browser)| !browser.is_alive(self.timeout))
            .map(|(id, _)| id.clone())
            .collect();

        let removed: Vec<Arc<SlaveBrowser>> = expired
            .iter()
            .filter_map(|id| browsers.remove(id))
            .collect();
        for browser in &removed {
            tracing::info!(
                browser = %browser.id(),
                name = %browser.info().name,
                idle_secs = browser.idle_for().as_secs(),
                remaining = browsers.len(),
                "browser timed out, removing"
            );
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.browsers.read().expect("lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
