//! Captured ("slave") browsers: identity, capabilities, and the set of files
//! each browser currently has loaded.

mod registry;
mod user_agent;

pub use registry::{BrowserRegistry, DEFAULT_BROWSER_TIMEOUT, SlaveBrowser};
pub use user_agent::UserAgent;

use serde::{Deserialize, Serialize};

/// Browsers that cannot reliably overwrite a script in place.
pub const DEFAULT_FULL_RESET_BROWSERS: [&str; 3] = ["Safari", "Opera", "Konqueror"];

/// What the server may assume about a browser runtime when pushing files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserCapability {
    /// When false, any change to the browser's file set is delivered as a
    /// full reset and reload.
    pub supports_incremental_overwrite: bool,
}

impl Default for BrowserCapability {
    fn default() -> Self {
        Self {
            supports_incremental_overwrite: true,
        }
    }
}

/// Browser name → capability lookup, resolved once per capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityTable {
    full_reset: Vec<String>,
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::with_full_reset(DEFAULT_FULL_RESET_BROWSERS)
    }
}

impl CapabilityTable {
    pub fn with_full_reset<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            full_reset: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn resolve(&self, browser_name: &str) -> BrowserCapability {
        let full_reset = self
            .full_reset
            .iter()
            .any(|name| name.eq_ignore_ascii_case(browser_name));
        BrowserCapability {
            supports_incremental_overwrite: !full_reset,
        }
    }
}

/// Identity reported for a captured browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserInfo {
    pub id: String,
    pub name: String,
    pub version: String,
    pub os: String,
    pub user_agent: String,
}
