//! Wire vocabulary of the file-set endpoints.

use jstd_fileset::{BrowserCapability, SlaveBrowser};
use serde::{Deserialize, Serialize};

/// Form field naming the action on `POST /fileSet`.
pub const FIELD_ACTION: &str = "action";
/// Form field carrying the JSON payload.
pub const FIELD_DATA: &str = "data";
/// Form or query field carrying the captured browser id.
pub const FIELD_ID: &str = "id";

/// Actions accepted on `POST /fileSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSetAction {
    /// Client submits test cases; answered with the deltas it still owes.
    ServerFileUpload,
    /// Client uploads file contents.
    DeltaUpdate,
    ListCases,
    /// Browser asks what to fetch and drop for a case.
    BrowserFileCheck,
    /// Browser reports the files it has finished loading.
    BrowserLoaded,
}

impl FileSetAction {
    pub const ALL: [FileSetAction; 5] = [
        Self::ServerFileUpload,
        Self::DeltaUpdate,
        Self::ListCases,
        Self::BrowserFileCheck,
        Self::BrowserLoaded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServerFileUpload => "serverFileUpload",
            Self::DeltaUpdate => "deltaUpdate",
            Self::ListCases => "listCases",
            Self::BrowserFileCheck => "browserFileCheck",
            Self::BrowserLoaded => "browserLoaded",
        }
    }

    /// Case-insensitive lookup.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(name))
    }

    /// Whether the payload field must be present.
    pub fn requires_data(self) -> bool {
        !matches!(self, Self::ListCases)
    }
}

impl std::fmt::Display for FileSetAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acknowledgement body, `{"ok":1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub ok: u8,
}

impl Ack {
    pub const OK: Ack = Ack { ok: 1 };
}

/// Reply to `GET /capture`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub id: String,
    pub name: String,
    pub supports_incremental_overwrite: bool,
}

impl CaptureResult {
    pub fn for_browser(browser: &SlaveBrowser) -> Self {
        let BrowserCapability {
            supports_incremental_overwrite,
        } = browser.capability();
        Self {
            id: browser.id().to_string(),
            name: browser.info().name.clone(),
            supports_incremental_overwrite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn action_names_match_case_insensitively() {
        assert_eq!(
            FileSetAction::parse("SERVERFILEUPLOAD"),
            Some(FileSetAction::ServerFileUpload)
        );
        assert_eq!(
            FileSetAction::parse("browserfilecheck"),
            Some(FileSetAction::BrowserFileCheck)
        );
        assert_eq!(FileSetAction::parse("upload"), None);
    }

    #[test]
    fn every_action_round_trips_through_its_name() {
        for action in FileSetAction::ALL {
            assert_eq!(FileSetAction::parse(action.as_str()), Some(action));
        }
    }

    #[test]
    fn ack_wire_shape() {
        assert_eq!(
            serde_json::to_string(&Ack::OK).unwrap_or_default(),
            r#"{"ok":1}"#
        );
    }
}
