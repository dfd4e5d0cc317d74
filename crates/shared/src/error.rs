use serde::{Deserialize, Serialize};

/// Error payload returned by the backend on a non-ok response.
///
/// Either field may be absent. Readers go through [`ErrorBody::message_or`]
/// so the precedence stays in one place: `detail`, then `message`, then the
/// caller's fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn with_detail(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            message: None,
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            detail: None,
            message: Some(message.into()),
        }
    }

    /// Parses a raw response body, yielding an empty body when it is not JSON
    /// of the expected shape.
    pub fn from_bytes(raw: &[u8]) -> Self {
        serde_json::from_slice(raw).unwrap_or_default()
    }

    pub fn message_or(&self, fallback: &str) -> String {
        [self.detail.as_deref(), self.message.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|candidate| !candidate.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}
