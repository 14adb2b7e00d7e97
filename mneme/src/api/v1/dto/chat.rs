use serde::Deserialize;

use crate::models::ChatMessage;

pub const DEFAULT_SESSION_ID: &str = "default-session";

/// JSON body for `POST /v1/chat`. The multipart form carries the same
/// fields, with `messages` as a JSON string.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub session_id: Option<String>,
}

impl ChatRequest {
    pub fn session_id(&self) -> String {
        self.session_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_SESSION_ID)
            .to_string()
    }
}
