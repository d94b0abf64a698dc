//! UI-agnostic data types
//!
//! Everything here is transient client state: nothing is persisted apart from
//! the session token (see `session`).

use serde::{Deserialize, Serialize};

/// A chat message in the refinement transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// The role of a chat message sender. The backend calls the assistant "ai".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "ai", alias = "assistant")]
    Assistant,
}

/// Output of one generate call, edited in place once in the workspace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationResult {
    pub draft: String,
    pub sources: Vec<String>,
    pub context: Vec<String>,
}

/// A past exchange as returned by `/api/history`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    pub user: String,
    pub ai: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub source: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// An ingested document as listed by `/api/documents`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: serde_json::Value,
    #[serde(default)]
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub preview: String,
}

impl Document {
    pub fn is_image(&self) -> bool {
        self.metadata.kind.starts_with("image/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_as_user_and_ai() {
        let transcript = vec![ChatMessage::user("A"), ChatMessage::assistant("B")];
        let json = serde_json::to_value(&transcript).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"role": "user", "content": "A"},
                {"role": "ai", "content": "B"}
            ])
        );
    }

    #[test]
    fn assistant_alias_is_accepted() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role":"assistant","content":"hi"}"#).unwrap();
        assert_eq!(msg.role, ChatRole::Assistant);
    }

    #[test]
    fn document_parses_backend_shape() {
        let doc: Document = serde_json::from_str(
            r#"{"id": 7, "metadata": {"source": "scan.png", "type": "image/png", "page": 1}, "preview": "hello..."}"#,
        )
        .unwrap();
        assert_eq!(doc.metadata.source, "scan.png");
        assert_eq!(doc.metadata.page, Some(1));
        assert!(doc.is_image());
    }

    #[test]
    fn history_record_without_id_or_timestamp() {
        let record: HistoryRecord =
            serde_json::from_str(r#"{"user": "A", "ai": "B"}"#).unwrap();
        assert_eq!(record.id, None);
        assert_eq!(record.timestamp, "");
    }
}
