//! Wire types for the Mistral file and chat APIs.

use serde::{Deserialize, Serialize};

use super::client::MistralError;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One segment of a message's content.
///
/// Serialized with a `type` tag, e.g. `{"type": "text", "text": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentChunk {
    /// Reference to a previously uploaded document.
    DocumentUrl { document_url: String },
    /// Plain text.
    Text { text: String },
}

impl ContentChunk {
    pub fn document_url(url: impl Into<String>) -> Self {
        Self::DocumentUrl {
            document_url: url.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// A chat message with ordered content segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentChunk>,
}

impl ChatMessage {
    /// Creates a user message from the given content segments.
    pub fn user(content: Vec<ContentChunk>) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }
}

/// A file stored by the provider after upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
}

/// A time-limited URL granting access to an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignedUrl {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<serde_json::Value>,
}

impl ChatResponse {
    /// Returns the text of the first choice.
    ///
    /// The provider may return content either as a plain string or as a list
    /// of typed chunks; text chunks are concatenated in order.
    pub fn into_first_text(self) -> Result<String, MistralError> {
        let choice = self.choices.into_iter().next().ok_or_else(|| MistralError::Api {
            message: "Response contained no choices".to_string(),
        })?;

        match choice.message.content {
            Some(serde_json::Value::String(text)) => Ok(text),
            Some(serde_json::Value::Array(chunks)) => Ok(chunks
                .iter()
                .filter(|c| c.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|c| c.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("")),
            _ => Err(MistralError::Api {
                message: "Missing message content in first choice".to_string(),
            }),
        }
    }
}
