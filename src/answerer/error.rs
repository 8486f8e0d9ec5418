//! Error types for the answering pipeline.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::mistral::MistralError;

/// Why a document could not be turned into a reference URL.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The local file could not be read.
    #[error("Cannot read {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The upload or signed-URL request failed.
    #[error(transparent)]
    Provider(#[from] MistralError),
}

/// Errors returned by `AnswerEngine::answer_question`.
#[derive(Debug, Error)]
pub enum AnswerError {
    /// The document could not be read, uploaded, or signed. No cache entry
    /// is written.
    #[error("Failed to upload document '{}': {source}", .path.display())]
    Upload {
        path: PathBuf,
        #[source]
        source: Arc<DocumentError>,
    },

    /// The chat completion failed. A cached document reference is kept.
    #[error("Chat completion failed: {0}")]
    Chat(#[source] MistralError),
}

impl AnswerError {
    /// Returns true for upload failures, including unreadable files.
    pub fn is_upload(&self) -> bool {
        matches!(self, Self::Upload { .. })
    }

    /// Returns true when the underlying cause is an unreadable local file.
    pub fn is_file_access(&self) -> bool {
        match self {
            Self::Upload { source, .. } => matches!(**source, DocumentError::FileAccess { .. }),
            Self::Chat(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn upload_error_names_path_and_cause() {
        let err = AnswerError::Upload {
            path: PathBuf::from("kb.pdf"),
            source: Arc::new(DocumentError::FileAccess {
                path: PathBuf::from("kb.pdf"),
                source: io::Error::new(io::ErrorKind::NotFound, "No such file"),
            }),
        };

        let msg = err.to_string();
        assert!(msg.starts_with("Failed to upload document 'kb.pdf'"));
        assert!(msg.contains("No such file"));
        assert!(err.is_upload());
        assert!(err.is_file_access());
        assert!(err.source().is_some());
    }

    #[test]
    fn provider_failure_is_upload_but_not_file_access() {
        let err = AnswerError::Upload {
            path: PathBuf::from("kb.pdf"),
            source: Arc::new(DocumentError::Provider(MistralError::Http {
                status: 422,
                body: String::new(),
            })),
        };

        assert!(err.is_upload());
        assert!(!err.is_file_access());
        assert!(err.to_string().contains("status 422"));
    }

    #[test]
    fn chat_error_display() {
        let err = AnswerError::Chat(MistralError::Api {
            message: "Response contained no choices".to_string(),
        });

        assert!(!err.is_upload());
        assert_eq!(
            err.to_string(),
            "Chat completion failed: Mistral API error: Response contained no choices"
        );
    }
}
