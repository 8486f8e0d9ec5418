//! Answering questions against an uploaded document.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::mistral::{ChatMessage, ContentChunk, MistralClientTrait};

use super::document_cache::DocumentCache;
use super::error::{AnswerError, DocumentError};

/// Chat model used when none is configured.
pub const DEFAULT_MODEL: &str = "mistral-small-latest";

/// Purpose tag sent with document uploads.
pub const UPLOAD_PURPOSE: &str = "ocr";

/// Builder for constructing `AnswerEngine` instances.
pub struct AnswerEngineBuilder {
    client: Arc<dyn MistralClientTrait>,
    model: Option<String>,
    document_ttl: Option<Duration>,
}

impl AnswerEngineBuilder {
    /// Creates a builder around the provider client.
    pub fn new(client: Arc<dyn MistralClientTrait>) -> Self {
        Self {
            client,
            model: None,
            document_ttl: None,
        }
    }

    /// Sets the chat model. Defaults to [`DEFAULT_MODEL`].
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Expires cached document references after `ttl`.
    pub fn document_ttl(mut self, ttl: Duration) -> Self {
        self.document_ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn build(self) -> AnswerEngine {
        let cache = match self.document_ttl {
            Some(ttl) => DocumentCache::with_ttl(ttl),
            None => DocumentCache::new(),
        };

        AnswerEngine {
            client: self.client,
            cache,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

/// Answers questions against local documents using the Mistral API.
///
/// Each document is uploaded at most once per engine (or once per TTL window
/// when one is configured); every question costs exactly one chat request.
/// The engine is `Send + Sync` and can be shared across threads behind an
/// `Arc`.
pub struct AnswerEngine {
    client: Arc<dyn MistralClientTrait>,
    cache: DocumentCache,
    model: String,
}

impl AnswerEngine {
    /// Creates an engine with the default model and no document TTL.
    #[must_use]
    pub fn new(client: Arc<dyn MistralClientTrait>) -> Self {
        AnswerEngineBuilder::new(client).build()
    }

    /// Returns the chat model in use.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the document reference cache.
    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    /// Answers `question` using the document at `document_path`.
    ///
    /// Uploads the document on first use and reuses the cached reference
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::Upload` if the file cannot be read or the upload
    /// or signed-URL request fails, and `AnswerError::Chat` if the completion
    /// request fails.
    pub fn answer_question(
        &self,
        document_path: impl AsRef<Path>,
        question: &str,
    ) -> Result<String, AnswerError> {
        let path = document_path.as_ref();
        let document_url = self.document_url(path)?;

        let messages = [ChatMessage::user(vec![
            ContentChunk::document_url(document_url),
            ContentChunk::text(question),
        ])];

        debug!(model = %self.model, "requesting chat completion");
        let answer = self
            .client
            .chat_complete(&self.model, &messages)
            .map_err(AnswerError::Chat)?;

        info!(document = %path.display(), chars = answer.len(), "question answered");
        Ok(answer)
    }

    /// Returns the reference URL for `document_path`, uploading it if needed.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::Upload` on any read, upload, or signing failure.
    pub fn document_url(&self, document_path: &Path) -> Result<String, AnswerError> {
        self.cache
            .get_or_upload(document_path, || self.upload_document(document_path))
            .map_err(|source| AnswerError::Upload {
                path: document_path.to_path_buf(),
                source,
            })
    }

    fn upload_document(&self, path: &Path) -> Result<String, DocumentError> {
        let content = std::fs::read(path).map_err(|source| DocumentError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        info!(document = %path.display(), bytes = content.len(), "uploading document");
        let uploaded = self.client.upload_file(&file_name, content, UPLOAD_PURPOSE)?;
        let signed = self.client.get_signed_url(&uploaded.id)?;
        debug!(file_id = %uploaded.id, "document reference cached");

        Ok(signed.url)
    }
}
