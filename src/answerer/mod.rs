//! Document-grounded question answering.
//!
//! This module provides the `AnswerEngine`, which uploads a reference document
//! once per path and answers questions against it through the Mistral chat API.

mod document_cache;
mod engine;
mod error;

pub use document_cache::DocumentCache;
pub use engine::{AnswerEngine, AnswerEngineBuilder, DEFAULT_MODEL, UPLOAD_PURPOSE};
pub use error::{AnswerError, DocumentError};
