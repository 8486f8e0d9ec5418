/// Mistral HTTP client module.
///
/// This module provides a blocking HTTP client for the Mistral file and chat
/// endpoints used to answer questions against an uploaded document.
mod client;
mod types;

pub use client::{MistralClient, MistralClientBuilder, MistralClientTrait, MistralError};
pub use types::{ChatMessage, ContentChunk, Role, SignedUrl, UploadedFile};
