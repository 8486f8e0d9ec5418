/// Livestorm question source module.
///
/// This module provides a blocking HTTP client that lists the audience questions
/// of a webinar session, plus the `QuestionSource` trait the poller consumes.
mod client;

pub use client::{LivestormClient, LivestormClientBuilder, LivestormError, Question, QuestionSource};
