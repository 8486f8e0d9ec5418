//! Console watcher: prints each new question and its suggested answer.

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use tracing::warn;

use crate::answerer::AnswerEngine;
use crate::livestorm::Question;
use crate::poller::{PollError, Poller};

/// Answers one question and writes the result to `out`.
///
/// Answering failures are written as an error line and do not fail the
/// call; only write failures do.
pub fn answer_and_print<W: Write>(
    engine: &AnswerEngine,
    document: &Path,
    question: &Question,
    out: &mut W,
) -> anyhow::Result<()> {
    writeln!(out, "\nNew question: {}", question.text).context("Failed to write output")?;
    writeln!(out, "butterfly thinking ...").context("Failed to write output")?;
    out.flush().context("Failed to flush output")?;

    let written = match engine.answer_question(document, &question.text) {
        Ok(answer) => writeln!(out, "Suggestion: {answer}"),
        Err(err) => {
            warn!(id = %question.id, error = %err, "failed to answer question");
            writeln!(out, "Error: {err}")
        }
    };
    written.context("Failed to write output")
}

/// Polls for questions and answers each against `document` until the poller
/// stops.
///
/// # Errors
///
/// Returns the poller's error: a fatal fetch failure (depending on policy) or
/// a failure writing to `out`.
pub fn watch<W: Write>(
    poller: &mut Poller,
    engine: &AnswerEngine,
    document: &Path,
    out: &mut W,
) -> Result<(), PollError> {
    poller.run(|question: &Question| answer_and_print(engine, document, question, out))
}
