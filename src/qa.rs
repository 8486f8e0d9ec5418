//! Question/answer records shown to the presenter.
//!
//! The core pipeline only produces answers; this module keeps the records the
//! console watcher and dashboard display, newest question first.

use time::OffsetDateTime;

use crate::answerer::AnswerError;
use crate::livestorm::Question;

/// Text shown while an answer is being generated.
pub const PENDING_MARKER: &str = "Butterfly thinking...";

/// Answer status of a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerState {
    Pending,
    Answered(String),
    Failed(String),
}

impl AnswerState {
    /// Converts an answering result into a displayable state.
    pub fn from_result(result: &Result<String, AnswerError>) -> Self {
        match result {
            Ok(answer) => Self::Answered(answer.clone()),
            Err(err) => Self::Failed(err.to_string()),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Text to display in place of the answer.
    ///
    /// Failures are prefixed with `Error:` so they are never mistaken for an
    /// answer.
    pub fn display_text(&self) -> String {
        match self {
            Self::Pending => PENDING_MARKER.to_string(),
            Self::Answered(answer) => answer.clone(),
            Self::Failed(message) => format!("Error: {message}"),
        }
    }
}

/// One audience question and its answer state.
#[derive(Debug, Clone, PartialEq)]
pub struct QaRecord {
    pub id: String,
    pub question: String,
    pub answer: AnswerState,
    pub received_at: OffsetDateTime,
}

/// Question/answer records ordered newest first.
#[derive(Debug, Clone, Default)]
pub struct QaBoard {
    records: Vec<QaRecord>,
}

impl QaBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pending record for `question` at the top of the board.
    ///
    /// Returns false (and changes nothing) if a record with the same id exists.
    pub fn push_question(&mut self, question: &Question) -> bool {
        if self.get(&question.id).is_some() {
            return false;
        }

        self.records.insert(
            0,
            QaRecord {
                id: question.id.clone(),
                question: question.text.clone(),
                answer: AnswerState::Pending,
                received_at: OffsetDateTime::now_utc(),
            },
        );
        true
    }

    /// Sets the answer state of the record with `id`.
    ///
    /// Returns false if no such record exists.
    pub fn set_answer(&mut self, id: &str, answer: AnswerState) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.answer = answer;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&QaRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Records, newest first.
    pub fn records(&self) -> &[QaRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records still waiting for an answer.
    pub fn pending_count(&self) -> usize {
        self.records.iter().filter(|r| r.answer.is_pending()).count()
    }
}
