//! Classification of question-source failures.

use crate::livestorm::LivestormError;

/// What the poller does after a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Log the failure and poll again after the interval.
    Continue,
    /// Stop polling and return the failure from `Poller::run`.
    Stop,
}

/// Decides whether a question-source failure is transient or fatal.
///
/// Closures `FnMut(&LivestormError) -> ErrorAction` implement this trait, which
/// lets callers observe failures (e.g. to show them in a status bar) while
/// choosing the action.
pub trait ErrorPolicy: Send {
    fn classify(&mut self, error: &LivestormError) -> ErrorAction;
}

/// Treats every failure as transient. This is the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinueOnError;

impl ErrorPolicy for ContinueOnError {
    fn classify(&mut self, _error: &LivestormError) -> ErrorAction {
        ErrorAction::Continue
    }
}

/// Treats every failure as fatal.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopOnError;

impl ErrorPolicy for StopOnError {
    fn classify(&mut self, _error: &LivestormError) -> ErrorAction {
        ErrorAction::Stop
    }
}

impl<F> ErrorPolicy for F
where
    F: FnMut(&LivestormError) -> ErrorAction + Send,
{
    fn classify(&mut self, error: &LivestormError) -> ErrorAction {
        self(error)
    }
}
