use time::OffsetDateTime;

use crate::livestorm::Question;
use crate::qa::{AnswerState, QaBoard, QaRecord};

/// Updates delivered to the dashboard from the polling and answering threads.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    /// A question was seen for the first time.
    NewQuestion(Question),
    /// Answering finished, successfully or not.
    Answered { id: String, answer: AnswerState },
    /// A poll cycle failed; polling continues unless the policy says otherwise.
    PollFailed(String),
    /// The polling thread exited, with the reason if it failed.
    PollerStopped(Option<String>),
}

/// Application state for the dashboard.
///
/// Holds the question/answer board, selection, panel focus, and the last
/// polling problem. A failed poll never removes records from the board.
#[derive(Debug, Clone)]
pub struct App {
    board: QaBoard,
    /// Index into `board.records()` (newest first)
    selected_index: Option<usize>,
    focus: Focus,
    detail_scroll: u16,
    document: String,
    last_poll_error: Option<(OffsetDateTime, String)>,
    poller_stopped: Option<Option<String>>,
}

/// Panel focus state for keyboard navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// Question list is focused (j/k moves the selection)
    QuestionList,
    /// Answer panel is focused (j/k scrolls)
    AnswerView,
}

impl App {
    /// Creates an empty dashboard for the named document.
    ///
    /// # Examples
    ///
    /// ```
    /// use butterfly::tui::{App, Focus};
    ///
    /// let app = App::new("kb.pdf");
    /// assert!(app.board().is_empty());
    /// assert_eq!(app.focus(), Focus::QuestionList);
    /// ```
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            board: QaBoard::new(),
            selected_index: None,
            focus: Focus::QuestionList,
            detail_scroll: 0,
            document: document.into(),
            last_poll_error: None,
            poller_stopped: None,
        }
    }

    pub fn board(&self) -> &QaBoard {
        &self.board
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected_index
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn detail_scroll(&self) -> u16 {
        self.detail_scroll
    }

    /// Returns the selected record, if any.
    pub fn selected_record(&self) -> Option<&QaRecord> {
        self.selected_index
            .and_then(|i| self.board.records().get(i))
    }

    /// Returns when and why the most recent poll failed.
    pub fn last_poll_error(&self) -> Option<&(OffsetDateTime, String)> {
        self.last_poll_error.as_ref()
    }

    /// Returns `Some` once the polling thread has exited; the inner value is
    /// the failure reason, if any.
    pub fn poller_stopped(&self) -> Option<Option<&str>> {
        self.poller_stopped.as_ref().map(|reason| reason.as_deref())
    }

    /// Applies an update from a background thread.
    pub fn apply(&mut self, event: DashboardEvent) {
        match event {
            DashboardEvent::NewQuestion(question) => {
                if self.board.push_question(&question) {
                    // Records are newest first, so keep the selection on the
                    // same record it pointed at before the insert.
                    self.selected_index = Some(self.selected_index.map_or(0, |i| i + 1));
                }
            }
            DashboardEvent::Answered { id, answer } => {
                self.board.set_answer(&id, answer);
            }
            DashboardEvent::PollFailed(message) => {
                self.last_poll_error = Some((OffsetDateTime::now_utc(), message));
            }
            DashboardEvent::PollerStopped(reason) => {
                self.poller_stopped = Some(reason);
            }
        }
    }

    /// Toggles focus between the question list and the answer panel.
    pub fn next_focus(&mut self) {
        self.focus = match self.focus {
            Focus::QuestionList => Focus::AnswerView,
            Focus::AnswerView => Focus::QuestionList,
        };
    }

    /// Moves selection down, wrapping to the top.
    pub fn select_next(&mut self) {
        let len = self.board.len();
        if len == 0 {
            self.selected_index = None;
            return;
        }

        self.selected_index = Some(match self.selected_index {
            None => 0,
            Some(i) if i + 1 >= len => 0,
            Some(i) => i + 1,
        });
        self.detail_scroll = 0;
    }

    /// Moves selection up, wrapping to the bottom.
    pub fn select_previous(&mut self) {
        let len = self.board.len();
        if len == 0 {
            self.selected_index = None;
            return;
        }

        self.selected_index = Some(match self.selected_index {
            None | Some(0) => len - 1,
            Some(i) => i - 1,
        });
        self.detail_scroll = 0;
    }

    /// Selects the newest question.
    pub fn select_newest(&mut self) {
        if !self.board.is_empty() {
            self.selected_index = Some(0);
            self.detail_scroll = 0;
        }
    }

    pub fn scroll_detail_down(&mut self, amount: u16) {
        self.detail_scroll = self.detail_scroll.saturating_add(amount);
    }

    pub fn scroll_detail_up(&mut self, amount: u16) {
        self.detail_scroll = self.detail_scroll.saturating_sub(amount);
    }
}
