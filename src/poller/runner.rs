//! The polling loop itself.

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::livestorm::{LivestormError, Question, QuestionSource};

use super::policy::{ContinueOnError, ErrorAction, ErrorPolicy};

/// Delay between poll cycles when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(6);

/// Errors that end `Poller::run`.
#[derive(Debug, Error)]
pub enum PollError {
    /// Fetching questions failed and the error policy chose to stop.
    #[error("Question source failed: {0}")]
    Source(#[source] LivestormError),

    /// The handler rejected a question.
    #[error("Handler failed for question {id}: {source}")]
    Handler {
        id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Cloneable handle that stops a running poller.
///
/// Stopping wakes a poller blocked in its inter-cycle sleep; a poller that is
/// fetching or dispatching finishes the current cycle first.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the poller to stop.
    pub fn stop(&self) {
        let (lock, cvar) = &*self.state;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    /// Returns true once `stop` has been called.
    pub fn is_stopped(&self) -> bool {
        let (lock, _) = &*self.state;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps for up to `timeout`, returning early (with `true`) if stopped.
    fn wait(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.state;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (stopped, _) = cvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *stopped
    }
}

/// Builder for constructing `Poller` instances.
pub struct PollerBuilder {
    source: Arc<dyn QuestionSource>,
    interval: Duration,
    policy: Box<dyn ErrorPolicy>,
    stop: StopHandle,
}

impl PollerBuilder {
    /// Creates a builder polling `source` every six seconds and continuing
    /// past fetch failures.
    pub fn new(source: Arc<dyn QuestionSource>) -> Self {
        Self {
            source,
            interval: DEFAULT_POLL_INTERVAL,
            policy: Box::new(ContinueOnError),
            stop: StopHandle::new(),
        }
    }

    /// Sets the delay between cycles.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets how fetch failures are classified.
    pub fn policy(mut self, policy: impl ErrorPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Uses an existing stop handle instead of a fresh one.
    pub fn stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    #[must_use]
    pub fn build(self) -> Poller {
        Poller {
            source: self.source,
            interval: self.interval,
            policy: self.policy,
            stop: self.stop,
            seen: HashSet::new(),
        }
    }
}

/// Polls a question source and dispatches each question exactly once.
///
/// State cycles between fetching and dispatching; the set of seen question
/// ids only grows and lives as long as the poller.
pub struct Poller {
    source: Arc<dyn QuestionSource>,
    interval: Duration,
    policy: Box<dyn ErrorPolicy>,
    stop: StopHandle,
    seen: HashSet<String>,
}

impl Poller {
    /// Creates a poller with the default interval and error policy.
    #[must_use]
    pub fn new(source: Arc<dyn QuestionSource>) -> Self {
        PollerBuilder::new(source).build()
    }

    /// Returns the delay between cycles.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns a handle that stops this poller.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Returns true if `id` has already been dispatched.
    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Number of distinct questions dispatched so far.
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Runs a single fetch-and-dispatch cycle.
    ///
    /// Returns the number of new questions handed to `handler`. Each new
    /// question is marked as seen before the handler runs, so a failing
    /// handler does not cause it to be re-delivered.
    ///
    /// # Errors
    ///
    /// Returns `PollError::Source` if the fetch fails (regardless of policy)
    /// and `PollError::Handler` if the handler fails; remaining questions of
    /// the batch are not dispatched in the latter case.
    pub fn poll_once<F, E>(&mut self, handler: &mut F) -> Result<usize, PollError>
    where
        F: FnMut(&Question) -> Result<(), E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let questions = self.source.fetch_questions().map_err(PollError::Source)?;
        debug!(count = questions.len(), "fetched questions");

        let mut dispatched = 0;
        for question in questions {
            if !self.seen.insert(question.id.clone()) {
                continue;
            }

            info!(id = %question.id, "new question");
            handler(&question).map_err(|e| PollError::Handler {
                id: question.id.clone(),
                source: e.into(),
            })?;
            dispatched += 1;
        }

        Ok(dispatched)
    }

    /// Polls until stopped, a fatal fetch failure, or a handler failure.
    ///
    /// Fetch failures are passed to the error policy: `Continue` logs and
    /// waits for the next cycle, `Stop` returns the error. Returns `Ok(())`
    /// when the stop handle is triggered.
    ///
    /// # Errors
    ///
    /// Returns `PollError::Source` when the policy stops on a fetch failure and
    /// `PollError::Handler` when the handler fails.
    pub fn run<F, E>(&mut self, mut handler: F) -> Result<(), PollError>
    where
        F: FnMut(&Question) -> Result<(), E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        info!(interval_secs = self.interval.as_secs_f64(), "polling started");

        loop {
            if self.stop.is_stopped() {
                break;
            }

            match self.poll_once(&mut handler) {
                Ok(_) => {}
                Err(PollError::Source(err)) => match self.policy.classify(&err) {
                    ErrorAction::Continue => warn!(error = %err, "poll failed, will retry"),
                    ErrorAction::Stop => return Err(PollError::Source(err)),
                },
                Err(err) => return Err(err),
            }

            if self.stop.wait(self.interval) {
                break;
            }
        }

        info!(seen = self.seen.len(), "polling stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::StopOnError;
    use std::collections::VecDeque;
    use std::thread;
    use std::time::Instant;

    /// Returns scripted responses, repeating the last one when exhausted.
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<Vec<Question>, u16>>>,
        last: Mutex<Vec<Question>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Vec<Question>, u16>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                last: Mutex::new(Vec::new()),
            })
        }
    }

    impl QuestionSource for ScriptedSource {
        fn fetch_questions(&self) -> Result<Vec<Question>, LivestormError> {
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(questions)) => {
                    *self.last.lock().unwrap() = questions.clone();
                    Ok(questions)
                }
                Some(Err(status)) => Err(LivestormError::Http { status }),
                None => Ok(self.last.lock().unwrap().clone()),
            }
        }
    }

    fn q(id: &str, text: &str) -> Question {
        Question::new(id, text)
    }

    #[test]
    fn poll_once_dispatches_new_questions_in_order() {
        let source = ScriptedSource::new(vec![Ok(vec![q("a", "A"), q("b", "B"), q("c", "C")])]);
        let mut poller = Poller::new(source);
        let mut seen = Vec::new();

        let count = poller
            .poll_once(&mut |question: &Question| -> Result<(), std::io::Error> {
                seen.push(question.id.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(poller.seen_count(), 3);
    }

    #[test]
    fn repeated_ids_are_skipped_across_cycles() {
        let source = ScriptedSource::new(vec![
            Ok(vec![q("1", "Q1")]),
            Ok(vec![q("1", "Q1"), q("2", "Q2")]),
            Ok(vec![q("2", "Q2"), q("1", "Q1")]),
        ]);
        let mut poller = Poller::new(source);
        let mut calls = Vec::new();
        let mut handler = |question: &Question| -> Result<(), std::io::Error> {
            calls.push((question.id.clone(), question.text.clone()));
            Ok(())
        };

        assert_eq!(poller.poll_once(&mut handler).unwrap(), 1);
        assert_eq!(poller.poll_once(&mut handler).unwrap(), 1);
        assert_eq!(poller.poll_once(&mut handler).unwrap(), 0);

        assert_eq!(
            calls,
            vec![
                ("1".to_string(), "Q1".to_string()),
                ("2".to_string(), "Q2".to_string())
            ]
        );
    }

    #[test]
    fn poll_once_surfaces_source_errors() {
        let source = ScriptedSource::new(vec![Err(500)]);
        let mut poller = Poller::new(source);

        let err = poller
            .poll_once(&mut |_: &Question| -> Result<(), std::io::Error> { Ok(()) })
            .unwrap_err();
        assert!(matches!(
            err,
            PollError::Source(LivestormError::Http { status: 500 })
        ));
    }

    #[test]
    fn handler_failure_marks_question_seen_and_stops_batch() {
        let source = ScriptedSource::new(vec![Ok(vec![q("1", "Q1"), q("2", "Q2")])]);
        let mut poller = Poller::new(source);

        let err = poller
            .poll_once(&mut |question: &Question| {
                if question.id == "1" {
                    Err(std::io::Error::other("boom"))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();

        assert!(matches!(err, PollError::Handler { ref id, .. } if id == "1"));
        assert!(err.to_string().contains("boom"));
        assert!(poller.has_seen("1"));
        assert!(!poller.has_seen("2"));
    }

    #[test]
    fn run_continues_past_source_errors_by_default() {
        let source = ScriptedSource::new(vec![
            Err(503),
            Ok(vec![q("1", "Q1")]),
            Err(502),
            Ok(vec![q("1", "Q1"), q("2", "Q2")]),
        ]);
        let mut poller = PollerBuilder::new(source)
            .interval(Duration::from_millis(1))
            .build();
        let stop = poller.stop_handle();
        let mut ids = Vec::new();

        poller
            .run(|question: &Question| -> Result<(), std::io::Error> {
                ids.push(question.id.clone());
                if ids.len() == 2 {
                    stop.stop();
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn run_returns_source_error_with_stop_policy() {
        let source = ScriptedSource::new(vec![Ok(vec![q("1", "Q1")]), Err(401)]);
        let mut poller = PollerBuilder::new(source)
            .interval(Duration::from_millis(1))
            .policy(StopOnError)
            .build();

        let err = poller
            .run(|_: &Question| -> Result<(), std::io::Error> { Ok(()) })
            .unwrap_err();

        assert!(matches!(
            err,
            PollError::Source(LivestormError::Http { status: 401 })
        ));
        assert!(poller.has_seen("1"));
    }

    #[test]
    fn closure_policy_observes_failures() {
        let source = ScriptedSource::new(vec![Err(500), Err(500), Err(404)]);
        let observed = Arc::new(Mutex::new(Vec::new()));
        let observed_in_policy = observed.clone();
        let mut poller = PollerBuilder::new(source)
            .interval(Duration::from_millis(1))
            .policy(move |err: &LivestormError| {
                observed_in_policy.lock().unwrap().push(err.to_string());
                match err {
                    LivestormError::Http { status: 404 } => ErrorAction::Stop,
                    _ => ErrorAction::Continue,
                }
            })
            .build();

        let err = poller
            .run(|_: &Question| -> Result<(), std::io::Error> { Ok(()) })
            .unwrap_err();

        assert!(err.to_string().contains("404"));
        assert_eq!(observed.lock().unwrap().len(), 3);
    }

    #[test]
    fn run_propagates_handler_failure() {
        let source = ScriptedSource::new(vec![Ok(vec![q("7", "Why?")])]);
        let mut poller = PollerBuilder::new(source)
            .interval(Duration::from_millis(1))
            .build();

        let err = poller
            .run(|_: &Question| Err(std::io::Error::other("handler exploded")))
            .unwrap_err();

        assert!(matches!(err, PollError::Handler { ref id, .. } if id == "7"));
    }

    #[test]
    fn stop_wakes_sleeping_poller() {
        let source = ScriptedSource::new(vec![Ok(Vec::new())]);
        let mut poller = PollerBuilder::new(source)
            .interval(Duration::from_secs(60))
            .build();
        let stop = poller.stop_handle();

        let started = Instant::now();
        let worker = thread::spawn(move || {
            poller.run(|_: &Question| -> Result<(), std::io::Error> { Ok(()) })
        });

        thread::sleep(Duration::from_millis(50));
        stop.stop();
        worker.join().unwrap().unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(stop.is_stopped());
    }

    #[test]
    fn stopped_before_start_does_not_fetch() {
        let source = ScriptedSource::new(vec![Err(500)]);
        let stop = StopHandle::new();
        stop.stop();
        let mut poller = PollerBuilder::new(source)
            .policy(StopOnError)
            .stop_handle(stop)
            .build();

        assert!(
            poller
                .run(|_: &Question| -> Result<(), std::io::Error> { Ok(()) })
                .is_ok()
        );
    }
}
