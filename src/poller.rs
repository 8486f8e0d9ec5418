//! De-duplicating question polling loop.
//!
//! The poller repeatedly fetches the question list from a `QuestionSource`,
//! skips questions it has already seen, and hands each new one to a caller
//! supplied handler, in the order the source returned them.

mod policy;
mod runner;

pub use policy::{ContinueOnError, ErrorAction, ErrorPolicy, StopOnError};
pub use runner::{DEFAULT_POLL_INTERVAL, PollError, Poller, PollerBuilder, StopHandle};
