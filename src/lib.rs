pub mod answerer;
pub mod config;
pub mod console;
pub mod livestorm;
pub mod mistral;
pub mod poller;
pub mod qa;
pub mod tui;

#[cfg(test)]
mod test_http;

pub use answerer::{AnswerEngine, AnswerEngineBuilder, AnswerError, DocumentError};
pub use config::Config;
pub use livestorm::{LivestormClient, LivestormClientBuilder, Question, QuestionSource};
pub use mistral::{MistralClient, MistralClientBuilder, MistralClientTrait};
pub use poller::{ErrorAction, PollError, Poller, PollerBuilder, StopHandle};
pub use qa::{AnswerState, QaBoard};
