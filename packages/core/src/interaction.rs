//! The engine depends on these traits, never on a concrete terminal, so it
//! can be driven headlessly by a scripted responder in tests.

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    All,
    None,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &str) -> Answer;
}

pub trait Reporter: Send + Sync {
    fn report(&self, section: &str, message: &str, level: Level);
}

/// Non-interactive responder: answers `All` to every prompt. This is the
/// deterministic default for `--yes`; orphan-table disposition falls back
/// to `None` instead when `--yes` is not passed and no interactive terminal
/// is available — callers choose which constant to install, see
/// [`Scripted`].
pub struct AcceptAll;

#[async_trait]
impl Confirm for AcceptAll {
    async fn confirm(&self, _prompt: &str) -> Answer {
        Answer::All
    }
}

/// A fixed queue of answers, consumed in order; used by engine-level tests
/// to script a run without a terminal.
pub struct Scripted {
    answers: std::sync::Mutex<std::collections::VecDeque<Answer>>,
    default: Answer,
}

impl Scripted {
    #[must_use]
    pub fn new(answers: Vec<Answer>, default: Answer) -> Self {
        Self {
            answers: std::sync::Mutex::new(answers.into()),
            default,
        }
    }
}

#[async_trait]
impl Confirm for Scripted {
    async fn confirm(&self, _prompt: &str) -> Answer {
        self.answers
            .lock()
            .expect("scripted answers mutex poisoned")
            .pop_front()
            .unwrap_or(self.default)
    }
}

/// Silent reporter: discards every message. Useful for tests that only
/// assert on the returned summary, not the log stream.
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _section: &str, _message: &str, _level: Level) {}
}
