//! Terminal-backed [`Confirm`]/[`Reporter`] implementations. The engine
//! never depends on these directly — it depends on the traits in
//! `schema_sync_core::interaction` — so headless tests swap in
//! `AcceptAll`/`Scripted`/`NullReporter` instead.

use async_trait::async_trait;
use colored::Colorize;
use schema_sync_core::interaction::{Answer, Confirm, Level, Reporter};

pub struct TerminalConfirm;

#[async_trait]
impl Confirm for TerminalConfirm {
    async fn confirm(&self, prompt: &str) -> Answer {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || {
            let choice = dialoguer::Select::new()
                .with_prompt(prompt)
                .items(&["Yes", "No", "All", "None", "List"])
                .default(0)
                .interact()
                .unwrap_or(1);
            match choice {
                0 => Answer::Yes,
                2 => Answer::All,
                3 => Answer::None,
                4 => Answer::List,
                _ => Answer::No,
            }
        })
        .await
        .unwrap_or(Answer::No)
    }
}

pub struct TerminalReporter;

impl Reporter for TerminalReporter {
    fn report(&self, section: &str, message: &str, level: Level) {
        let header = format!("[{section}]").bold();
        let line = match level {
            Level::Info => message.normal(),
            Level::Success => message.green(),
            Level::Warning => message.yellow(),
            Level::Error => message.red(),
        };
        println!("{header} {line}");
    }
}
