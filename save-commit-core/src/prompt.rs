// interactive questions asked during a save, behind a trait so hosts
// without a terminal can answer them

use crate::ai::composer::CommitMessage;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Password};
use tracing::warn;

pub trait Prompter: Send + Sync {
    /// ask for a backend api key; `None` when the user declines
    fn api_key(&self, env_var: &str) -> Option<String>;

    /// show the message that is about to be committed and ask to proceed
    fn confirm_commit(&self, message: &CommitMessage) -> bool;

    /// ask before resetting the last auto-commit
    fn confirm_undo(&self, commit_hash: &str, message: &str) -> bool;
}

/// dialoguer prompts on the controlling terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn api_key(&self, env_var: &str) -> Option<String> {
        eprintln!(
            "{}",
            style(format!("no api key found ({env_var} is unset); leave empty to use template messages")).yellow()
        );
        let answer = Password::with_theme(&ColorfulTheme::default())
            .with_prompt("api key")
            .allow_empty_password(true)
            .interact();

        match answer {
            Ok(key) if !key.trim().is_empty() => Some(key.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!("api key prompt failed: {e}");
                None
            }
        }
    }

    fn confirm_commit(&self, message: &CommitMessage) -> bool {
        eprintln!("\n{}\n", style("generated commit message:").green().bold());
        eprintln!("{}", style(message.full_text()).yellow());
        eprintln!();

        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("commit with this message?")
            .default(true)
            .show_default(true)
            .interact()
            .unwrap_or_else(|e| {
                warn!("confirmation prompt failed: {e}");
                false
            })
    }

    fn confirm_undo(&self, commit_hash: &str, message: &str) -> bool {
        let short = commit_hash.get(..7).unwrap_or(commit_hash);
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("undo {short} \"{message}\"?"))
            .default(false)
            .show_default(true)
            .interact()
            .unwrap_or(false)
    }
}

/// fixed answers for hosts that cannot prompt (serve mode, tests)
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractive {
    pub assume_yes: bool,
}

impl NonInteractive {
    pub fn yes() -> Self {
        Self { assume_yes: true }
    }
}

impl Prompter for NonInteractive {
    fn api_key(&self, _env_var: &str) -> Option<String> {
        None
    }

    fn confirm_commit(&self, _message: &CommitMessage) -> bool {
        self.assume_yes
    }

    fn confirm_undo(&self, _commit_hash: &str, _message: &str) -> bool {
        self.assume_yes
    }
}
