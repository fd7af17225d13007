// save-commit-core/src/lib.rs

// declare modules
pub mod ai;
pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod git;
pub mod guard;
pub mod handler;
pub mod prompt;
pub mod state;
pub mod utils;

// re-export for the cli crate
pub use console::{style, user_attended};
pub use dotenv::dotenv;

pub use crate::ai::{CommitMessage, Composer, MessageStyle, TextGenerator};
pub use crate::config::{Config, ConfigLoader, Overrides};
pub use crate::error::{GenerationError, GitError, SaveCommitError};
pub use crate::executor::UndoMode;
pub use crate::guard::{GuardVerdict, SkipReason, TriggerAuthority};
pub use crate::handler::{SaveEvent, SaveHandler, SaveOutcome};
pub use crate::prompt::{NonInteractive, Prompter, TerminalPrompter};
pub use crate::state::{State, StateStore};
