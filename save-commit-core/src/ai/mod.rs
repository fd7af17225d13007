// ai module - organises message analysis and composition into submodules

pub mod api;
pub mod composer;
pub mod intelligence;
pub mod models;
pub mod patterns;
pub mod prompts;
pub mod templates;
pub mod validation;

// re-export key public items for convenient access
pub use api::{ChatCompletionsClient, GenerationRequest, TextGenerator};
pub use composer::{CommitMessage, Composer, MessageOrigin, MessageStyle};
pub use intelligence::{analyze, ChangeAnalysis, ChangeType, Complexity, MessageLength};
