// message composition: generated text when a backend is available, the
// deterministic templates otherwise

use super::api::{GenerationRequest, TextGenerator};
use super::intelligence::ChangeAnalysis;
use super::models::select_model;
use super::prompts::{build_system_prompt, build_user_prompt};
use super::templates::fallback_subject;
use super::validation::{finalize_subject, parse_generated};
use crate::config::{Config, GenerationConfig};
use crate::error::GenerationError;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// message presentation preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageStyle {
    pub use_emoji: bool,
    pub conventional_commits: bool,
    pub include_scope: bool,
}

impl MessageStyle {
    pub fn from_config(config: &Config) -> Self {
        Self {
            use_emoji: config.policy.use_emoji,
            conventional_commits: config.message.conventional_commits,
            include_scope: config.message.include_scope,
        }
    }
}

/// where a message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageOrigin {
    Generated,
    Template,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitMessage {
    pub subject: String,
    pub body: Vec<String>,
    pub origin: MessageOrigin,
}

impl CommitMessage {
    /// subject, a blank line, then the body lines
    pub fn full_text(&self) -> String {
        if self.body.is_empty() {
            self.subject.clone()
        } else {
            format!("{}\n\n{}", self.subject, self.body.join("\n"))
        }
    }

    pub fn body_text(&self) -> Option<String> {
        (!self.body.is_empty()).then(|| self.body.join("\n"))
    }
}

pub struct Composer {
    generator: Option<Arc<dyn TextGenerator>>,
    generation: GenerationConfig,
    show_progress: bool,
}

impl Composer {
    /// composer that only uses templates until a generator is attached
    pub fn new(generation: GenerationConfig) -> Self {
        Self {
            generator: None,
            generation,
            show_progress: false,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// show a terminal spinner while waiting on the backend
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// produce a commit message; never fails
    ///
    /// any generation problem is logged and the template path is used
    pub async fn compose(
        &self,
        analysis: &ChangeAnalysis,
        diff: &str,
        file_path: &str,
        style: &MessageStyle,
    ) -> CommitMessage {
        if let Some(generator) = &self.generator {
            match self.generate(generator.as_ref(), analysis, diff, file_path, style).await {
                Ok(message) => return message,
                Err(e) => warn!("message generation failed, using template: {e}"),
            }
        }

        self.fallback(analysis, file_path, style)
    }

    async fn generate(
        &self,
        generator: &dyn TextGenerator,
        analysis: &ChangeAnalysis,
        diff: &str,
        file_path: &str,
        style: &MessageStyle,
    ) -> Result<CommitMessage, GenerationError> {
        let request = GenerationRequest {
            model: select_model(analysis, &self.generation),
            system: build_system_prompt(analysis, style),
            user: build_user_prompt(analysis, diff, file_path),
            temperature: self.generation.temperature,
            max_tokens: self.generation.max_tokens,
        };

        let spinner = self.show_progress.then(|| start_spinner(&request.model));
        let raw = generator.generate(&request).await;
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }
        let raw = raw?;
        debug!("raw generated message: {raw:?}");

        let parsed = parse_generated(&raw, analysis.suggested_length).ok_or(GenerationError::Empty)?;
        let subject = finalize_subject(&parsed.subject, analysis, style).ok_or(GenerationError::Empty)?;

        info!("generated commit message with {}", request.model);
        Ok(CommitMessage {
            subject,
            body: parsed.body,
            origin: MessageOrigin::Generated,
        })
    }

    /// template message for `file_path`, shaped by the same finalization
    pub fn fallback(&self, analysis: &ChangeAnalysis, file_path: &str, style: &MessageStyle) -> CommitMessage {
        let template = fallback_subject(file_path);
        let subject = finalize_subject(&template, analysis, style).unwrap_or(template);

        CommitMessage {
            subject,
            body: Vec::new(),
            origin: MessageOrigin::Template,
        }
    }
}

fn start_spinner(model: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("generating commit message with {model}..."));
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}
