// save handler - the guard, message and commit pipeline for one save event

use crate::ai::composer::{Composer, MessageOrigin, MessageStyle};
use crate::ai::intelligence::analyze;
use crate::ai::api::{ChatCompletionsClient, TextGenerator};
use crate::config::{Config, ConfigLoader, GenerationConfig, Overrides};
use crate::context::extract_context;
use crate::credentials::{lookup_api_key, resolve_api_key, ApiKey, CredentialStore};
use crate::error::{Result, SaveCommitError};
use crate::executor::{build_command, execute, undo_last, CommitResult, UndoMode};
use crate::git::{GitProbe, RepoProbe};
use crate::guard::{Decision, GuardVerdict, PolicyChain, PushDecision, SkipReason, TriggerAuthority};
use crate::prompt::{NonInteractive, Prompter};
use crate::state::{LastCommitInfo, StateStore};
use crate::utils::normalize_path;
use chrono::Utc;
use console::style;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// a file save reported by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveEvent {
    pub path: PathBuf,
    /// live document text, when the host has it
    pub text: Option<String>,
}

impl SaveEvent {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SaveOutcome {
    Ignored {
        verdict: GuardVerdict,
    },
    Skipped {
        reason: SkipReason,
        detail: String,
    },
    Cancelled,
    Committed {
        hash: String,
        message: String,
        origin: MessageOrigin,
        pushed: bool,
        push_suppressed: bool,
    },
    DryRun {
        command: String,
        message: String,
    },
    NothingToCommit,
    Failed {
        error: String,
    },
}

impl fmt::Display for SaveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveOutcome::Ignored { verdict } => write!(f, "save ignored ({verdict:?})"),
            SaveOutcome::Skipped { reason, detail } => write!(f, "skipped ({reason}): {detail}"),
            SaveOutcome::Cancelled => f.write_str("cancelled"),
            SaveOutcome::Committed {
                hash,
                message,
                pushed,
                push_suppressed,
                ..
            } => {
                let short = hash.get(..7).unwrap_or(hash);
                let subject = message.lines().next().unwrap_or_default();
                write!(f, "committed {short}: {subject}")?;
                if *pushed {
                    f.write_str(" (pushed)")?;
                } else if *push_suppressed {
                    f.write_str(" (push suppressed on protected branch)")?;
                }
                Ok(())
            }
            SaveOutcome::DryRun { command, .. } => write!(f, "dry run: {command}"),
            SaveOutcome::NothingToCommit => f.write_str("nothing to commit"),
            SaveOutcome::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// owns everything a save event needs; one per workspace
pub struct SaveHandler {
    workspace_root: PathBuf,
    authority: Arc<TriggerAuthority>,
    probe: Arc<dyn RepoProbe>,
    prompter: Arc<dyn Prompter>,
    state: Arc<StateStore>,
    loader: ConfigLoader,
    credentials: CredentialStore,
    generator: Option<Arc<dyn TextGenerator>>,
    key_prompt_done: AtomicBool,
    show_progress: bool,
    print_warnings: bool,
}

impl SaveHandler {
    /// handler with libgit2 probes, no prompts and the default config files
    pub fn new(workspace_root: impl AsRef<Path>, state: StateStore) -> Self {
        let workspace_root = normalize_path(workspace_root);
        Self {
            loader: ConfigLoader::new(&workspace_root),
            workspace_root,
            authority: Arc::new(TriggerAuthority::default()),
            probe: Arc::new(GitProbe),
            prompter: Arc::new(NonInteractive::default()),
            state: Arc::new(state),
            credentials: CredentialStore::default(),
            generator: None,
            key_prompt_done: AtomicBool::new(false),
            show_progress: false,
            print_warnings: true,
        }
    }

    pub fn with_authority(mut self, authority: Arc<TriggerAuthority>) -> Self {
        self.authority = authority;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn RepoProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    pub fn with_config_loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.loader = self.loader.with_overrides(overrides);
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = credentials;
        self
    }

    /// use this generator instead of building an http client from config
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn with_warnings(mut self, print_warnings: bool) -> Self {
        self.print_warnings = print_warnings;
        self
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// "save and run": authorize the next save of `path`
    pub fn trigger(&self, path: &Path) {
        let ttl_ms = match self.loader.load() {
            Ok(config) => config.policy.trigger_ttl_ms,
            Err(e) => {
                debug!("using default trigger ttl, config failed to load: {e:#}");
                Config::default().policy.trigger_ttl_ms
            }
        };
        self.authority.issue(path, ttl_ms);
    }

    /// issue a trigger for `event.path` and handle the save immediately
    pub async fn save_and_run(&self, event: SaveEvent) -> SaveOutcome {
        self.trigger(&event.path);
        self.on_save(event).await
    }

    /// handle one save; never fails, every problem becomes an outcome
    pub async fn on_save(&self, event: SaveEvent) -> SaveOutcome {
        let verdict = self.authority.try_consume(&event.path, Utc::now());
        if !verdict.is_authorized() {
            return SaveOutcome::Ignored { verdict };
        }
        self.persist(self.state.record_action(Utc::now()));

        let config = match self.loader.load() {
            Ok(config) => config,
            Err(e) => return self.skipped(SkipReason::Environment, format!("configuration error: {e:#}")),
        };

        let file = normalize_path(&event.path);
        let (repo_root, relative_path, branch, push) =
            match PolicyChain::evaluate(&config.policy, &file, &self.workspace_root, self.probe.as_ref()) {
                Decision::Proceed {
                    repo_root,
                    relative_path,
                    branch,
                    push,
                } => (repo_root, relative_path, branch, push),
                Decision::Skipped { reason, detail } => return self.skipped(reason, detail),
            };

        let context = extract_context(&repo_root, &file, event.text.as_deref());
        debug!(
            "context from {:?}: {} chars (truncated: {})",
            context.source,
            context.text.chars().count(),
            context.truncated
        );

        let analysis = analyze(&context.text, &relative_path);
        debug!(
            "analysis: {} {:?} scope={:?} +{} -{}",
            analysis.change_type, analysis.complexity, analysis.scope, analysis.lines_added, analysis.lines_removed
        );

        let style = MessageStyle::from_config(&config);
        let message = self
            .composer(&config)
            .compose(&analysis, &context.text, &relative_path, &style)
            .await;

        let plan = build_command(
            &repo_root,
            &message,
            branch.as_deref(),
            push == PushDecision::Push,
            &config.policy.remote,
        );

        if config.policy.dry_run {
            info!("dry run: {plan}");
            self.persist(self.state.record_dry_run());
            return SaveOutcome::DryRun {
                command: plan.to_string(),
                message: message.full_text(),
            };
        }

        if config.policy.confirm_before_commit && !self.prompter.confirm_commit(&message) {
            info!("commit declined by user");
            return SaveOutcome::Cancelled;
        }

        let report = match execute(&plan) {
            Ok(report) => report,
            Err(e) => {
                self.notify(&format!("auto-commit failed: {e}"));
                return SaveOutcome::Failed { error: e.to_string() };
            }
        };

        match report.commit {
            CommitResult::NothingToCommit => SaveOutcome::NothingToCommit,
            CommitResult::Created { hash } => {
                if let Some(push_error) = &report.push_error {
                    self.notify(&format!("committed but push failed: {push_error}"));
                }
                let full_text = message.full_text();
                self.persist(self.state.record_commit(
                    LastCommitInfo {
                        commit_hash: hash.clone(),
                        message: full_text.clone(),
                        repo_root,
                        timestamp: Utc::now(),
                    },
                    &relative_path,
                    report.pushed,
                ));
                SaveOutcome::Committed {
                    hash,
                    message: full_text,
                    origin: message.origin,
                    pushed: report.pushed,
                    push_suppressed: push == PushDecision::Suppressed,
                }
            }
        }
    }

    /// reset the last recorded auto-commit after confirmation
    pub fn undo(&self, mode: UndoMode) -> Result<LastCommitInfo> {
        let last = self.state.load().last_commit.ok_or(SaveCommitError::NothingToUndo)?;
        let subject = last.message.lines().next().unwrap_or_default();

        if !self.prompter.confirm_undo(&last.commit_hash, subject) {
            return Err(SaveCommitError::Cancelled);
        }

        undo_last(&last, mode)?;
        self.state.clear_last_commit()?;
        Ok(last)
    }

    fn composer(&self, config: &Config) -> Composer {
        let composer = Composer::new(config.generation.clone()).with_progress(self.show_progress);
        if !config.message.use_generation {
            debug!("generation disabled, using template messages");
            return composer;
        }
        if let Some(generator) = &self.generator {
            return composer.with_generator(generator.clone());
        }

        let Some(key) = self.api_key(&config.generation) else {
            return composer;
        };
        match ChatCompletionsClient::new(config.generation.endpoint.clone(), key, config.generation.timeout_secs) {
            Ok(client) => composer.with_generator(Arc::new(client)),
            Err(e) => {
                warn!("could not build generation client: {e}");
                composer
            }
        }
    }

    /// key lookup; the prompt is offered at most once per handler
    fn api_key(&self, generation: &GenerationConfig) -> Option<ApiKey> {
        if self.key_prompt_done.swap(true, Ordering::SeqCst) {
            return lookup_api_key(generation, &self.credentials);
        }
        let key = resolve_api_key(generation, &self.credentials, self.prompter.as_ref());
        if key.is_none() {
            info!("no api key available, using template messages");
        }
        key
    }

    fn skipped(&self, reason: SkipReason, detail: String) -> SaveOutcome {
        if reason.is_warning() {
            self.notify(&detail);
        }
        self.persist(self.state.record_skip(reason.as_str()));
        SaveOutcome::Skipped { reason, detail }
    }

    fn notify(&self, message: &str) {
        warn!("{message}");
        if self.print_warnings {
            eprintln!("{} {message}", style("save-commit:").yellow().bold());
        }
    }

    fn persist(&self, result: Result<()>) {
        if let Err(e) = result {
            warn!("could not update state: {e}");
        }
    }
}
