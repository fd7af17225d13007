// policy filter chain run after a save is authorized

use crate::config::PolicyConfig;
use crate::git::RepoProbe;
use crate::utils::{normalize_path, relative_slash_path};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Unmatched,
    Disabled,
    NotARepository,
    Ignored,
    Sensitive,
    Environment,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Unmatched => "unmatched",
            SkipReason::Disabled => "disabled",
            SkipReason::NotARepository => "not_a_repository",
            SkipReason::Ignored => "ignored",
            SkipReason::Sensitive => "sensitive",
            SkipReason::Environment => "environment",
        }
    }

    /// skips the user should hear about, the rest are routine
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            SkipReason::NotARepository | SkipReason::Sensitive | SkipReason::Environment
        )
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushDecision {
    Push,
    /// auto-push is on but the branch is protected
    Suppressed,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Proceed {
        repo_root: PathBuf,
        /// repository-relative, forward slashes
        relative_path: String,
        /// only probed when auto-push is on
        branch: Option<String>,
        push: PushDecision,
    },
    Skipped {
        reason: SkipReason,
        detail: String,
    },
}

impl Decision {
    fn skip(reason: SkipReason, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if reason.is_warning() {
            warn!("save skipped ({reason}): {detail}");
        } else {
            info!("save skipped ({reason}): {detail}");
        }
        Decision::Skipped { reason, detail }
    }
}

/// ordered, short-circuiting checks; pure over config, path and probe answers
pub struct PolicyChain;

impl PolicyChain {
    pub fn evaluate(
        config: &PolicyConfig,
        file: &Path,
        workspace_root: &Path,
        probe: &dyn RepoProbe,
    ) -> Decision {
        let file = normalize_path(file);
        let workspace_path = relative_slash_path(&file, &normalize_path(workspace_root));

        if !build_globset(&config.watch_globs).is_match(&workspace_path) {
            return Decision::skip(
                SkipReason::Unmatched,
                format!("{workspace_path} does not match watch_globs"),
            );
        }

        if !config.auto_commit {
            return Decision::skip(SkipReason::Disabled, "auto_commit is off");
        }

        let repo_root = match probe.repo_root(&file) {
            Ok(Some(root)) => root,
            Ok(None) => {
                return Decision::skip(
                    SkipReason::NotARepository,
                    format!("{} is not inside a git repository", file.display()),
                )
            }
            Err(e) => return Decision::skip(SkipReason::Environment, format!("repository probe failed: {e}")),
        };

        match probe.is_ignored(&repo_root, &file) {
            Ok(false) => {}
            Ok(true) => {
                return Decision::skip(SkipReason::Ignored, format!("{workspace_path} is ignored by git"))
            }
            Err(e) => return Decision::skip(SkipReason::Environment, format!("ignore check failed: {e}")),
        }

        let relative_path = relative_slash_path(&file, &repo_root);
        if build_globset(&config.sensitive_globs).is_match(&relative_path) {
            return Decision::skip(
                SkipReason::Sensitive,
                format!("{relative_path} matches a sensitive pattern and will not be committed"),
            );
        }

        let (push, branch) = if config.auto_push {
            let branch = match probe.current_branch(&repo_root) {
                Ok(branch) => branch,
                Err(e) => return Decision::skip(SkipReason::Environment, format!("branch probe failed: {e}")),
            };
            if config.protected_branches.iter().any(|p| p == &branch) {
                warn!("auto-push downgraded: {branch} is a protected branch, committing without push");
                (PushDecision::Suppressed, Some(branch))
            } else {
                (PushDecision::Push, Some(branch))
            }
        } else {
            (PushDecision::Disabled, None)
        };

        Decision::Proceed {
            repo_root,
            relative_path,
            branch,
            push,
        }
    }
}

/// compile patterns, skipping (and logging) any that do not parse
fn build_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!("ignoring invalid glob {pattern:?}: {e}"),
        }
    }
    builder.build().unwrap_or_else(|e| {
        warn!("could not compile globs: {e}");
        GlobSet::empty()
    })
}
