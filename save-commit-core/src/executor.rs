// commit/push execution and undo

use crate::ai::composer::CommitMessage;
use crate::error::{GitError, Result, SaveCommitError};
use crate::git::{rev_parse_head, run_git, GitOutput};
use crate::state::LastCommitInfo;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const NOTHING_TO_COMMIT: &[&str] = &[
    "nothing to commit",
    "nothing added to commit",
    "no changes added to commit",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Stage,
    Commit,
    Push,
    Reset,
}

/// one git invocation, kept as an argument vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitStep {
    pub kind: StepKind,
    pub args: Vec<String>,
}

impl GitStep {
    fn new(kind: StepKind, args: &[&str]) -> Self {
        Self {
            kind,
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// ordered git steps run inside one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlan {
    pub repo_root: PathBuf,
    pub steps: Vec<GitStep>,
}

impl CommandPlan {
    pub fn has_push(&self) -> bool {
        self.steps.iter().any(|s| s.kind == StepKind::Push)
    }
}

/// escape for a double-quoted shell string
fn shell_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn is_bare_word(arg: &str) -> bool {
    !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '~' | ':' | '='))
}

impl fmt::Display for CommandPlan {
    /// `cd "<root>" && git add -A && git commit -m "..." && ...`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cd \"{}\"", shell_escape(&self.repo_root.to_string_lossy()))?;
        for step in &self.steps {
            f.write_str(" && git")?;
            let mut quote_next = false;
            for arg in &step.args {
                if quote_next || !is_bare_word(arg) {
                    write!(f, " \"{}\"", shell_escape(arg))?;
                } else {
                    write!(f, " {arg}")?;
                }
                quote_next = arg == "-m";
            }
        }
        Ok(())
    }
}

/// plan for staging, committing and optionally pushing
///
/// the push step is only added when `push` is set and a branch is known
pub fn build_command(
    repo_root: &Path,
    message: &CommitMessage,
    branch: Option<&str>,
    push: bool,
    remote: &str,
) -> CommandPlan {
    let mut steps = vec![GitStep::new(StepKind::Stage, &["add", "-A"])];

    let mut commit = vec!["commit", "-m", message.subject.as_str()];
    let body = message.body_text();
    if let Some(body) = body.as_deref() {
        commit.extend(["-m", body]);
    }
    steps.push(GitStep::new(StepKind::Commit, &commit));

    if let (true, Some(branch)) = (push, branch) {
        steps.push(GitStep::new(StepKind::Push, &["push", remote, branch]));
    }

    CommandPlan {
        repo_root: repo_root.to_path_buf(),
        steps,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommitResult {
    Created { hash: String },
    NothingToCommit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub commit: CommitResult,
    pub pushed: bool,
    /// set when the commit landed but the push did not
    pub push_error: Option<String>,
}

fn failed(step: &GitStep, output: &GitOutput) -> GitError {
    let stderr = if output.stderr.trim().is_empty() {
        output.stdout.trim()
    } else {
        output.stderr.trim()
    };
    GitError::CommandFailed {
        command: step.args.join(" "),
        stderr: stderr.to_string(),
    }
}

fn is_nothing_to_commit(output: &GitOutput) -> bool {
    let combined = format!("{}\n{}", output.stdout, output.stderr).to_lowercase();
    NOTHING_TO_COMMIT.iter().any(|marker| combined.contains(marker))
}

fn args_of(step: &GitStep) -> Vec<&str> {
    step.args.iter().map(String::as_str).collect()
}

/// run a commit plan; "nothing to commit" is a successful no-op that skips
/// any push
pub fn execute(plan: &CommandPlan) -> std::result::Result<ExecutionReport, GitError> {
    let mut commit = None;
    let mut pushed = false;
    let mut push_error = None;

    for step in &plan.steps {
        let output = run_git(&plan.repo_root, &args_of(step))?;

        match step.kind {
            StepKind::Commit if !output.success && is_nothing_to_commit(&output) => {
                info!("nothing to commit in {}", plan.repo_root.display());
                return Ok(ExecutionReport {
                    commit: CommitResult::NothingToCommit,
                    pushed: false,
                    push_error: None,
                });
            }
            StepKind::Commit if output.success => {
                let hash = rev_parse_head(&plan.repo_root)?;
                info!("created commit {}", &hash[..7.min(hash.len())]);
                commit = Some(CommitResult::Created { hash });
            }
            StepKind::Push if output.success => {
                debug!("push output: {}", output.stderr.trim());
                pushed = true;
            }
            StepKind::Push => {
                let err = failed(step, &output);
                warn!("commit created but push failed: {err}");
                push_error = Some(err.to_string());
            }
            _ if output.success => {}
            _ => return Err(failed(step, &output)),
        }
    }

    Ok(ExecutionReport {
        commit: commit.unwrap_or(CommitResult::NothingToCommit),
        pushed,
        push_error,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UndoMode {
    /// keep the changes staged
    #[default]
    Soft,
    /// discard the changes
    Hard,
}

pub fn build_undo(repo_root: &Path, mode: UndoMode) -> CommandPlan {
    let flag = match mode {
        UndoMode::Soft => "--soft",
        UndoMode::Hard => "--hard",
    };
    CommandPlan {
        repo_root: repo_root.to_path_buf(),
        steps: vec![GitStep::new(StepKind::Reset, &["reset", flag, "HEAD~1"])],
    }
}

/// reset the recorded auto-commit, refusing when HEAD has moved since
pub fn undo_last(last: &LastCommitInfo, mode: UndoMode) -> Result<()> {
    let actual = rev_parse_head(&last.repo_root)?;
    if actual != last.commit_hash {
        return Err(SaveCommitError::HeadMoved {
            expected: last.commit_hash.clone(),
            actual,
        });
    }

    let plan = build_undo(&last.repo_root, mode);
    for step in &plan.steps {
        let output = run_git(&plan.repo_root, &args_of(step))?;
        if !output.success {
            return Err(failed(step, &output).into());
        }
    }

    info!("undid commit {} ({mode:?})", &last.commit_hash[..7.min(last.commit_hash.len())]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::composer::MessageOrigin;

    fn message(subject: &str, body: &[&str]) -> CommitMessage {
        CommitMessage {
            subject: subject.to_string(),
            body: body.iter().map(|s| s.to_string()).collect(),
            origin: MessageOrigin::Template,
        }
    }

    #[test]
    fn renders_full_pipeline() {
        let plan = build_command(
            Path::new("/repo"),
            &message("feat: add x", &[]),
            Some("main"),
            true,
            "origin",
        );
        assert_eq!(
            plan.to_string(),
            "cd \"/repo\" && git add -A && git commit -m \"feat: add x\" && git push origin main"
        );
        assert!(plan.has_push());
    }

    #[test]
    fn push_needs_flag_and_branch() {
        let msg = message("fix: y", &[]);
        assert!(!build_command(Path::new("/r"), &msg, Some("dev"), false, "origin").has_push());
        assert!(!build_command(Path::new("/r"), &msg, None, true, "origin").has_push());
    }

    #[test]
    fn body_becomes_second_message_argument() {
        let plan = build_command(Path::new("/r"), &message("feat: a", &["one", "two"]), None, false, "origin");
        assert_eq!(plan.steps[1].args, vec!["commit", "-m", "feat: a", "-m", "one\ntwo"]);
    }

    #[test]
    fn rendering_escapes_shell_metacharacters() {
        let plan = build_command(
            Path::new("/r"),
            &message(r#"fix: say "hi" to $USER via `echo` \o/"#, &[]),
            None,
            false,
            "origin",
        );
        let rendered = plan.to_string();
        assert!(rendered.ends_with(r#"git commit -m "fix: say \"hi\" to \$USER via \`echo\` \\o/""#));
    }

    #[test]
    fn short_message_is_still_quoted() {
        let plan = build_command(Path::new("/r"), &message("wip", &[]), None, false, "origin");
        assert!(plan.to_string().ends_with("git commit -m \"wip\""));
    }

    #[test]
    fn undo_plans() {
        assert_eq!(
            build_undo(Path::new("/r"), UndoMode::Soft).to_string(),
            "cd \"/r\" && git reset --soft HEAD~1"
        );
        assert_eq!(build_undo(Path::new("/r"), UndoMode::Hard).steps[0].args[1], "--hard");
    }

    #[test]
    fn nothing_to_commit_markers() {
        let clean = GitOutput {
            success: false,
            stdout: "On branch main\nnothing to commit, working tree clean\n".to_string(),
            stderr: String::new(),
        };
        assert!(is_nothing_to_commit(&clean));

        let hook = GitOutput {
            success: false,
            stdout: String::new(),
            stderr: "pre-commit hook failed".to_string(),
        };
        assert!(!is_nothing_to_commit(&hook));
    }
}
