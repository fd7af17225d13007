use crate::error::GitError;
use crate::utils::normalize_path;
use encoding_rs::Encoding;
use git2::Repository;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// read-only questions the save guard asks about a repository
///
/// kept behind a trait so the policy chain can be exercised without a
/// real repository on disk
pub trait RepoProbe: Send + Sync {
    /// root of the working tree containing `path`, `None` outside any repository
    fn repo_root(&self, path: &Path) -> Result<Option<PathBuf>, GitError>;

    /// whether `.gitignore` rules exclude `path` (absolute or root-relative)
    fn is_ignored(&self, repo_root: &Path, path: &Path) -> Result<bool, GitError>;

    /// short branch name, or the short commit hash on a detached HEAD
    fn current_branch(&self, repo_root: &Path) -> Result<String, GitError>;

    /// full hash of HEAD, `None` before the first commit
    fn head(&self, repo_root: &Path) -> Result<Option<String>, GitError>;
}

/// libgit2-backed probe, equivalent to `rev-parse --show-toplevel`,
/// `check-ignore`, `symbolic-ref --short HEAD` and `rev-parse HEAD`
#[derive(Debug, Default, Clone, Copy)]
pub struct GitProbe;

impl RepoProbe for GitProbe {
    fn repo_root(&self, path: &Path) -> Result<Option<PathBuf>, GitError> {
        // discover wants a directory; saved paths are usually files
        let start = if path.is_dir() {
            path.to_path_buf()
        } else {
            match path.parent() {
                Some(parent) => parent.to_path_buf(),
                None => return Ok(None),
            }
        };

        let repo = match Repository::discover(&start) {
            Ok(repo) => repo,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(GitError::Probe(e)),
        };

        // bare repositories have no working tree to commit from
        Ok(repo.workdir().map(normalize_path))
    }

    fn is_ignored(&self, repo_root: &Path, path: &Path) -> Result<bool, GitError> {
        let repo = Repository::open(repo_root)?;
        let relative = path
            .strip_prefix(repo_root)
            .unwrap_or(path)
            .to_path_buf();
        Ok(repo.is_path_ignored(&relative)?)
    }

    fn current_branch(&self, repo_root: &Path) -> Result<String, GitError> {
        let repo = Repository::open(repo_root)?;

        match repo.head() {
            Ok(head) if head.is_branch() => Ok(head
                .shorthand()
                .unwrap_or("HEAD")
                .to_string()),
            Ok(head) => {
                // detached HEAD, fall back to the short hash
                let oid = head
                    .target()
                    .ok_or_else(|| git2::Error::from_str("HEAD has no target"))?;
                let full = oid.to_string();
                Ok(full[..7.min(full.len())].to_string())
            }
            Err(_) => {
                // unborn branch: HEAD is symbolic but points at nothing yet
                let head_ref = repo.find_reference("HEAD")?;
                let target = head_ref.symbolic_target().unwrap_or("HEAD");
                Ok(target.trim_start_matches("refs/heads/").to_string())
            }
        }
    }

    fn head(&self, repo_root: &Path) -> Result<Option<String>, GitError> {
        let repo = Repository::open(repo_root)?;
        let head = match repo.head() {
            Ok(head) => head,
            Err(_) => return Ok(None),
        };
        Ok(head.target().map(|oid| oid.to_string()))
    }
}

/// captured result of one git subprocess
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// run `git <args>` inside `repo_root` without a shell
pub fn run_git(repo_root: &Path, args: &[&str]) -> Result<GitOutput, GitError> {
    let git = which::which("git").map_err(|_| GitError::GitUnavailable)?;
    debug!("git {}", args.join(" "));

    // output is matched against english messages, so pin the locale
    let output = Command::new(git)
        .args(args)
        .current_dir(repo_root)
        .env("LC_ALL", "C")
        .env_remove("LANGUAGE")
        .output()?;

    Ok(GitOutput {
        success: output.status.success(),
        stdout: decode_output(&output.stdout),
        stderr: decode_output(&output.stderr),
    })
}

/// like [`run_git`] but a non-zero exit becomes an error
pub fn run_git_checked(repo_root: &Path, args: &[&str]) -> Result<String, GitError> {
    let output = run_git(repo_root, args)?;
    if output.success {
        Ok(output.stdout)
    } else {
        Err(GitError::CommandFailed {
            command: args.join(" "),
            stderr: output.stderr.trim().to_string(),
        })
    }
}

/// stage everything, including deletions and untracked files
pub fn stage_all(repo_root: &Path) -> Result<(), GitError> {
    run_git_checked(repo_root, &["add", "-A"]).map(|_| ())
}

/// cumulative staged diff with three lines of context
pub fn diff_cached(repo_root: &Path) -> Result<String, GitError> {
    run_git_checked(repo_root, &["diff", "--cached", "--unified=3"])
}

/// diff of a single file against its last committed state, or against the
/// index when there is no commit yet
pub fn diff_file(repo_root: &Path, file: &Path) -> Result<String, GitError> {
    let relative = file.strip_prefix(repo_root).unwrap_or(file);
    let relative = relative.to_string_lossy();
    match run_git_checked(repo_root, &["diff", "HEAD", "--", relative.as_ref()]) {
        Ok(diff) => Ok(diff),
        Err(GitError::CommandFailed { .. }) => {
            run_git_checked(repo_root, &["diff", "--", relative.as_ref()])
        }
        Err(e) => Err(e),
    }
}

/// full hash of HEAD as reported by the git binary
pub fn rev_parse_head(repo_root: &Path) -> Result<String, GitError> {
    run_git_checked(repo_root, &["rev-parse", "HEAD"]).map(|s| s.trim().to_string())
}

/// decode subprocess output, tolerating non-utf8 bytes in diffs
fn decode_output(bytes: &[u8]) -> String {
    let (cow, _encoding_used, had_errors) = encoding_rs::UTF_8.decode(bytes);

    if had_errors {
        // latin-1 style content is common in legacy files
        let (fallback, _, _) = Encoding::for_label(b"windows-1252")
            .unwrap_or(encoding_rs::UTF_8)
            .decode(bytes);
        fallback.into_owned()
    } else {
        cow.into_owned()
    }
}
