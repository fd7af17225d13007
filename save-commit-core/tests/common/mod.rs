#![allow(dead_code)]

use save_commit_core::config::ConfigLoader;
use save_commit_core::credentials::CredentialStore;
use save_commit_core::{SaveHandler, StateStore};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// throwaway repository on `main` with one initial commit
pub struct TestRepo {
    _dir: TempDir,
    pub root: PathBuf,
}

pub fn git(root: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .expect("git should run");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

impl TestRepo {
    pub fn init() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();

        git(&root, &["init", "-q"]);
        git(&root, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(&root, &["config", "user.name", "Save Commit Tests"]);
        git(&root, &["config", "user.email", "tests@example.com"]);
        git(&root, &["config", "commit.gpgsign", "false"]);

        let repo = Self { _dir: dir, root };
        repo.write("README.md", "# fixture\n");
        repo.write(".gitignore", "*.log\n");
        repo.write("src/lib.rs", "pub fn one() -> u32 {\n    1\n}\n");
        git(&repo.root, &["add", "-A"]);
        git(&repo.root, &["commit", "-q", "-m", "initial"]);
        repo
    }

    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn head(&self) -> String {
        git(&self.root, &["rev-parse", "HEAD"])
    }

    pub fn last_subject(&self) -> String {
        git(&self.root, &["log", "-1", "--format=%s"])
    }

    pub fn staged_names(&self) -> String {
        git(&self.root, &["diff", "--cached", "--name-only"])
    }
}

/// state, credentials and config kept outside the repository so
/// `git add -A` never picks them up
pub struct Sandbox {
    pub dir: TempDir,
}

impl Sandbox {
    pub fn new(config_toml: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.toml"), config_toml).unwrap();
        Self { dir }
    }

    pub fn state(&self) -> StateStore {
        StateStore::at(self.dir.path().join("state.json"))
    }

    pub fn credentials(&self) -> CredentialStore {
        CredentialStore::at(self.dir.path().join("credentials.toml"))
    }

    pub fn handler(&self, repo: &TestRepo) -> SaveHandler {
        SaveHandler::new(&repo.root, self.state())
            .with_config_loader(ConfigLoader::with_files(
                None,
                Some(self.dir.path().join("config.toml")),
            ))
            .with_credentials(self.credentials())
            .with_warnings(false)
    }
}

pub const TEMPLATE_ONLY: &str = r#"
[message]
use_generation = false

[generation]
api_key_env = "SAVE_COMMIT_TEST_KEY_THAT_IS_NEVER_SET"
"#;
