// layered toml configuration: built-in defaults, then the user file
// (<config_dir>/save-commit/config.toml), then the workspace file
// (<workspace>/.save-commit.toml), then host overrides. loaded fresh on
// every save event so edits apply without a restart

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const APP_DIR_NAME: &str = "save-commit";
pub const WORKSPACE_FILE_NAME: &str = ".save-commit.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub policy: PolicyConfig,
    pub message: MessageConfig,
    pub generation: GenerationConfig,
}

/// policy inputs for the save guard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub watch_globs: Vec<String>,
    pub protected_branches: Vec<String>,
    pub sensitive_globs: Vec<String>,
    pub dry_run: bool,
    pub auto_commit: bool,
    pub auto_push: bool,
    pub use_emoji: bool,
    pub remote: String,
    pub trigger_ttl_ms: u64,
    pub confirm_before_commit: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            watch_globs: vec!["**/*".to_string()],
            protected_branches: vec!["main".to_string(), "master".to_string()],
            sensitive_globs: [
                "**/.env",
                "**/.env.*",
                "**/*.pem",
                "**/*.key",
                "**/*.p12",
                "**/*.pfx",
                "**/id_rsa*",
                "**/id_ed25519*",
                "**/*secret*",
                "**/credentials*",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            dry_run: false,
            auto_commit: true,
            auto_push: false,
            use_emoji: false,
            remote: "origin".to_string(),
            trigger_ttl_ms: 5000,
            confirm_before_commit: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageConfig {
    pub use_generation: bool,
    pub conventional_commits: bool,
    pub include_scope: bool,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            use_generation: true,
            conventional_commits: true,
            include_scope: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub model: String,
    /// used instead of `model` for complex and major changes
    pub detailed_model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub api_key_env: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
            detailed_model: None,
            temperature: 0.2,
            max_tokens: 300,
            timeout_secs: 15,
            api_key_env: "OPENROUTER_API_KEY".to_string(),
        }
    }
}

/// values forced by the host regardless of the files
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub dry_run: Option<bool>,
    pub auto_push: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_file: Option<PathBuf>,
    workspace_file: Option<PathBuf>,
    overrides: Overrides,
}

impl ConfigLoader {
    /// loader using the platform config dir and the given workspace
    pub fn new(workspace_root: &Path) -> Self {
        Self {
            user_file: user_config_path(),
            workspace_file: Some(workspace_root.join(WORKSPACE_FILE_NAME)),
            overrides: Overrides::default(),
        }
    }

    /// loader with explicit file locations, missing files are skipped
    pub fn with_files(user_file: Option<PathBuf>, workspace_file: Option<PathBuf>) -> Self {
        Self {
            user_file,
            workspace_file,
            overrides: Overrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn load(&self) -> Result<Config> {
        let mut merged = toml::Value::try_from(Config::default())
            .context("failed to serialise default config")?;

        for path in [&self.user_file, &self.workspace_file].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let layer: toml::Value = toml::from_str(&raw)
                .with_context(|| format!("invalid toml in {}", path.display()))?;
            debug!("applying config layer {}", path.display());
            merge_values(&mut merged, layer);
        }

        let mut config: Config = merged
            .try_into()
            .context("configuration does not match the expected schema")?;

        if let Some(dry_run) = self.overrides.dry_run {
            config.policy.dry_run = dry_run;
        }
        if let Some(auto_push) = self.overrides.auto_push {
            config.policy.auto_push = auto_push;
        }

        Ok(config)
    }
}

impl Config {
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render config as toml")
    }

    /// write the defaults to `path`, refusing to overwrite an existing file
    pub fn write_default(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("{} already exists", path.display());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, Config::default().to_toml_string()?)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join("config.toml"))
}

/// deep-merge tables, anything else in `overlay` replaces `base`
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_no_files_exist() {
        let loader = ConfigLoader::with_files(None, Some(PathBuf::from("/nonexistent/.save-commit.toml")));
        let config = loader.load().unwrap();
        assert_eq!(config, Config::default());
        assert!(config.policy.auto_commit);
        assert!(!config.policy.auto_push);
        assert_eq!(config.generation.timeout_secs, 15);
    }

    #[test]
    fn workspace_layer_overrides_user_layer_per_key() {
        let dir = TempDir::new().unwrap();
        let user = dir.path().join("user.toml");
        let workspace = dir.path().join("workspace.toml");
        fs::write(&user, "[policy]\nauto_push = true\nremote = \"upstream\"\n").unwrap();
        fs::write(&workspace, "[policy]\nauto_push = false\n[message]\ninclude_scope = false\n").unwrap();

        let config = ConfigLoader::with_files(Some(user), Some(workspace)).load().unwrap();
        assert!(!config.policy.auto_push);
        assert_eq!(config.policy.remote, "upstream");
        assert!(!config.message.include_scope);
        // untouched keys keep their defaults
        assert_eq!(config.policy.protected_branches, vec!["main", "master"]);
    }

    #[test]
    fn host_overrides_win() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path().join("workspace.toml");
        fs::write(&workspace, "[policy]\ndry_run = false\nauto_push = true\n").unwrap();

        let config = ConfigLoader::with_files(None, Some(workspace))
            .with_overrides(Overrides {
                dry_run: Some(true),
                auto_push: Some(false),
            })
            .load()
            .unwrap();
        assert!(config.policy.dry_run);
        assert!(!config.policy.auto_push);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path().join("workspace.toml");
        fs::write(&workspace, "[policy\nauto_push = ").unwrap();
        assert!(ConfigLoader::with_files(None, Some(workspace)).load().is_err());
    }

    #[test]
    fn write_default_round_trips_and_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        Config::write_default(&path).unwrap();
        let config = ConfigLoader::with_files(Some(path.clone()), None).load().unwrap();
        assert_eq!(config, Config::default());
        assert!(Config::write_default(&path).is_err());
    }
}
