// api key resolution: environment, then the credentials file, then a
// one-time prompt

use crate::config::{GenerationConfig, APP_DIR_NAME};
use crate::prompt::Prompter;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const CREDENTIALS_FILE_NAME: &str = "credentials.toml";

/// backend secret; never printed in full
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// `None` for blank input
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredCredentials {
    api_key: Option<String>,
}

/// the on-disk credentials file
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: Option<PathBuf>,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self {
            path: dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CREDENTIALS_FILE_NAME)),
        }
    }
}

impl CredentialStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn load(&self) -> Option<ApiKey> {
        let path = self.path.as_ref()?;
        let raw = fs::read_to_string(path).ok()?;
        match toml::from_str::<StoredCredentials>(&raw) {
            Ok(stored) => stored.api_key.and_then(ApiKey::new),
            Err(e) => {
                warn!("ignoring unreadable credentials file {}: {e}", path.display());
                None
            }
        }
    }

    pub fn save(&self, key: &ApiKey) -> Result<()> {
        let path = self
            .path
            .as_ref()
            .context("no config directory available for the credentials file")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let contents = toml::to_string(&StoredCredentials {
            api_key: Some(key.expose().to_string()),
        })
        .context("failed to encode credentials")?;
        write_private(path, &contents).with_context(|| format!("failed to write {}", path.display()))?;

        info!("saved api key to {}", path.display());
        Ok(())
    }
}

/// write `contents` to a file only the owner can read, from creation on
fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        let mut file = options.open(path)?;
        // an existing file keeps its old mode on open
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        file.write_all(contents.as_bytes())
    }
    #[cfg(not(unix))]
    {
        options.open(path)?.write_all(contents.as_bytes())
    }
}

/// find an api key without prompting
pub fn lookup_api_key(config: &GenerationConfig, store: &CredentialStore) -> Option<ApiKey> {
    if let Some(key) = std::env::var(&config.api_key_env).ok().and_then(ApiKey::new) {
        debug!("using api key from {}", config.api_key_env);
        return Some(key);
    }
    store.load()
}

/// find an api key, asking once through `prompter` when none is stored
///
/// a key entered at the prompt is persisted for later sessions; declining
/// returns `None` and the caller falls back to template messages
pub fn resolve_api_key(
    config: &GenerationConfig,
    store: &CredentialStore,
    prompter: &dyn Prompter,
) -> Option<ApiKey> {
    if let Some(key) = lookup_api_key(config, store) {
        return Some(key);
    }

    let key = prompter.api_key(&config.api_key_env).and_then(ApiKey::new)?;
    if let Err(e) = store.save(&key) {
        warn!("api key will only be used for this session: {e:#}");
    }
    Some(key)
}
