// single-use save-trigger tokens

use crate::utils::normalize_path;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const NONCE_LEN: usize = 32;
/// upper bound on a configured trigger lifetime
pub const MAX_TTL_MS: u64 = 60 * 60 * 1000;

/// authorization for exactly one save of `file_path` before `expires_at`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveTriggerToken {
    pub file_path: PathBuf,
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardVerdict {
    NoToken,
    TokenExpired,
    PathMismatch,
    NonceMismatch,
    Authorized,
}

impl GuardVerdict {
    pub fn is_authorized(&self) -> bool {
        matches!(self, GuardVerdict::Authorized)
    }
}

/// the token slot; anything outside the process may write it, so a stored
/// token alone never authorizes a save
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<SaveTriggerToken>;
    fn store(&self, token: SaveTriggerToken);
    fn clear(&self);
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<SaveTriggerToken>>,
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<SaveTriggerToken> {
        self.slot.lock().clone()
    }

    fn store(&self, token: SaveTriggerToken) {
        *self.slot.lock() = Some(token);
    }

    fn clear(&self) {
        *self.slot.lock() = None;
    }
}

/// issues tokens and decides whether a save event may proceed
///
/// the nonce table never leaves this type; both it and the token slot are
/// only touched while `nonces` is locked, so check-and-clear is atomic
pub struct TriggerAuthority {
    store: Arc<dyn TokenStore>,
    nonces: Mutex<HashMap<PathBuf, String>>,
}

impl Default for TriggerAuthority {
    fn default() -> Self {
        Self::new(Arc::new(MemoryTokenStore::default()))
    }
}

impl TriggerAuthority {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            nonces: Mutex::new(HashMap::new()),
        }
    }

    /// issue a token for `path`, replacing any live one
    pub fn issue(&self, path: &Path, ttl_ms: u64) -> SaveTriggerToken {
        let file_path = normalize_path(path);
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect();
        let ttl = Duration::milliseconds(ttl_ms.min(MAX_TTL_MS) as i64);
        let token = SaveTriggerToken {
            file_path: file_path.clone(),
            nonce: nonce.clone(),
            expires_at: Utc::now() + ttl,
        };

        let mut nonces = self.nonces.lock();
        if let Some(previous) = self.store.load() {
            nonces.remove(&previous.file_path);
        }
        nonces.insert(file_path.clone(), nonce);
        self.store.store(token.clone());

        debug!("issued save trigger for {} (ttl {ttl_ms}ms)", file_path.display());
        token
    }

    /// validate a save of `path` at `now`, consuming the token on success
    pub fn try_consume(&self, path: &Path, now: DateTime<Utc>) -> GuardVerdict {
        let path = normalize_path(path);
        let mut nonces = self.nonces.lock();

        let verdict = match self.store.load() {
            None => GuardVerdict::NoToken,
            Some(token) if now > token.expires_at => {
                self.store.clear();
                nonces.remove(&token.file_path);
                GuardVerdict::TokenExpired
            }
            Some(token) if token.file_path != path => GuardVerdict::PathMismatch,
            Some(token) => {
                let matches = nonces.get(&path).is_some_and(|nonce| *nonce == token.nonce);
                self.store.clear();
                nonces.remove(&path);
                if matches {
                    GuardVerdict::Authorized
                } else {
                    GuardVerdict::NonceMismatch
                }
            }
        };

        match verdict {
            GuardVerdict::Authorized => info!("save of {} authorized", path.display()),
            GuardVerdict::NoToken => debug!("save of {} ignored: no trigger pending", path.display()),
            other => info!("save of {} ignored: {other:?}", path.display()),
        }
        verdict
    }

    /// whether a token is waiting to be consumed
    pub fn has_pending(&self) -> bool {
        let _nonces = self.nonces.lock();
        self.store.load().is_some()
    }
}
