// persisted state: undo slot, last action time and usage stats

use crate::config::APP_DIR_NAME;
use crate::error::{Result, SaveCommitError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const STATE_FILE_NAME: &str = "state.json";
/// entries kept in `Stats::history`
pub const HISTORY_LIMIT: usize = 50;

/// what undo needs to know about the most recent auto-commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastCommitInfo {
    pub commit_hash: String,
    pub message: String,
    pub repo_root: PathBuf,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub hash: String,
    pub subject: String,
    pub file: String,
    pub pushed: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub total_commits: u64,
    pub total_pushes: u64,
    pub dry_runs: u64,
    pub skipped: BTreeMap<String, u64>,
    /// newest last
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    pub last_action_at: Option<DateTime<Utc>>,
    pub last_commit: Option<LastCommitInfo>,
    pub stats: Stats,
}

/// json-backed store; every update is a read-modify-write of the whole file
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl StateStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// store under the platform data directory
    pub fn open_default() -> Result<Self> {
        let dir = dirs::data_dir()
            .ok_or_else(|| SaveCommitError::State("no data directory on this platform".to_string()))?;
        Ok(Self::at(dir.join(APP_DIR_NAME).join(STATE_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// current state; a missing or unreadable file reads as empty
    pub fn load(&self) -> State {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return State::default(),
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("state file {} is corrupt, starting fresh: {e}", self.path.display());
            State::default()
        })
    }

    fn update(&self, apply: impl FnOnce(&mut State)) -> Result<State> {
        let _guard = self.write_lock.lock();
        let mut state = self.load();
        apply(&mut state);
        self.save(&state)?;
        Ok(state)
    }

    fn save(&self, state: &State) -> Result<()> {
        let io = |e: std::io::Error| SaveCommitError::State(format!("{}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io)?;
        }
        let json = serde_json::to_string_pretty(state).map_err(|e| SaveCommitError::State(e.to_string()))?;

        // write then rename so a crash never leaves half a file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io)?;
        fs::rename(&tmp, &self.path).map_err(io)?;
        debug!("state saved to {}", self.path.display());
        Ok(())
    }

    /// note that an authorized save was handled
    pub fn record_action(&self, at: DateTime<Utc>) -> Result<()> {
        self.update(|state| state.last_action_at = Some(at)).map(|_| ())
    }

    /// record a real commit: replaces the undo slot and appends history
    pub fn record_commit(&self, info: LastCommitInfo, file: &str, pushed: bool) -> Result<()> {
        self.update(|state| {
            let subject = info.message.lines().next().unwrap_or_default().to_string();
            state.stats.total_commits += 1;
            if pushed {
                state.stats.total_pushes += 1;
            }
            state.stats.history.push(HistoryEntry {
                hash: info.commit_hash.clone(),
                subject,
                file: file.to_string(),
                pushed,
                timestamp: info.timestamp,
            });
            let overflow = state.stats.history.len().saturating_sub(HISTORY_LIMIT);
            state.stats.history.drain(..overflow);
            state.last_commit = Some(info);
        })
        .map(|_| ())
    }

    pub fn record_dry_run(&self) -> Result<()> {
        self.update(|state| state.stats.dry_runs += 1).map(|_| ())
    }

    pub fn record_skip(&self, reason: &str) -> Result<()> {
        self.update(|state| *state.stats.skipped.entry(reason.to_string()).or_default() += 1)
            .map(|_| ())
    }

    pub fn clear_last_commit(&self) -> Result<()> {
        self.update(|state| state.last_commit = None).map(|_| ())
    }
}
