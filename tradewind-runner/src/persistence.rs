//! Session-state and result persistence.
//!
//! Paper sessions and resumable backtests snapshot the account ledger and
//! closed-trade record as JSON. A missing state file means a fresh start; a
//! corrupt one is an error, because silently resetting a live ledger would
//! orphan open positions.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tradewind_core::domain::{AccountState, PerformanceRecord};

use crate::runner::{RunResult, SCHEMA_VERSION};

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Errors raised while reading or writing persisted state.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state file '{path}' is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Everything needed to continue a session where it left off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Run the state was saved under.
    pub run_id: String,
    /// Short fingerprint of the configuration that produced the state.
    /// Resuming under a different configuration is refused.
    pub config_hash: String,
    pub account: AccountState,
    pub record: PerformanceRecord,
    pub saved_at: DateTime<Utc>,
}

/// Write session state as pretty JSON.
pub fn save_state(path: impl AsRef<Path>, state: &SessionState) -> Result<(), PersistError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(state)?;
    fs::write(path, json).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read session state back. A missing file is `Ok(None)`; anything
/// unparseable is an error rather than a silent fresh start.
pub fn load_state(path: impl AsRef<Path>) -> Result<Option<SessionState>, PersistError> {
    let path = path.as_ref();
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let state = serde_json::from_str(&text).map_err(|source| PersistError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(state))
}

/// Write a run result to `dir/<run_id>.json` and return the path.
pub fn save_result(dir: impl AsRef<Path>, result: &RunResult) -> Result<PathBuf, PersistError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|source| PersistError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(format!("{}.json", result.run_id));
    let json = serde_json::to_string_pretty(result)?;
    fs::write(&path, json).map_err(|source| PersistError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
