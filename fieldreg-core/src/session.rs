//! Local operator session.
//!
//! Read-only as far as the queue is concerned: intake copies the operator
//! name onto new records for attribution, nothing in the sync path depends
//! on it. Persisted at `~/.fieldreg/session.json`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};

/// The currently signed-in operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub operator: String,
    pub signed_in_at: DateTime<Utc>,
}

/// `<home>/.fieldreg/session.json`; pure, no I/O.
pub fn session_path_at(home: &Path) -> PathBuf {
    home.join(".fieldreg").join("session.json")
}

fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}

/// Current session, or `None` when nobody is signed in.
pub fn current_at(home: &Path) -> Result<Option<Session>, StoreError> {
    let path = session_path_at(home);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(Some(serde_json::from_str(&contents)?))
}

/// `current_at` convenience wrapper.
pub fn current() -> Result<Option<Session>, StoreError> {
    current_at(&home()?)
}

/// Sign an operator in, replacing any existing session.
pub fn sign_in_at(home: &Path, operator: &str) -> Result<Session, StoreError> {
    let session = Session {
        operator: operator.to_string(),
        signed_in_at: Utc::now(),
    };
    let path = session_path_at(home);
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid session path")));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    let json = serde_json::to_string_pretty(&session)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(session)
}

/// `sign_in_at` convenience wrapper.
pub fn sign_in(operator: &str) -> Result<Session, StoreError> {
    sign_in_at(&home()?, operator)
}

/// Remove the session file, if any.
pub fn sign_out_at(home: &Path) -> Result<(), StoreError> {
    let path = session_path_at(home);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(&path, err)),
    }
}

/// `sign_out_at` convenience wrapper.
pub fn sign_out() -> Result<(), StoreError> {
    sign_out_at(&home()?)
}
