//! Durable on-device registration queue.
//!
//! # Storage layout
//!
//! ```text
//! ~/.fieldreg/
//!   queue/
//!     registrations.json   (one JSON document, mode 0600)
//! ```
//!
//! Writes use an atomic `.tmp` + rename so a crash mid-save never leaves a
//! truncated queue behind. The queue is append-mostly: records are added by
//! intake and only the `synced` flag of an existing record is ever mutated,
//! through [`mark_synced_at`].
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{io_err, StoreError};
use crate::types::{PendingRegistration, QueueFile, RecordId};

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.fieldreg/queue/registrations.json`; pure, no I/O.
pub fn queue_path_at(home: &Path) -> PathBuf {
    home.join(".fieldreg").join("queue").join("registrations.json")
}

fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load the queue document. Returns an empty queue if the file does not yet
/// exist; a device that has never registered anyone has no pending records.
pub fn load_at(home: &Path) -> Result<QueueFile, StoreError> {
    let path = queue_path_at(home);
    if !path.exists() {
        return Ok(QueueFile::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<QueueFile, StoreError> {
    load_at(&home()?)
}

/// All records, as a copy. Mutation must go through [`mark_synced_at`].
pub fn list_at(home: &Path) -> Result<Vec<PendingRegistration>, StoreError> {
    Ok(load_at(home)?.records)
}

/// `list_at` convenience wrapper.
pub fn list() -> Result<Vec<PendingRegistration>, StoreError> {
    list_at(&home()?)
}

/// Records still awaiting remote confirmation (`synced = false`).
pub fn pending_at(home: &Path) -> Result<Vec<PendingRegistration>, StoreError> {
    let mut records = list_at(home)?;
    records.retain(|r| !r.synced);
    Ok(records)
}

/// `pending_at` convenience wrapper.
pub fn pending() -> Result<Vec<PendingRegistration>, StoreError> {
    pending_at(&home()?)
}

/// Count of unsynced records, computed freshly from the store on every call
/// so the number shown to the user can never drift from what is on disk.
pub fn pending_count_at(home: &Path) -> Result<usize, StoreError> {
    Ok(pending_at(home)?.len())
}

/// `pending_count_at` convenience wrapper.
pub fn pending_count() -> Result<usize, StoreError> {
    pending_count_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Save the queue document atomically: write `<path>.tmp`, then rename.
pub fn save_at(home: &Path, queue: &QueueFile) -> Result<(), StoreError> {
    let path = queue_path_at(home);
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid queue path")));
    };

    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        set_dir_permissions(dir)?;
    }

    let json = serde_json::to_string_pretty(queue)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    set_file_permissions(&path)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(queue: &QueueFile) -> Result<(), StoreError> {
    save_at(&home()?, queue)
}

// ---------------------------------------------------------------------------
// 4. Mutations
// ---------------------------------------------------------------------------

/// Append a new record to the queue.
///
/// On failure the record is considered never created; the caller must inform
/// the user rather than drop it silently.
pub fn append_at(home: &Path, record: PendingRegistration) -> Result<(), StoreError> {
    let mut queue = load_at(home)?;
    queue.records.push(record);
    save_at(home, &queue)
}

/// `append_at` convenience wrapper.
pub fn append(record: PendingRegistration) -> Result<(), StoreError> {
    append_at(&home()?, record)
}

/// Flip the `synced` flag of one record to true.
///
/// Targeted update: the queue is re-read so appends made after a caller's
/// snapshot survive, and only the matching record is touched. Idempotent:
/// flagging an already-synced record leaves the store unchanged (the
/// original `synced_at` is kept).
pub fn mark_synced_at(home: &Path, id: &RecordId) -> Result<(), StoreError> {
    let mut queue = load_at(home)?;
    let record = queue
        .records
        .iter_mut()
        .find(|r| &r.id == id)
        .ok_or_else(|| StoreError::RecordNotFound { id: id.clone() })?;

    if record.synced {
        return Ok(());
    }
    record.synced = true;
    record.synced_at = Some(Utc::now());
    save_at(home, &queue)
}

/// `mark_synced_at` convenience wrapper.
pub fn mark_synced(id: &RecordId) -> Result<(), StoreError> {
    mark_synced_at(&home()?, id)
}

// ---------------------------------------------------------------------------
// 5. Permissions
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_dir_permissions(dir: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(dir, e))
}

#[cfg(not(unix))]
fn set_dir_permissions(_dir: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
