//! Persistence for the session and cart between CLI invocations.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::cart::Cart;
use crate::session::Session;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub cart: Cart,
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Read saved state. A missing file is not an error.
pub fn load(path: &Path) -> Result<Option<PersistedState>, PersistenceError> {
    let contents = match std::fs::read(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(Some(serde_json::from_slice(&contents)?))
}

/// Write state atomically: the file is either the old state or the new one,
/// never a partial write.
pub fn save(path: &Path, state: &PersistedState) -> Result<(), PersistenceError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut file, state)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;

    tracing::debug!(path = %path.display(), "State saved");
    Ok(())
}
