//! On-disk snapshot of the node's documents and accounts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::Account;
use crate::store::StoreState;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub store: StoreState,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed snapshot: {0}")]
    Codec(#[from] serde_json::Error),
}

/// `<data dir>/valdore/node-snapshot.json`
pub fn default_snapshot_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("valdore")
        .join("node-snapshot.json")
}

/// Load a snapshot. A missing file is not an error.
pub fn load(path: &Path) -> Result<Option<NodeSnapshot>, PersistError> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let snapshot: NodeSnapshot = serde_json::from_str(&data)?;
    info!(
        path = %path.display(),
        documents = snapshot.store.document_count(),
        accounts = snapshot.accounts.len(),
        "loaded snapshot"
    );
    Ok(Some(snapshot))
}

/// Write through a temp file and rename, so a crash never leaves half a file.
pub fn save(path: &Path, snapshot: &NodeSnapshot) -> Result<(), PersistError> {
    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    info!(path = %path.display(), "saved snapshot");
    Ok(())
}
