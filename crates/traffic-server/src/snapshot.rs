//! On-disk ledger snapshots
//!
//! File layout: 8-byte magic `TRLEDGR1` followed by a bincode [`Snapshot`].
//! Writes go to a sibling `.tmp` file that is synced and renamed over the
//! target, so a crash leaves either the old or the new snapshot.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use traffic_core::{Address, InconsistentStore, RecordKind, RecordStore};
use traffic_oracle::CiphertextRegistry;

pub const SNAPSHOT_MAGIC: &[u8; 8] = b"TRLEDGR1";

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Not a ledger snapshot (bad magic)")]
    BadMagic,

    #[error("Snapshot belongs to ledger {found}, expected {expected}")]
    LedgerMismatch { expected: Address, found: Address },

    #[error(transparent)]
    Inconsistent(#[from] InconsistentStore),
}

/// Everything needed to resume a ledger after restart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub ledger: Address,
    pub store: RecordStore,
    /// Ciphertexts behind every handle, so pending records stay decryptable
    pub registry: CiphertextRegistry,
}

impl Snapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        let mut bytes = SNAPSHOT_MAGIC.to_vec();
        bincode::serialize_into(&mut bytes, self)?;
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let body = bytes
            .strip_prefix(SNAPSHOT_MAGIC.as_slice())
            .ok_or(SnapshotError::BadMagic)?;
        Ok(bincode::deserialize(body)?)
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SnapshotError + '_ {
    move |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Atomically replace the snapshot at `path`
pub fn save(path: &Path, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    let bytes = snapshot.to_bytes()?;
    let tmp = path.with_extension("tmp");

    let mut file = File::create(&tmp).map_err(io_err(&tmp))?;
    file.write_all(&bytes).map_err(io_err(&tmp))?;
    file.sync_all().map_err(io_err(&tmp))?;
    drop(file);
    fs::rename(&tmp, path).map_err(io_err(path))?;

    tracing::debug!(
        path = %path.display(),
        bytes = bytes.len(),
        telemetry = snapshot.store.len(RecordKind::Telemetry),
        schedules = snapshot.store.len(RecordKind::Schedule),
        "Snapshot written"
    );
    Ok(())
}

/// Load the snapshot at `path` if one exists.
///
/// The snapshot must belong to `ledger` and its store must pass validation.
pub fn load(path: &Path, ledger: &Address) -> Result<Option<Snapshot>, SnapshotError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path)(e)),
    };
    let snapshot = Snapshot::from_bytes(&bytes)?;
    if snapshot.ledger != *ledger {
        return Err(SnapshotError::LedgerMismatch {
            expected: *ledger,
            found: snapshot.ledger,
        });
    }
    snapshot.store.validate()?;

    tracing::info!(
        path = %path.display(),
        telemetry = snapshot.store.len(RecordKind::Telemetry),
        schedules = snapshot.store.len(RecordKind::Schedule),
        ciphertexts = snapshot.registry.len(),
        "Snapshot loaded"
    );
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const LEDGER: Address = Address([0xeeu8; 20]);

    fn empty() -> Snapshot {
        Snapshot {
            ledger: LEDGER,
            store: RecordStore::new(),
            registry: CiphertextRegistry::default(),
        }
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempdir().unwrap();
        assert!(load(&dir.path().join("ledger.snap"), &LEDGER)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.snap");

        save(&path, &empty()).unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(load(&path, &LEDGER).unwrap(), Some(empty()));
    }

    #[test]
    fn test_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.snap");
        fs::write(&path, b"NOTASNAPSHOT").unwrap();
        assert!(matches!(load(&path, &LEDGER), Err(SnapshotError::BadMagic)));
    }

    #[test]
    fn test_ledger_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.snap");
        save(&path, &empty()).unwrap();

        let other = Address([0x01u8; 20]);
        assert!(matches!(
            load(&path, &other),
            Err(SnapshotError::LedgerMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_body() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.snap");
        let mut bytes = empty().to_bytes().unwrap();
        bytes.truncate(SNAPSHOT_MAGIC.len() + 3);
        fs::write(&path, bytes).unwrap();
        assert!(matches!(load(&path, &LEDGER), Err(SnapshotError::Encoding(_))));
    }
}
