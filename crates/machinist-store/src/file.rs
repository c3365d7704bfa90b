use crate::table::MachineTable;
use crate::{fsync_dir, MachineStore, StoreError, Upserted};
use fs2::FileExt;
use machinist_schema::{Machine, MachineId, MachinePatch, NewMachine};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Current snapshot format version. Incremented on incompatible changes.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;
const SNAPSHOT_FILE: &str = "machines.json";
const LOCK_FILE: &str = ".lock";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
    format_version: u32,
    next_id: MachineId,
    machines: Vec<Machine>,
    /// blake3 checksum over the snapshot with this field unset. `None` for hand-written files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
}

impl Snapshot {
    fn compute_checksum(&self) -> Result<String, StoreError> {
        let mut copy = self.clone();
        copy.checksum = None;
        let json = serde_json::to_string_pretty(&copy)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

/// Exclusive advisory lock on the data directory, released on drop.
#[derive(Debug)]
struct DirLock {
    file: File,
}

impl DirLock {
    fn acquire(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        FileExt::try_lock_exclusive(&file).map_err(|e| {
            StoreError::LockFailed(format!(
                "{} is held by another process: {e}",
                path.display()
            ))
        })?;
        Ok(Self { file })
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Durable store: the whole table is rewritten atomically on every mutation.
///
/// Layout under `data_dir`:
/// - `machines.json`: checksummed snapshot (format version, next id, records)
/// - `.lock`: held exclusively for the lifetime of the store
#[derive(Debug)]
pub struct FileStore {
    data_dir: PathBuf,
    table: RwLock<MachineTable>,
    _lock: DirLock,
}

impl FileStore {
    /// Open (or create) a store rooted at `data_dir`.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        let lock = DirLock::acquire(&data_dir.join(LOCK_FILE))?;

        let path = data_dir.join(SNAPSHOT_FILE);
        let fresh = !path.exists();
        let table = if fresh {
            MachineTable::default()
        } else {
            load_snapshot(&path)?
        };

        let store = Self {
            data_dir,
            table: RwLock::new(table),
            _lock: lock,
        };
        if fresh {
            store.persist(&MachineTable::default())?;
        }
        info!(
            "opened machine store at {} ({} records)",
            store.data_dir.display(),
            store.read()?.rows().len()
        );
        Ok(store)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MachineTable>, StoreError> {
        self.table.read().map_err(|_| StoreError::Poisoned)
    }

    fn persist(&self, table: &MachineTable) -> Result<(), StoreError> {
        let mut snapshot = Snapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            next_id: table.next_id(),
            machines: table.rows().to_vec(),
            checksum: None,
        };
        snapshot.checksum = Some(snapshot.compute_checksum()?);
        let content = serde_json::to_string_pretty(&snapshot)?;

        let mut tmp = NamedTempFile::new_in(&self.data_dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.snapshot_path())
            .map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(&self.data_dir)?;
        debug!("wrote snapshot: {} records", snapshot.machines.len());
        Ok(())
    }

    /// Apply `f` under the write lock and persist when it reports a change.
    /// A failed write restores the previous table so memory matches disk.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut MachineTable) -> Result<(T, bool), StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.table.write().map_err(|_| StoreError::Poisoned)?;
        let before = guard.clone();
        let (out, changed) = f(&mut guard)?;
        if changed {
            if let Err(e) = self.persist(&guard) {
                *guard = before;
                return Err(e);
            }
        }
        Ok(out)
    }
}

fn load_snapshot(path: &Path) -> Result<MachineTable, StoreError> {
    let content = fs::read_to_string(path)?;
    let snapshot: Snapshot = serde_json::from_str(&content)?;

    if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(StoreError::VersionMismatch {
            expected: SNAPSHOT_FORMAT_VERSION,
            found: snapshot.format_version,
        });
    }
    if let Some(ref expected) = snapshot.checksum {
        let actual = snapshot.compute_checksum()?;
        if actual != *expected {
            return Err(StoreError::IntegrityFailure {
                expected: expected.clone(),
                actual,
            });
        }
    }
    MachineTable::from_parts(snapshot.machines, snapshot.next_id)
}

impl MachineStore for FileStore {
    fn insert(&self, machine: NewMachine) -> Result<Machine, StoreError> {
        self.mutate(|t| t.insert(machine).map(|m| (m, true)))
    }

    fn find_by_id(&self, id: MachineId) -> Result<Option<Machine>, StoreError> {
        Ok(self.read()?.get(id).cloned())
    }

    fn find_by_name(&self, name: &str) -> Result<Vec<Machine>, StoreError> {
        Ok(self.read()?.by_name(name))
    }

    fn find_all(&self) -> Result<Vec<Machine>, StoreError> {
        Ok(self.read()?.rows().to_vec())
    }

    fn upsert_at(&self, id: MachineId, machine: NewMachine) -> Result<Upserted, StoreError> {
        self.mutate(|t| t.upsert_at(id, machine).map(|u| (u, true)))
    }

    fn update(&self, id: MachineId, patch: &MachinePatch) -> Result<Option<Machine>, StoreError> {
        self.mutate(|t| {
            let out = t.update(id, patch);
            let changed = out.is_some();
            Ok((out, changed))
        })
    }
}
