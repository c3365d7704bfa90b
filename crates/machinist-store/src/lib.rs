//! Keyed storage for machine records.
//!
//! [`MachineStore`] is the contract the service layer consumes. Two backends
//! implement it: [`MemoryStore`] keeps the table in process memory, and
//! [`FileStore`] additionally writes every mutation to a checksummed JSON
//! snapshot under a data directory guarded by an exclusive lock file.
//!
//! Both backends serialize writers behind one lock, so an upsert or partial
//! update on an id is never observed half-applied.

pub mod file;
pub mod memory;
mod table;

pub use file::{FileStore, SNAPSHOT_FORMAT_VERSION};
pub use memory::MemoryStore;

use machinist_schema::{Machine, MachineId, MachinePatch, NewMachine};
use std::path::Path;
use thiserror::Error;

/// Fsync a directory so that a preceding `rename()` is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("snapshot integrity check failed: expected {expected}, got {actual}")]
    IntegrityFailure { expected: String, actual: String },
    #[error("snapshot format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("machine id {0} is reserved")]
    ReservedId(MachineId),
    #[error("machine ids exhausted")]
    IdsExhausted,
}

/// Result of [`MachineStore::upsert_at`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upserted {
    /// No record existed at the id; one was inserted there.
    Created(Machine),
    /// The record at the id had all its fields replaced.
    Replaced(Machine),
}

impl Upserted {
    pub fn was_created(&self) -> bool {
        matches!(self, Upserted::Created(_))
    }

    pub fn machine(&self) -> &Machine {
        match self {
            Upserted::Created(m) | Upserted::Replaced(m) => m,
        }
    }

    pub fn into_machine(self) -> Machine {
        match self {
            Upserted::Created(m) | Upserted::Replaced(m) => m,
        }
    }
}

/// Durable keyed storage for machines.
///
/// Listing operations return records in insertion order. Ids handed out by
/// [`insert`](Self::insert) start at 1, only grow, and are never reused.
pub trait MachineStore: Send + Sync {
    /// Insert a new record under a fresh id. Fails with
    /// [`StoreError::IdsExhausted`] once the counter cannot advance.
    fn insert(&self, machine: NewMachine) -> Result<Machine, StoreError>;

    fn find_by_id(&self, id: MachineId) -> Result<Option<Machine>, StoreError>;

    /// All records whose name equals `name` exactly.
    fn find_by_name(&self, name: &str) -> Result<Vec<Machine>, StoreError>;

    fn find_all(&self) -> Result<Vec<Machine>, StoreError>;

    /// Insert at `id` if absent, otherwise replace every field of the record at `id`.
    /// Ids that are not [assignable](MachineId::is_assignable) are rejected.
    fn upsert_at(&self, id: MachineId, machine: NewMachine) -> Result<Upserted, StoreError>;

    /// Merge the present fields of `patch` onto the record at `id`.
    /// Returns `None` when no such record exists.
    fn update(&self, id: MachineId, patch: &MachinePatch) -> Result<Option<Machine>, StoreError>;
}
