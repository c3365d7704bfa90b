use crate::table::MachineTable;
use crate::{MachineStore, StoreError, Upserted};
use machinist_schema::{Machine, MachineId, MachinePatch, NewMachine};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Process-local store. Contents are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<MachineTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MachineTable>, StoreError> {
        self.table.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MachineTable>, StoreError> {
        self.table.write().map_err(|_| StoreError::Poisoned)
    }
}

impl MachineStore for MemoryStore {
    fn insert(&self, machine: NewMachine) -> Result<Machine, StoreError> {
        self.write()?.insert(machine)
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
        self.write()?.upsert_at(id, machine)
    }

    fn update(&self, id: MachineId, patch: &MachinePatch) -> Result<Option<Machine>, StoreError> {
        Ok(self.write()?.update(id, patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use machinist_schema::{validate_draft, Field, MachineDraft};
    use std::sync::Arc;

    fn new_machine(name: &str, description: &str, throughput: i64) -> NewMachine {
        validate_draft(&MachineDraft::new(name, throughput).with_description(description)).unwrap()
    }

    #[test]
    fn insert_then_find() {
        let store = MemoryStore::new();
        let m = store.insert(new_machine("M1", "D1", 5)).unwrap();
        assert!(!m.id.is_unset());
        assert_eq!(store.find_by_id(m.id).unwrap(), Some(m.clone()));
        assert_eq!(store.find_by_name("M1").unwrap(), vec![m.clone()]);
        assert_eq!(store.find_all().unwrap(), vec![m]);
        assert!(store.find_by_id(MachineId::new(42)).unwrap().is_none());
    }

    #[test]
    fn repeated_insert_creates_distinct_rows() {
        let store = MemoryStore::new();
        let ids: Vec<_> = (0..3)
            .map(|_| store.insert(new_machine("M3", "D3", 7)).unwrap().id)
            .collect();
        assert_eq!(ids, [MachineId::new(1), MachineId::new(2), MachineId::new(3)]);
        let found = store.find_by_name("M3").unwrap();
        assert_eq!(found.len(), 3);
        assert!(found
            .iter()
            .all(|m| m.description.as_deref() == Some("D3") && m.throughput_mins == 7));
    }

    #[test]
    fn find_by_name_is_exact_and_ordered() {
        let store = MemoryStore::new();
        store.insert(new_machine("lathe", "first", 1)).unwrap();
        store.insert(new_machine("Lathe", "other", 1)).unwrap();
        store.insert(new_machine("lathe", "second", 1)).unwrap();
        let found = store.find_by_name("lathe").unwrap();
        let descs: Vec<_> = found.iter().map(|m| m.description.as_deref()).collect();
        assert_eq!(descs, [Some("first"), Some("second")]);
        assert!(store.find_by_name("lath").unwrap().is_empty());
    }

    #[test]
    fn upsert_is_idempotent() {
        let store = MemoryStore::new();
        let id = MachineId::new(99);
        let first = store.upsert_at(id, new_machine("M4", "D4", 3)).unwrap();
        assert!(first.was_created());
        for _ in 0..2 {
            let again = store.upsert_at(id, new_machine("M4", "D4", 3)).unwrap();
            assert!(!again.was_created());
            assert_eq!(again.machine(), first.machine());
        }
        assert_eq!(store.find_by_name("M4").unwrap().len(), 1);
        assert_eq!(store.find_all().unwrap().len(), 1);
    }

    #[test]
    fn upsert_replaces_all_fields() {
        let store = MemoryStore::new();
        let m = store.insert(new_machine("old", "desc", 1)).unwrap();
        let replacement = validate_draft(&MachineDraft::new("new", 2)).unwrap();
        let out = store.upsert_at(m.id, replacement).unwrap().into_machine();
        assert_eq!(out.id, m.id);
        assert_eq!(out.name, "new");
        assert_eq!(out.description, None);
        assert_eq!(out.throughput_mins, 2);
    }

    #[test]
    fn update_merges_present_fields() {
        let store = MemoryStore::new();
        let m = store.insert(new_machine("M2", "D2", 10)).unwrap();
        let patch = MachinePatch {
            description: Field::Value("new".to_owned()),
            ..MachinePatch::default()
        };
        let updated = store.update(m.id, &patch).unwrap().unwrap();
        assert_eq!(updated.id, m.id);
        assert_eq!(updated.name, "M2");
        assert_eq!(updated.throughput_mins, 10);
        assert_eq!(updated.description.as_deref(), Some("new"));
        assert_eq!(store.find_by_id(m.id).unwrap(), Some(updated));
    }

    #[test]
    fn concurrent_inserts_get_unique_ids() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let s = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        s.insert(new_machine(&format!("t{t}"), &format!("{i}"), 1))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let mut ids: Vec<_> = store.find_all().unwrap().iter().map(|m| m.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 100);
    }

    /// Every write below stores a full record `w{k}` / `d{k}` / `k`, so a reader
    /// that sees mixed fields has observed a half-applied write.
    fn versioned(k: i64) -> NewMachine {
        new_machine(&format!("w{k}"), &format!("d{k}"), k)
    }

    fn is_whole_version(m: &Machine) -> bool {
        let k = m.throughput_mins;
        m.name == format!("w{k}") && m.description.as_deref() == Some(format!("d{k}").as_str())
    }

    #[test]
    fn concurrent_upsert_and_update_on_one_id_are_never_torn() {
        let store = Arc::new(MemoryStore::new());
        let id = MachineId::new(7);
        store.upsert_at(id, versioned(1)).unwrap();

        let writers: Vec<_> = (0..4_i64)
            .map(|t| {
                let s = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50_i64 {
                        let k = t * 100 + i + 1;
                        if i % 2 == 0 {
                            s.upsert_at(id, versioned(k)).unwrap();
                        } else {
                            let patch = MachinePatch {
                                name: Field::Value(format!("w{k}")),
                                description: Field::Value(format!("d{k}")),
                                throughput_mins: Field::Value(k),
                            };
                            assert!(s.update(id, &patch).unwrap().is_some());
                        }
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let s = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let m = s.find_by_id(id).unwrap().unwrap();
                        assert_eq!(m.id, id);
                        assert!(is_whole_version(&m), "torn read: {m:?}");
                    }
                })
            })
            .collect();

        for h in writers.into_iter().chain(readers) {
            h.join().unwrap();
        }

        let all = store.find_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert!(is_whole_version(&all[0]));
    }

    #[test]
    fn failed_upsert_at_max_does_not_poison_the_store() {
        let store = MemoryStore::new();
        let err = store
            .upsert_at(MachineId::new(u64::MAX), new_machine("edge", "x", 1))
            .unwrap_err();
        assert!(matches!(err, StoreError::ReservedId(_)), "got: {err}");
        let m = store.insert(new_machine("after", "x", 1)).unwrap();
        assert_eq!(m.id, MachineId::new(1));
        assert_eq!(store.find_all().unwrap(), vec![m]);
    }
}
