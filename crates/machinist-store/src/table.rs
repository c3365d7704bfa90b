use crate::{StoreError, Upserted};
use machinist_schema::{validate_draft, Machine, MachineDraft, MachineId, MachinePatch, NewMachine};
use std::collections::HashMap;

/// Rows in insertion order plus an id index. Shared by both backends;
/// callers hold the surrounding lock.
#[derive(Debug, Clone)]
pub(crate) struct MachineTable {
    rows: Vec<Machine>,
    index: HashMap<MachineId, usize>,
    next_id: MachineId,
}

impl Default for MachineTable {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
            next_id: MachineId::new(1),
        }
    }
}

impl MachineTable {
    /// Rebuild a table from persisted parts, rejecting duplicate or reserved ids
    /// and records that would not pass validation.
    pub(crate) fn from_parts(rows: Vec<Machine>, next_id: MachineId) -> Result<Self, StoreError> {
        let mut index = HashMap::with_capacity(rows.len());
        let mut next_id = next_id.max(MachineId::new(1));
        for (pos, m) in rows.iter().enumerate() {
            if !m.id.is_assignable() {
                return Err(StoreError::Corrupt(format!(
                    "record at position {pos} has reserved id {}",
                    m.id
                )));
            }
            if index.insert(m.id, pos).is_some() {
                return Err(StoreError::Corrupt(format!("duplicate machine id {}", m.id)));
            }
            if let Err(violations) = validate_draft(&MachineDraft::from(m)) {
                return Err(StoreError::Corrupt(format!("machine {}: {violations}", m.id)));
            }
            if m.id >= next_id {
                next_id = counter_after(m.id)?;
            }
        }
        Ok(Self {
            rows,
            index,
            next_id,
        })
    }

    pub(crate) fn rows(&self) -> &[Machine] {
        &self.rows
    }

    pub(crate) fn next_id(&self) -> MachineId {
        self.next_id
    }

    pub(crate) fn insert(&mut self, machine: NewMachine) -> Result<Machine, StoreError> {
        let id = self.next_id;
        if !id.is_assignable() {
            return Err(StoreError::IdsExhausted);
        }
        self.next_id = counter_after(id)?;
        Ok(self.push(machine.into_machine(id)))
    }

    fn push(&mut self, machine: Machine) -> Machine {
        self.index.insert(machine.id, self.rows.len());
        self.rows.push(machine.clone());
        machine
    }

    pub(crate) fn get(&self, id: MachineId) -> Option<&Machine> {
        self.index.get(&id).map(|&pos| &self.rows[pos])
    }

    pub(crate) fn by_name(&self, name: &str) -> Vec<Machine> {
        self.rows.iter().filter(|m| m.name == name).cloned().collect()
    }

    pub(crate) fn upsert_at(
        &mut self,
        id: MachineId,
        machine: NewMachine,
    ) -> Result<Upserted, StoreError> {
        if !id.is_assignable() {
            return Err(StoreError::ReservedId(id));
        }
        let record = machine.into_machine(id);
        if let Some(&pos) = self.index.get(&id) {
            self.rows[pos] = record.clone();
            return Ok(Upserted::Replaced(record));
        }
        if id >= self.next_id {
            self.next_id = counter_after(id)?;
        }
        Ok(Upserted::Created(self.push(record)))
    }

    pub(crate) fn update(&mut self, id: MachineId, patch: &MachinePatch) -> Option<Machine> {
        let pos = *self.index.get(&id)?;
        let merged = patch.apply(&self.rows[pos]);
        self.rows[pos] = merged.clone();
        Some(merged)
    }
}

fn counter_after(id: MachineId) -> Result<MachineId, StoreError> {
    id.next().ok_or(StoreError::IdsExhausted)
}
