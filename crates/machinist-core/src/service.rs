use crate::ServiceError;
use machinist_schema::{
    validate_draft, validate_patch, Machine, MachineDraft, MachineId, MachinePatch, Violation,
    Violations,
};
use machinist_store::{MachineStore, Upserted};
use std::sync::Arc;
use tracing::{debug, info};

/// Create, query, upsert, and partially update machines.
///
/// `create` always inserts a new row, even for a payload identical to an
/// existing one. `upsert` targets a caller-chosen id and is idempotent:
/// repeating it with the same payload leaves exactly one record there.
#[derive(Clone)]
pub struct MachineService {
    store: Arc<dyn MachineStore>,
}

impl MachineService {
    pub fn new(store: Arc<dyn MachineStore>) -> Self {
        Self { store }
    }

    pub fn create(&self, draft: &MachineDraft) -> Result<Machine, ServiceError> {
        let new = validate_draft(draft)?;
        let machine = self.store.insert(new)?;
        info!("created machine {} ({})", machine.id, machine.name);
        Ok(machine)
    }

    pub fn get_by_id(&self, id: MachineId) -> Result<Machine, ServiceError> {
        debug!("get machine {id}");
        self.store
            .find_by_id(id)?
            .ok_or(ServiceError::NotFound(id))
    }

    pub fn get_by_name(&self, name: &str) -> Result<Vec<Machine>, ServiceError> {
        let found = self.store.find_by_name(name)?;
        debug!("name '{name}' matched {} machines", found.len());
        Ok(found)
    }

    pub fn get_all(&self) -> Result<Vec<Machine>, ServiceError> {
        let all = self.store.find_all()?;
        debug!("listing {} machines", all.len());
        Ok(all)
    }

    pub fn upsert(&self, id: MachineId, draft: &MachineDraft) -> Result<Upserted, ServiceError> {
        if id.is_unset() {
            return Err(Violations::single(Violation::IdNotPositive).into());
        }
        if !id.is_assignable() {
            return Err(Violations::single(Violation::IdTooLarge).into());
        }
        let new = validate_draft(draft)?;
        let outcome = self.store.upsert_at(id, new)?;
        if outcome.was_created() {
            info!("upsert created machine {id}");
        } else {
            info!("upsert replaced machine {id}");
        }
        Ok(outcome)
    }

    pub fn update(&self, id: MachineId, patch: &MachinePatch) -> Result<Machine, ServiceError> {
        validate_patch(patch)?;
        let machine = self
            .store
            .update(id, patch)?
            .ok_or(ServiceError::NotFound(id))?;
        info!("updated machine {id}");
        Ok(machine)
    }
}
