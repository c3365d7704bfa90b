//! Service layer for machinist.
//!
//! [`MachineService`] validates inbound payloads and drives a
//! [`MachineStore`](machinist_store::MachineStore). Validation always runs
//! before the store is touched, so a rejected request never causes a partial
//! write.

pub mod service;

pub use service::MachineService;

use machinist_schema::{MachineId, Violations};
use machinist_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(#[from] Violations),
    #[error("machine {0} not found")]
    NotFound(MachineId),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
