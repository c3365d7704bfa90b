//! Machine record types and validation for machinist.
//!
//! This crate defines the schema layer: the persisted [`Machine`] record and its
//! list wrapper [`Machines`], the inbound create/upsert body [`MachineDraft`], the
//! partial-update body [`MachinePatch`] (which tells a missing key apart from an
//! explicit `null` via [`Field`]), and the pure validators that turn inbound
//! payloads into a checked [`NewMachine`] or an ordered list of [`Violations`].

pub mod machine;
pub mod patch;
pub mod types;
pub mod validate;

pub use machine::{Machine, MachineDraft, Machines, NewMachine};
pub use patch::{Field, MachinePatch};
pub use types::{InvalidMachineId, MachineId};
pub use validate::{validate_draft, validate_patch, Violation, Violations, NAME_MAX_CHARS};
