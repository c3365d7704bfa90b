//! Field constraints for inbound machine payloads.
//!
//! Both validators are pure: they never touch a store, so the rules can be
//! checked directly in tests and applied before any mutation.

use crate::machine::{MachineDraft, NewMachine};
use crate::patch::{Field, MachinePatch};
use thiserror::Error;

/// Maximum length of a machine name, in characters.
pub const NAME_MAX_CHARS: usize = 80;

/// A single failed field constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("name is required")]
    NameRequired,
    #[error("name must be less than/equal to 80 characters")]
    NameTooLong,
    #[error("throughput per minute is required")]
    ThroughputRequired,
    #[error("throughput per minute must be a positive integer")]
    ThroughputNotPositive,
    #[error("id must be a positive integer")]
    IdNotPositive,
    #[error("id must be less than 18446744073709551615")]
    IdTooLarge,
}

/// Ordered, non-empty list of violations. Displays as the messages joined by `"; "`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_messages(.0))]
pub struct Violations(Vec<Violation>);

fn join_messages(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Violations {
    pub fn single(violation: Violation) -> Self {
        Self(vec![violation])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    // Never true for a value handed out by this crate.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, violation: Violation) -> bool {
        self.0.contains(&violation)
    }

    fn from_vec(violations: Vec<Violation>) -> Result<(), Self> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Self(violations))
        }
    }
}

fn check_name(name: &str, out: &mut Vec<Violation>) {
    if name.chars().count() > NAME_MAX_CHARS {
        out.push(Violation::NameTooLong);
    }
}

fn check_throughput(throughput_mins: i64, out: &mut Vec<Violation>) {
    if throughput_mins <= 0 {
        out.push(Violation::ThroughputNotPositive);
    }
}

/// Validate a create/upsert body as a full record.
pub fn validate_draft(draft: &MachineDraft) -> Result<NewMachine, Violations> {
    let mut out = Vec::new();
    match &draft.name {
        Some(name) => check_name(name, &mut out),
        None => out.push(Violation::NameRequired),
    }
    match draft.throughput_mins {
        Some(t) => check_throughput(t, &mut out),
        None => out.push(Violation::ThroughputRequired),
    }

    match (&draft.name, draft.throughput_mins) {
        (Some(name), Some(throughput_mins)) if out.is_empty() => Ok(NewMachine::new(
            name.clone(),
            draft.description.clone(),
            throughput_mins,
        )),
        _ => Err(Violations(out)),
    }
}

/// Validate a partial-update body. Only keys present in the body are checked.
pub fn validate_patch(patch: &MachinePatch) -> Result<(), Violations> {
    let mut out = Vec::new();
    match &patch.name {
        Field::Value(name) => check_name(name, &mut out),
        Field::Null => out.push(Violation::NameRequired),
        Field::Absent => {}
    }
    match patch.throughput_mins {
        Field::Value(t) => check_throughput(t, &mut out),
        Field::Null => out.push(Violation::ThroughputRequired),
        Field::Absent => {}
    }
    Violations::from_vec(out)
}
