use crate::types::MachineId;
use serde::{Deserialize, Serialize};

/// A persisted machine record, exactly as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub id: MachineId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub throughput_mins: i64,
}

/// List wrapper returned by the collection routes: `{"machines": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machines {
    pub machines: Vec<Machine>,
}

impl From<Vec<Machine>> for Machines {
    fn from(machines: Vec<Machine>) -> Self {
        Self { machines }
    }
}

/// Inbound body of create and upsert.
///
/// Every field is optional at this stage so that a missing field becomes a
/// violation instead of a deserialization failure. Any `id` key is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput_mins: Option<i64>,
}

impl MachineDraft {
    pub fn new(name: impl Into<String>, throughput_mins: i64) -> Self {
        Self {
            name: Some(name.into()),
            description: None,
            throughput_mins: Some(throughput_mins),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl From<&Machine> for MachineDraft {
    fn from(m: &Machine) -> Self {
        Self {
            name: Some(m.name.clone()),
            description: m.description.clone(),
            throughput_mins: Some(m.throughput_mins),
        }
    }
}

/// A full record that passed validation and is waiting for an id.
///
/// Only [`validate_draft`](crate::validate_draft) builds one, so a store that
/// accepts `NewMachine` never persists an invalid record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMachine {
    name: String,
    description: Option<String>,
    throughput_mins: i64,
}

impl NewMachine {
    pub(crate) fn new(name: String, description: Option<String>, throughput_mins: i64) -> Self {
        Self {
            name,
            description,
            throughput_mins,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn throughput_mins(&self) -> i64 {
        self.throughput_mins
    }

    pub fn into_machine(self, id: MachineId) -> Machine {
        Machine {
            id,
            name: self.name,
            description: self.description,
            throughput_mins: self.throughput_mins,
        }
    }
}
