//! Partial-update payloads.
//!
//! A JSON merge body has three states per key: missing, `null`, or a value.
//! `Option<T>` collapses the first two, so [`Field`] keeps them apart.

use crate::machine::Machine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One key of a partial-update body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Field<T> {
    /// Key not present: leave the stored value untouched.
    #[default]
    Absent,
    /// Key present with `null`.
    Null,
    Value(T),
}

impl<T> Field<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }
}

impl<T> From<T> for Field<T> {
    fn from(v: T) -> Self {
        Field::Value(v)
    }
}

// Only reached when the key is present; `#[serde(default)]` covers Absent.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Field::Value(v),
            None => Field::Null,
        })
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Value(v) => serializer.serialize_some(v),
            Field::Absent | Field::Null => serializer.serialize_none(),
        }
    }
}

/// Inbound body of a partial update. Keys absent from the JSON stay
/// [`Field::Absent`] and leave the stored record alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachinePatch {
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub name: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub description: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub throughput_mins: Field<i64>,
}

impl MachinePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_absent() && self.description.is_absent() && self.throughput_mins.is_absent()
    }

    /// Merge the present fields onto `current`. The id never changes.
    ///
    /// Callers validate first; an explicit `null` on a required field is a
    /// violation there and is treated as "leave unchanged" here.
    pub fn apply(&self, current: &Machine) -> Machine {
        let mut merged = current.clone();
        if let Field::Value(name) = &self.name {
            merged.name.clone_from(name);
        }
        match &self.description {
            Field::Value(d) => merged.description = Some(d.clone()),
            Field::Null => merged.description = None,
            Field::Absent => {}
        }
        if let Field::Value(t) = self.throughput_mins {
            merged.throughput_mins = t;
        }
        merged
    }
}
