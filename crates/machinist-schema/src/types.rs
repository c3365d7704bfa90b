//! Identifier newtype for persisted machines.
//!
//! Serializes as a plain JSON integer so the wire format stays `{"id": 7, ...}`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Store-assigned identity of a machine. Zero means "not yet created".
///
/// `u64::MAX` is never stored: the id counter has to be able to move past
/// every stored id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineId(u64);

impl MachineId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// The id following this one, used by stores to hand out fresh ids.
    /// `None` at `u64::MAX`.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    pub const fn is_unset(self) -> bool {
        self.0 == 0
    }

    /// Whether a store may hold a record under this id.
    pub const fn is_assignable(self) -> bool {
        self.0 != 0 && self.0 != u64::MAX
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MachineId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid machine id: '{0}'")]
pub struct InvalidMachineId(String);

impl FromStr for MachineId {
    type Err = InvalidMachineId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidMachineId(s.to_owned()));
        }
        s.parse::<u64>()
            .map(Self)
            .map_err(|_| InvalidMachineId(s.to_owned()))
    }
}
