//! Identifier types shared across generation runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of one unit of work within a run (shot number, pose index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl ItemId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for ItemId {
    fn from(value: u32) -> Self {
        ItemId(value)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic generation counter tagging one fan-out run.
///
/// Outcomes carry the run id they were dispatched under; the coordinator drops
/// any outcome whose run id is no longer current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl RunId {
    pub const INITIAL: RunId = RunId(0);

    pub fn next(self) -> Self {
        RunId(self.0 + 1)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}
