//! Identifier newtypes
//!
//! Groups and reply destinations are keyed by the numeric snowflake ids the
//! messaging platform hands out. Wrapping them keeps the two from being
//! mixed up at call sites.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a group (one voice session per group)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

/// Identity of a reply destination (a text channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for GroupId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<u64> for DestinationId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
