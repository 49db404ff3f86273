//! Identifier newtypes used across the meta-plane.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an application (a table / keyspace).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct AppId(pub u32);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a partition within an app.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct PartitionIndex(pub u32);

impl fmt::Display for PartitionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Global partition id: `(app, partition index)`.
///
/// This is the key every per-partition structure is addressed by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Gpid {
    pub app_id: AppId,
    pub partition: PartitionIndex,
}

impl Gpid {
    pub fn new(app_id: u32, partition: u32) -> Self {
        Self {
            app_id: AppId(app_id),
            partition: PartitionIndex(partition),
        }
    }
}

impl fmt::Display for Gpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app_id, self.partition)
    }
}

/// Identifier of a cluster node (a replica server).
///
/// A networked deployment would carry a resolved address here; the meta-plane
/// only ever needs identity, ordering and equality.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Configuration epoch of a replica group.
///
/// Every accepted configuration change advances the ballot by exactly one.
/// `Ballot::INVALID` (`-1`) marks metadata that has not been collected.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Ballot(pub i64);

impl Ballot {
    pub const INVALID: Ballot = Ballot(-1);

    /// Whether this ballot carries a real value.
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }

    /// The ballot after one accepted configuration change.
    pub fn next(self) -> Ballot {
        Ballot(self.0 + 1)
    }
}

impl fmt::Display for Ballot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Log position within a replica group. `Decree::INVALID` (`-1`) means unknown.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Decree(pub i64);

impl Decree {
    pub const INVALID: Decree = Decree(-1);

    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for Decree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
