//! Partition configuration and replica metadata.

use crate::{Ballot, Decree, Gpid, NodeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors detected while validating a partition configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The primary also appears in the secondary list.
    #[error("partition {pid}: primary {node} is also listed as a secondary")]
    PrimaryIsSecondary { pid: Gpid, node: NodeId },

    /// A node appears more than once in the secondary list.
    #[error("partition {pid}: {node} appears twice in the secondary list")]
    DuplicateSecondary { pid: Gpid, node: NodeId },
}

/// The replicated-group configuration of one partition, as the meta-plane
/// knows it.
///
/// `last_drops` remembers the identities of former members, most recent
/// last; it is bounded by the app's replica count and is the anchor for
/// all-replicas-down recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionConfig {
    pub pid: Gpid,
    pub ballot: Ballot,
    /// Target replica count for this partition (primary included), copied
    /// from the app at creation.
    pub max_replica_count: usize,
    pub primary: Option<NodeId>,
    pub secondaries: Vec<NodeId>,
    pub last_drops: Vec<NodeId>,
    pub last_committed_decree: Decree,
}

impl PartitionConfig {
    /// A fresh configuration for a newly created partition.
    pub fn new(pid: Gpid, max_replica_count: usize) -> Self {
        Self {
            pid,
            ballot: Ballot(0),
            max_replica_count,
            primary: None,
            secondaries: Vec::new(),
            last_drops: Vec::new(),
            last_committed_decree: Decree(0),
        }
    }

    pub fn is_primary(&self, node: NodeId) -> bool {
        self.primary == Some(node)
    }

    pub fn is_secondary(&self, node: NodeId) -> bool {
        self.secondaries.contains(&node)
    }

    /// Whether `node` currently holds any role in the group.
    pub fn is_member(&self, node: NodeId) -> bool {
        self.is_primary(node) || self.is_secondary(node)
    }

    /// Number of replicas currently configured (primary included).
    pub fn replica_count(&self) -> usize {
        self.secondaries.len() + usize::from(self.primary.is_some())
    }

    /// All current members, primary first.
    pub fn members(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.primary.into_iter().chain(self.secondaries.iter().copied())
    }

    /// Record that `node` left the group, keeping at most
    /// `max_replica_count` former identities.
    pub fn push_drop(&mut self, node: NodeId) {
        self.last_drops.retain(|n| *n != node);
        self.last_drops.push(node);
        if self.last_drops.len() > self.max_replica_count {
            let excess = self.last_drops.len() - self.max_replica_count;
            self.last_drops.drain(..excess);
        }
    }

    /// Forget a former member that rejoined the group.
    pub fn clear_drop(&mut self, node: NodeId) {
        self.last_drops.retain(|n| *n != node);
    }

    /// Check the structural invariants: the primary is not a secondary and
    /// no node appears twice.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(primary) = self.primary {
            if self.secondaries.contains(&primary) {
                return Err(ConfigError::PrimaryIsSecondary {
                    pid: self.pid,
                    node: primary,
                });
            }
        }
        for (i, node) in self.secondaries.iter().enumerate() {
            if self.secondaries[i + 1..].contains(node) {
                return Err(ConfigError::DuplicateSecondary {
                    pid: self.pid,
                    node: *node,
                });
            }
        }
        Ok(())
    }
}

/// Status of a replica as reported by the node hosting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplicaStatus {
    Inactive,
    Error,
    Primary,
    Secondary,
    /// Learning state: the replica is catching up before joining as a
    /// secondary.
    PotentialSecondary,
}

/// Per-replica metadata reported by a node for one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaInfo {
    pub pid: Gpid,
    pub status: ReplicaStatus,
    pub ballot: Ballot,
    pub last_committed_decree: Decree,
    pub last_prepared_decree: Decree,
    pub last_durable_decree: Decree,
}

/// Memory of a node that once held a replica of a partition.
///
/// `time == INVALID_TIMESTAMP` means the drop instant is unknown (the entry
/// was reconstructed from a node report rather than observed live).
/// `ballot == Ballot::INVALID` means the node has not reported this
/// replica's metadata since its last restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedReplica {
    pub node: NodeId,
    pub time: u64,
    pub ballot: Ballot,
    pub last_committed_decree: Decree,
    pub last_prepared_decree: Decree,
}

impl DroppedReplica {
    /// Sentinel for "drop instant unknown".
    pub const INVALID_TIMESTAMP: u64 = u64::MAX;

    /// An entry observed live by the meta-plane, carrying the last known
    /// replica metadata.
    pub fn observed(node: NodeId, time: u64, info: Option<&ReplicaInfo>) -> Self {
        match info {
            Some(info) => Self {
                node,
                time,
                ballot: info.ballot,
                last_committed_decree: info.last_committed_decree,
                last_prepared_decree: info.last_prepared_decree,
            },
            None => Self {
                node,
                time,
                ballot: Ballot::INVALID,
                last_committed_decree: Decree::INVALID,
                last_prepared_decree: Decree::INVALID,
            },
        }
    }

    /// Whether the node reported real metadata for this replica.
    pub fn has_metadata(&self) -> bool {
        self.ballot.is_valid()
    }
}
