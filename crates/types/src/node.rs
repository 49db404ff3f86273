//! Per-node liveness and replica accounting.

use crate::{Gpid, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors from node accounting updates.
///
/// These indicate a bookkeeping bug in the caller, not a recoverable
/// condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountingError {
    #[error("{node} is not serving partition {pid}, cannot remove")]
    NotServing { node: NodeId, pid: Gpid },

    #[error("{node} already serves partition {pid}, cannot add twice")]
    AlreadyServing { node: NodeId, pid: Gpid },

    #[error("{node} is not primary of partition {pid}")]
    NotPrimary { node: NodeId, pid: Gpid },
}

/// Liveness and replica accounting for one cluster node.
///
/// Membership is tracked as sets of partition ids rather than bare counters
/// so a double-add or a remove of an absent member surfaces as an error
/// instead of silently corrupting the counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeState {
    alive: bool,
    /// Set once the node has reported its full replica inventory since its
    /// last restart. Precondition for trusting its history in
    /// all-replicas-down recovery.
    replicas_collected: bool,
    /// Partitions this node is primary for.
    primaries: BTreeSet<Gpid>,
    /// All partitions this node serves (any role).
    partitions: BTreeSet<Gpid>,
}

impl NodeState {
    pub fn new(alive: bool) -> Self {
        Self {
            alive,
            ..Default::default()
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn set_alive(&mut self, alive: bool) {
        self.alive = alive;
    }

    pub fn replicas_collected(&self) -> bool {
        self.replicas_collected
    }

    pub fn set_replicas_collected(&mut self, collected: bool) {
        self.replicas_collected = collected;
    }

    pub fn primary_count(&self) -> usize {
        self.primaries.len()
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn serves(&self, pid: Gpid) -> bool {
        self.partitions.contains(&pid)
    }

    /// Record that this node joined `pid`, optionally as primary.
    pub fn put_partition(&mut self, node: NodeId, pid: Gpid, primary: bool) -> Result<(), AccountingError> {
        if !self.partitions.insert(pid) {
            return Err(AccountingError::AlreadyServing { node, pid });
        }
        if primary {
            self.primaries.insert(pid);
        }
        Ok(())
    }

    /// Record that this node left `pid` entirely.
    pub fn remove_partition(&mut self, node: NodeId, pid: Gpid) -> Result<(), AccountingError> {
        if !self.partitions.remove(&pid) {
            return Err(AccountingError::NotServing { node, pid });
        }
        self.primaries.remove(&pid);
        Ok(())
    }

    /// Promote this node to primary of a partition it already serves.
    pub fn promote(&mut self, node: NodeId, pid: Gpid) -> Result<(), AccountingError> {
        if !self.partitions.contains(&pid) {
            return Err(AccountingError::NotServing { node, pid });
        }
        self.primaries.insert(pid);
        Ok(())
    }

    /// Demote this node from primary while it keeps serving the partition.
    pub fn demote(&mut self, node: NodeId, pid: Gpid) -> Result<(), AccountingError> {
        if !self.primaries.remove(&pid) {
            return Err(AccountingError::NotPrimary { node, pid });
        }
        Ok(())
    }

    /// Forget all partition accounting, keeping liveness and the collected
    /// flag. Used when the driver rebuilds accounting from the catalog.
    pub fn clear_partitions(&mut self) {
        self.primaries.clear();
        self.partitions.clear();
    }
}

/// All known nodes, keyed by id. `BTreeMap` keeps iteration deterministic.
pub type NodeMap = BTreeMap<NodeId, NodeState>;
