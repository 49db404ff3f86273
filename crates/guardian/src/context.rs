//! Per-partition bookkeeping: drop history, queued balancer proposals,
//! collected replica info.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use warden_types::{BalancerProposal, DroppedReplica, NodeId, ReplicaInfo};

/// Replica metadata reported by a node, with the instant it was collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedReplica {
    pub node: NodeId,
    pub info: ReplicaInfo,
    pub collected_at: Duration,
}

/// The history sidecar of one partition.
///
/// `dropped` remembers former members most-recent-last; it never contains a
/// current member. `lb_actions` is the FIFO of planned actions a balancer
/// has queued for validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigContext {
    pub dropped: Vec<DroppedReplica>,
    pub lb_actions: VecDeque<BalancerProposal>,
    serving: Vec<CollectedReplica>,
    /// When the partition entered the all-replicas-down state, if it is in
    /// one.
    pub ddd_since: Option<Duration>,
}

impl ConfigContext {
    pub fn find_from_dropped(&self, node: NodeId) -> Option<&DroppedReplica> {
        self.dropped.iter().find(|d| d.node == node)
    }

    /// Append a drop record, replacing any previous record for the node and
    /// keeping at most `bound` entries.
    pub fn push_dropped(&mut self, record: DroppedReplica, bound: usize) {
        self.dropped.retain(|d| d.node != record.node);
        self.dropped.push(record);
        if self.dropped.len() > bound {
            let excess = self.dropped.len() - bound;
            self.dropped.drain(..excess);
        }
    }

    pub fn remove_from_dropped(&mut self, node: NodeId) {
        self.dropped.retain(|d| d.node != node);
    }

    /// Record replica info reported by `node`, replacing older reports.
    pub fn collect_serving(&mut self, node: NodeId, info: ReplicaInfo, now: Duration) {
        self.serving.retain(|c| c.node != node);
        self.serving.push(CollectedReplica {
            node,
            info,
            collected_at: now,
        });
    }

    pub fn serving(&self, node: NodeId) -> Option<&CollectedReplica> {
        self.serving.iter().find(|c| c.node == node)
    }

    /// Replace the queued balancer proposals wholesale.
    pub fn assign_balancer_proposals(
        &mut self,
        proposals: impl IntoIterator<Item = BalancerProposal>,
    ) {
        self.lb_actions = proposals.into_iter().collect();
    }
}
