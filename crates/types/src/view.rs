//! Read-only cluster view handed to every guardian decision.

use crate::{AppMap, Gpid, NodeId, NodeMap, NodeState, PartitionConfig};

/// Compute which shard serializes work for a partition.
///
/// The driver keys per-partition work by this stable hash so no two ticks
/// for the same partition can interleave.
pub fn shard_for_partition(pid: Gpid, num_shards: u64) -> u64 {
    let mut bytes = [0u8; 8];
    bytes[..4].copy_from_slice(&pid.app_id.0.to_le_bytes());
    bytes[4..].copy_from_slice(&pid.partition.0.to_le_bytes());
    let hash = blake3::hash(&bytes);
    let h = u64::from_le_bytes(hash.as_bytes()[..8].try_into().expect("hash is 32 bytes"));
    h % num_shards
}

/// A borrowed, read-only snapshot of the cluster: the app catalog plus node
/// liveness and accounting.
///
/// The guardian borrows one of these for a single call; the driver owns
/// everything. Nothing here is mutated through the view.
#[derive(Debug, Clone, Copy)]
pub struct ClusterView<'a> {
    pub apps: &'a AppMap,
    pub nodes: &'a NodeMap,
}

impl<'a> ClusterView<'a> {
    pub fn new(apps: &'a AppMap, nodes: &'a NodeMap) -> Self {
        Self { apps, nodes }
    }

    /// Look up a partition configuration by gpid.
    pub fn config(&self, pid: Gpid) -> Option<&'a PartitionConfig> {
        self.apps.get(&pid.app_id)?.partition(pid)
    }

    pub fn node(&self, node: NodeId) -> Option<&'a NodeState> {
        self.nodes.get(&node)
    }

    /// Liveness oracle. Unknown nodes are dead.
    pub fn is_alive(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(|ns| ns.is_alive())
    }

    /// Alive nodes in deterministic (id) order.
    pub fn alive_nodes(&self) -> impl Iterator<Item = NodeId> + 'a {
        self.nodes
            .iter()
            .filter(|(_, ns)| ns.is_alive())
            .map(|(id, _)| *id)
    }
}
