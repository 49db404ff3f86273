//! Foundation types for the warden meta-plane.
//!
//! This crate provides the data model shared by the guardian and the
//! cluster driver:
//!
//! - **Identifiers**: [`AppId`], [`Gpid`], [`NodeId`], [`Ballot`], [`Decree`]
//! - **Partition model**: [`PartitionConfig`], [`DroppedReplica`], [`ReplicaInfo`]
//! - **Node accounting**: [`NodeState`], [`NodeMap`]
//! - **Proposals**: [`ProposalAction`], [`BalancerProposal`], [`UpdateRequest`]
//! - **Views**: [`ClusterView`], [`shard_for_partition`]
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not
//! depend on any other workspace crates, making it the foundation layer.
//! Types here are passive data; the decision logic lives in the guardian
//! crate and all I/O in the driver.

mod action;
mod app;
mod ids;
mod node;
mod partition;
mod view;

pub use action::{ActionKind, BalancerProposal, ProposalAction, UpdateRequest};
pub use app::{AppInfo, AppMap, AppState};
pub use ids::{AppId, Ballot, Decree, Gpid, NodeId, PartitionIndex};
pub use node::{AccountingError, NodeMap, NodeState};
pub use partition::{ConfigError, DroppedReplica, PartitionConfig, ReplicaInfo, ReplicaStatus};
pub use view::{shard_for_partition, ClusterView};

/// Test utilities.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;

    /// Create an app with `partition_count` fresh partitions.
    pub fn test_app(app_id: u32, partition_count: usize, max_replica_count: usize) -> AppState {
        AppState::create(AppInfo {
            app_id: AppId(app_id),
            app_name: format!("test-app-{app_id}"),
            max_replica_count,
            partition_count,
        })
    }

    /// An app map holding a single test app.
    pub fn test_apps(app: AppState) -> AppMap {
        let mut apps = AppMap::new();
        apps.insert(app.info.app_id, app);
        apps
    }

    /// A node map with ids `0..count`, all in the given liveness state.
    pub fn test_nodes(count: u32, alive: bool) -> NodeMap {
        (0..count).map(|i| (NodeId(i), NodeState::new(alive))).collect()
    }

    /// Replica metadata with `last_durable_decree` pinned to the committed
    /// decree, which is all the guardian ever inspects.
    pub fn test_replica_info(
        pid: Gpid,
        status: ReplicaStatus,
        ballot: i64,
        committed: i64,
        prepared: i64,
    ) -> ReplicaInfo {
        ReplicaInfo {
            pid,
            status,
            ballot: Ballot(ballot),
            last_committed_decree: Decree(committed),
            last_prepared_decree: Decree(prepared),
            last_durable_decree: Decree(committed),
        }
    }

    /// A dropped-record literal: `(node, time, ballot, committed, prepared)`.
    pub fn dropped(node: u32, time: u64, ballot: i64, committed: i64, prepared: i64) -> DroppedReplica {
        DroppedReplica {
            node: NodeId(node),
            time,
            ballot: Ballot(ballot),
            last_committed_decree: Decree(committed),
            last_prepared_decree: Decree(prepared),
        }
    }
}
