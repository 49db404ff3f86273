//! Partition guardian: the control-plane decision engine of a replicated
//! storage cluster.
//!
//! For each partition the guardian inspects the observed replica-group
//! configuration and node liveness, and emits configuration proposals that
//! heal the group toward one primary and N−1 secondaries, all alive.
//!
//! # Architecture
//!
//! The guardian is a pure decision function over a borrowed snapshot:
//!
//! ```text
//! ClusterView → from_proposals / cure → Option<ProposalAction>
//! ```
//!
//! It is:
//! - **Synchronous**: no async, no background threads
//! - **Deterministic**: same view and history produce the same action
//! - **Idempotent**: re-emitting an unacknowledged action is safe; the
//!   periodic tick is the only retry mechanism
//!
//! All I/O belongs to the driver, which executes proposals through an
//! applier and folds accepted post-images back via [`PartitionGuardian::reconfig`].
//! The only state the guardian owns is the per-partition [`ConfigContext`]:
//! drop history, the balancer proposal queue, and collected replica info.

mod config;
mod context;
mod cure;
mod state;

pub use config::GuardianConfig;
pub use context::{CollectedReplica, ConfigContext};
pub use state::{GuardianError, PartitionGuardian};

/// Health of a partition as seen by the cure engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionHealth {
    /// Fully replicated, every member alive.
    Healthy,
    /// Degraded but recoverable; the guardian is driving it back to health.
    Ill,
    /// No live replica and recovery is currently refused; waiting for node
    /// metadata or operator intervention.
    Dead,
}
