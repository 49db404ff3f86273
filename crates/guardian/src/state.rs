//! The guardian state: per-partition contexts, proposal validation and the
//! reconfigure hook.

use crate::{ConfigContext, GuardianConfig};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use warden_types::{
    AccountingError, ActionKind, Ballot, BalancerProposal, ClusterView, ConfigError,
    DroppedReplica, Gpid, NodeId, NodeMap, PartitionConfig, ProposalAction, ReplicaInfo,
    ReplicaStatus, UpdateRequest,
};

/// Errors surfaced by the guardian.
///
/// Everything here is an invariant violation: the accepted post-image or the
/// node accounting is inconsistent with the guardian's own bookkeeping.
/// The driver must treat these as fatal rather than retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardianError {
    /// An accepted configuration did not advance the ballot by exactly one.
    #[error("partition {pid}: accepted ballot {got} does not advance {prev} by one")]
    BallotNotAdvanced { pid: Gpid, prev: Ballot, got: Ballot },

    /// The accepted post-image violates partition structural invariants.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Node accounting would go inconsistent (double add, remove of an
    /// absent member).
    #[error(transparent)]
    Accounting(#[from] AccountingError),

    /// An accepted configuration references a node the view has never seen.
    #[error("partition {pid}: {node} is not a known cluster node")]
    UnknownNode { pid: Gpid, node: NodeId },
}

/// The partition guardian.
///
/// Owns the per-partition [`ConfigContext`] sidecars and the clock; borrows
/// a [`ClusterView`] per decision. See the crate docs for the control flow.
pub struct PartitionGuardian {
    pub(crate) config: GuardianConfig,
    pub(crate) contexts: HashMap<Gpid, ConfigContext>,
    pub(crate) now: Duration,
}

impl std::fmt::Debug for PartitionGuardian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionGuardian")
            .field("contexts", &self.contexts.len())
            .field("now", &self.now)
            .finish()
    }
}

impl PartitionGuardian {
    pub fn new(config: GuardianConfig) -> Self {
        Self {
            config,
            contexts: HashMap::new(),
            now: Duration::ZERO,
        }
    }

    /// Advance the guardian's clock. Drop timestamps and freshness checks
    /// are derived from this, never from wall time.
    pub fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn context(&self, pid: Gpid) -> Option<&ConfigContext> {
        self.contexts.get(&pid)
    }

    pub fn context_mut(&mut self, pid: Gpid) -> &mut ConfigContext {
        self.contexts.entry(pid).or_default()
    }

    /// Queue a planned action from a balancer for validation.
    pub fn queue_proposal(&mut self, pid: Gpid, proposal: BalancerProposal) {
        self.context_mut(pid).lb_actions.push_back(proposal);
    }

    /// Feed collected replica info for the partition named in `info`.
    pub fn collect_replica(&mut self, node: NodeId, info: ReplicaInfo) {
        let now = self.now;
        self.context_mut(info.pid).collect_serving(node, info, now);
    }

    /// Drop all bookkeeping for a partition (its app was dropped).
    pub fn forget_partition(&mut self, pid: Gpid) {
        self.contexts.remove(&pid);
    }

    /// Validate the head of the partition's balancer queue against the
    /// current view.
    ///
    /// Pops the head unconditionally: a rejected action is discarded, never
    /// re-queued. The balancer is expected to re-propose against a fresher
    /// view.
    pub fn from_proposals(&mut self, view: &ClusterView<'_>, pid: Gpid) -> Option<ProposalAction> {
        let proposal = self.contexts.get_mut(&pid)?.lb_actions.pop_front()?;
        let pc = view.config(pid)?;

        let (Some(target), Some(node)) = (proposal.target, proposal.node) else {
            debug!(%pid, ?proposal, "discarding balancer proposal with missing identity");
            return None;
        };
        if !view.is_alive(target) || !view.is_alive(node) {
            debug!(%pid, %target, %node, "discarding balancer proposal: endpoint not alive");
            return None;
        }

        let valid = match proposal.kind {
            ActionKind::AssignPrimary => pc.primary.is_none(),
            ActionKind::UpgradeToPrimary => pc.is_secondary(node),
            ActionKind::AddSecondary | ActionKind::AddSecondaryForLb => {
                !pc.is_member(node) && self.learning_healthy(pid, node)
            }
            ActionKind::Remove
            | ActionKind::DowngradeToInactive
            | ActionKind::DowngradeToSecondary => pc.is_member(node),
            // replica-side transition, never a balancer plan
            ActionKind::UpgradeToSecondary => false,
        };

        if !valid {
            debug!(%pid, kind = %proposal.kind, %node, "discarding balancer proposal: precondition lost");
            return None;
        }
        Some(ProposalAction::new(target, node, proposal.kind))
    }

    /// Whether learning on `node` looks healthy according to the last
    /// collected replica info. Absent or stale info does not block.
    fn learning_healthy(&self, pid: Gpid, node: NodeId) -> bool {
        let Some(cc) = self.contexts.get(&pid) else {
            return true;
        };
        match cc.serving(node) {
            Some(entry)
                if self.now.saturating_sub(entry.collected_at)
                    <= self.config.replica_info_freshness =>
            {
                entry.info.status == ReplicaStatus::PotentialSecondary
            }
            _ => true,
        }
    }

    /// Fold an accepted configuration change back into the bookkeeping.
    ///
    /// `previous` is the pre-image the proposal was derived from; the
    /// post-image travels in `update.config`. Updates node accounting and
    /// the dropped-replica history so the next decision sees consistent
    /// state.
    pub fn reconfig(
        &mut self,
        nodes: &mut NodeMap,
        previous: &PartitionConfig,
        update: &UpdateRequest,
    ) -> Result<(), GuardianError> {
        let pc = &update.config;
        let pid = pc.pid;

        pc.validate()?;
        if pc.ballot != previous.ballot.next() {
            return Err(GuardianError::BallotNotAdvanced {
                pid,
                prev: previous.ballot,
                got: pc.ballot,
            });
        }

        let drop_time = self.now.as_millis() as u64;
        let bound = self.config.drop_history_bound;
        let cc = self.contexts.entry(pid).or_default();

        // leavers and role changes among continuing members
        for node in previous.members() {
            let ns = nodes
                .get_mut(&node)
                .ok_or(GuardianError::UnknownNode { pid, node })?;
            if !pc.is_member(node) {
                ns.remove_partition(node, pid)?;
                let info = cc.serving(node).map(|c| c.info);
                cc.push_dropped(DroppedReplica::observed(node, drop_time, info.as_ref()), bound);
            } else if previous.is_primary(node) && !pc.is_primary(node) {
                ns.demote(node, pid)?;
            } else if !previous.is_primary(node) && pc.is_primary(node) {
                ns.promote(node, pid)?;
            }
        }

        // joiners
        for node in pc.members() {
            if previous.is_member(node) {
                continue;
            }
            let ns = nodes
                .get_mut(&node)
                .ok_or(GuardianError::UnknownNode { pid, node })?;
            ns.put_partition(node, pid, pc.is_primary(node))?;
            let served_before = cc.find_from_dropped(node).is_some();
            cc.remove_from_dropped(node);
            if !served_before {
                // the node's reported inventory no longer covers what it
                // serves; require a fresh report before trusting it
                ns.set_replicas_collected(false);
            }
        }

        cc.ddd_since = None;
        debug!(%pid, ballot = %pc.ballot, act = %update.act, "reconfigured");
        Ok(())
    }
}
