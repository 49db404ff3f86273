//! The cure engine: given a partition whose configuration is not healthy,
//! produce the next proposal that moves it toward one live primary and
//! N−1 live secondaries.

use crate::{ConfigContext, PartitionGuardian, PartitionHealth};
use std::cmp::Reverse;
use tracing::{debug, warn};
use warden_types::{
    ActionKind, Ballot, ClusterView, Decree, DroppedReplica, Gpid, NodeId, PartitionConfig,
    ProposalAction,
};

impl PartitionGuardian {
    /// Decide the next healing step for a partition.
    ///
    /// Called when [`PartitionGuardian::from_proposals`] produced nothing.
    /// Emits at most one action; the driver re-invokes every tick, so a lost
    /// or rejected proposal is simply re-derived against the fresher view.
    pub fn cure(
        &mut self,
        view: &ClusterView<'_>,
        pid: Gpid,
    ) -> (PartitionHealth, Option<ProposalAction>) {
        let Some(pc) = view.config(pid) else {
            warn!(%pid, "cure requested for unknown partition");
            return (PartitionHealth::Dead, None);
        };

        let Some(primary) = pc.primary.filter(|p| view.is_alive(*p)) else {
            return self.on_missing_primary(view, pc);
        };

        // a dead secondary still listed must leave before anything is added
        if let Some(dead) = pc.secondaries.iter().copied().find(|n| !view.is_alive(*n)) {
            debug!(%pid, node = %dead, "downgrading dead secondary");
            return (
                PartitionHealth::Ill,
                Some(ProposalAction::new(primary, dead, ActionKind::DowngradeToInactive)),
            );
        }

        if pc.replica_count() < pc.max_replica_count {
            return self.on_missing_secondary(view, pc, primary);
        }
        if pc.replica_count() > pc.max_replica_count {
            return Self::on_redundant_secondary(view, pc, primary);
        }
        (PartitionHealth::Healthy, None)
    }

    /// No live primary: promote, bootstrap, or attempt all-down recovery.
    fn on_missing_primary(
        &mut self,
        view: &ClusterView<'_>,
        pc: &PartitionConfig,
    ) -> (PartitionHealth, Option<ProposalAction>) {
        let pid = pc.pid;
        let alive_secondaries: Vec<NodeId> = pc
            .secondaries
            .iter()
            .copied()
            .filter(|n| view.is_alive(*n))
            .collect();

        if !alive_secondaries.is_empty() {
            // promote the secondary with the best standing: highest known
            // ballot, then committed decree, then lowest node id
            let cc = self.contexts.get(&pid);
            let best = alive_secondaries
                .into_iter()
                .max_by_key(|n| {
                    let (ballot, committed) = cc
                        .and_then(|cc| cc.serving(*n))
                        .map(|c| (c.info.ballot, c.info.last_committed_decree))
                        .unwrap_or((Ballot::INVALID, Decree::INVALID));
                    (ballot, committed, Reverse(*n))
                })
                .expect("non-empty candidate list");
            debug!(%pid, node = %best, "upgrading secondary to primary");
            return (
                PartitionHealth::Ill,
                Some(ProposalAction::new(best, best, ActionKind::UpgradeToPrimary)),
            );
        }

        if pc.primary.is_none() && pc.secondaries.is_empty() && pc.last_drops.is_empty() {
            // fresh partition: seat the first primary on the least loaded node
            let candidate = view.alive_nodes().min_by_key(|n| {
                let ns = view.node(*n).expect("alive node has state");
                (ns.primary_count(), ns.partition_count(), *n)
            });
            return match candidate {
                Some(node) => {
                    debug!(%pid, %node, "assigning primary for fresh partition");
                    (
                        PartitionHealth::Ill,
                        Some(ProposalAction::new(node, node, ActionKind::AssignPrimary)),
                    )
                }
                None => (PartitionHealth::Ill, None),
            };
        }

        if pc.secondaries.is_empty() {
            return self.on_all_replicas_down(view, pc);
        }

        // members are still listed but none is alive; a downgrade has no
        // primary to target, so wait for one of them to return
        (PartitionHealth::Dead, None)
    }

    /// All replicas down: pick the safest former replica to restart from,
    /// or refuse until enough metadata has arrived.
    fn on_all_replicas_down(
        &mut self,
        view: &ClusterView<'_>,
        pc: &PartitionConfig,
    ) -> (PartitionHealth, Option<ProposalAction>) {
        let pid = pc.pid;
        let now = self.now;
        let timeout = self.config.ddd_metadata_timeout;
        let cc = self.contexts.entry(pid).or_default();
        let since = *cc.ddd_since.get_or_insert(now);

        match Self::select_recovery_primary(view, pc, cc) {
            Some(node) => {
                cc.ddd_since = None;
                debug!(%pid, %node, "recovering all-down partition");
                (
                    PartitionHealth::Ill,
                    Some(ProposalAction::new(node, node, ActionKind::AssignPrimary)),
                )
            }
            None => {
                if now.saturating_sub(since) >= timeout {
                    warn!(
                        %pid,
                        waiting_secs = now.saturating_sub(since).as_secs(),
                        "partition has no live replica and recovery metadata is still incomplete"
                    );
                } else {
                    debug!(%pid, "all replicas down, waiting for node metadata");
                }
                (PartitionHealth::Dead, None)
            }
        }
    }

    /// The safety core of all-down recovery. Returns the node to seat the
    /// primary on, or `None` to keep waiting.
    fn select_recovery_primary(
        view: &ClusterView<'_>,
        pc: &PartitionConfig,
        cc: &ConfigContext,
    ) -> Option<NodeId> {
        // single-replica groups degenerate: the sole former holder is the
        // only possible source of truth
        if pc.max_replica_count == 1 {
            let node = *pc.last_drops.last()?;
            return view.is_alive(node).then_some(node);
        }

        // every expected former member must be alive and accounted for:
        // either its drop record carries metadata, or the node has reported
        // its full inventory since restarting
        for &node in &pc.last_drops {
            if !view.is_alive(node) {
                return None;
            }
            let has_metadata = cc.find_from_dropped(node).is_some_and(DroppedReplica::has_metadata);
            let collected = view.node(node).is_some_and(|ns| ns.replicas_collected());
            if !has_metadata && !collected {
                return None;
            }
        }

        // candidates: metadata-bearing records of live nodes, history order
        let candidates: Vec<&DroppedReplica> = cc
            .dropped
            .iter()
            .filter(|d| d.has_metadata() && view.is_alive(d.node))
            .collect();

        // a single survivor's history cannot be cross-checked
        if candidates.len() < 2 {
            return None;
        }

        // a strictly larger ballot carrying a strictly smaller committed
        // decree means the histories disagree; refuse rather than guess
        for a in &candidates {
            for b in &candidates {
                if a.ballot > b.ballot && a.last_committed_decree < b.last_committed_decree {
                    return None;
                }
            }
        }

        let best = candidates
            .iter()
            .enumerate()
            .max_by_key(|(i, d)| {
                (d.ballot, d.last_committed_decree, d.last_prepared_decree, *i)
            })
            .map(|(_, d)| *d)?;

        if !best.last_committed_decree.is_valid()
            || best.last_prepared_decree < best.last_committed_decree
        {
            return None;
        }
        // the winner must cover everything the meta-plane knows is committed
        if best.last_committed_decree < pc.last_committed_decree {
            return None;
        }
        Some(best.node)
    }

    /// Primary alive but the group is under-replicated: start learning a
    /// new secondary.
    fn on_missing_secondary(
        &mut self,
        view: &ClusterView<'_>,
        pc: &PartitionConfig,
        primary: NodeId,
    ) -> (PartitionHealth, Option<ProposalAction>) {
        let pid = pc.pid;
        let cc = self.contexts.entry(pid).or_default();

        // a recently dropped node with collected metadata can re-learn from
        // its local data instead of a full copy; most recent drop first
        let from_dropped = cc
            .dropped
            .iter()
            .rev()
            .filter(|d| d.has_metadata())
            .map(|d| d.node)
            .find(|n| view.is_alive(*n) && !pc.is_member(*n));

        let node = from_dropped.or_else(|| {
            view.alive_nodes().filter(|n| !pc.is_member(*n)).min_by_key(|n| {
                let ns = view.node(*n).expect("alive node has state");
                (ns.partition_count(), ns.primary_count(), *n)
            })
        });

        match node {
            Some(node) => {
                debug!(%pid, %node, %primary, "adding secondary");
                (
                    PartitionHealth::Ill,
                    Some(ProposalAction::new(primary, node, ActionKind::AddSecondary)),
                )
            }
            None => (PartitionHealth::Ill, None),
        }
    }

    /// More live secondaries than the app wants: shed the one hosted by the
    /// most loaded node.
    fn on_redundant_secondary(
        view: &ClusterView<'_>,
        pc: &PartitionConfig,
        primary: NodeId,
    ) -> (PartitionHealth, Option<ProposalAction>) {
        let node = pc.secondaries.iter().copied().max_by_key(|n| {
            view.node(*n)
                .map(|ns| (ns.partition_count(), ns.primary_count()))
                .unwrap_or((0, 0))
        });
        match node {
            Some(node) => {
                debug!(pid = %pc.pid, %node, "removing redundant secondary");
                (
                    PartitionHealth::Ill,
                    Some(ProposalAction::new(primary, node, ActionKind::Remove)),
                )
            }
            None => (PartitionHealth::Ill, None),
        }
    }
}
