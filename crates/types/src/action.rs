//! Configuration proposals and the update request handed to the applier.
//!
//! Proposals are **commands** that describe a single membership change the
//! guardian wants a replica group to make. The applier executes them and
//! hands back the accepted post-image.

use crate::{NodeId, PartitionConfig};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of configuration change a proposal can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Seat a primary on a node that holds no replica yet.
    AssignPrimary,
    /// Promote a current secondary to primary.
    UpgradeToPrimary,
    /// Start learning a new secondary.
    AddSecondary,
    /// Same as [`ActionKind::AddSecondary`], requested by the balancer for
    /// load reasons rather than for placement correctness.
    AddSecondaryForLb,
    /// Finish learning: the potential secondary becomes a real one.
    UpgradeToSecondary,
    /// The primary steps down but stays in the group.
    DowngradeToSecondary,
    /// Drop a member to inactive, keeping its data for later recovery.
    DowngradeToInactive,
    /// Remove a member outright.
    Remove,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::AssignPrimary => "assign-primary",
            ActionKind::UpgradeToPrimary => "upgrade-to-primary",
            ActionKind::AddSecondary => "add-secondary",
            ActionKind::AddSecondaryForLb => "add-secondary-for-lb",
            ActionKind::UpgradeToSecondary => "upgrade-to-secondary",
            ActionKind::DowngradeToSecondary => "downgrade-to-secondary",
            ActionKind::DowngradeToInactive => "downgrade-to-inactive",
            ActionKind::Remove => "remove",
        };
        f.write_str(s)
    }
}

/// A fully formed configuration proposal.
///
/// `target` is the node the command is *sent* to (the primary, or the
/// subject itself for primary assignment); `node` is the subject of the
/// change. Absence of a proposal is `Option<ProposalAction>`; there is no
/// invalid variant to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalAction {
    pub target: NodeId,
    pub node: NodeId,
    pub kind: ActionKind,
}

impl ProposalAction {
    pub fn new(target: NodeId, node: NodeId, kind: ActionKind) -> Self {
        Self { target, node, kind }
    }
}

impl fmt::Display for ProposalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) -> {}", self.kind, self.node, self.target)
    }
}

/// An *unvalidated* proposal as submitted by a balancer.
///
/// Balancers run on stale views and may submit actions whose identities are
/// missing or whose preconditions no longer hold; the from-proposals
/// validator either turns one of these into a [`ProposalAction`] or discards
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancerProposal {
    pub target: Option<NodeId>,
    pub node: Option<NodeId>,
    pub kind: ActionKind,
}

impl BalancerProposal {
    pub fn new(target: NodeId, node: NodeId, kind: ActionKind) -> Self {
        Self {
            target: Some(target),
            node: Some(node),
            kind,
        }
    }
}

/// The request the driver sends to the applier: the pre-image configuration
/// plus the action to execute against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub config: PartitionConfig,
    pub act: ProposalAction,
}

impl UpdateRequest {
    pub fn new(config: PartitionConfig, act: ProposalAction) -> Self {
        Self { config, act }
    }

    /// Execute the action against the carried configuration, bumping the
    /// ballot and maintaining the drop history.
    ///
    /// This is the replica-group side of a proposal, modeled as a total
    /// match: every action kind has exactly one membership effect.
    pub fn apply(&mut self) {
        let node = self.act.node;
        let pc = &mut self.config;
        pc.ballot = pc.ballot.next();

        match self.act.kind {
            ActionKind::AssignPrimary | ActionKind::UpgradeToPrimary => {
                if let Some(old) = pc.primary {
                    if old != node {
                        // a dead primary displaced by promotion leaves the group
                        pc.push_drop(old);
                    }
                }
                pc.primary = Some(node);
                pc.secondaries.retain(|n| *n != node);
                pc.clear_drop(node);
            }
            ActionKind::AddSecondary
            | ActionKind::AddSecondaryForLb
            | ActionKind::UpgradeToSecondary => {
                if !pc.secondaries.contains(&node) {
                    pc.secondaries.push(node);
                }
                pc.clear_drop(node);
            }
            ActionKind::DowngradeToSecondary => {
                if let Some(old) = pc.primary.take() {
                    if !pc.secondaries.contains(&old) {
                        pc.secondaries.push(old);
                    }
                }
            }
            ActionKind::DowngradeToInactive | ActionKind::Remove => {
                if pc.primary == Some(node) {
                    pc.primary = None;
                } else {
                    pc.secondaries.retain(|n| *n != node);
                }
                pc.push_drop(node);
            }
        }
    }
}
