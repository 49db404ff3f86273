//! End-to-end cure scenarios driven through the applier seam: lost
//! messages, dying candidates, concurrent external updates, and
//! all-replicas-down recovery.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use warden_cluster::{ClusterDriver, FilterApplier};
use warden_guardian::GuardianConfig;
use warden_types::test_utils::{dropped, test_app};
use warden_types::{
    ActionKind, Ballot, Decree, DroppedReplica, Gpid, NodeId, ProposalAction, UpdateRequest,
};

const N0: NodeId = NodeId(0);
const N1: NodeId = NodeId(1);
const N2: NodeId = NodeId(2);
const N3: NodeId = NodeId(3);

fn pid() -> Gpid {
    Gpid::new(1, 0)
}

/// A driver over one 3-replica partition and four alive nodes, with a
/// filter that panics if anything is sent before a test installs its own.
fn scenario_driver() -> ClusterDriver<FilterApplier> {
    let mut d = ClusterDriver::new(
        FilterApplier::new(|_, req| panic!("unexpected proposal: {}", req.act)),
        GuardianConfig::default(),
        4,
    );
    d.create_app(test_app(1, 1, 3).info);
    d.set_node_state(&[N0, N1, N2, N3], true);
    d
}

fn accept(_: NodeId, mut req: UpdateRequest) -> Option<UpdateRequest> {
    req.apply();
    Some(req)
}

#[test]
fn upgrade_secondary_and_message_lost() {
    let mut d = scenario_driver();
    {
        let pc = d.config_mut(pid()).unwrap();
        pc.secondaries = vec![N0, N1];
        pc.ballot = Ballot(1);
    }
    d.initialize_node_state().unwrap();

    // first pass: the proposal is dropped on the floor
    let picked = Rc::new(RefCell::new(None));
    let record = Rc::clone(&picked);
    d.applier_mut().set_filter(move |target, req| {
        assert_eq!(req.act.kind, ActionKind::UpgradeToPrimary);
        assert!(req.config.is_secondary(req.act.node));
        assert_eq!(target, req.act.node);
        *record.borrow_mut() = Some(req.act.node);
        None
    });
    let stats = d.tick().unwrap();
    assert_eq!(stats.proposals_sent, 1);
    let first = picked.borrow().unwrap();

    // second pass: the guardian re-derives the same proposal, now accepted
    let expect = Rc::clone(&picked);
    d.applier_mut().set_filter(move |target, mut req| {
        assert_eq!(req.act.kind, ActionKind::UpgradeToPrimary);
        assert_eq!(req.act.node, expect.borrow().unwrap());
        assert_eq!(target, req.act.node);
        req.apply();
        Some(req)
    });
    d.tick().unwrap();

    let pc = d.config(pid()).unwrap();
    assert_eq!(pc.primary, Some(first));
    assert_eq!(pc.ballot, Ballot(2));
}

#[test]
fn upgrade_secondary_and_candidate_dies() {
    let mut d = scenario_driver();
    {
        let pc = d.config_mut(pid()).unwrap();
        pc.secondaries = vec![N0, N1];
        pc.ballot = Ballot(1);
    }
    d.initialize_node_state().unwrap();

    let picked = Rc::new(RefCell::new(None));
    let record = Rc::clone(&picked);
    d.applier_mut().set_filter(move |target, req| {
        assert_eq!(req.act.kind, ActionKind::UpgradeToPrimary);
        assert_eq!(target, req.act.node);
        *record.borrow_mut() = Some(req.act.node);
        None
    });
    d.tick().unwrap();
    let first = picked.borrow().unwrap();

    // the candidate dies before the retry; the guardian must switch
    d.set_node_state(&[first], false);
    let expect = Rc::clone(&picked);
    d.applier_mut().set_filter(move |target, mut req| {
        assert_eq!(req.act.kind, ActionKind::UpgradeToPrimary);
        assert_ne!(req.act.node, expect.borrow().unwrap());
        assert!(req.config.is_secondary(req.act.node));
        assert_eq!(target, req.act.node);
        req.apply();
        Some(req)
    });
    d.tick().unwrap();

    let pc = d.config(pid()).unwrap();
    assert!(pc.primary.is_some());
    assert_ne!(pc.primary, Some(first));
}

#[test]
fn add_secondary_while_primary_downgrades_another() {
    let mut d = scenario_driver();
    {
        let pc = d.config_mut(pid()).unwrap();
        pc.primary = Some(N0);
        pc.secondaries = vec![N1];
        pc.ballot = Ballot(1);
    }
    d.initialize_node_state().unwrap();

    // the applier answers the add with a concurrent downgrade of N1 instead
    d.applier_mut().set_filter(|target, req| {
        assert_eq!(req.act.kind, ActionKind::AddSecondary);
        assert!(!req.config.is_member(req.act.node));
        assert_eq!(target, N0);

        let mut rewritten = UpdateRequest::new(
            req.config,
            ProposalAction::new(N0, N1, ActionKind::DowngradeToInactive),
        );
        rewritten.apply();
        Some(rewritten)
    });
    d.tick().unwrap();
    assert!(d.config(pid()).unwrap().secondaries.is_empty());

    // the guardian keeps driving toward two secondaries regardless
    d.applier_mut().set_filter(accept);
    assert!(d.run_until_healthy(8, Duration::from_millis(100)).unwrap());
    assert_eq!(d.config(pid()).unwrap().secondaries.len(), 2);
}

#[test]
fn add_secondary_and_primary_dies() {
    let mut d = scenario_driver();
    {
        let pc = d.config_mut(pid()).unwrap();
        pc.primary = Some(N0);
        pc.secondaries = vec![N1];
        pc.ballot = Ballot(1);
    }
    d.initialize_node_state().unwrap();

    d.applier_mut().set_filter(|target, req| {
        assert_eq!(req.act.kind, ActionKind::AddSecondary);
        assert_eq!(target, N0);
        None
    });
    d.tick().unwrap();

    // the primary never saw the add and is now gone
    d.set_node_state(&[N0], false);
    d.applier_mut().set_filter(|target, mut req| {
        assert_eq!(req.act.kind, ActionKind::UpgradeToPrimary);
        assert_eq!(req.act.node, N1);
        assert_eq!(target, N1);
        req.apply();
        Some(req)
    });
    d.tick().unwrap();
    assert_eq!(d.config(pid()).unwrap().primary, Some(N1));
}

#[test]
fn add_secondary_and_chosen_node_dies() {
    let mut d = scenario_driver();
    {
        let pc = d.config_mut(pid()).unwrap();
        pc.primary = Some(N0);
        pc.secondaries = vec![N1];
        pc.ballot = Ballot(1);
    }
    d.initialize_node_state().unwrap();

    let picked = Rc::new(RefCell::new(None));
    let record = Rc::clone(&picked);
    d.applier_mut().set_filter(move |target, req| {
        assert_eq!(req.act.kind, ActionKind::AddSecondary);
        assert_eq!(target, N0);
        *record.borrow_mut() = Some(req.act.node);
        None
    });
    d.tick().unwrap();
    let first = picked.borrow().unwrap();

    d.set_node_state(&[first], false);
    let expect = Rc::clone(&picked);
    d.applier_mut().set_filter(move |target, mut req| {
        assert_eq!(req.act.kind, ActionKind::AddSecondary);
        assert_ne!(req.act.node, expect.borrow().unwrap());
        assert_eq!(target, N0);
        req.apply();
        Some(req)
    });
    d.tick().unwrap();

    let pc = d.config(pid()).unwrap();
    assert_eq!(pc.secondaries.len(), 2);
    assert!(!pc.secondaries.contains(&first));
}

fn ddd_driver() -> ClusterDriver<FilterApplier> {
    let mut d = scenario_driver();
    {
        let pc = d.config_mut(pid()).unwrap();
        pc.ballot = Ballot(4);
        pc.last_drops = vec![N0, N1, N2];
    }
    d.initialize_node_state().unwrap();
    d
}

#[test]
fn recovery_refused_while_metadata_incomplete() {
    let mut d = ddd_driver();
    d.guardian_mut().context_mut(pid()).dropped = vec![
        dropped(0, DroppedReplica::INVALID_TIMESTAMP, 1, 1, 1),
        dropped(1, DroppedReplica::INVALID_TIMESTAMP, 1, 1, 1),
        dropped(2, 500, -1, -1, -1),
    ];

    let stats = d.tick().unwrap();
    assert_eq!(stats.dead, 1);
    assert_eq!(stats.proposals_sent, 0);
    assert!(d.config(pid()).unwrap().primary.is_none());

    // once node 2 reports its inventory the partition recovers
    d.nodes_mut().get_mut(&N2).unwrap().set_replicas_collected(true);
    d.applier_mut().set_filter(|target, mut req| {
        assert_eq!(req.act.kind, ActionKind::AssignPrimary);
        assert_eq!(req.act.node, N1);
        assert_eq!(target, N1);
        req.apply();
        Some(req)
    });
    let stats = d.tick().unwrap();
    assert_eq!(stats.proposals_sent, 1);
    assert_eq!(d.config(pid()).unwrap().primary, Some(N1));
}

#[test]
fn recovery_picks_highest_committed_on_ballot_tie() {
    let mut d = ddd_driver();
    d.config_mut(pid()).unwrap().last_committed_decree = Decree(2);
    for n in [N0, N1, N2] {
        d.nodes_mut().get_mut(&n).unwrap().set_replicas_collected(true);
    }
    d.guardian_mut().context_mut(pid()).dropped = vec![
        dropped(0, 12344, -1, -1, -1),
        dropped(2, DroppedReplica::INVALID_TIMESTAMP, 4, 2, 4),
        dropped(1, DroppedReplica::INVALID_TIMESTAMP, 4, 3, 4),
    ];

    d.applier_mut().set_filter(|target, mut req| {
        assert_eq!(req.act.kind, ActionKind::AssignPrimary);
        assert_eq!(req.act.node, N1);
        assert_eq!(target, N1);
        req.apply();
        Some(req)
    });
    d.tick().unwrap();

    let pc = d.config(pid()).unwrap();
    assert_eq!(pc.primary, Some(N1));
    assert_eq!(pc.ballot, Ballot(5));
}

#[test]
fn recovery_refused_on_ballot_decree_disagreement() {
    let mut d = ddd_driver();
    d.guardian_mut().context_mut(pid()).dropped = vec![
        dropped(0, DroppedReplica::INVALID_TIMESTAMP, 1, 1, 1),
        dropped(1, DroppedReplica::INVALID_TIMESTAMP, 1, 0, 1),
        dropped(2, DroppedReplica::INVALID_TIMESTAMP, 0, 1, 1),
    ];

    let stats = d.tick().unwrap();
    assert_eq!(stats.dead, 1);
    assert_eq!(stats.proposals_sent, 0);
    assert!(d.config(pid()).unwrap().primary.is_none());
}

#[test]
fn single_replica_recovers_trivially() {
    let mut d = ClusterDriver::new(
        FilterApplier::new(|target, mut req: UpdateRequest| {
            assert_eq!(req.act.kind, ActionKind::AssignPrimary);
            assert_eq!(req.act.node, N0);
            assert_eq!(target, N0);
            req.apply();
            Some(req)
        }),
        GuardianConfig::default(),
        4,
    );
    d.create_app(test_app(1, 1, 1).info);
    d.set_node_state(&[N0, N1, N2], true);
    {
        let pc = d.config_mut(pid()).unwrap();
        pc.ballot = Ballot(1);
        pc.last_drops = vec![N0];
    }
    d.initialize_node_state().unwrap();

    d.tick().unwrap();
    assert_eq!(d.config(pid()).unwrap().primary, Some(N0));
}

#[test]
fn queued_balancer_proposal_takes_precedence() {
    let mut d = scenario_driver();
    {
        let pc = d.config_mut(pid()).unwrap();
        pc.primary = Some(N0);
        pc.secondaries = vec![N1, N2];
        pc.ballot = Ballot(1);
    }
    d.initialize_node_state().unwrap();

    // a healthy partition emits nothing on its own, but a queued balancer
    // plan is validated and forwarded
    d.guardian_mut().queue_proposal(
        pid(),
        warden_types::BalancerProposal::new(N0, N2, ActionKind::DowngradeToInactive),
    );
    d.applier_mut().set_filter(|target, mut req| {
        assert_eq!(req.act.kind, ActionKind::DowngradeToInactive);
        assert_eq!(req.act.node, N2);
        assert_eq!(target, N0);
        req.apply();
        Some(req)
    });
    let stats = d.tick().unwrap();
    assert_eq!(stats.proposals_sent, 1);
    assert_eq!(d.config(pid()).unwrap().secondaries, vec![N1]);

    // the cure engine then backfills the lost secondary
    d.applier_mut().set_filter(accept);
    assert!(d.run_until_healthy(8, Duration::from_millis(100)).unwrap());
    assert_eq!(d.config(pid()).unwrap().secondaries.len(), 2);
}
