//! Seeded churn simulation.
//!
//! Builds a cluster with one app, kills and revives nodes at random for a
//! while, then lets the guardian heal everything. Given the same seed the
//! run is identical every time, which is what makes failures replayable.

use crate::{ClusterDriver, LoopbackApplier};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Duration;
use tracing::{debug, info};
use warden_guardian::{GuardianConfig, GuardianError};
use warden_types::{AppId, AppInfo, NodeId, ReplicaInfo, ReplicaStatus};

/// Configuration for a churn run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub seed: u64,
    pub node_count: u32,
    pub partition_count: usize,
    pub max_replica_count: usize,
    /// Ticks with random node churn before the heal phase.
    pub churn_ticks: usize,
    /// Maximum ticks the heal phase may take.
    pub heal_ticks: usize,
    /// Per-tick probability of killing an alive node.
    pub kill_probability: f64,
    /// Per-tick probability of reviving a dead node.
    pub revive_probability: f64,
    pub tick_interval: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            node_count: 8,
            partition_count: 64,
            max_replica_count: 3,
            churn_ticks: 200,
            heal_ticks: 200,
            kill_probability: 0.05,
            revive_probability: 0.2,
            tick_interval: Duration::from_millis(100),
        }
    }
}

/// Summary of a churn run.
#[derive(Debug, Clone, Default)]
pub struct SimReport {
    pub ticks_run: usize,
    pub proposals_sent: usize,
    pub applied: usize,
    pub kills: usize,
    pub revives: usize,
    pub converged: bool,
}

/// The churn simulator: a [`ClusterDriver`] plus a seeded RNG.
pub struct ChurnSim {
    driver: ClusterDriver<LoopbackApplier>,
    rng: ChaCha8Rng,
    config: SimConfig,
}

impl ChurnSim {
    pub fn new(config: SimConfig) -> Self {
        let mut driver = ClusterDriver::new(
            LoopbackApplier::new(),
            GuardianConfig::default(),
            (config.node_count as u64).max(1),
        );
        let nodes: Vec<NodeId> = (0..config.node_count).map(NodeId).collect();
        driver.set_node_state(&nodes, true);
        driver.create_app(AppInfo {
            app_id: AppId(1),
            app_name: "churn".into(),
            max_replica_count: config.max_replica_count,
            partition_count: config.partition_count,
        });

        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            driver,
            rng,
            config,
        }
    }

    /// Run churn, then heal. Returns the run summary.
    pub fn run(&mut self) -> Result<SimReport, GuardianError> {
        let mut report = SimReport::default();

        for _ in 0..self.config.churn_ticks {
            self.churn(&mut report);
            self.report_replica_state();
            let stats = self.driver.tick()?;
            report.ticks_run += 1;
            report.proposals_sent += stats.proposals_sent;
            report.applied += stats.applied;
            self.driver.advance(self.config.tick_interval);
        }

        // heal phase: everything comes back and reports its inventory
        let all: Vec<NodeId> = (0..self.config.node_count).map(NodeId).collect();
        report.revives += self
            .driver
            .nodes()
            .values()
            .filter(|ns| !ns.is_alive())
            .count();
        self.driver.set_node_state(&all, true);
        self.mark_all_collected();

        for _ in 0..self.config.heal_ticks {
            self.report_replica_state();
            let stats = self.driver.tick()?;
            report.ticks_run += 1;
            report.proposals_sent += stats.proposals_sent;
            report.applied += stats.applied;
            self.driver.advance(self.config.tick_interval);
            if stats.all_healthy() {
                report.converged = true;
                break;
            }
        }

        info!(
            ticks = report.ticks_run,
            proposals = report.proposals_sent,
            applied = report.applied,
            kills = report.kills,
            converged = report.converged,
            "churn run finished"
        );
        Ok(report)
    }

    pub fn driver(&self) -> &ClusterDriver<LoopbackApplier> {
        &self.driver
    }

    /// Randomly kill and revive nodes, never dropping below a replica
    /// group's worth of alive nodes.
    fn churn(&mut self, report: &mut SimReport) {
        let alive: Vec<NodeId> = self
            .driver
            .nodes()
            .iter()
            .filter(|(_, ns)| ns.is_alive())
            .map(|(id, _)| *id)
            .collect();
        let dead: Vec<NodeId> = self
            .driver
            .nodes()
            .iter()
            .filter(|(_, ns)| !ns.is_alive())
            .map(|(id, _)| *id)
            .collect();

        if alive.len() > self.config.max_replica_count
            && self.rng.gen_bool(self.config.kill_probability)
        {
            let victim = alive[self.rng.gen_range(0..alive.len())];
            debug!(node = %victim, "churn: killing node");
            self.driver.set_node_state(&[victim], false);
            report.kills += 1;
        }
        if !dead.is_empty() && self.rng.gen_bool(self.config.revive_probability) {
            let node = dead[self.rng.gen_range(0..dead.len())];
            debug!(node = %node, "churn: reviving node");
            self.driver.set_node_state(&[node], true);
            // a revived node reports its full inventory promptly
            if let Some(ns) = self.driver.nodes_mut().get_mut(&node) {
                ns.set_replicas_collected(true);
            }
            report.revives += 1;
        }
    }

    fn mark_all_collected(&mut self) {
        for ns in self.driver.nodes_mut().values_mut() {
            ns.set_replicas_collected(true);
        }
    }

    /// Replica servers periodically report per-partition state; feed the
    /// collector so drop records carry metadata when members go away.
    fn report_replica_state(&mut self) {
        let mut reports = Vec::new();
        for app in self.driver.apps().values() {
            for pc in &app.partitions {
                for node in pc.members() {
                    let status = if pc.is_primary(node) {
                        ReplicaStatus::Primary
                    } else {
                        ReplicaStatus::Secondary
                    };
                    reports.push((
                        node,
                        ReplicaInfo {
                            pid: pc.pid,
                            status,
                            ballot: pc.ballot,
                            last_committed_decree: pc.last_committed_decree,
                            last_prepared_decree: pc.last_committed_decree,
                            last_durable_decree: pc.last_committed_decree,
                        },
                    ));
                }
            }
        }
        for (node, info) in reports {
            self.driver.guardian_mut().collect_replica(node, info);
        }
    }
}
