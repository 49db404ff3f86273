//! The cluster driver: owns the catalog, the node map and the guardian, and
//! advances partition decisions tick by tick.

use crate::Applier;
use std::time::Duration;
use tracing::{debug, info, warn};
use warden_guardian::{GuardianConfig, GuardianError, PartitionGuardian, PartitionHealth};
use warden_types::{
    shard_for_partition, AppId, AppInfo, AppMap, AppState, ClusterView, Gpid, NodeId, NodeMap,
    NodeState, PartitionConfig, UpdateRequest,
};

/// Outcome of one driver tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub healthy: usize,
    pub ill: usize,
    pub dead: usize,
    pub proposals_sent: usize,
    pub applied: usize,
}

impl TickStats {
    /// Whether every partition was healthy this tick.
    pub fn all_healthy(&self) -> bool {
        self.ill == 0 && self.dead == 0
    }
}

/// Owns cluster state and drives the guardian.
///
/// One logical worker advances all partitions: the walk is grouped by
/// [`shard_for_partition`], so work for one partition is never interleaved
/// and the serialization key is stable across runs. Liveness flips and
/// collected-flag updates made between ticks become visible atomically at
/// the next tick boundary.
pub struct ClusterDriver<A: Applier> {
    apps: AppMap,
    nodes: NodeMap,
    guardian: PartitionGuardian,
    applier: A,
    num_shards: u64,
    now: Duration,
}

impl<A: Applier> std::fmt::Debug for ClusterDriver<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterDriver")
            .field("apps", &self.apps.len())
            .field("nodes", &self.nodes.len())
            .field("num_shards", &self.num_shards)
            .field("now", &self.now)
            .finish()
    }
}

impl<A: Applier> ClusterDriver<A> {
    pub fn new(applier: A, guardian_config: GuardianConfig, num_shards: u64) -> Self {
        Self {
            apps: AppMap::new(),
            nodes: NodeMap::new(),
            guardian: PartitionGuardian::new(guardian_config),
            applier,
            num_shards: num_shards.max(1),
            now: Duration::ZERO,
        }
    }

    pub fn create_app(&mut self, info: AppInfo) {
        info!(app_id = %info.app_id, name = %info.app_name, partitions = info.partition_count, "creating app");
        self.apps.insert(info.app_id, AppState::create(info));
    }

    pub fn drop_app(&mut self, app_id: AppId) {
        if let Some(app) = self.apps.remove(&app_id) {
            info!(%app_id, "dropping app");
            for pc in &app.partitions {
                self.guardian.forget_partition(pc.pid);
            }
        }
    }

    /// Flip liveness for a set of nodes, registering unknown ones.
    pub fn set_node_state(&mut self, nodes: &[NodeId], alive: bool) {
        for &node in nodes {
            self.nodes
                .entry(node)
                .or_insert_with(|| NodeState::new(alive))
                .set_alive(alive);
        }
    }

    /// Rebuild node accounting from the current partition configurations.
    pub fn initialize_node_state(&mut self) -> Result<(), GuardianError> {
        for ns in self.nodes.values_mut() {
            ns.clear_partitions();
        }
        for app in self.apps.values() {
            for pc in &app.partitions {
                for node in pc.members() {
                    let ns = self
                        .nodes
                        .entry(node)
                        .or_insert_with(|| NodeState::new(false));
                    ns.put_partition(node, pc.pid, pc.is_primary(node))?;
                }
            }
        }
        Ok(())
    }

    pub fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn advance(&mut self, dt: Duration) {
        self.now += dt;
    }

    pub fn apps(&self) -> &AppMap {
        &self.apps
    }

    pub fn nodes(&self) -> &NodeMap {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut NodeMap {
        &mut self.nodes
    }

    pub fn config(&self, pid: Gpid) -> Option<&PartitionConfig> {
        self.apps.get(&pid.app_id)?.partition(pid)
    }

    pub fn config_mut(&mut self, pid: Gpid) -> Option<&mut PartitionConfig> {
        self.apps.get_mut(&pid.app_id)?.partition_mut(pid)
    }

    pub fn guardian(&self) -> &PartitionGuardian {
        &self.guardian
    }

    pub fn guardian_mut(&mut self) -> &mut PartitionGuardian {
        &mut self.guardian
    }

    pub fn applier_mut(&mut self) -> &mut A {
        &mut self.applier
    }

    /// Walk every partition once: from-proposals first, cure otherwise,
    /// forward at most one action each through the applier and fold accepted
    /// post-images back.
    pub fn tick(&mut self) -> Result<TickStats, GuardianError> {
        self.guardian.set_time(self.now);
        let mut stats = TickStats::default();

        // group the walk by shard so per-partition work has a stable,
        // non-interleaved serialization key
        let mut shards: Vec<Vec<Gpid>> = vec![Vec::new(); self.num_shards as usize];
        for app in self.apps.values() {
            for pc in &app.partitions {
                shards[shard_for_partition(pc.pid, self.num_shards) as usize].push(pc.pid);
            }
        }

        for shard in shards {
            for pid in shard {
                self.step_partition(pid, &mut stats)?;
            }
        }
        Ok(stats)
    }

    /// Tick until every partition is healthy, at most `max_ticks` times.
    /// Returns whether the cluster converged.
    pub fn run_until_healthy(
        &mut self,
        max_ticks: usize,
        tick_interval: Duration,
    ) -> Result<bool, GuardianError> {
        for _ in 0..max_ticks {
            let stats = self.tick()?;
            if stats.all_healthy() {
                return Ok(true);
            }
            self.advance(tick_interval);
        }
        Ok(false)
    }

    fn step_partition(&mut self, pid: Gpid, stats: &mut TickStats) -> Result<(), GuardianError> {
        let action = {
            let view = ClusterView::new(&self.apps, &self.nodes);
            match self.guardian.from_proposals(&view, pid) {
                Some(action) => {
                    stats.ill += 1;
                    Some(action)
                }
                None => {
                    let (health, action) = self.guardian.cure(&view, pid);
                    match health {
                        PartitionHealth::Healthy => stats.healthy += 1,
                        PartitionHealth::Ill => stats.ill += 1,
                        PartitionHealth::Dead => stats.dead += 1,
                    }
                    action
                }
            }
        };
        let Some(action) = action else {
            return Ok(());
        };

        let Some(previous) = self.config(pid).cloned() else {
            return Ok(());
        };
        debug!(%pid, %action, ballot = %previous.ballot, "sending proposal");
        stats.proposals_sent += 1;

        let request = UpdateRequest::new(previous.clone(), action);
        let Some(accepted) = self.applier.send_proposal(action.target, request) else {
            debug!(%pid, %action, "proposal not acknowledged");
            return Ok(());
        };
        if accepted.config.pid != pid {
            warn!(%pid, got = %accepted.config.pid, "applier returned post-image for wrong partition");
            return Ok(());
        }

        self.guardian.reconfig(&mut self.nodes, &previous, &accepted)?;
        if let Some(pc) = self.config_mut(pid) {
            *pc = accepted.config.clone();
        }
        self.applier.on_applied(pid, &accepted.config);
        stats.applied += 1;
        Ok(())
    }
}
