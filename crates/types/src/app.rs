//! App catalog: apps and their partition arrays.

use crate::{AppId, Gpid, PartitionConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Static description of an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub app_id: AppId,
    pub app_name: String,
    /// Target replica count per partition (primary included).
    pub max_replica_count: usize,
    pub partition_count: usize,
}

/// An app together with the configurations of all its partitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppState {
    pub info: AppInfo,
    pub partitions: Vec<PartitionConfig>,
}

impl AppState {
    /// Create an app with fresh (empty) partition configurations.
    pub fn create(info: AppInfo) -> Self {
        let partitions = (0..info.partition_count)
            .map(|i| {
                PartitionConfig::new(Gpid::new(info.app_id.0, i as u32), info.max_replica_count)
            })
            .collect();
        Self { info, partitions }
    }

    pub fn partition(&self, pid: Gpid) -> Option<&PartitionConfig> {
        self.partitions.get(pid.partition.0 as usize)
    }

    pub fn partition_mut(&mut self, pid: Gpid) -> Option<&mut PartitionConfig> {
        self.partitions.get_mut(pid.partition.0 as usize)
    }
}

/// All apps, keyed by id.
pub type AppMap = BTreeMap<AppId, AppState>;
