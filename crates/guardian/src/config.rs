//! Guardian configuration.

use std::time::Duration;

/// Tunables for the partition guardian.
#[derive(Debug, Clone)]
pub struct GuardianConfig {
    /// How long an all-replicas-down partition may wait for node metadata
    /// before refusals are escalated to warnings.
    pub ddd_metadata_timeout: Duration,
    /// Maximum number of dropped-replica records kept per partition.
    pub drop_history_bound: usize,
    /// Collected replica info older than this is treated as absent by the
    /// learning-state check.
    pub replica_info_freshness: Duration,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            ddd_metadata_timeout: Duration::from_secs(60),
            drop_history_bound: 8,
            replica_info_freshness: Duration::from_secs(30),
        }
    }
}

impl GuardianConfig {
    /// Set the all-replicas-down escalation timeout.
    pub fn with_ddd_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.ddd_metadata_timeout = timeout;
        self
    }

    /// Set the dropped-replica history bound.
    pub fn with_drop_history_bound(mut self, bound: usize) -> Self {
        self.drop_history_bound = bound;
        self
    }

    /// Set the freshness bound for collected replica info.
    pub fn with_replica_info_freshness(mut self, freshness: Duration) -> Self {
        self.replica_info_freshness = freshness;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_pattern() {
        let config = GuardianConfig::default()
            .with_drop_history_bound(4)
            .with_ddd_metadata_timeout(Duration::from_secs(5));
        assert_eq!(config.drop_history_bound, 4);
        assert_eq!(config.ddd_metadata_timeout, Duration::from_secs(5));
        assert_eq!(config.replica_info_freshness, Duration::from_secs(30));
    }
}
