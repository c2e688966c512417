//! Replica configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use stockroom_core::ReplicaId;

/// Static configuration for one replica. The participant set is fixed
/// for the lifetime of the cluster; reconfiguration is not supported.
#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    /// This replica's name. Names rank lexicographically and every
    /// client derives the leader from that order.
    pub name: ReplicaId,
    /// Listen address for client and peer connections.
    pub listen: String,
    /// The other replicas, by name.
    pub peers: BTreeMap<ReplicaId, String>,
    /// How long a single proposal may wait for a majority.
    pub propose_timeout: Duration,
}

impl ReplicaConfig {
    pub const DEFAULT_PROPOSE_TIMEOUT: Duration = Duration::from_secs(5);

    #[must_use]
    pub fn new(
        name: ReplicaId,
        listen: impl Into<String>,
        peers: impl IntoIterator<Item = (ReplicaId, String)>,
    ) -> Self {
        Self {
            name,
            listen: listen.into(),
            peers: peers.into_iter().collect(),
            propose_timeout: Self::DEFAULT_PROPOSE_TIMEOUT,
        }
    }

    /// All consensus participants: the peers plus this replica.
    #[must_use]
    pub fn participants(&self) -> Vec<ReplicaId> {
        let mut all: Vec<ReplicaId> = self.peers.keys().cloned().collect();
        all.push(self.name.clone());
        all.sort();
        all
    }
}
