//! Eventually-strong failure detection and monarchical leader choice.
//!
//! Pure state, no I/O. The backend drives [`ElectorState::tick`] on a
//! timer and feeds heartbeat replies in; [`ElectorState::leader`] is the
//! lowest-ranked server not currently suspected. Ranks are the `Ord` of
//! [`ReplicaId`], shared by every client, so once the suspected sets
//! coincide all clients trust the same replica.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::debug;

use stockroom_core::ReplicaId;

#[derive(Debug, Clone)]
pub struct ElectorConfig {
    /// Initial probe period.
    pub delay: Duration,
    /// How much the period grows on each false suspicion.
    pub delta: Duration,
}

impl Default for ElectorConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            delta: Duration::from_secs(2),
        }
    }
}

/// Failure detector with increasing timeout.
///
/// Every server starts out considered alive, so a fresh client trusts
/// the minimum-rank replica immediately and only demotes it on missed
/// heartbeats.
#[derive(Debug, Clone)]
pub struct ElectorState {
    servers: BTreeSet<ReplicaId>,
    alive: BTreeSet<ReplicaId>,
    suspected: BTreeSet<ReplicaId>,
    delay: Duration,
    delta: Duration,
}

impl ElectorState {
    pub fn new(servers: impl IntoIterator<Item = ReplicaId>, config: &ElectorConfig) -> Self {
        let servers: BTreeSet<ReplicaId> = servers.into_iter().collect();
        Self {
            alive: servers.clone(),
            servers,
            suspected: BTreeSet::new(),
            delay: config.delay,
            delta: config.delta,
        }
    }

    /// One probe round. Servers that answered since the last round stop
    /// being suspected; servers that did not become suspected. A reply
    /// from a suspected server means the timeout was too aggressive, so
    /// the period grows by `delta`. Returns the period until the next
    /// round.
    pub fn tick(&mut self) -> Duration {
        if !self.alive.is_disjoint(&self.suspected) {
            self.delay += self.delta;
            debug!(delay = ?self.delay, "suspected server answered, increasing timeout");
        }

        for server in &self.servers {
            let alive = self.alive.contains(server);
            if !alive && !self.suspected.contains(server) {
                debug!(server = %server, "suspecting");
                self.suspected.insert(server.clone());
            } else if alive && self.suspected.contains(server) {
                debug!(server = %server, "no longer suspecting");
                self.suspected.remove(server);
            }
        }

        self.alive.clear();
        self.delay
    }

    /// Record a heartbeat reply for the current round.
    pub fn record_reply(&mut self, name: &ReplicaId) {
        if self.servers.contains(name) {
            self.alive.insert(name.clone());
        }
    }

    /// The lowest-ranked server not currently suspected, if any.
    #[must_use]
    pub fn leader(&self) -> Option<&ReplicaId> {
        self.servers.difference(&self.suspected).next()
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}
