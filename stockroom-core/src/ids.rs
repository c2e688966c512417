//! Identifiers shared across the cluster.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Name of a replica. The `Ord` impl (lexicographic) doubles as the rank
/// order every client uses to pick a leader, so all clients agree on the
/// same ranking without coordination.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaId(String);

impl ReplicaId {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReplicaId {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

/// Identity of a client backend. Picked at random on startup; a restarted
/// client is a fresh client.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl ClientId {
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Identity of a single command: originating client plus a per-client
/// monotonic sequence number. Replicas use this to recognise a command
/// that was already decided in an earlier consensus instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommandId {
    pub client: ClientId,
    pub seq: u64,
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.client, self.seq)
    }
}

/// Consensus instance number. Instance 0 is never decided; replicas start
/// with `last_applied == ZERO` and propose into `last_applied.next()`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Instance(pub u64);

impl Instance {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replica_rank_is_lexicographic() {
        let mut names = vec![
            ReplicaId::from("s3"),
            ReplicaId::from("s1"),
            ReplicaId::from("s2"),
        ];
        names.sort();
        assert_eq!(names[0], ReplicaId::from("s1"));
        assert_eq!(names[2], ReplicaId::from("s3"));
    }

    #[test]
    fn instance_advances_by_one() {
        assert_eq!(Instance::ZERO.next(), Instance(1));
        assert_eq!(Instance(41).next(), Instance(42));
    }
}
