//! Ballot numbers and their per-node allocation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A proposal ballot. Totally ordered by integer value; higher wins.
///
/// Ballots are partitioned across the cluster: the node at rank index
/// `k` of `N` participants only ever uses ballots from the arithmetic
/// progression `k+1, k+1+N, k+1+2N, ...`. Progressions for distinct
/// indexes are disjoint, so a ballot identifies its proposer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ballot(u64);

impl Ballot {
    /// Wrap a raw ballot number. Normal proposers take ballots from a
    /// [`BallotClock`]; this is for deserialization shims and tests.
    #[must_use]
    pub fn from_raw(ballot: u64) -> Self {
        Self(ballot)
    }
}

impl fmt::Display for Ballot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Hands out this node's ballots, strictly increasing across all
/// instances. One clock per node, shared by every proposal attempt.
#[derive(Debug)]
pub struct BallotClock {
    index: u64,
    stride: u64,
    last: Option<Ballot>,
}

impl BallotClock {
    /// # Panics
    /// Panics if `index` is not a valid position in the participant list.
    #[must_use]
    pub fn new(index: usize, participants: usize) -> Self {
        assert!(
            index < participants,
            "ballot index {index} out of range for {participants} participants"
        );
        Self {
            index: index as u64,
            stride: participants as u64,
            last: None,
        }
    }

    /// Next unused ballot for this node.
    pub fn next(&mut self) -> Ballot {
        let ballot = match self.last {
            None => Ballot(self.index + 1),
            Some(Ballot(b)) => Ballot(b + self.stride),
        };
        self.last = Some(ballot);
        ballot
    }
}
