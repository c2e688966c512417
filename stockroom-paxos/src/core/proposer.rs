//! Pure proposer state for one proposal attempt.

use std::collections::BTreeSet;

use stockroom_core::ReplicaId;

use crate::ballot::Ballot;

/// Proposer-side record for a single attempt at one instance.
///
/// Responses are keyed by sender, so duplicate deliveries of the same
/// `Prepared` or `Accepted` frame can never count twice towards a
/// quorum. Moving from `Preparing` to `Accepting` doubles as the
/// accept-sent latch: promises arriving after the accepts went out are
/// ignored.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProposerState<V> {
    ballot: Ballot,
    value: V,
    quorum: usize,
    phase: Phase<V>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Phase<V> {
    Preparing {
        promises: BTreeSet<ReplicaId>,
        /// Highest (ballot, value) pair reported accepted by a promiser.
        adopted: Option<(Ballot, V)>,
    },
    Accepting {
        chosen: V,
        accepts: BTreeSet<ReplicaId>,
    },
    Decided,
}

/// Result of recording one promise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PromiseOutcome<V> {
    /// Need more promises.
    Pending,
    /// Quorum of promises; broadcast accepts carrying this value.
    StartAccept(V),
}

/// Result of recording one accept confirmation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcceptedOutcome {
    /// Need more accepts.
    Pending,
    /// Quorum of accepts; the value is decided.
    Decided,
}

impl<V: Clone> ProposerState<V> {
    #[must_use]
    pub fn new(ballot: Ballot, value: V, quorum: usize) -> Self {
        Self {
            ballot,
            value,
            quorum,
            phase: Phase::Preparing {
                promises: BTreeSet::new(),
                adopted: None,
            },
        }
    }

    #[must_use]
    pub fn ballot(&self) -> Ballot {
        self.ballot
    }

    /// True if a message at `ballot` belongs to this attempt.
    #[must_use]
    pub fn matches(&self, ballot: Ballot) -> bool {
        self.ballot == ballot
    }

    /// The value the accepts carry. `None` until the prepare quorum.
    #[must_use]
    pub fn chosen(&self) -> Option<&V> {
        match &self.phase {
            Phase::Accepting { chosen, .. } => Some(chosen),
            _ => None,
        }
    }

    /// Record a promise from `from`, along with the highest pair that
    /// acceptor had already accepted. On quorum, picks the value to
    /// propose: the adopted value of the highest reported ballot if any
    /// acceptor had one, otherwise our own.
    pub fn record_promise(
        &mut self,
        from: ReplicaId,
        accepted: Option<(Ballot, V)>,
    ) -> PromiseOutcome<V> {
        let Phase::Preparing { promises, adopted } = &mut self.phase else {
            return PromiseOutcome::Pending;
        };

        promises.insert(from);
        if let Some((ballot, value)) = accepted {
            if adopted.as_ref().is_none_or(|(b, _)| *b < ballot) {
                *adopted = Some((ballot, value));
            }
        }

        if promises.len() < self.quorum {
            return PromiseOutcome::Pending;
        }

        let chosen = adopted
            .take()
            .map_or_else(|| self.value.clone(), |(_, value)| value);
        self.phase = Phase::Accepting {
            chosen: chosen.clone(),
            accepts: BTreeSet::new(),
        };
        PromiseOutcome::StartAccept(chosen)
    }

    /// Record an accept confirmation from `from`.
    pub fn record_accepted(&mut self, from: ReplicaId) -> AcceptedOutcome {
        let Phase::Accepting { accepts, .. } = &mut self.phase else {
            return AcceptedOutcome::Pending;
        };

        accepts.insert(from);
        if accepts.len() < self.quorum {
            return AcceptedOutcome::Pending;
        }

        AcceptedOutcome::Decided
    }

    /// Mark the attempt decided so stray confirmations are ignored.
    pub fn finish(&mut self) -> Option<V> {
        let chosen = self.chosen().cloned();
        self.phase = Phase::Decided;
        chosen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ReplicaId {
        ReplicaId::from(name)
    }

    #[test]
    fn promise_quorum_uses_own_value() {
        let mut prop = ProposerState::new(Ballot::from_raw(1), "ours", 2);
        assert_eq!(prop.record_promise(id("a"), None), PromiseOutcome::Pending);
        assert_eq!(
            prop.record_promise(id("b"), None),
            PromiseOutcome::StartAccept("ours")
        );
    }

    #[test]
    fn promise_quorum_adopts_highest_accepted() {
        let mut prop = ProposerState::new(Ballot::from_raw(7), "ours", 2);
        let low = Some((Ballot::from_raw(2), "low"));
        let high = Some((Ballot::from_raw(5), "high"));
        assert_eq!(prop.record_promise(id("a"), low), PromiseOutcome::Pending);
        assert_eq!(
            prop.record_promise(id("b"), high),
            PromiseOutcome::StartAccept("high")
        );
    }

    #[test]
    fn duplicate_promises_do_not_reach_quorum() {
        let mut prop = ProposerState::new(Ballot::from_raw(1), "v", 2);
        assert_eq!(prop.record_promise(id("a"), None), PromiseOutcome::Pending);
        assert_eq!(prop.record_promise(id("a"), None), PromiseOutcome::Pending);
        assert_eq!(
            prop.record_promise(id("b"), None),
            PromiseOutcome::StartAccept("v")
        );
    }

    #[test]
    fn late_promise_after_accepts_is_ignored() {
        let mut prop = ProposerState::new(Ballot::from_raw(1), "v", 1);
        assert_eq!(
            prop.record_promise(id("a"), None),
            PromiseOutcome::StartAccept("v")
        );
        // The duplicate delivery must not restart the accept round.
        assert_eq!(prop.record_promise(id("a"), None), PromiseOutcome::Pending);
        assert_eq!(prop.chosen(), Some(&"v"));
    }

    #[test]
    fn accepted_quorum_decides_once() {
        let mut prop = ProposerState::new(Ballot::from_raw(1), "v", 2);
        prop.record_promise(id("a"), None);
        prop.record_promise(id("b"), None);
        assert_eq!(prop.record_accepted(id("a")), AcceptedOutcome::Pending);
        assert_eq!(prop.record_accepted(id("a")), AcceptedOutcome::Pending);
        assert_eq!(prop.record_accepted(id("b")), AcceptedOutcome::Decided);
        assert_eq!(prop.finish(), Some("v"));
        // Stray confirmations after the decision change nothing.
        assert_eq!(prop.record_accepted(id("c")), AcceptedOutcome::Pending);
    }

    #[test]
    fn accepted_before_prepare_quorum_is_ignored() {
        let mut prop = ProposerState::new(Ballot::from_raw(1), "v", 2);
        assert_eq!(prop.record_accepted(id("a")), AcceptedOutcome::Pending);
        assert_eq!(prop.record_accepted(id("b")), AcceptedOutcome::Pending);
        assert_eq!(prop.chosen(), None);
    }
}
