//! Pure acceptor state for one consensus instance.

use crate::ballot::Ballot;

/// Acceptor-side record for a single instance.
///
/// `promised` is the highest ballot this node ever promised, `accepted`
/// the highest ballot it accepted and the value accepted at it.
/// `decided` latches once and never changes value afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AcceptorState<V> {
    promised: Option<Ballot>,
    accepted: Option<(Ballot, V)>,
    decided: Option<V>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrepareOutcome<V> {
    /// Promise granted; report the highest accepted pair to the proposer.
    Promised { accepted: Option<(Ballot, V)> },
    /// A ballot at least this high was already promised.
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcceptOutcome {
    Accepted,
    Rejected,
}

impl<V: Clone> AcceptorState<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            promised: None,
            accepted: None,
            decided: None,
        }
    }

    /// Phase 1b. Promises `ballot` if it is strictly higher than any
    /// ballot promised so far.
    pub fn prepare(&mut self, ballot: Ballot) -> PrepareOutcome<V> {
        if self.promised.is_some_and(|p| p >= ballot) {
            return PrepareOutcome::Rejected;
        }
        self.promised = Some(ballot);
        PrepareOutcome::Promised {
            accepted: self.accepted.clone(),
        }
    }

    /// Phase 2b. Accepts unless a strictly higher ballot was promised in
    /// the meantime. An accept at the promised ballot itself is fine.
    pub fn accept(&mut self, ballot: Ballot, value: V) -> AcceptOutcome {
        if self.promised.is_some_and(|p| p > ballot) {
            return AcceptOutcome::Rejected;
        }
        self.promised = Some(ballot);
        self.accepted = Some((ballot, value));
        AcceptOutcome::Accepted
    }

    /// Latch the decision. Idempotent; the first value wins and later
    /// calls are ignored.
    pub fn learn(&mut self, value: V) {
        if self.decided.is_none() {
            self.decided = Some(value);
        }
    }

    #[must_use]
    pub fn decision(&self) -> Option<&V> {
        self.decided.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_on_fresh_state_promises() {
        let mut acc: AcceptorState<&str> = AcceptorState::new();
        let out = acc.prepare(Ballot::from_raw(3));
        assert_eq!(out, PrepareOutcome::Promised { accepted: None });
    }

    #[test]
    fn prepare_with_lower_ballot_rejected() {
        let mut acc: AcceptorState<&str> = AcceptorState::new();
        acc.prepare(Ballot::from_raw(5));
        assert_eq!(acc.prepare(Ballot::from_raw(2)), PrepareOutcome::Rejected);
        // Equal ballots are rejected too: a promise is granted once.
        assert_eq!(acc.prepare(Ballot::from_raw(5)), PrepareOutcome::Rejected);
    }

    #[test]
    fn prepare_reports_previously_accepted_value() {
        let mut acc = AcceptorState::new();
        acc.prepare(Ballot::from_raw(1));
        acc.accept(Ballot::from_raw(1), "milk");
        let out = acc.prepare(Ballot::from_raw(4));
        assert_eq!(
            out,
            PrepareOutcome::Promised {
                accepted: Some((Ballot::from_raw(1), "milk")),
            }
        );
    }

    #[test]
    fn accept_at_promised_ballot_succeeds() {
        let mut acc = AcceptorState::new();
        acc.prepare(Ballot::from_raw(4));
        assert_eq!(acc.accept(Ballot::from_raw(4), "x"), AcceptOutcome::Accepted);
    }

    #[test]
    fn accept_below_promise_rejected() {
        let mut acc = AcceptorState::new();
        acc.prepare(Ballot::from_raw(9));
        assert_eq!(acc.accept(Ballot::from_raw(4), "x"), AcceptOutcome::Rejected);
    }

    #[test]
    fn accept_above_promise_bumps_promise() {
        let mut acc = AcceptorState::new();
        acc.prepare(Ballot::from_raw(2));
        assert_eq!(acc.accept(Ballot::from_raw(7), "x"), AcceptOutcome::Accepted);
        // The later prepare at a ballot between the two must now fail.
        assert_eq!(acc.prepare(Ballot::from_raw(5)), PrepareOutcome::Rejected);
    }

    #[test]
    fn decision_latches_once() {
        let mut acc = AcceptorState::new();
        acc.learn("first");
        acc.learn("second");
        assert_eq!(acc.decision(), Some(&"first"));
    }
}
