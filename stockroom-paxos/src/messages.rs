//! Consensus protocol messages exchanged between replicas.
//!
//! The transport is best-effort: frames can be lost, duplicated, and
//! reordered, and the handlers in [`crate::engine`] are written to
//! tolerate all three.

use serde::{Deserialize, Serialize};

use stockroom_core::Instance;

use crate::ballot::Ballot;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PaxosMsg<V> {
    /// Phase 1a: ask every acceptor to promise this ballot.
    Prepare { instance: Instance, ballot: Ballot },
    /// Phase 1b: promise granted, reporting the highest accepted pair.
    Prepared {
        instance: Instance,
        ballot: Ballot,
        accepted: Option<(Ballot, V)>,
    },
    /// Phase 2a: ask every acceptor to accept this value.
    Accept {
        instance: Instance,
        ballot: Ballot,
        value: V,
    },
    /// Phase 2b: value accepted at this ballot.
    Accepted { instance: Instance, ballot: Ballot },
    /// The ballot was rejected; a higher one exists.
    Nack { instance: Instance, ballot: Ballot },
    /// A quorum accepted; the instance is decided.
    Decide { instance: Instance, value: V },
}
