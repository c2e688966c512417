//! Pure state machine cores for Paxos - no I/O, no async
//!
//! The core state transition logic is shared between the async engine
//! and the Stateright model checker, so the model checker verifies the
//! exact same transitions as the production code.

mod acceptor;
mod proposer;

pub use acceptor::{AcceptOutcome, AcceptorState, PrepareOutcome};
pub use proposer::{AcceptedOutcome, PromiseOutcome, ProposerState};
