//! Single-decree Paxos, one independent decision per numbered instance.
//!
//! Every replica plays proposer, acceptor, and learner for every
//! instance, on demand. The protocol state transitions live in pure
//! cores ([`core::AcceptorState`], [`core::ProposerState`]) with no I/O
//! and no async, which is what the model-checking tests exercise; the
//! [`Engine`] actor wraps the cores with a mailbox and drives the wire
//! protocol.
//!
//! # Safety
//!
//! A value is chosen at ballot `b` only after a majority promised not to
//! accept ballots below `b`, and the proposer adopts the accepted value
//! of the highest ballot reported in those promises. Quorums intersect
//! and ballots are totally ordered and unique per proposer
//! ([`BallotClock`]), so at most one value can ever be chosen per
//! instance.
//!
//! # Liveness
//!
//! Not guaranteed under contention: two proposers can nack each other
//! forever. The layer above funnels commands through a single elected
//! replica, at which point that replica's ballots eventually dominate
//! and its proposals decide.

#![warn(clippy::pedantic)]

pub mod ballot;
pub mod core;
pub mod engine;
pub mod messages;

pub use ballot::{Ballot, BallotClock};
pub use engine::{Engine, EngineHandle, EngineStopped, ProposeReply};
pub use messages::PaxosMsg;
