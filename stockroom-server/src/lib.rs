//! Stockroom replica server.
//!
//! A replica owns three actors: the consensus engine
//! ([`stockroom_paxos::Engine`]), the replica state machine
//! ([`Replica`]) that linearizes client commands through it, and the
//! peer transport that carries consensus frames to the other replicas.
//! The binary in `main.rs` wires them to a TCP listener; the simulation
//! tests wire the same pieces to turmoil sockets.

#![warn(clippy::pedantic)]

pub mod config;
pub mod ledger;
pub mod node;
pub mod replica;
pub mod serve;
pub mod transport;

pub use config::ReplicaConfig;
pub use ledger::StockLedger;
pub use node::{Node, start_node};
pub use replica::{Replica, ReplicaHandle, ReplicaMsg};
pub use serve::serve_connection;
