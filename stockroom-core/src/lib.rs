//! Stockroom Core - shared types for clients and replicas
//!
//! This crate provides the common vocabulary of the stockroom replicated
//! store: command and response types, the identifiers that tie them to
//! their originating client, the wire frames exchanged over TCP, the
//! postcard codec, and the connector abstraction that lets the same code
//! run over real sockets and simulated ones.

#![warn(clippy::pedantic)]

pub mod codec;
pub mod command;
pub mod error;
pub mod ids;
pub mod net;
pub mod wire;

pub use codec::FrameCodec;
pub use command::{Command, CommandKind, Response};
pub use error::WireError;
pub use ids::{ClientId, CommandId, Instance, ReplicaId};
pub use net::{BackoffConfig, Connect, TcpConnector};
pub use wire::{ClientRequest, Hello, ServerReply};
