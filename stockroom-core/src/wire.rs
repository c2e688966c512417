//! Frames exchanged over TCP connections.
//!
//! Every connection starts with a single [`Hello`] frame that selects the
//! protocol spoken for the rest of the connection:
//!
//! - `Hello::Client`: [`ClientRequest`] frames in, [`ServerReply`] frames out
//! - `Hello::Peer`: consensus messages in, nothing out (peer links are
//!   unidirectional; each replica dials every peer for sending)

use serde::{Deserialize, Serialize};

use crate::command::{Command, Response};
use crate::ids::{ClientId, ReplicaId};

/// First frame on every connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hello {
    Client(ClientId),
    Peer(ReplicaId),
}

/// Frames a client backend sends to a replica.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientRequest {
    Submit(Command),
    Heartbeat,
}

/// Frames a replica sends back to a client backend.
///
/// Command replies are tagged with the command's sequence number so a
/// late reply from an earlier attempt cannot be mistaken for the current
/// one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerReply {
    /// The command was decided and applied; here is its outcome.
    Outcome { seq: u64, response: Response },
    /// Another proposer outran this replica; the client may retry.
    Abort { seq: u64 },
    /// No majority answered within the proposal deadline.
    Timeout { seq: u64 },
    HeartbeatReply(ReplicaId),
}
