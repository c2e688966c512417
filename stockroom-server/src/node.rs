//! Wiring: engine + replica + peer transport for one node.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use stockroom_core::{Command, Connect, ReplicaId};
use stockroom_paxos::{Engine, EngineHandle, EngineStopped};

use crate::config::ReplicaConfig;
use crate::replica::{Replica, ReplicaHandle};
use crate::transport;

/// Handles to a running node. Accepting connections is the caller's
/// job: pass each accepted stream to [`crate::serve_connection`].
pub struct Node {
    pub name: ReplicaId,
    pub replica: ReplicaHandle,
    pub engine: EngineHandle<Command>,
    /// Resolves when the replica stops. An `Err` means the consensus
    /// engine died and the process must exit so clients fail over.
    pub replica_task: JoinHandle<Result<(), EngineStopped>>,
}

/// Spawn the engine, replica, and peer links for `config`.
#[must_use]
pub fn start_node<C: Connect>(config: ReplicaConfig, connector: &C) -> Node {
    let name = config.name.clone();
    let participants = config.participants();

    let (net_tx, net_rx) = mpsc::unbounded_channel();
    let (engine, engine_handle) = Engine::new(name.clone(), participants, net_tx);
    tokio::spawn(engine.run());

    transport::spawn_peer_links(&name, &config.peers, connector, net_rx);

    let (replica, replica_handle) = Replica::new(config, engine_handle.clone());
    let replica_task = tokio::spawn(replica.run());

    Node {
        name,
        replica: replica_handle,
        engine: engine_handle,
        replica_task,
    }
}
