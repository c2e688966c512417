//! Inbound connection handling.
//!
//! Generic over the stream type so the binary serves real TCP sockets
//! while the simulation tests serve turmoil ones.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, instrument};

use stockroom_core::{
    ClientId, ClientRequest, Command, FrameCodec, Hello, ReplicaId, ServerReply, WireError,
};
use stockroom_paxos::{EngineHandle, PaxosMsg};

use crate::replica::ReplicaHandle;

/// Handle one inbound connection: read the hello frame, then speak the
/// protocol it selected until the connection closes.
///
/// # Errors
/// [`WireError`] on connection failure, or once the replica or engine
/// behind this connection has stopped.
pub async fn serve_connection<S>(
    stream: S,
    replica: ReplicaHandle,
    engine: EngineHandle<Command>,
) -> Result<(), WireError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let mut hello_framed = Framed::new(stream, FrameCodec::<Hello, Hello>::new());
    let hello = match hello_framed.next().await {
        Some(frame) => frame?,
        None => {
            return Err(WireError::Handshake(
                "connection closed before hello".to_owned(),
            ));
        }
    };

    match hello {
        Hello::Client(client) => {
            serve_client(hello_framed.map_codec(|_| FrameCodec::new()), client, replica).await
        }
        Hello::Peer(peer) => {
            serve_peer(hello_framed.map_codec(|_| FrameCodec::new()), &peer, &engine).await
        }
    }
}

/// Client protocol: submissions are forwarded to the replica with this
/// connection's reply channel; heartbeats are answered in line. Both go
/// through the replica's mailbox, so a wedged replica stops producing
/// heartbeat replies and its clients fail over.
#[instrument(skip_all, name = "client_conn", fields(client = %client))]
async fn serve_client<S>(
    mut framed: Framed<S, FrameCodec<ServerReply, ClientRequest>>,
    client: ClientId,
    replica: ReplicaHandle,
) -> Result<(), WireError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    debug!("client connected");
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();

    loop {
        tokio::select! {
            frame = framed.next() => match frame {
                None => {
                    debug!("client disconnected");
                    return Ok(());
                }
                Some(request) => match request? {
                    ClientRequest::Submit(command) => {
                        replica
                            .submit(command, reply_tx.clone())
                            .map_err(|e| WireError::Connect(e.to_string()))?;
                    }
                    ClientRequest::Heartbeat => {
                        let name = replica
                            .heartbeat()
                            .await
                            .map_err(|e| WireError::Connect(e.to_string()))?;
                        framed.send(ServerReply::HeartbeatReply(name)).await?;
                    }
                },
            },
            Some(reply) = reply_rx.recv() => {
                framed.send(reply).await?;
            }
        }
    }
}

/// Peer protocol: the inbound half of a unidirectional link. Frames are
/// handed to the engine; nothing is ever written back.
#[instrument(skip_all, name = "peer_conn", fields(peer = %peer))]
async fn serve_peer<S>(
    mut framed: Framed<S, FrameCodec<(), PaxosMsg<Command>>>,
    peer: &ReplicaId,
    engine: &EngineHandle<Command>,
) -> Result<(), WireError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    debug!("peer link attached");
    while let Some(frame) = framed.next().await {
        let msg = frame?;
        engine
            .deliver(peer.clone(), msg)
            .map_err(|e| WireError::Connect(e.to_string()))?;
    }
    debug!("peer link detached");
    Ok(())
}
