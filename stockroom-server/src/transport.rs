//! Outbound peer links.
//!
//! Consensus frames leave the engine on one channel; a router fans them
//! out to one link task per peer. A link owns its socket, reconnects
//! with jittered backoff, and drops frames whenever the peer is
//! unreachable. That is exactly the fair-loss contract the protocol
//! assumes, so nothing is buffered or retried here.

use std::collections::BTreeMap;

use futures::SinkExt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, instrument, trace, warn};

use stockroom_core::{BackoffConfig, Command, Connect, FrameCodec, Hello, ReplicaId, WireError};
use stockroom_paxos::PaxosMsg;

type PeerCodec = FrameCodec<PaxosMsg<Command>, ()>;

/// Spawn the router plus one link task per peer, draining `net_rx`.
pub fn spawn_peer_links<C: Connect>(
    me: &ReplicaId,
    peers: &BTreeMap<ReplicaId, String>,
    connector: &C,
    mut net_rx: mpsc::UnboundedReceiver<(ReplicaId, PaxosMsg<Command>)>,
) {
    let mut links: BTreeMap<ReplicaId, mpsc::UnboundedSender<PaxosMsg<Command>>> = BTreeMap::new();
    for (peer, addr) in peers {
        let (tx, rx) = mpsc::unbounded_channel();
        links.insert(peer.clone(), tx);
        tokio::spawn(run_link(
            me.clone(),
            peer.clone(),
            addr.clone(),
            connector.clone(),
            rx,
        ));
    }

    tokio::spawn(async move {
        while let Some((to, msg)) = net_rx.recv().await {
            match links.get(&to) {
                // Link task gone or queue full never happens with
                // unbounded senders; a closed link means shutdown.
                Some(tx) => {
                    let _ = tx.send(msg);
                }
                None => warn!(peer = %to, "no link for peer"),
            }
        }
    });
}

#[instrument(skip_all, name = "peer_link", fields(node = %me, peer = %peer))]
async fn run_link<C: Connect>(
    me: ReplicaId,
    peer: ReplicaId,
    addr: String,
    mut connector: C,
    mut rx: mpsc::UnboundedReceiver<PaxosMsg<Command>>,
) {
    let backoff = BackoffConfig::default();
    let mut rng = StdRng::from_os_rng();
    let mut retries: u32 = 0;
    let mut conn: Option<Framed<C::Stream, PeerCodec>> = None;

    while let Some(msg) = rx.recv().await {
        if conn.is_none() {
            match open(&mut connector, &addr, &me).await {
                Ok(framed) => {
                    debug!("peer link established");
                    conn = Some(framed);
                    retries = 0;
                }
                Err(error) => {
                    trace!(%error, "dial failed, dropping frame");
                    let delay = backoff.duration(retries, &mut rng);
                    retries = retries.saturating_add(1);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }
        }

        if let Some(framed) = conn.as_mut() {
            if let Err(error) = framed.send(msg).await {
                debug!(%error, "peer link broken, dropping frame");
                conn = None;
            }
        }
    }
}

async fn open<C: Connect>(
    connector: &mut C,
    addr: &str,
    me: &ReplicaId,
) -> Result<Framed<C::Stream, PeerCodec>, WireError> {
    let stream = connector
        .connect(addr)
        .await
        .map_err(|e| WireError::Connect(e.to_string()))?;
    let mut hello = Framed::new(stream, FrameCodec::<Hello, Hello>::new());
    hello.send(Hello::Peer(me.clone())).await?;
    Ok(hello.map_codec(|_| FrameCodec::new()))
}
