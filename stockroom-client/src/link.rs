//! One outbound link per replica.
//!
//! A link owns its socket and is driven by the backend: heartbeats and
//! submissions go out, every [`ServerReply`] frame comes back tagged
//! with the replica it arrived from. Links reconnect lazily with
//! jittered backoff and drop outbound frames while disconnected; the
//! failure detector reads exactly that silence as suspicion.

use futures::{SinkExt, StreamExt};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, instrument, trace};

use stockroom_core::{
    BackoffConfig, ClientId, ClientRequest, Connect, FrameCodec, Hello, ReplicaId, ServerReply,
    WireError,
};

type ClientCodec = FrameCodec<ClientRequest, ServerReply>;

/// Inbound traffic from a link back to the backend.
pub enum LinkEvent {
    Reply { from: ReplicaId, reply: ServerReply },
}

#[instrument(skip_all, name = "link", fields(client = %client, replica = %replica))]
pub(crate) async fn run_link<C: Connect>(
    client: ClientId,
    replica: ReplicaId,
    addr: String,
    mut connector: C,
    mut rx: mpsc::UnboundedReceiver<ClientRequest>,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    let backoff = BackoffConfig::default();
    let mut rng = StdRng::from_os_rng();
    let mut retries: u32 = 0;
    let mut conn: Option<Framed<C::Stream, ClientCodec>> = None;

    loop {
        let broken = match conn.as_mut() {
            None => {
                // Dial only when there is something to send; heartbeats
                // arrive every probe period and keep this moving.
                let Some(msg) = rx.recv().await else { return };
                match open(&mut connector, &addr, client).await {
                    Ok(mut framed) => {
                        debug!("connected");
                        retries = 0;
                        match framed.send(msg).await {
                            Ok(()) => conn = Some(framed),
                            Err(error) => trace!(%error, "send on fresh link failed"),
                        }
                    }
                    Err(error) => {
                        trace!(%error, "dial failed, dropping frame");
                        let delay = backoff.duration(retries, &mut rng);
                        retries = retries.saturating_add(1);
                        tokio::time::sleep(delay).await;
                    }
                }
                false
            }
            Some(framed) => {
                tokio::select! {
                    out = rx.recv() => match out {
                        None => return,
                        Some(msg) => framed.send(msg).await.is_err(),
                    },
                    inbound = framed.next() => match inbound {
                        Some(Ok(reply)) => {
                            let _ = events.send(LinkEvent::Reply {
                                from: replica.clone(),
                                reply,
                            });
                            false
                        }
                        Some(Err(error)) => {
                            trace!(%error, "read failed");
                            true
                        }
                        None => {
                            debug!("replica closed the connection");
                            true
                        }
                    },
                }
            }
        };

        if broken {
            debug!("link broken");
            conn = None;
        }
    }
}

async fn open<C: Connect>(
    connector: &mut C,
    addr: &str,
    client: ClientId,
) -> Result<Framed<C::Stream, ClientCodec>, WireError> {
    let stream = connector
        .connect(addr)
        .await
        .map_err(|e| WireError::Connect(e.to_string()))?;
    let mut hello = Framed::new(stream, FrameCodec::<Hello, Hello>::new());
    hello.send(Hello::Client(client)).await?;
    Ok(hello.map_codec(|_| FrameCodec::new()))
}
