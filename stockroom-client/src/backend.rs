//! The client backend actor.
//!
//! Owns the failure detector and one link per replica. Answers two
//! questions for the front-end: "who is the leader right now" and
//! "send this command to that replica and hand me the reply". At most
//! one submission is in flight per backend; a newer one supersedes a
//! stale one, and replies are matched by sequence number so a late
//! reply from an earlier attempt is discarded.

use std::collections::BTreeMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, trace, warn};

use stockroom_core::{ClientId, ClientRequest, Command, Connect, ReplicaId, ServerReply};

use crate::elector::{ElectorConfig, ElectorState};
use crate::link::{LinkEvent, run_link};

pub enum BackendMsg {
    GetLeader {
        reply: oneshot::Sender<Option<ReplicaId>>,
    },
    Submit {
        to: ReplicaId,
        command: Command,
        reply: oneshot::Sender<ServerReply>,
    },
}

/// Cloneable handle to a running [`Backend`].
#[derive(Clone)]
pub struct BackendHandle {
    tx: mpsc::UnboundedSender<BackendMsg>,
}

impl BackendHandle {
    /// The replica this backend currently trusts, or `None` while every
    /// replica is suspected (or the backend is gone).
    pub async fn get_leader(&self) -> Option<ReplicaId> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(BackendMsg::GetLeader { reply }).ok()?;
        rx.await.ok().flatten()
    }

    /// Send `command` to `to`. The returned channel yields the matching
    /// reply; it is dropped without a value if the backend goes away or
    /// a newer submission supersedes this one.
    ///
    /// # Errors
    /// Returns the command back if the backend actor is gone.
    pub fn submit(
        &self,
        to: ReplicaId,
        command: Command,
    ) -> Result<oneshot::Receiver<ServerReply>, Command> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(BackendMsg::Submit { to, command, reply })
            .map_err(|e| match e.0 {
                BackendMsg::Submit { command, .. } => command,
                BackendMsg::GetLeader { .. } => unreachable!("we sent a Submit"),
            })?;
        Ok(rx)
    }
}

/// The backend actor. Build with [`Backend::spawn`].
pub struct Backend {
    id: ClientId,
    elector: ElectorState,
    links: BTreeMap<ReplicaId, mpsc::UnboundedSender<ClientRequest>>,
    rx: mpsc::UnboundedReceiver<BackendMsg>,
    events: mpsc::UnboundedReceiver<LinkEvent>,
    inflight: Option<(u64, oneshot::Sender<ServerReply>)>,
}

impl Backend {
    /// Spawn the backend and its per-replica links.
    pub fn spawn<C: Connect>(
        id: ClientId,
        servers: BTreeMap<ReplicaId, String>,
        connector: &C,
        config: &ElectorConfig,
    ) -> BackendHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut links = BTreeMap::new();
        for (replica, addr) in &servers {
            let (link_tx, link_rx) = mpsc::unbounded_channel();
            links.insert(replica.clone(), link_tx);
            tokio::spawn(run_link(
                id,
                replica.clone(),
                addr.clone(),
                connector.clone(),
                link_rx,
                events_tx.clone(),
            ));
        }

        let backend = Self {
            id,
            elector: ElectorState::new(servers.into_keys(), config),
            links,
            rx,
            events: events_rx,
            inflight: None,
        };
        tokio::spawn(backend.run());
        BackendHandle { tx }
    }

    #[instrument(skip_all, name = "backend", fields(client = %self.id))]
    async fn run(mut self) {
        debug!("backend started");
        let sleep = tokio::time::sleep(self.elector.delay());
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = &mut sleep => {
                    let delay = self.elector.tick();
                    trace!(leader = ?self.elector.leader(), "probe round");
                    for link in self.links.values() {
                        let _ = link.send(ClientRequest::Heartbeat);
                    }
                    sleep.as_mut().reset(tokio::time::Instant::now() + delay);
                }
                msg = self.rx.recv() => match msg {
                    Some(msg) => self.handle(msg),
                    None => {
                        debug!("all handles dropped, backend stopping");
                        return;
                    }
                },
                Some(event) = self.events.recv() => self.on_event(event),
            }
        }
    }

    fn handle(&mut self, msg: BackendMsg) {
        match msg {
            BackendMsg::GetLeader { reply } => {
                let _ = reply.send(self.elector.leader().cloned());
            }
            BackendMsg::Submit { to, command, reply } => {
                if let Some((stale, _)) = self.inflight.take() {
                    trace!(seq = stale, "superseding stale submission");
                }
                let seq = command.id.seq;
                match self.links.get(&to) {
                    Some(link) => {
                        trace!(seq, replica = %to, "submitting");
                        self.inflight = Some((seq, reply));
                        let _ = link.send(ClientRequest::Submit(command));
                    }
                    None => warn!(replica = %to, "no link for replica"),
                }
            }
        }
    }

    fn on_event(&mut self, event: LinkEvent) {
        let LinkEvent::Reply { from, reply } = event;
        match reply {
            ServerReply::HeartbeatReply(name) => {
                trace!(replica = %name, "heartbeat reply");
                self.elector.record_reply(&name);
            }
            ServerReply::Outcome { seq, .. }
            | ServerReply::Abort { seq }
            | ServerReply::Timeout { seq } => {
                let matches = self.inflight.as_ref().is_some_and(|(s, _)| *s == seq);
                if matches {
                    let (_, waiter) = self.inflight.take().expect("just checked");
                    let _ = waiter.send(reply);
                } else {
                    trace!(seq, replica = %from, "discarding stale reply");
                }
            }
        }
    }
}
