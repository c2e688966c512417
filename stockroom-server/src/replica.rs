//! The replica actor: linearizes locally submitted commands into the
//! replicated log and applies every decision to the ledger.

use std::collections::VecDeque;
use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, trace, warn};

use stockroom_core::{Command, Instance, ReplicaId, ServerReply};
use stockroom_paxos::{EngineHandle, EngineStopped, ProposeReply};

use crate::config::ReplicaConfig;
use crate::ledger::StockLedger;

/// Messages a replica accepts from connection handlers.
pub enum ReplicaMsg {
    /// Enqueue a client command; the reply goes back over the
    /// originating connection.
    Submit {
        command: Command,
        reply: mpsc::UnboundedSender<ServerReply>,
    },
    /// Liveness probe from a client backend.
    Heartbeat { reply: oneshot::Sender<ReplicaId> },
}

/// Cloneable handle to a running [`Replica`].
#[derive(Clone)]
pub struct ReplicaHandle {
    tx: mpsc::UnboundedSender<ReplicaMsg>,
}

/// The replica actor is gone; its connections should close.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplicaGone;

impl fmt::Display for ReplicaGone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("replica stopped")
    }
}

impl std::error::Error for ReplicaGone {}

impl ReplicaHandle {
    /// # Errors
    /// [`ReplicaGone`] if the replica actor stopped.
    pub fn submit(
        &self,
        command: Command,
        reply: mpsc::UnboundedSender<ServerReply>,
    ) -> Result<(), ReplicaGone> {
        self.tx
            .send(ReplicaMsg::Submit { command, reply })
            .map_err(|_| ReplicaGone)
    }

    /// Probe the replica. Answered immediately from the mailbox, even
    /// while a proposal is in flight, so an unresponsive consensus
    /// module shows up as missed heartbeats.
    ///
    /// # Errors
    /// [`ReplicaGone`] if the replica actor stopped.
    pub async fn heartbeat(&self) -> Result<ReplicaId, ReplicaGone> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ReplicaMsg::Heartbeat { reply })
            .map_err(|_| ReplicaGone)?;
        rx.await.map_err(|_| ReplicaGone)
    }
}

struct PendingCommand {
    command: Command,
    reply: mpsc::UnboundedSender<ServerReply>,
}

/// The replicated state machine server for one node.
pub struct Replica {
    name: ReplicaId,
    config: ReplicaConfig,
    engine: EngineHandle<Command>,
    ledger: StockLedger,
    last_applied: Instance,
    pending: VecDeque<PendingCommand>,
    rx: mpsc::UnboundedReceiver<ReplicaMsg>,
    inbox_open: bool,
}

impl Replica {
    #[must_use]
    pub fn new(config: ReplicaConfig, engine: EngineHandle<Command>) -> (Self, ReplicaHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let replica = Self {
            name: config.name.clone(),
            config,
            engine,
            ledger: StockLedger::new(),
            last_applied: Instance::ZERO,
            pending: VecDeque::new(),
            rx,
            inbox_open: true,
        };
        (replica, ReplicaHandle { tx })
    }

    /// Run until the inbox closes and the queue drains, or until the
    /// consensus engine dies. The caller must treat [`EngineStopped`] as
    /// fatal for the whole process: a replica without consensus must
    /// stop answering so clients fail over to the others.
    ///
    /// # Errors
    /// [`EngineStopped`] if the consensus engine actor is gone.
    #[instrument(skip_all, name = "replica", fields(node = %self.name))]
    pub async fn run(mut self) -> Result<(), EngineStopped> {
        info!("replica started");
        loop {
            while self.pending.is_empty() {
                if !self.inbox_open {
                    info!("inbox closed, replica stopping");
                    return Ok(());
                }
                match self.rx.recv().await {
                    Some(msg) => self.handle(msg),
                    None => self.inbox_open = false,
                }
            }

            self.catch_up().await?;

            // A head command whose decision was observed during catch-up
            // must not be proposed again.
            if let Some(head) = self.pending.front() {
                if let Some(response) = self.ledger.replay(&head.command.id) {
                    debug!(id = %head.command.id, "head already decided, replaying response");
                    let head = self.pending.pop_front().expect("head exists");
                    let _ = head.reply.send(ServerReply::Outcome {
                        seq: head.command.id.seq,
                        response,
                    });
                    continue;
                }
            }

            self.propose_head().await?;
        }
    }

    /// Apply every already-decided instance after `last_applied`. These
    /// are other replicas' commands; nothing is sent anywhere.
    async fn catch_up(&mut self) -> Result<(), EngineStopped> {
        loop {
            let next = self.last_applied.next();
            match self.engine.get_decision(next).await? {
                Some(command) => {
                    trace!(instance = %next, %command, "catching up");
                    let _ = self.ledger.apply(&command);
                    self.last_applied = next;
                }
                None => return Ok(()),
            }
        }
    }

    /// Propose the head of the queue for the next instance, draining the
    /// inbox while the proposal is in flight so submissions keep
    /// queueing and heartbeats keep getting answered.
    async fn propose_head(&mut self) -> Result<(), EngineStopped> {
        let head = self.pending.front().expect("propose_head needs a head");
        let command = head.command.clone();
        let instance = self.last_applied.next();
        debug!(%instance, %command, "proposing");

        let engine = self.engine.clone();
        let deadline = self.config.propose_timeout;
        let propose = engine.propose(instance, command.clone(), deadline);
        tokio::pin!(propose);

        let outcome = loop {
            tokio::select! {
                outcome = &mut propose => break outcome?,
                msg = self.rx.recv(), if self.inbox_open => match msg {
                    Some(msg) => self.handle(msg),
                    None => self.inbox_open = false,
                },
            }
        };

        match outcome {
            ProposeReply::Decided(decided) => {
                let response = self.ledger.apply(&decided);
                self.last_applied = instance;
                if decided.id == command.id {
                    debug!(%instance, id = %command.id, "command decided and applied");
                    let head = self.pending.pop_front().expect("head exists");
                    let _ = head.reply.send(ServerReply::Outcome {
                        seq: command.id.seq,
                        response,
                    });
                } else {
                    // Someone else's command took this instance; ours
                    // stays queued for the next one.
                    debug!(%instance, winner = %decided, "lost the instance, retrying");
                }
            }
            ProposeReply::Aborted => {
                debug!(%instance, id = %command.id, "proposal aborted");
                let head = self.pending.pop_front().expect("head exists");
                let _ = head.reply.send(ServerReply::Abort {
                    seq: command.id.seq,
                });
            }
            ProposeReply::TimedOut => {
                warn!(%instance, id = %command.id, "proposal timed out");
                let head = self.pending.pop_front().expect("head exists");
                let _ = head.reply.send(ServerReply::Timeout {
                    seq: command.id.seq,
                });
            }
        }
        Ok(())
    }

    fn handle(&mut self, msg: ReplicaMsg) {
        match msg {
            ReplicaMsg::Submit { command, reply } => {
                trace!(%command, "command queued");
                self.pending.push_back(PendingCommand { command, reply });
            }
            ReplicaMsg::Heartbeat { reply } => {
                let _ = reply.send(self.name.clone());
            }
        }
    }
}
