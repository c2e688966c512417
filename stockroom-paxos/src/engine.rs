//! The consensus engine actor.
//!
//! One engine per replica, owning the acceptor and proposer state of
//! every instance. It is a single-threaded mailbox actor: local callers
//! talk to it through [`EngineHandle`], the peer transport delivers wire
//! messages into the same mailbox, and each message is fully processed
//! before the next is dequeued.
//!
//! Outbound messages go to an unbounded channel the peer transport
//! drains; messages addressed to this node itself are short-circuited
//! and handled inline instead of taking a trip through the network.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, trace};

use stockroom_core::{Instance, ReplicaId};

use crate::ballot::BallotClock;
use crate::core::{
    AcceptOutcome, AcceptedOutcome, AcceptorState, PrepareOutcome, PromiseOutcome, ProposerState,
};
use crate::messages::PaxosMsg;

/// Result of a local `propose` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProposeReply<V> {
    /// The instance decided. The value may be someone else's proposal.
    Decided(V),
    /// A higher ballot nacked this attempt; retry is the caller's choice.
    Aborted,
    /// No decision within the deadline. The attempt keeps running in the
    /// background and may still decide.
    TimedOut,
}

/// The engine actor is gone. Replicas treat this as fatal: a replica
/// whose consensus module died must stop answering so clients fail over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineStopped;

impl fmt::Display for EngineStopped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("consensus engine stopped")
    }
}

impl std::error::Error for EngineStopped {}

enum Cmd<V> {
    Propose {
        instance: Instance,
        value: V,
        reply: oneshot::Sender<ProposeReply<V>>,
    },
    GetDecision {
        instance: Instance,
        reply: oneshot::Sender<Option<V>>,
    },
    Deliver {
        from: ReplicaId,
        msg: PaxosMsg<V>,
    },
}

/// Cloneable handle to a running [`Engine`].
pub struct EngineHandle<V> {
    tx: mpsc::UnboundedSender<Cmd<V>>,
}

impl<V> Clone for EngineHandle<V> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<V> EngineHandle<V> {
    /// Propose `value` for `instance` and wait for the outcome.
    ///
    /// An already-decided instance replies immediately with its existing
    /// decision. The deadline only bounds the wait: on `TimedOut` the
    /// attempt stays live and a later `get_decision` may observe its
    /// decision.
    ///
    /// # Errors
    /// [`EngineStopped`] if the engine actor is gone.
    pub async fn propose(
        &self,
        instance: Instance,
        value: V,
        deadline: Duration,
    ) -> Result<ProposeReply<V>, EngineStopped> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Cmd::Propose {
                instance,
                value,
                reply,
            })
            .map_err(|_| EngineStopped)?;
        match tokio::time::timeout(deadline, rx).await {
            Err(_elapsed) => Ok(ProposeReply::TimedOut),
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_closed)) => Err(EngineStopped),
        }
    }

    /// Read the decision of `instance`, if any. Pure local read.
    ///
    /// # Errors
    /// [`EngineStopped`] if the engine actor is gone.
    pub async fn get_decision(&self, instance: Instance) -> Result<Option<V>, EngineStopped> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Cmd::GetDecision { instance, reply })
            .map_err(|_| EngineStopped)?;
        rx.await.map_err(|_| EngineStopped)
    }

    /// Hand an inbound wire message to the engine.
    ///
    /// # Errors
    /// [`EngineStopped`] if the engine actor is gone.
    pub fn deliver(&self, from: ReplicaId, msg: PaxosMsg<V>) -> Result<(), EngineStopped> {
        self.tx
            .send(Cmd::Deliver { from, msg })
            .map_err(|_| EngineStopped)
    }
}

/// Per-instance state: always an acceptor, a proposer only while this
/// node has an attempt in flight, and at most one local waiter.
struct Slot<V> {
    acceptor: AcceptorState<V>,
    attempt: Option<Attempt<V>>,
}

struct Attempt<V> {
    proposer: ProposerState<V>,
    waiter: Option<oneshot::Sender<ProposeReply<V>>>,
}

impl<V: Clone> Default for Slot<V> {
    fn default() -> Self {
        Self {
            acceptor: AcceptorState::new(),
            attempt: None,
        }
    }
}

/// Consensus engine for one replica.
pub struct Engine<V> {
    me: ReplicaId,
    participants: Vec<ReplicaId>,
    quorum: usize,
    clock: BallotClock,
    instances: BTreeMap<Instance, Slot<V>>,
    rx: mpsc::UnboundedReceiver<Cmd<V>>,
    outbound: mpsc::UnboundedSender<(ReplicaId, PaxosMsg<V>)>,
}

impl<V: Clone + fmt::Debug + Send + 'static> Engine<V> {
    /// Build an engine for `me` within `participants` (which must
    /// contain `me`). Outbound wire messages are pushed to `outbound`
    /// for the peer transport to deliver.
    ///
    /// # Panics
    /// Panics if `me` is not in `participants`.
    #[must_use]
    pub fn new(
        me: ReplicaId,
        mut participants: Vec<ReplicaId>,
        outbound: mpsc::UnboundedSender<(ReplicaId, PaxosMsg<V>)>,
    ) -> (Self, EngineHandle<V>) {
        participants.sort();
        participants.dedup();
        let index = participants
            .iter()
            .position(|p| *p == me)
            .expect("engine node must be one of the participants");
        let clock = BallotClock::new(index, participants.len());
        let quorum = participants.len() / 2 + 1;

        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Self {
            me,
            participants,
            quorum,
            clock,
            instances: BTreeMap::new(),
            rx,
            outbound,
        };
        (engine, EngineHandle { tx })
    }

    /// Run until every handle is dropped.
    #[instrument(skip_all, name = "engine", fields(node = %self.me))]
    pub async fn run(mut self) {
        debug!(
            participants = self.participants.len(),
            quorum = self.quorum,
            "engine started"
        );
        while let Some(cmd) = self.rx.recv().await {
            match cmd {
                Cmd::Propose {
                    instance,
                    value,
                    reply,
                } => self.on_propose(instance, value, reply),
                Cmd::GetDecision { instance, reply } => {
                    let decision = self
                        .instances
                        .get(&instance)
                        .and_then(|slot| slot.acceptor.decision())
                        .cloned();
                    let _ = reply.send(decision);
                }
                Cmd::Deliver { from, msg } => self.on_message(&from, msg),
            }
        }
        debug!("engine stopped");
    }

    fn on_propose(&mut self, instance: Instance, value: V, reply: oneshot::Sender<ProposeReply<V>>) {
        let slot = self.instances.entry(instance).or_default();

        if let Some(decision) = slot.acceptor.decision() {
            trace!(%instance, "propose on decided instance");
            let _ = reply.send(ProposeReply::Decided(decision.clone()));
            return;
        }

        let ballot = self.clock.next();
        debug!(%instance, %ballot, "starting proposal");

        let slot = self.instances.entry(instance).or_default();
        slot.attempt = Some(Attempt {
            proposer: ProposerState::new(ballot, value, self.quorum),
            waiter: Some(reply),
        });

        self.broadcast(PaxosMsg::Prepare { instance, ballot });
    }

    fn on_message(&mut self, from: &ReplicaId, msg: PaxosMsg<V>) {
        match msg {
            PaxosMsg::Prepare { instance, ballot } => {
                let slot = self.instances.entry(instance).or_default();
                let reply = match slot.acceptor.prepare(ballot) {
                    PrepareOutcome::Promised { accepted } => {
                        trace!(%instance, %ballot, peer = %from, "promised");
                        PaxosMsg::Prepared {
                            instance,
                            ballot,
                            accepted,
                        }
                    }
                    PrepareOutcome::Rejected => {
                        trace!(%instance, %ballot, peer = %from, "prepare rejected");
                        PaxosMsg::Nack { instance, ballot }
                    }
                };
                self.send(from.clone(), reply);
            }

            PaxosMsg::Accept {
                instance,
                ballot,
                value,
            } => {
                let slot = self.instances.entry(instance).or_default();
                let reply = match slot.acceptor.accept(ballot, value) {
                    AcceptOutcome::Accepted => {
                        trace!(%instance, %ballot, peer = %from, "accepted");
                        PaxosMsg::Accepted { instance, ballot }
                    }
                    AcceptOutcome::Rejected => {
                        trace!(%instance, %ballot, peer = %from, "accept rejected");
                        PaxosMsg::Nack { instance, ballot }
                    }
                };
                self.send(from.clone(), reply);
            }

            PaxosMsg::Prepared {
                instance,
                ballot,
                accepted,
            } => {
                let slot = self.instances.entry(instance).or_default();
                let Some(attempt) = slot.attempt.as_mut() else {
                    trace!(%instance, %ballot, "promise without an attempt");
                    return;
                };
                if !attempt.proposer.matches(ballot) {
                    trace!(%instance, %ballot, "promise for a stale ballot");
                    return;
                }
                match attempt.proposer.record_promise(from.clone(), accepted) {
                    PromiseOutcome::Pending => {}
                    PromiseOutcome::StartAccept(value) => {
                        debug!(%instance, %ballot, "prepare quorum reached, sending accepts");
                        self.broadcast(PaxosMsg::Accept {
                            instance,
                            ballot,
                            value,
                        });
                    }
                }
            }

            PaxosMsg::Accepted { instance, ballot } => {
                let slot = self.instances.entry(instance).or_default();
                if slot.acceptor.decision().is_some() {
                    return;
                }
                let Some(attempt) = slot.attempt.as_mut() else {
                    trace!(%instance, %ballot, "accept confirmation without an attempt");
                    return;
                };
                if !attempt.proposer.matches(ballot) {
                    return;
                }
                match attempt.proposer.record_accepted(from.clone()) {
                    AcceptedOutcome::Pending => {}
                    AcceptedOutcome::Decided => {
                        let value = attempt
                            .proposer
                            .finish()
                            .expect("accept quorum implies a chosen value");
                        debug!(%instance, %ballot, "accept quorum reached, deciding");
                        if let Some(waiter) = attempt.waiter.take() {
                            let _ = waiter.send(ProposeReply::Decided(value.clone()));
                        }
                        slot.acceptor.learn(value.clone());
                        self.broadcast(PaxosMsg::Decide { instance, value });
                    }
                }
            }

            PaxosMsg::Nack { instance, ballot } => {
                let Some(slot) = self.instances.get_mut(&instance) else {
                    return;
                };
                let matches = slot
                    .attempt
                    .as_ref()
                    .is_some_and(|a| a.proposer.matches(ballot));
                if !matches {
                    return;
                }
                // A nack aborts the attempt even after accepts went out.
                debug!(%instance, %ballot, "attempt nacked, aborting");
                if let Some(mut attempt) = slot.attempt.take() {
                    if let Some(waiter) = attempt.waiter.take() {
                        let _ = waiter.send(ProposeReply::Aborted);
                    }
                }
            }

            PaxosMsg::Decide { instance, value } => {
                let slot = self.instances.entry(instance).or_default();
                if slot.acceptor.decision().is_none() {
                    debug!(%instance, "decision learned");
                }
                slot.acceptor.learn(value);
                let decided = slot
                    .acceptor
                    .decision()
                    .expect("just latched a decision")
                    .clone();
                // Whatever we were proposing here, the slot now has its
                // value; the local caller hears the decided one.
                if let Some(mut attempt) = slot.attempt.take() {
                    if let Some(waiter) = attempt.waiter.take() {
                        let _ = waiter.send(ProposeReply::Decided(decided));
                    }
                }
            }
        }
    }

    /// Send to every participant, delivering our own copy inline.
    fn broadcast(&mut self, msg: PaxosMsg<V>) {
        for peer in self.participants.clone() {
            self.send(peer, msg.clone());
        }
    }

    fn send(&mut self, to: ReplicaId, msg: PaxosMsg<V>) {
        if to == self.me {
            let me = self.me.clone();
            self.on_message(&me, msg);
        } else {
            // Transport gone means shutdown is in progress; frames are
            // fair-loss anyway.
            let _ = self.outbound.send((to, msg));
        }
    }
}
