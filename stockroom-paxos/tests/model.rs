//! Stateright model checker tests for one consensus instance.
//!
//! The acceptor and proposer logic here is the same pure core the
//! production engine runs ([`stockroom_paxos::core`]), wired into
//! Stateright actors, so the checker explores the interleavings of the
//! actual implementation rather than a re-transcription of it.

use std::borrow::Cow;
use std::sync::Arc;

use stateright::actor::{Actor, ActorModel, Id, Network, Out};
use stateright::{Checker, Model};

use stockroom_core::{Instance, ReplicaId};
use stockroom_paxos::PaxosMsg;
use stockroom_paxos::ballot::Ballot;
use stockroom_paxos::core::{
    AcceptOutcome, AcceptedOutcome, AcceptorState, PrepareOutcome, PromiseOutcome, ProposerState,
};

type Value = u64;

/// The single instance under test.
const INSTANCE: Instance = Instance(1);

fn sender(src: Id) -> ReplicaId {
    ReplicaId::new(format!("n{}", usize::from(src)))
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
enum ModelActor {
    Acceptor,
    Proposer {
        /// This proposer's fixed ballot, as a [`stockroom_paxos::BallotClock`]
        /// would allocate it: unique per proposer.
        ballot: u64,
        value: Value,
        acceptor_ids: Vec<Id>,
    },
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
enum ModelState {
    Acceptor(AcceptorState<Value>),
    Proposing(ProposerState<Value>),
    Decided(Value),
    Failed,
}

impl Actor for ModelActor {
    type Msg = PaxosMsg<Value>;
    type State = ModelState;
    type Timer = ();
    type Storage = ();
    type Random = ();

    fn on_start(&self, _id: Id, _storage: &Option<Self::Storage>, o: &mut Out<Self>) -> Self::State {
        match self {
            ModelActor::Acceptor => ModelState::Acceptor(AcceptorState::new()),
            ModelActor::Proposer {
                ballot,
                value,
                acceptor_ids,
            } => {
                let ballot = Ballot::from_raw(*ballot);
                let quorum = acceptor_ids.len() / 2 + 1;
                for &acc in acceptor_ids {
                    o.send(
                        acc,
                        PaxosMsg::Prepare {
                            instance: INSTANCE,
                            ballot,
                        },
                    );
                }
                ModelState::Proposing(ProposerState::new(ballot, *value, quorum))
            }
        }
    }

    fn on_msg(
        &self,
        _id: Id,
        state: &mut Cow<Self::State>,
        src: Id,
        msg: Self::Msg,
        o: &mut Out<Self>,
    ) {
        match (self, state.as_ref().clone()) {
            (ModelActor::Acceptor, ModelState::Acceptor(acc)) => {
                Self::on_acceptor_msg(acc, state, src, msg, o);
            }
            (ModelActor::Proposer { acceptor_ids, .. }, ModelState::Proposing(prop)) => {
                Self::on_proposer_msg(acceptor_ids, prop, state, src, msg, o);
            }
            _ => {}
        }
    }
}

impl ModelActor {
    fn on_acceptor_msg(
        mut acc: AcceptorState<Value>,
        state: &mut Cow<ModelState>,
        src: Id,
        msg: PaxosMsg<Value>,
        o: &mut Out<Self>,
    ) {
        match msg {
            PaxosMsg::Prepare { instance, ballot } => {
                let reply = match acc.prepare(ballot) {
                    PrepareOutcome::Promised { accepted } => PaxosMsg::Prepared {
                        instance,
                        ballot,
                        accepted,
                    },
                    PrepareOutcome::Rejected => PaxosMsg::Nack { instance, ballot },
                };
                *state.to_mut() = ModelState::Acceptor(acc);
                o.send(src, reply);
            }
            PaxosMsg::Accept {
                instance,
                ballot,
                value,
            } => {
                let reply = match acc.accept(ballot, value) {
                    AcceptOutcome::Accepted => PaxosMsg::Accepted { instance, ballot },
                    AcceptOutcome::Rejected => PaxosMsg::Nack { instance, ballot },
                };
                *state.to_mut() = ModelState::Acceptor(acc);
                o.send(src, reply);
            }
            _ => {}
        }
    }

    fn on_proposer_msg(
        acceptor_ids: &[Id],
        mut prop: ProposerState<Value>,
        state: &mut Cow<ModelState>,
        src: Id,
        msg: PaxosMsg<Value>,
        o: &mut Out<Self>,
    ) {
        match msg {
            PaxosMsg::Prepared {
                ballot, accepted, ..
            } if prop.matches(ballot) => {
                match prop.record_promise(sender(src), accepted) {
                    PromiseOutcome::Pending => {}
                    PromiseOutcome::StartAccept(value) => {
                        for &acc in acceptor_ids {
                            o.send(
                                acc,
                                PaxosMsg::Accept {
                                    instance: INSTANCE,
                                    ballot,
                                    value,
                                },
                            );
                        }
                    }
                }
                *state.to_mut() = ModelState::Proposing(prop);
            }
            PaxosMsg::Accepted { ballot, .. } if prop.matches(ballot) => {
                match prop.record_accepted(sender(src)) {
                    AcceptedOutcome::Pending => {
                        *state.to_mut() = ModelState::Proposing(prop);
                    }
                    AcceptedOutcome::Decided => {
                        let value = prop.finish().expect("decided attempt has a value");
                        *state.to_mut() = ModelState::Decided(value);
                    }
                }
            }
            PaxosMsg::Nack { ballot, .. } if prop.matches(ballot) => {
                // No retries in the model; one attempt per proposer keeps
                // the state space small.
                *state.to_mut() = ModelState::Failed;
            }
            _ => {}
        }
    }
}

fn paxos_model(num_acceptors: usize, values: &[Value]) -> ActorModel<ModelActor, (), ()> {
    let acceptor_ids: Vec<Id> = (0..num_acceptors).map(Id::from).collect();

    let mut model = ActorModel::new((), ()).init_network(Network::new_ordered([]));

    for _ in 0..num_acceptors {
        model = model.actor(ModelActor::Acceptor);
    }

    for (i, &value) in values.iter().enumerate() {
        model = model.actor(ModelActor::Proposer {
            // Disjoint ballots, as the clock would hand them out.
            ballot: (i + 1) as u64,
            value,
            acceptor_ids: acceptor_ids.clone(),
        });
    }

    model = model.property(stateright::Expectation::Always, "agreement", |_, state| {
        let decided: Vec<Value> = state
            .actor_states
            .iter()
            .filter_map(|s: &Arc<ModelState>| match s.as_ref() {
                ModelState::Decided(v) => Some(*v),
                _ => None,
            })
            .collect();
        decided.windows(2).all(|w| w[0] == w[1])
    });

    model.property(stateright::Expectation::Always, "validity", |model, state| {
        let proposed: Vec<Value> = model
            .actors
            .iter()
            .filter_map(|a| match a {
                ModelActor::Proposer { value, .. } => Some(*value),
                _ => None,
            })
            .collect();
        state
            .actor_states
            .iter()
            .all(|s: &Arc<ModelState>| match s.as_ref() {
                ModelState::Decided(v) => proposed.contains(v),
                _ => true,
            })
    })
}

#[test]
fn check_single_proposer() {
    let model = paxos_model(3, &[10]);
    let checker = model.checker().threads(num_cpus::get()).spawn_bfs().join();
    checker.assert_properties();
    println!(
        "single proposer: {} states explored",
        checker.unique_state_count()
    );
}

#[test]
fn check_two_competing_proposers() {
    let model = paxos_model(3, &[10, 20]);
    let checker = model.checker().threads(num_cpus::get()).spawn_bfs().join();
    checker.assert_properties();
    println!(
        "two proposers: {} states explored",
        checker.unique_state_count()
    );
}
