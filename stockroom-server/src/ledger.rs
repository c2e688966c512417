//! The deterministic application state: item stock levels plus the
//! per-client session record that makes command application idempotent.

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use stockroom_core::{ClientId, Command, CommandId, CommandKind, Response};

/// Stock levels by item, plus one `(seq, response)` entry per client.
///
/// The session entries are part of the replicated state: every replica
/// applies the same commands in the same order, so every replica holds
/// the same entries. They exist because an aborted proposal's value can
/// be resurrected by a later proposer and decided a second time in a
/// later instance; re-applying it must not double-count stock.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StockLedger {
    items: BTreeMap<String, u64>,
    sessions: HashMap<ClientId, (u64, Response)>,
}

impl StockLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one decided command, returning its response. Pure function
    /// of the ledger state and the command; replicas stay in lock-step
    /// by calling this in decision order.
    ///
    /// A command whose sequence number was already applied for its
    /// client returns the recorded response without touching the items.
    pub fn apply(&mut self, command: &Command) -> Response {
        if let Some(response) = self.replay(&command.id) {
            trace!(id = %command.id, "duplicate command, replaying recorded response");
            return response;
        }

        let response = self.execute(command);
        self.sessions
            .insert(command.id.client, (command.id.seq, response.clone()));
        response
    }

    /// The recorded response if this command was already applied.
    #[must_use]
    pub fn replay(&self, id: &CommandId) -> Option<Response> {
        let (seq, response) = self.sessions.get(&id.client)?;
        (id.seq <= *seq).then(|| response.clone())
    }

    fn execute(&mut self, command: &Command) -> Response {
        let item = &command.item;
        match command.kind {
            CommandKind::CreateItem => {
                if self.items.contains_key(item) {
                    Response::ErrDuplicateItem
                } else {
                    self.items.insert(item.clone(), 0);
                    Response::CreateItemOk
                }
            }
            CommandKind::DeleteItem => {
                if self.items.remove(item).is_some() {
                    Response::DeleteItemOk
                } else {
                    Response::ErrNoSuchItem
                }
            }
            CommandKind::AddStock { qty } => match self.items.get_mut(item) {
                Some(level) => {
                    *level += qty;
                    Response::AddStockOk(*level)
                }
                None => Response::ErrNoSuchItem,
            },
            CommandKind::RemoveStock { qty } => match self.items.get_mut(item) {
                Some(level) if *level >= qty => {
                    *level -= qty;
                    Response::RemoveStockOk(*level)
                }
                Some(_) => Response::ErrInsufficientStock,
                None => Response::ErrNoSuchItem,
            },
            CommandKind::QueryStock => match self.items.get(item) {
                Some(level) => Response::QueryStockOk(*level),
                None => Response::ErrNoSuchItem,
            },
        }
    }

    /// Current stock level of `item`, if it exists.
    #[must_use]
    pub fn level(&self, item: &str) -> Option<u64> {
        self.items.get(item).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(seq: u64, item: &str, kind: CommandKind) -> Command {
        Command {
            id: CommandId {
                client: ClientId(1),
                seq,
            },
            item: item.to_owned(),
            kind,
        }
    }

    #[test]
    fn create_then_add_then_query() {
        let mut ledger = StockLedger::new();
        assert_eq!(
            ledger.apply(&cmd(1, "cheese", CommandKind::CreateItem)),
            Response::CreateItemOk
        );
        assert_eq!(
            ledger.apply(&cmd(2, "cheese", CommandKind::AddStock { qty: 10 })),
            Response::AddStockOk(10)
        );
        assert_eq!(
            ledger.apply(&cmd(3, "cheese", CommandKind::QueryStock)),
            Response::QueryStockOk(10)
        );
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let mut ledger = StockLedger::new();
        ledger.apply(&cmd(1, "bread", CommandKind::CreateItem));
        assert_eq!(
            ledger.apply(&cmd(2, "bread", CommandKind::CreateItem)),
            Response::ErrDuplicateItem
        );
    }

    #[test]
    fn delete_allows_recreation() {
        let mut ledger = StockLedger::new();
        ledger.apply(&cmd(1, "bread", CommandKind::CreateItem));
        assert_eq!(
            ledger.apply(&cmd(2, "bread", CommandKind::DeleteItem)),
            Response::DeleteItemOk
        );
        assert_eq!(
            ledger.apply(&cmd(3, "bread", CommandKind::CreateItem)),
            Response::CreateItemOk
        );
        assert_eq!(ledger.level("bread"), Some(0));
    }

    #[test]
    fn remove_below_zero_is_rejected() {
        let mut ledger = StockLedger::new();
        ledger.apply(&cmd(1, "milk", CommandKind::CreateItem));
        ledger.apply(&cmd(2, "milk", CommandKind::AddStock { qty: 3 }));
        assert_eq!(
            ledger.apply(&cmd(3, "milk", CommandKind::RemoveStock { qty: 5 })),
            Response::ErrInsufficientStock
        );
        // The failed removal must not change the level.
        assert_eq!(ledger.level("milk"), Some(3));
    }

    #[test]
    fn operations_on_missing_items_are_rejected() {
        let mut ledger = StockLedger::new();
        assert_eq!(
            ledger.apply(&cmd(1, "ghost", CommandKind::AddStock { qty: 1 })),
            Response::ErrNoSuchItem
        );
        assert_eq!(
            ledger.apply(&cmd(2, "ghost", CommandKind::RemoveStock { qty: 1 })),
            Response::ErrNoSuchItem
        );
        assert_eq!(
            ledger.apply(&cmd(3, "ghost", CommandKind::QueryStock)),
            Response::ErrNoSuchItem
        );
        assert_eq!(
            ledger.apply(&cmd(4, "ghost", CommandKind::DeleteItem)),
            Response::ErrNoSuchItem
        );
    }

    #[test]
    fn level_tracks_adds_and_removes_exactly() {
        let mut ledger = StockLedger::new();
        ledger.apply(&cmd(1, "nails", CommandKind::CreateItem));
        let mut expected = 0u64;
        let mut seq = 1;
        for (add, remove) in [(10, 4), (7, 7), (1, 0), (0, 5)] {
            if add > 0 {
                seq += 1;
                ledger.apply(&cmd(seq, "nails", CommandKind::AddStock { qty: add }));
                expected += add;
            }
            if remove > 0 {
                seq += 1;
                let response =
                    ledger.apply(&cmd(seq, "nails", CommandKind::RemoveStock { qty: remove }));
                if expected >= remove {
                    expected -= remove;
                    assert_eq!(response, Response::RemoveStockOk(expected));
                } else {
                    assert_eq!(response, Response::ErrInsufficientStock);
                }
            }
        }
        assert_eq!(ledger.level("nails"), Some(expected));
    }

    #[test]
    fn reapplied_command_replays_without_double_counting() {
        let mut ledger = StockLedger::new();
        ledger.apply(&cmd(1, "cheese", CommandKind::CreateItem));
        let add = cmd(2, "cheese", CommandKind::AddStock { qty: 10 });
        assert_eq!(ledger.apply(&add), Response::AddStockOk(10));
        // The same command decided again in a later instance.
        assert_eq!(ledger.apply(&add), Response::AddStockOk(10));
        assert_eq!(ledger.level("cheese"), Some(10));
    }

    #[test]
    fn sessions_are_per_client() {
        let mut ledger = StockLedger::new();
        ledger.apply(&cmd(1, "cheese", CommandKind::CreateItem));
        ledger.apply(&cmd(2, "cheese", CommandKind::AddStock { qty: 5 }));
        let other = Command {
            id: CommandId {
                client: ClientId(2),
                seq: 2,
            },
            item: "cheese".to_owned(),
            kind: CommandKind::AddStock { qty: 5 },
        };
        // Same seq, different client: not a duplicate.
        assert_eq!(ledger.apply(&other), Response::AddStockOk(10));
    }
}
