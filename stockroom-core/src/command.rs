//! Commands applied to the replicated stock ledger and their responses.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::CommandId;

/// A single client operation, tagged with the identity of the submission
/// so that exactly the proposing replica can reply to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: CommandId,
    pub item: String,
    pub kind: CommandKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    CreateItem,
    DeleteItem,
    AddStock { qty: u64 },
    RemoveStock { qty: u64 },
    QueryStock,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CommandKind::CreateItem => write!(f, "create {}", self.item),
            CommandKind::DeleteItem => write!(f, "delete {}", self.item),
            CommandKind::AddStock { qty } => write!(f, "add {} {qty}", self.item),
            CommandKind::RemoveStock { qty } => write!(f, "remove {} {qty}", self.item),
            CommandKind::QueryStock => write!(f, "query {}", self.item),
        }
    }
}

/// Outcome of applying a command to the ledger. Deterministic: every
/// replica computes the same response for the same command at the same
/// instance, even though only the proposing replica sends it anywhere.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    CreateItemOk,
    DeleteItemOk,
    AddStockOk(u64),
    RemoveStockOk(u64),
    QueryStockOk(u64),
    ErrDuplicateItem,
    ErrNoSuchItem,
    ErrInsufficientStock,
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::CreateItemOk | Response::DeleteItemOk => f.write_str("ok"),
            Response::AddStockOk(n) | Response::RemoveStockOk(n) | Response::QueryStockOk(n) => {
                write!(f, "{n}")
            }
            Response::ErrDuplicateItem => f.write_str("error: duplicate item"),
            Response::ErrNoSuchItem => f.write_str("error: no such item"),
            Response::ErrInsufficientStock => f.write_str("error: insufficient stock"),
        }
    }
}
