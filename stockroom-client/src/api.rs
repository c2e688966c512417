//! Typed front-end API over the backend.

use core::fmt;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, trace, warn};

use stockroom_core::{ClientId, Command, CommandId, CommandKind, Response, ServerReply};

use crate::backend::BackendHandle;

/// Retry policy for one store call. The attempt budget is shared by
/// no-leader rounds and aborted proposals; a timed-out wait is terminal
/// because the command may still commit.
#[derive(Debug, Clone)]
pub struct SubmitConfig {
    pub attempts: u32,
    /// How long to wait for the leader oracle.
    pub leader_wait: Duration,
    /// How long to wait for the replica's reply.
    pub reply_wait: Duration,
    /// Pause before the next attempt when there is no leader.
    pub retry_pause: Duration,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            leader_wait: Duration::from_secs(1),
            reply_wait: Duration::from_secs(6),
            retry_pause: Duration::from_secs(1),
        }
    }
}

/// What a store call can come back with, besides its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    DuplicateItem,
    NoSuchItem,
    InsufficientStock,
    /// No reply in time. The command may or may not have committed.
    Timeout,
    /// Retries exhausted without reaching a leader that would commit.
    Unavailable,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::DuplicateItem => f.write_str("duplicate item"),
            StoreError::NoSuchItem => f.write_str("no such item"),
            StoreError::InsufficientStock => f.write_str("insufficient stock"),
            StoreError::Timeout => f.write_str("timed out"),
            StoreError::Unavailable => f.write_str("store unavailable"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Handle to the store for one client. Submits one command at a time;
/// sequence numbers are monotonic per client, which is what lets the
/// replicas deduplicate a command that decides twice.
pub struct StockClient {
    id: ClientId,
    seq: u64,
    backend: BackendHandle,
    config: SubmitConfig,
}

impl StockClient {
    #[must_use]
    pub fn new(id: ClientId, backend: BackendHandle) -> Self {
        Self::with_config(id, backend, SubmitConfig::default())
    }

    #[must_use]
    pub fn with_config(id: ClientId, backend: BackendHandle, config: SubmitConfig) -> Self {
        Self {
            id,
            seq: 0,
            backend,
            config,
        }
    }

    /// The replica currently trusted by this client's backend.
    pub async fn leader(&self) -> Option<stockroom_core::ReplicaId> {
        self.backend.get_leader().await
    }

    /// # Errors
    /// [`StoreError::DuplicateItem`] if the item already exists, or a
    /// delivery failure.
    ///
    /// # Panics
    /// Panics if `item` is empty.
    pub async fn create_item(&mut self, item: &str) -> Result<(), StoreError> {
        match self.call(item, CommandKind::CreateItem).await? {
            Response::CreateItemOk => Ok(()),
            Response::ErrDuplicateItem => Err(StoreError::DuplicateItem),
            other => Err(unexpected("create_item", &other)),
        }
    }

    /// # Errors
    /// [`StoreError::NoSuchItem`] if the item does not exist, or a
    /// delivery failure.
    ///
    /// # Panics
    /// Panics if `item` is empty.
    pub async fn delete_item(&mut self, item: &str) -> Result<(), StoreError> {
        match self.call(item, CommandKind::DeleteItem).await? {
            Response::DeleteItemOk => Ok(()),
            Response::ErrNoSuchItem => Err(StoreError::NoSuchItem),
            other => Err(unexpected("delete_item", &other)),
        }
    }

    /// Returns the new stock level.
    ///
    /// # Errors
    /// [`StoreError::NoSuchItem`] if the item does not exist, or a
    /// delivery failure.
    ///
    /// # Panics
    /// Panics if `item` is empty or `qty` is zero.
    pub async fn add_stock(&mut self, item: &str, qty: u64) -> Result<u64, StoreError> {
        assert!(qty >= 1, "quantity must be at least 1");
        match self.call(item, CommandKind::AddStock { qty }).await? {
            Response::AddStockOk(level) => Ok(level),
            Response::ErrNoSuchItem => Err(StoreError::NoSuchItem),
            other => Err(unexpected("add_stock", &other)),
        }
    }

    /// Returns the new stock level.
    ///
    /// # Errors
    /// [`StoreError::NoSuchItem`] or [`StoreError::InsufficientStock`],
    /// or a delivery failure.
    ///
    /// # Panics
    /// Panics if `item` is empty or `qty` is zero.
    pub async fn remove_stock(&mut self, item: &str, qty: u64) -> Result<u64, StoreError> {
        assert!(qty >= 1, "quantity must be at least 1");
        match self.call(item, CommandKind::RemoveStock { qty }).await? {
            Response::RemoveStockOk(level) => Ok(level),
            Response::ErrNoSuchItem => Err(StoreError::NoSuchItem),
            Response::ErrInsufficientStock => Err(StoreError::InsufficientStock),
            other => Err(unexpected("remove_stock", &other)),
        }
    }

    /// Returns the current stock level. Linearized through consensus
    /// like every other command, so it reads its own writes across
    /// replicas.
    ///
    /// # Errors
    /// [`StoreError::NoSuchItem`] if the item does not exist, or a
    /// delivery failure.
    ///
    /// # Panics
    /// Panics if `item` is empty.
    pub async fn query_stock(&mut self, item: &str) -> Result<u64, StoreError> {
        match self.call(item, CommandKind::QueryStock).await? {
            Response::QueryStockOk(level) => Ok(level),
            Response::ErrNoSuchItem => Err(StoreError::NoSuchItem),
            other => Err(unexpected("query_stock", &other)),
        }
    }

    async fn call(&mut self, item: &str, kind: CommandKind) -> Result<Response, StoreError> {
        assert!(!item.is_empty(), "item name must not be empty");

        self.seq += 1;
        let command = Command {
            id: CommandId {
                client: self.id,
                seq: self.seq,
            },
            item: item.to_owned(),
            kind,
        };

        for attempt in 1..=self.config.attempts {
            let leader = timeout(self.config.leader_wait, self.backend.get_leader())
                .await
                .ok()
                .flatten();
            let Some(leader) = leader else {
                debug!(attempt, "no leader, waiting");
                sleep(self.config.retry_pause).await;
                continue;
            };

            trace!(attempt, %leader, %command, "submitting");
            let Ok(reply) = self.backend.submit(leader, command.clone()) else {
                return Err(StoreError::Unavailable);
            };

            match timeout(self.config.reply_wait, reply).await {
                Err(_elapsed) => {
                    debug!(attempt, "no reply in time");
                    return Err(StoreError::Timeout);
                }
                Ok(Err(_superseded)) => {
                    debug!(attempt, "submission dropped by backend");
                    sleep(self.config.retry_pause).await;
                }
                Ok(Ok(ServerReply::Outcome { response, .. })) => return Ok(response),
                Ok(Ok(ServerReply::Abort { .. })) => {
                    debug!(attempt, "proposal aborted, retrying");
                }
                Ok(Ok(ServerReply::Timeout { .. })) => return Err(StoreError::Timeout),
                Ok(Ok(ServerReply::HeartbeatReply(_))) => {
                    // The backend never routes heartbeat replies here.
                    debug!(attempt, "unexpected reply kind");
                }
            }
        }

        debug!("attempts exhausted");
        Err(StoreError::Unavailable)
    }
}

fn unexpected(operation: &'static str, response: &Response) -> StoreError {
    warn!(operation, ?response, "response does not match the operation");
    StoreError::Unavailable
}
