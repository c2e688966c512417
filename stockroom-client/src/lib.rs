//! Stockroom client library.
//!
//! The [`Backend`] actor runs an eventually-strong failure detector
//! over the replica set and funnels submissions to whichever replica it
//! currently trusts as leader. [`StockClient`] is the typed front-end:
//! one call per store operation, with the bounded retry loop hidden
//! inside. The `stockroom` binary wraps it in a line-based REPL.

#![warn(clippy::pedantic)]

pub mod api;
pub mod backend;
pub mod elector;
pub mod link;
pub mod repl;

pub use api::{StockClient, StoreError, SubmitConfig};
pub use backend::{Backend, BackendHandle};
pub use elector::{ElectorConfig, ElectorState};
pub use repl::Repl;
