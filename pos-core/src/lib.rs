//! Restaurant order lifecycle and cash reconciliation engine
//!
//! Terminals embed this crate and talk to each other only through the
//! durable store: every mutation rewrites a full record snapshot and
//! the change feed tells the other screens to re-read. There is no
//! in-process coordination beyond that.

pub mod common;
pub mod config;
pub mod identity;
pub mod kitchen;
pub mod orders;
pub mod sessions;
pub mod settlement;
pub mod store;

pub use config::Config;
pub use identity::Actor;
pub use store::{ChangeEvent, DataStore, LiveQuery, StoreError};
