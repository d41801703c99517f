//! Shared domain types for the POS core
//!
//! Record shapes persisted to the data store and read by the serving,
//! kitchen, and back-office terminals. Field names serialize in
//! camelCase: they are the wire contract other terminals depend on.

pub mod models;
pub mod order;
pub mod util;
