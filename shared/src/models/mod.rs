//! Reference-data and reporting records
//!
//! One file per persisted record type. These mirror the documents the
//! back office maintains; this core reads them and only ever writes
//! `cash_sessions`.

pub mod cash_session;
pub mod category;
pub mod customer;
pub mod employee;
pub mod settings;
pub mod table;

pub mod product;

pub use cash_session::*;
pub use category::*;
pub use customer::*;
pub use employee::*;
pub use product::*;
pub use settings::*;
pub use table::*;
