// storefront/src/models/mod.rs

//! Order records and the values used to query and update them.

pub mod order;

pub use order::{CartLine, InsertOutcome, NewOrder, Order, OrderFilter, OrderPatch, OrderStatus, StatusChange, StatusGuard};
