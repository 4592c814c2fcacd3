//! Execution History Module
//!
//! Persistence for past execution records, backing the aggregate
//! metrics. One JSON blob holds the whole collection.

pub mod store;

pub use store::{HistoryStore, StoreError};
