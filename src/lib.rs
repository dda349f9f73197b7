//! Cache Ledger - Observable cache layer with tag propagation and audit trail.

pub mod audit;
pub mod caller;
pub mod config;
pub mod events;
pub mod facade;
pub mod manager;
pub mod recorder;
pub mod store;
pub mod summary;
pub mod tags;
