//! In-process cache mutation events.
//!
//! Every mutating facade operation publishes one event after the underlying
//! store call succeeded. Delivery is synchronous and ordered: handlers run
//! in the publisher's call path, and a handler failure never reaches the
//! publisher.

mod bus;
mod payload;

pub use bus::{CacheEventHandler, EventBus};
pub use payload::{CacheEvent, ClearEvent, DeleteEvent, GeneratorRef, Operation, WriteEvent};
