//! Durable delivery state
//!
//! The store holds the path -> record map behind one lock and persists it as
//! a single JSON document; recovery re-queues records left mid-flight by a
//! previous run.

mod recovery;
mod store;

pub use recovery::recover;
pub use store::StateStore;
