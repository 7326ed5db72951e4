//! Tick-driven dispatch of upload workers

mod manager;
mod worker;

pub use manager::{DispatchConfig, Dispatcher};
