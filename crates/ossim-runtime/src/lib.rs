//! OS Simulator Runtime
//!
//! Wraps the pure `ossim-core` engine for concurrent use:
//! - one lock serializing every command and tick
//! - a cancellable automatic ticker per run
//! - seeded entropy for probability-driven I/O

mod config;
mod controller;
mod ticker;

pub use config::{RuntimeConfig, DEFAULT_TICK_INTERVAL};
pub use controller::Controller;
