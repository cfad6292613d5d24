//! aerial-daemon library target.
//!
//! Exposes state, bootstrap builders and the route scheduler for
//! integration tests. The binary `main.rs` depends on this library target.

pub mod bootstrap;
pub mod scheduler;
pub mod state;
