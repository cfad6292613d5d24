//! aerial-reconcile
//!
//! Per-route reconciliation of vehicle presence.
//!
//! - `plan_movements` is deterministic, pure logic over a stop order and two
//!   presence sets. No IO.
//! - `reconcile_route` runs one pass against the store: topology refresh on
//!   full passes, presence delta, movement inference, event publication.
//! - Events go out in the order the planner yields them.

mod engine;
mod pass;
mod publisher;
mod types;

pub use engine::plan_movements;
pub use pass::reconcile_route;
pub use publisher::EventPublisher;
pub use types::*;
