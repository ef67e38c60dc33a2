//! Control-database schema, the base action contract, and the built-in actions that
//! drive the phase state machine (spec C2–C4).

pub mod action;
pub mod core_actions;
pub mod phase;
pub mod schema;

pub use action::{Action, BaseAction, Duration};
pub use phase::{ActionPhase, ExecutionPhase};
