//! Shared models: code addresses and call/return transitions
//!
//! These are value types used by every feature of the engine, so they live in
//! shared/models to avoid circular dependencies between the fixpoint and
//! domain layers.

pub mod addr;
pub mod transition;

pub use addr::Addr;
pub use transition::Transition;
