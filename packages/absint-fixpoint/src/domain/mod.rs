//! Abstract-domain contract
//!
//! The engine never looks inside an abstract state. Everything it needs from
//! a collaborating domain is the semi-lattice contract in [`lattice`] plus
//! the per-state analysis context in [`context`]: where the state currently
//! is, the shared environment handle, and the channel domains post warnings
//! into.

pub mod context;
pub mod lattice;
pub mod warnings;

pub use context::{AnalysisCtx, AnalysisEnvironment};
pub use lattice::AbstractState;
pub use warnings::{WarningMessage, WarningSeverity, WarningsChannel, WarningsMap};
