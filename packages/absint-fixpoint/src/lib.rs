/*
 * absint-fixpoint - Interprocedural Fixpoint Engine
 *
 * Feature-First Architecture:
 * - shared/      : Common models (Addr, Transition)
 * - features/    : Vertical slice (call strings → flows → worklist → state space → driver)
 * - domain/      : The abstract-domain contract (AbstractState, AnalysisCtx, warnings)
 *
 * The engine computes a context-sensitive fixpoint over the reconstructed
 * control flow of a binary program: the call-strings approach of Sharir and
 * Pnueli bounds the calling context, widening at back-edges bounds the
 * iteration. Callers plug in an abstract domain through the AbstractState
 * trait and the instruction semantics through the TransferFunction trait.
 */

#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::module_inception)] // Module naming intentional

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports - Feature-First Architecture
// ═══════════════════════════════════════════════════════════════════════════

/// Shared models and utilities
pub mod shared;

/// Feature modules (fixpoint iteration slice)
pub mod features;

/// Abstract-domain contract and analysis context
pub mod domain;

/// Engine configuration
pub mod config;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::{EngineConfig, WorklistOrder};
pub use domain::{
    AbstractState, AnalysisCtx, AnalysisEnvironment, WarningMessage, WarningSeverity,
    WarningsChannel, WarningsMap,
};
pub use errors::{EngineError, Result};
pub use features::fixpoint::{
    address_backedge, BackedgePolicy, CallString, FixpointEngine, FlowKind, Flows,
    ProceduralTransitions, ProgramCtx, ProgramPoint, StateSpace, Successor, TransferFunction,
    TransitionSystem, Worklist,
};
pub use shared::models::{Addr, Transition};
