//! Engine configuration
//!
//! All behavior toggles of the fixpoint engine are explicit values passed in
//! at construction time. There is no ambient/global configuration state: the
//! worklist ordering, the call-string bound and the widening switch all live
//! here and are fixed for the duration of one analysis run.

use crate::errors::{EngineError, Result};
use crate::features::fixpoint::CallString;

/// Scheduling policy of the worklist (see `features::fixpoint::Worklist`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorklistOrder {
    /// Priority queue over the natural order of program points
    /// (address first, then context). Re-enqueuing a pending point is a
    /// no-op. Favors re-visiting lower addresses, which tends to stabilize
    /// inner loops before outer control flow.
    #[default]
    GlobalOrder,
    /// LIFO stack. Re-enqueuing a pending point moves it to the top, so the
    /// most recently produced successor is processed next.
    Stack,
}

/// Configuration of one fixpoint analysis run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bound `k` on the significant part of call strings. `0` degenerates to
    /// the unbounded backlog-only mode (context-insensitive, size
    /// bookkeeping only).
    pub call_string_length: usize,
    /// Worklist scheduling policy
    pub worklist_order: WorklistOrder,
    /// Whether widening is applied at back-edges of local transitions.
    /// Disabling it is only sound on lattices of finite height.
    pub widening: bool,
}

impl EngineConfig {
    pub const DEFAULT_CALL_STRING_LENGTH: usize = CallString::DEFAULT_LENGTH;

    pub fn new() -> Self {
        Self::default()
    }

    /// Set the call-string bound `k`
    pub fn with_call_string_length(mut self, k: usize) -> Self {
        self.call_string_length = k;
        self
    }

    /// Set the worklist scheduling policy
    pub fn with_worklist_order(mut self, order: WorklistOrder) -> Self {
        self.worklist_order = order;
        self
    }

    /// Enable or disable widening at local back-edges
    pub fn with_widening(mut self, widening: bool) -> Self {
        self.widening = widening;
        self
    }

    /// Check configuration consistency
    pub fn validate(&self) -> Result<()> {
        if !self.widening && self.call_string_length == 0 {
            // without widening and without context bounds nothing guarantees
            // termination on recursive programs
            return Err(EngineError::invariant(
                "widening disabled together with unbounded call strings",
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_string_length: Self::DEFAULT_CALL_STRING_LENGTH,
            worklist_order: WorklistOrder::default(),
            widening: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(
            config.call_string_length,
            EngineConfig::DEFAULT_CALL_STRING_LENGTH
        );
        assert_eq!(config.worklist_order, WorklistOrder::GlobalOrder);
        assert!(config.widening);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_style() {
        let config = EngineConfig::new()
            .with_call_string_length(2)
            .with_worklist_order(WorklistOrder::Stack)
            .with_widening(false);
        assert_eq!(config.call_string_length, 2);
        assert_eq!(config.worklist_order, WorklistOrder::Stack);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_no_widening_needs_bounded_contexts() {
        let config = EngineConfig::new()
            .with_call_string_length(0)
            .with_widening(false);
        assert!(config.validate().is_err());
    }
}
