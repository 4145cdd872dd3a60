//! Per-state analysis context
//!
//! The fixpoint engine injects data into the domains through the context
//! attached to every abstract state: the current program location (if known),
//! the platform/environment settings of the run, and the warnings channel.
//! Collecting these in one value keeps the transfer-function signatures of
//! the domains free of extra parameters that only some domains need.

use std::fmt;
use std::sync::Arc;

use crate::domain::warnings::{WarningMessage, WarningsChannel};
use crate::features::fixpoint::ProgramCtx;

/// Platform and analysis-wide settings shared by all domain states.
/// Immutable for the duration of one analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisEnvironment {
    /// Name of the analyzed platform, e.g. "x86-64"
    pub platform: String,
    /// Width of native addresses and registers in bits
    pub address_width: u32,
}

impl Default for AnalysisEnvironment {
    fn default() -> Self {
        Self {
            platform: "unknown".to_string(),
            address_width: 64,
        }
    }
}

/// Context of the current analysis, attached to every abstract state.
#[derive(Debug, Clone, Default)]
pub struct AnalysisCtx {
    location: Option<ProgramCtx>,
    environment: Arc<AnalysisEnvironment>,
    warnings: WarningsChannel,
}

impl AnalysisCtx {
    /// Context at the very start of an analysis: environment known, location
    /// not yet.
    pub fn new(environment: Arc<AnalysisEnvironment>) -> Self {
        Self {
            location: None,
            environment,
            warnings: WarningsChannel::new(),
        }
    }

    pub fn at(
        location: Option<ProgramCtx>,
        environment: Arc<AnalysisEnvironment>,
        warnings: WarningsChannel,
    ) -> Self {
        Self {
            location,
            environment,
            warnings,
        }
    }

    /// Context with default environment and a fresh warnings channel. Useful
    /// for initializing domain states in tests where most of the context is
    /// not needed but a warnings channel is.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// This context with the location information removed. Used when a
    /// transfer function must not depend on the location.
    pub fn without_location(&self) -> Self {
        Self {
            location: None,
            environment: Arc::clone(&self.environment),
            warnings: self.warnings.clone(),
        }
    }

    /// The current location of the fixpoint analysis, if known
    pub fn location(&self) -> Option<&ProgramCtx> {
        self.location.as_ref()
    }

    /// Platform and other environment-specific settings
    pub fn environment(&self) -> &Arc<AnalysisEnvironment> {
        &self.environment
    }

    /// The channel used to post warnings during domain operations.
    ///
    /// The channel is reset whenever a state is written into the state
    /// space, so the warnings of a finished analysis must be queried from
    /// the engine's warnings map, not from here.
    pub fn warnings_channel(&self) -> &WarningsChannel {
        &self.warnings
    }

    /// Post a new warning on the warnings channel
    pub fn add_warning(&self, warning: WarningMessage) {
        self.warnings.add(warning);
    }
}

impl fmt::Display for AnalysisCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "ctx@{location}"),
            None => write!(f, "ctx@?"),
        }
    }
}
