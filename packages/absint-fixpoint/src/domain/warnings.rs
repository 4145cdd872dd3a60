//! Analysis warnings
//!
//! Domains report imprecision and suspicious program behavior as warnings.
//! During evaluation they post into a [`WarningsChannel`], a shared mutable
//! container that the state space resets on every state write so warnings
//! never leak across re-evaluations of the same point. The persistent record
//! is the [`WarningsMap`], which also remembers the iteration at which a
//! point first produced warnings.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// How serious a warning is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WarningSeverity {
    /// Informational, e.g. a heuristic decision was taken
    Info,
    /// The analysis result may be imprecise or the program may misbehave
    Warning,
}

/// One warning produced by a domain operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningMessage {
    pub severity: WarningSeverity,
    pub message: String,
}

impl WarningMessage {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: WarningSeverity::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: WarningSeverity::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for WarningMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            WarningSeverity::Info => write!(f, "[info] {}", self.message),
            WarningSeverity::Warning => write!(f, "[warning] {}", self.message),
        }
    }
}

/// The channel domains post warnings into during evaluation.
///
/// The channel is shared: cloning it yields a handle to the same container,
/// which is how one channel instance is threaded through every domain of a
/// state. It is reset (replaced by a fresh container) each time a state is
/// written into the state space, so the only reliable record of warnings is
/// the [`WarningsMap`] filled by the engine after each evaluation.
#[derive(Debug, Clone, Default)]
pub struct WarningsChannel {
    inner: Arc<Mutex<Vec<WarningMessage>>>,
}

impl WarningsChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a warning on the channel
    pub fn add(&self, warning: WarningMessage) {
        self.inner.lock().push(warning);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Copy of the warnings currently on the channel
    pub fn snapshot(&self) -> Vec<WarningMessage> {
        self.inner.lock().clone()
    }
}

/// Persistent log of warnings per program point.
///
/// Keyed by the point the warnings were produced at, ordered by the point's
/// natural order. The state at a point only grows during the analysis, so a
/// warning once raised does not disappear again; it is enough to remember the
/// first iteration it occurred at.
#[derive(Debug, Clone, Default)]
pub struct WarningsMap<P: Ord> {
    map: BTreeMap<P, Vec<WarningMessage>>,
    iteration_of_occurrence: BTreeMap<P, usize>,
}

impl<P: Ord + Clone + fmt::Display> WarningsMap<P> {
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
            iteration_of_occurrence: BTreeMap::new(),
        }
    }

    /// Warnings recorded for a program point (empty slice if none)
    pub fn get(&self, location: &P) -> &[WarningMessage] {
        self.map.get(location).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iteration count at which the point first produced warnings
    pub fn iteration_of_warnings(&self, location: &P) -> Option<usize> {
        self.iteration_of_occurrence.get(location).copied()
    }

    /// Associate the warnings on a channel with the point they were emitted
    /// at and the iteration number of that evaluation. Empty channels are
    /// not recorded.
    pub fn put(&mut self, location: P, iteration: usize, warnings: &WarningsChannel) {
        if warnings.is_empty() {
            return;
        }
        self.map.insert(location.clone(), warnings.snapshot());
        // only the first occurrence is remembered
        self.iteration_of_occurrence
            .entry(location)
            .or_insert(iteration);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&P, &[WarningMessage])> {
        self.map.iter().map(|(p, w)| (p, w.as_slice()))
    }

    pub fn total_warnings(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<P: Ord + Clone + fmt::Display> fmt::Display for WarningsMap<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Warnings: {}", self.total_warnings())?;
        for (location, warnings) in self.iter() {
            for warning in warnings {
                writeln!(f, "  {location}: {warning}")?;
            }
        }
        Ok(())
    }
}
