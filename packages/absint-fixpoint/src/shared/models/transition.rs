//! Call/return transitions
//!
//! A transition is one interprocedural control-flow edge: the address of the
//! call (or return) instruction and the address it transfers control to.
//! Transitions are the letters of the call-string alphabet.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shared::models::Addr;

/// One call or return edge, identified by its source and target address.
/// Immutable value type; equality and hashing cover both fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Transition {
    source: Addr,
    target: Addr,
}

impl Transition {
    pub fn new(source: Addr, target: Addr) -> Self {
        Self { source, target }
    }

    /// Address of the instruction performing the transfer
    pub fn source(&self) -> Addr {
        self.source
    }

    /// Address control is transferred to (for calls: the procedure entry)
    pub fn target(&self) -> Addr {
        self.target
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}\u{bb}{}>", self.source, self.target)
    }
}
