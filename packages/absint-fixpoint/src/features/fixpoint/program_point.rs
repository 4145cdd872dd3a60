//! Program points: the unit identity of fixpoint iteration
//!
//! A program point is whatever the engine iterates over — at minimum a code
//! address, refined by an implementation-specific notion of context. The
//! [`ProgramPoint`] trait is the seam: ordering must put lower addresses
//! first (the worklist's global-order policy relies on it), and equality,
//! hashing and ordering must be consistent with each other. [`ProgramCtx`]
//! is the context-sensitive variant used by this engine: a code address
//! paired with the call string it was reached under.

use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;

use crate::features::fixpoint::CallString;
use crate::shared::models::Addr;

/// Capability contract for fixpoint-iteration identities.
pub trait ProgramPoint: Clone + Eq + Hash + Ord + fmt::Display {
    /// The code address of this point
    fn address(&self) -> Addr;

    /// This point rebound to a new address, preserving all non-address
    /// identity (for `ProgramCtx`: the call string)
    fn with_address(&self, address: Addr) -> Self;
}

/// A program point distinguished by interprocedural context: the pair of a
/// call string and a code address. Two `ProgramCtx` are equal iff they have
/// the same address and the same call-string context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramCtx {
    call_string: CallString,
    address: Addr,
}

impl ProgramCtx {
    pub fn new(call_string: CallString, address: Addr) -> Self {
        Self {
            call_string,
            address,
        }
    }

    pub fn call_string(&self) -> &CallString {
        &self.call_string
    }
}

impl ProgramPoint for ProgramCtx {
    fn address(&self) -> Addr {
        self.address
    }

    fn with_address(&self, address: Addr) -> Self {
        Self {
            call_string: self.call_string.clone(),
            address,
        }
    }
}

impl PartialOrd for ProgramCtx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProgramCtx {
    /// Address first; ties broken by the call string, shorter (less deeply
    /// nested) contexts first. The full call-string comparison keeps the
    /// order a total one consistent with `Eq`.
    fn cmp(&self, other: &Self) -> Ordering {
        self.address
            .cmp(&other.address)
            .then_with(|| self.call_string.cmp(&other.call_string))
    }
}

impl fmt::Display for ProgramCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.call_string.is_root() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{}@{}", self.address, self.call_string)
        }
    }
}
