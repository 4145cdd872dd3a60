//! Code addresses
//!
//! An address identifies one intermediate instruction in the analyzed binary.
//! Machine instructions are translated into one or more intermediate
//! instructions, so an address is a pair of the native address (`base`) and
//! the index of the intermediate instruction within that translation
//! (`offset`). Addresses are totally ordered by `(base, offset)`; that order
//! drives both the worklist scheduling and the back-edge heuristic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of an intermediate instruction: native address plus the offset of
/// the micro-instruction inside the translated machine instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Addr {
    /// Native address of the machine instruction
    pub base: u64,
    /// Index of the intermediate instruction within the translation
    pub offset: u32,
}

impl Addr {
    /// The zero address. Used as the artificial entry point of an analysis.
    pub const ZERO: Addr = Addr { base: 0, offset: 0 };

    /// Address of the first intermediate instruction at a native address
    pub fn new(base: u64) -> Self {
        Self { base, offset: 0 }
    }

    /// Address at an intra-instruction offset
    pub fn with_offset(base: u64, offset: u32) -> Self {
        Self { base, offset }
    }

    /// This address rebased to offset zero, i.e. the start of the
    /// surrounding machine instruction
    pub fn instruction_start(&self) -> Self {
        Self::new(self.base)
    }

    /// Whether this address points at the start of a machine instruction
    pub fn is_instruction_start(&self) -> bool {
        self.offset == 0
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.offset == 0 {
            write!(f, "{:#x}", self.base)
        } else {
            write!(f, "{:#x}.{:02}", self.base, self.offset)
        }
    }
}

impl From<u64> for Addr {
    fn from(base: u64) -> Self {
        Addr::new(base)
    }
}
