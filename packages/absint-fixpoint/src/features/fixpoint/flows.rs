//! Flows: the output contract of one transfer-function evaluation
//!
//! Evaluating the instruction at a program point yields a [`Flows`] value:
//! the ordered set of successors reached in one step, each tagged by the
//! kind of control transfer and carrying the abstract state to propagate
//! there. The engine consumes a `Flows` exactly once and never inspects the
//! states beyond handing them to the state space.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shared::models::Addr;

/// The kind of control-flow transfer by which a successor is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowKind {
    /// Fall-through to the next instruction
    Next,
    /// Intraprocedural jump
    Jump,
    /// Procedure call
    Call,
    /// Procedure return
    Return,
    /// The program ends here
    Halt,
    /// The evaluation ran into an error
    Error,
}

/// One successor of a program point: the transfer kind, the target address
/// (absent for `Halt`/`Error`) and the state to propagate there. The state
/// is the one leaving the evaluated point, not the one already stored at the
/// target.
#[derive(Debug, Clone)]
pub struct Successor<D> {
    kind: FlowKind,
    target: Option<Addr>,
    /// The fall-through address after a call instruction, i.e. the address
    /// the callee will return to. Only populated for `Call` successors and
    /// only when the caller knows it.
    return_site: Option<Addr>,
    state: D,
}

impl<D> Successor<D> {
    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    /// The target address of this successor (not where it was reached from)
    pub fn target(&self) -> Option<Addr> {
        self.target
    }

    pub fn return_site(&self) -> Option<Addr> {
        self.return_site
    }

    pub fn state(&self) -> &D {
        &self.state
    }

    pub fn into_state(self) -> D {
        self.state
    }
}

impl<D> fmt::Display for Successor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            Some(target) => write!(f, "{:?}({})", self.kind, target),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

/// Ordered collection of the successors produced by one evaluation step.
/// Built incrementally by the transfer function, consumed once by the
/// driver.
#[derive(Debug, Clone, Default)]
pub struct Flows<D> {
    successors: Vec<Successor<D>>,
}

impl<D> Flows<D> {
    pub fn new() -> Self {
        Self {
            successors: Vec::new(),
        }
    }

    /// Single fall-through successor
    pub fn next(address: Addr, state: D) -> Self {
        Self::new().add_next(address, state)
    }

    /// Single program-end successor
    pub fn halt(state: D) -> Self {
        Self::new().add_halt(state)
    }

    /// Single error successor
    pub fn error(state: D) -> Self {
        Self::new().add_error(state)
    }

    fn add(mut self, kind: FlowKind, target: Option<Addr>, return_site: Option<Addr>, state: D) -> Self {
        self.successors.push(Successor {
            kind,
            target,
            return_site,
            state,
        });
        self
    }

    /// The fall-through case
    pub fn add_next(self, address: Addr, state: D) -> Self {
        self.add(FlowKind::Next, Some(address), None, state)
    }

    /// A jump to an address
    pub fn add_jump(self, address: Addr, state: D) -> Self {
        self.add(FlowKind::Jump, Some(address), None, state)
    }

    /// A call to a procedure entry
    pub fn add_call(self, address: Addr, state: D) -> Self {
        self.add(FlowKind::Call, Some(address), None, state)
    }

    /// A call whose fall-through address is statically known; the engine
    /// records it as a potential return site of the callee, used later to
    /// reconstruct return targets that are not statically obvious.
    pub fn add_call_with_return_site(self, address: Addr, return_site: Addr, state: D) -> Self {
        self.add(FlowKind::Call, Some(address), Some(return_site), state)
    }

    /// A return-jump to an address in the caller
    pub fn add_return(self, address: Addr, state: D) -> Self {
        self.add(FlowKind::Return, Some(address), None, state)
    }

    /// The analysis should stop, the program ends here
    pub fn add_halt(self, state: D) -> Self {
        self.add(FlowKind::Halt, None, None, state)
    }

    /// The evaluation encountered an error
    pub fn add_error(self, state: D) -> Self {
        self.add(FlowKind::Error, None, None, state)
    }

    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.successors.len()
    }

    /// Reorder the successors so lower target addresses come first,
    /// targetless successors last.
    ///
    /// Evaluation-order heuristic: evaluate a loop until it is stable before
    /// propagating its state outwards. A backwards jump to the loop head
    /// goes to a lower address than the jump leaving the loop, so visiting
    /// lower addresses first keeps the iteration inside the loop until it
    /// stabilizes. Redundant when the worklist already runs in global
    /// address order, but useful under the stack policy.
    pub fn sort_lower_addresses_first(&mut self) {
        self.successors.sort_by(|a, b| match (a.target, b.target) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Successor<D>> {
        self.successors.iter()
    }
}

impl<D> IntoIterator for Flows<D> {
    type Item = Successor<D>;
    type IntoIter = std::vec::IntoIter<Successor<D>>;

    fn into_iter(self) -> Self::IntoIter {
        self.successors.into_iter()
    }
}

impl<'a, D> IntoIterator for &'a Flows<D> {
    type Item = &'a Successor<D>;
    type IntoIter = std::slice::Iter<'a, Successor<D>>;

    fn into_iter(self) -> Self::IntoIter {
        self.successors.iter()
    }
}
