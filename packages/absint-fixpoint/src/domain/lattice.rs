/*
 * Semi-lattice contract for abstract domains
 *
 * Every abstract domain plugged into the fixpoint engine implements this
 * trait. The engine itself only ever calls `add_to_state`, which is derived
 * from the three primitive lattice operations:
 *
 *   if new ⊑ self        → None            (nothing to do)
 *   else if not widening → Some(self ⊔ new)
 *   else                 → Some(self ∇ (self ⊔ new))
 *
 * Widening receives the join of both operands as its argument, i.e. the
 * receiver is always the smaller, older state and the argument the wider,
 * newer one. The engine asserts after widening that the result is above both
 * operands; a violation there is a bug in the domain, not an analyzable
 * program property.
 *
 * References:
 * - Cousot & Cousot (1977). "Abstract Interpretation: A Unified Lattice
 *   Model for Static Analysis of Programs"
 * - Cousot & Cousot (1992). "Comparing the Galois Connection and
 *   Widening/Narrowing Approaches to Abstract Interpretation"
 */

use crate::domain::context::AnalysisCtx;

/// An element of the abstract-domain semi-lattice.
///
/// States are immutable values: every operation returns a new state. The
/// bottom element is not represented explicitly; the engine encodes it as
/// the absence of a state at a program point.
pub trait AbstractState: Sized + Clone {
    /// Partial-order test: is `self` subsumed by `other`?
    fn subset_or_equal(&self, other: &Self) -> bool;

    /// Least upper bound of `self` and `other`
    fn join(&self, other: &Self) -> Self;

    /// Widen `self` (the older, smaller state) towards `other` (the newer,
    /// wider state). Must over-approximate the join of both operands.
    fn widen(&self, other: &Self) -> Self;

    /// The context attached to this state
    fn context(&self) -> &AnalysisCtx;

    /// This state with a new context attached
    fn with_context(self, ctx: AnalysisCtx) -> Self;

    /// Merge `new_state` into `self`, the single operation the state space
    /// performs. Returns `None` if `new_state` contributed nothing new, i.e.
    /// the old state already subsumes it.
    fn add_to_state(&self, new_state: &Self, is_widening_point: bool) -> Option<Self> {
        if new_state.subset_or_equal(self) {
            return None;
        }
        let joined = self.join(new_state);
        if !is_widening_point {
            return Some(joined);
        }
        Some(self.widen(&joined))
    }

    /// Enumerate the non-deterministic case splits this state represents.
    /// Most domains are not disjunctive and return themselves only.
    fn enumerate_alternatives(&self) -> Vec<Self> {
        vec![self.clone()]
    }
}
