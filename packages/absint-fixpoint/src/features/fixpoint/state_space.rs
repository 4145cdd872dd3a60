/*
 * StateSpace: the merge engine of the fixpoint iteration
 *
 * Maps each program point to the abstract state *before* the point executes
 * (the incoming state) and owns all the bookkeeping needed to decide how an
 * incoming state is merged: junction detection, widening-point tracking,
 * per-point iteration counters and the warnings produced along the way.
 *
 * The update protocol distinguishes three cases:
 * - no old state: the target was bottom, the new state is stored as-is;
 * - not a junction and not a widening point: the old state is overwritten.
 *   A non-junction point has exactly one logical predecessor path, so no
 *   information is lost by discarding the old state. This optimization is
 *   worth about 3-5x in analysis time. It is known to be unsound in rare
 *   heap-domain interactions and is kept deliberately for compatibility;
 * - otherwise: the lattice merge `old.add_to_state(new, widening)` decides,
 *   returning None when the old state already subsumes the new one.
 *
 * Back-edges are detected by a heuristic over addresses (target <= source).
 * The heuristic is imprecise for some control-flow shapes and is injectable
 * so a CFG-structural detector can replace it without touching the merge
 * logic here.
 */

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

use crate::domain::{AbstractState, AnalysisCtx, WarningsChannel, WarningsMap};
use crate::features::fixpoint::flows::FlowKind;
use crate::features::fixpoint::program_point::{ProgramCtx, ProgramPoint};
use crate::shared::models::Addr;

/// Decides whether an edge is treated as a loop back-edge (and therefore a
/// widening point). Injected into the state space at construction.
pub type BackedgePolicy = Box<dyn Fn(&ProgramCtx, &ProgramCtx) -> bool>;

/// The default back-edge heuristic: an edge to a lower-or-equal address is
/// assumed to close a loop. Cheap and right for the loop shapes compilers
/// emit, but not a precise back-edge detector; it misfires on some
/// control-flow shapes and is kept as a documented compatibility trade-off.
pub fn address_backedge(from: &ProgramCtx, to: &ProgramCtx) -> bool {
    to.address() <= from.address()
}

/// The map from program points to abstract states plus the merge
/// bookkeeping. See the module header for the update protocol.
pub struct StateSpace<D: AbstractState> {
    states: FxHashMap<ProgramCtx, D>,
    /// Program points sharing an address, for address-based inspection
    points_for_address: BTreeMap<Addr, BTreeSet<ProgramCtx>>,
    /// Points reached by at least one non-fall-through edge
    junction_points: FxHashSet<ProgramCtx>,
    /// Recorded predecessors per point, used to compute junction-ness
    incoming_edges: FxHashMap<ProgramCtx, FxHashSet<ProgramCtx>>,
    warnings: WarningsMap<ProgramCtx>,
    /// How many times a point's state was written
    iterations: FxHashMap<ProgramCtx, usize>,
    /// How many times widening fired at a point
    widening_points: FxHashMap<ProgramCtx, usize>,
    backedge_policy: BackedgePolicy,
}

impl<D: AbstractState> Default for StateSpace<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: AbstractState> StateSpace<D> {
    pub fn new() -> Self {
        Self::with_backedge_policy(Box::new(address_backedge))
    }

    pub fn with_backedge_policy(backedge_policy: BackedgePolicy) -> Self {
        Self {
            states: FxHashMap::default(),
            points_for_address: BTreeMap::new(),
            junction_points: FxHashSet::default(),
            incoming_edges: FxHashMap::default(),
            warnings: WarningsMap::new(),
            iterations: FxHashMap::default(),
            widening_points: FxHashMap::default(),
            backedge_policy,
        }
    }

    /// Seed the state at a program point. Only for bootstrapping an
    /// analysis, as it bypasses the whole update protocol; during the
    /// analysis use [`Self::update`].
    ///
    /// # Panics
    /// If the point already has a state.
    pub fn set_initial(&mut self, point: ProgramCtx, state: D) {
        assert!(
            self.get(&point).is_none(),
            "set_initial on already-seeded point {point}"
        );
        self.put_state(point, state);
    }

    /// Update the state space with a new incoming state at `to`, reached
    /// from `from` via a `kind` edge.
    ///
    /// Returns `true` if the state at `to` changed (the caller must
    /// re-enqueue `to`) or `false` if the new state was already subsumed.
    ///
    /// # Panics
    /// If widening produced a state that is not above both operands — a
    /// monotonicity bug in the collaborating domain.
    pub fn update(
        &mut self,
        from: &ProgramCtx,
        kind: FlowKind,
        to: &ProgramCtx,
        new_state: D,
        use_widening: bool,
    ) -> bool {
        self.record_incoming(from, to, kind);
        // cannot test for a junction here as well: the back-edge might not
        // lead into a junction
        let is_widening_point = use_widening && (self.backedge_policy)(from, to);
        if is_widening_point {
            *self.widening_points.entry(to.clone()).or_insert(0) += 1;
        }
        // warnings produced while computing the new state, keyed below by
        // the source point of the edge
        let produced_warnings = new_state.context().warnings_channel().clone();
        let final_state = match self.states.get(to) {
            None => {
                // old state is bottom, no need to widen or join
                trace!(point = %to, "state stored, old state was bottom");
                Some(new_state)
            }
            Some(old_state) if !self.is_junction(to) && !is_widening_point => {
                // single logical predecessor path: overwrite (see module
                // header for the soundness caveat). Re-delivering the same
                // state is not a change, so the point is not re-enqueued.
                if new_state.subset_or_equal(old_state) && old_state.subset_or_equal(&new_state) {
                    trace!(point = %to, "state unchanged at non-junction");
                    None
                } else {
                    trace!(point = %to, "state overwritten, not a junction or widening point");
                    Some(new_state)
                }
            }
            Some(old_state) => {
                let merged = old_state.add_to_state(&new_state, is_widening_point);
                if is_widening_point {
                    if let Some(widened) = &merged {
                        assert!(
                            old_state.subset_or_equal(widened),
                            "widened state at {to} (reached from {from}) is \
                             smaller than the old state it was widened from"
                        );
                        assert!(
                            new_state.subset_or_equal(widened),
                            "widened state at {to} (reached from {from}) is \
                             smaller than the incoming state"
                        );
                    }
                }
                trace!(
                    point = %to,
                    widening = is_widening_point,
                    changed = merged.is_some(),
                    "states merged"
                );
                merged
            }
        };
        let Some(final_state) = final_state else {
            return false;
        };
        self.put_warnings(from, &produced_warnings);
        self.put_state(to.clone(), final_state);
        true
    }

    /// Store a state and update the bookkeeping: iteration counter, address
    /// index, and a fresh warnings channel so warnings from previous
    /// evaluations are not passed on when the state is read again.
    fn put_state(&mut self, point: ProgramCtx, state: D) {
        let environment = std::sync::Arc::clone(state.context().environment());
        let ctx = AnalysisCtx::at(Some(point.clone()), environment, WarningsChannel::new());
        let state = state.with_context(ctx);
        *self.iterations.entry(point.clone()).or_insert(0) += 1;
        self.points_for_address
            .entry(point.address())
            .or_default()
            .insert(point.clone());
        self.states.insert(point, state);
    }

    /// Track the incoming edge and junction-ness of `to`. Any non-fall-
    /// through edge makes the target a junction even with a single
    /// predecessor: a conditional jump to the textually next instruction
    /// still reaches it via two distinct routes. Two distinct predecessors
    /// make a junction regardless of edge kind.
    fn record_incoming(&mut self, from: &ProgramCtx, to: &ProgramCtx, kind: FlowKind) {
        self.incoming_edges
            .entry(to.clone())
            .or_default()
            .insert(from.clone());
        match kind {
            FlowKind::Call | FlowKind::Jump | FlowKind::Return => {
                self.junction_points.insert(to.clone());
            }
            FlowKind::Next | FlowKind::Halt | FlowKind::Error => {}
        }
    }

    fn is_junction(&self, point: &ProgramCtx) -> bool {
        self.incoming_edges
            .get(point)
            .is_some_and(|preds| preds.len() > 1)
            || self.junction_points.contains(point)
    }

    /// The state at a program point, if any (absent means bottom)
    pub fn get(&self, point: &ProgramCtx) -> Option<&D> {
        self.states.get(point)
    }

    /// The program points associated with an address. Use [`Self::get`] on
    /// each of them to retrieve their states.
    pub fn points_at(&self, address: Addr) -> impl Iterator<Item = &ProgramCtx> {
        self.points_for_address
            .get(&address)
            .into_iter()
            .flatten()
    }

    pub fn warnings(&self) -> &WarningsMap<ProgramCtx> {
        &self.warnings
    }

    /// Record the warnings on a channel for a point, keyed additionally by
    /// the point's current iteration count. Empty channels are ignored.
    pub fn put_warnings(&mut self, point: &ProgramCtx, warnings: &WarningsChannel) {
        let iteration = self.iteration_count(point);
        self.warnings.put(point.clone(), iteration, warnings);
    }

    /// How many times widening fired per point. Used for diagnostics and
    /// termination heuristics by the calling domains.
    pub fn widening_points(&self) -> &FxHashMap<ProgramCtx, usize> {
        &self.widening_points
    }

    pub fn widening_count(&self, point: &ProgramCtx) -> usize {
        self.widening_points.get(point).copied().unwrap_or(0)
    }

    /// How many times the state at a point was written
    pub fn iteration_count(&self, point: &ProgramCtx) -> usize {
        self.iterations.get(point).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProgramCtx, &D)> {
        self.states.iter()
    }
}
