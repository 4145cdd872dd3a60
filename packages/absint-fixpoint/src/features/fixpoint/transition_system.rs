//! TransitionSystem: the discovered interprocedural control-flow graph
//!
//! Pure bookkeeping, no merge logic: as the fixpoint iteration discovers
//! edges they are recorded here, organized per call string, together with
//! global indexes answering the queries reporting and return-target
//! reconstruction need — which call strings reach a procedure, where is it
//! called from, where might it return to, and a flattened address-to-address
//! successor map that ignores call-string distinctions for over-approximate
//! reachability queries.

use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};

use crate::features::fixpoint::call_string::CallString;
use crate::features::fixpoint::program_point::{ProgramCtx, ProgramPoint};
use crate::shared::models::Addr;

/// The control-flow transitions discovered inside one procedure context:
/// local edges plus the calls and returns leaving it.
#[derive(Debug, Clone, Default)]
pub struct ProceduralTransitions {
    local_transitions: BTreeMap<ProgramCtx, BTreeSet<ProgramCtx>>,
    calls: BTreeMap<ProgramCtx, BTreeSet<ProgramCtx>>,
    returns: BTreeMap<ProgramCtx, BTreeSet<ProgramCtx>>,
}

impl ProceduralTransitions {
    fn add_local(&mut self, from: ProgramCtx, to: ProgramCtx) {
        self.local_transitions.entry(from).or_default().insert(to);
    }

    fn add_call(&mut self, from: ProgramCtx, to: ProgramCtx) {
        self.calls.entry(from).or_default().insert(to);
    }

    fn add_return(&mut self, from: ProgramCtx, to: ProgramCtx) {
        self.returns.entry(from).or_default().insert(to);
    }

    /// Intraprocedural edges, per source point
    pub fn local_transitions(&self) -> &BTreeMap<ProgramCtx, BTreeSet<ProgramCtx>> {
        &self.local_transitions
    }

    /// Call edges leaving this procedure context
    pub fn calls(&self) -> &BTreeMap<ProgramCtx, BTreeSet<ProgramCtx>> {
        &self.calls
    }

    /// Return edges leaving this procedure context
    pub fn returns(&self) -> &BTreeMap<ProgramCtx, BTreeSet<ProgramCtx>> {
        &self.returns
    }
}

/// The accumulated intra- and interprocedural control flow of the analyzed
/// program.
#[derive(Debug, Clone, Default)]
pub struct TransitionSystem {
    /// Per call string, the transitions of the procedure it identifies
    procedures: FxHashMap<CallString, ProceduralTransitions>,
    /// All call strings that occur for a procedure, by its entry address
    callstrings_for_procedure: BTreeMap<Addr, BTreeSet<CallString>>,
    /// Call-site addresses known per procedure entry address
    callsites: BTreeMap<Addr, BTreeSet<Addr>>,
    /// Potential return sites per procedure entry address: the instruction
    /// following a call of the procedure
    returnsites: BTreeMap<Addr, BTreeSet<Addr>>,
    /// Over-approximated successors ignoring call strings
    flat_successors: BTreeMap<Addr, BTreeSet<Addr>>,
}

impl TransitionSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// The transitions bucket for a procedure context, created lazily. On
    /// first creation of a non-root context the call string is indexed
    /// under its procedure's entry address.
    pub fn transitions_for(&mut self, procedure: &CallString) -> &mut ProceduralTransitions {
        if !self.procedures.contains_key(procedure) {
            if let Some(last_call) = procedure.peek() {
                self.callstrings_for_procedure
                    .entry(last_call.target())
                    .or_default()
                    .insert(procedure.clone());
            }
            self.procedures
                .insert(procedure.clone(), ProceduralTransitions::default());
        }
        self.procedures.get_mut(procedure).expect("bucket exists")
    }

    /// Record an intraprocedural edge
    pub fn add_local_transition(&mut self, procedure: &CallString, from: ProgramCtx, to: ProgramCtx) {
        let (from_addr, to_addr) = (from.address(), to.address());
        self.transitions_for(procedure).add_local(from, to);
        self.flat_successors
            .entry(from_addr)
            .or_default()
            .insert(to_addr);
    }

    /// Record a call edge. The edge is filed under the caller's context and
    /// the caller's address is indexed as a call site of the callee.
    pub fn add_call_transition(&mut self, from: ProgramCtx, to: ProgramCtx) {
        let (from_addr, to_addr) = (from.address(), to.address());
        let caller = from.call_string().clone();
        self.transitions_for(&caller).add_call(from, to);
        self.callsites
            .entry(to_addr)
            .or_default()
            .insert(from_addr);
        self.flat_successors
            .entry(from_addr)
            .or_default()
            .insert(to_addr);
    }

    /// Record a call edge together with the call's fall-through address,
    /// remembered as a potential return site of the callee. Used to
    /// reconstruct interprocedural return targets heuristically when the
    /// true return is not statically obvious.
    pub fn add_call_transition_with_return_site(
        &mut self,
        from: ProgramCtx,
        to: ProgramCtx,
        fall_through: Addr,
    ) {
        let callee_entry = to.address();
        self.add_call_transition(from, to);
        self.returnsites
            .entry(callee_entry)
            .or_default()
            .insert(fall_through);
    }

    /// Record a return edge, filed under the returning procedure's context
    pub fn add_return_transition(&mut self, from: ProgramCtx, to: ProgramCtx) {
        let (from_addr, to_addr) = (from.address(), to.address());
        let returning = from.call_string().clone();
        self.transitions_for(&returning).add_return(from, to);
        self.flat_successors
            .entry(from_addr)
            .or_default()
            .insert(to_addr);
    }

    /// All procedure contexts discovered so far
    pub fn all_procedures(&self) -> impl Iterator<Item = (&CallString, &ProceduralTransitions)> {
        self.procedures.iter()
    }

    /// The call strings under which a procedure was analyzed
    pub fn call_strings_for_procedure(&self, procedure_entry: Addr) -> impl Iterator<Item = &CallString> {
        self.callstrings_for_procedure
            .get(&procedure_entry)
            .into_iter()
            .flatten()
    }

    /// The call-site addresses known for a procedure
    pub fn call_sites_for_procedure(&self, procedure_entry: Addr) -> impl Iterator<Item = Addr> + '_ {
        self.callsites
            .get(&procedure_entry)
            .into_iter()
            .flatten()
            .copied()
    }

    /// The potential return-site addresses known for a procedure
    pub fn potential_return_sites_for_procedure(
        &self,
        procedure_entry: Addr,
    ) -> impl Iterator<Item = Addr> + '_ {
        self.returnsites
            .get(&procedure_entry)
            .into_iter()
            .flatten()
            .copied()
    }

    /// Over-approximation of all successors per address: successors for all
    /// call strings, intra- and interprocedural transitions not
    /// distinguished. From a given address this yields every address
    /// reachable through any form of control flow in one step.
    pub fn all_possible_transitions(&self) -> &BTreeMap<Addr, BTreeSet<Addr>> {
        &self.flat_successors
    }
}
