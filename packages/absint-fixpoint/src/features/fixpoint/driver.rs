/*
 * Fixpoint driver: interprocedural iteration with call strings
 *
 * The engine repeatedly dequeues a program point from the worklist, asks the
 * transfer function for the successors of one evaluation step, and feeds
 * each successor through the state space's update protocol; targets whose
 * state changed are re-enqueued. Termination is reached when the worklist
 * runs empty: with widening at back-edges every ascending chain of states is
 * cut off, so every point is re-enqueued only finitely often.
 *
 * Interprocedural context is managed here and nowhere else: a Call successor
 * pushes the call transition onto the current call string, a Return pops it
 * (unchecked, since the state may have merged several callers), Next/Jump
 * stay in context. Widening is only ever enabled on local transitions —
 * call and return edges never widen.
 *
 * Reference:
 * - Sharir & Pnueli (1981). "Two Approaches to Interprocedural Data Flow
 *   Analysis"
 */

use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::domain::AbstractState;
use crate::errors::{EngineError, Result};
use crate::features::fixpoint::call_string::CallString;
use crate::features::fixpoint::flows::{FlowKind, Flows, Successor};
use crate::features::fixpoint::program_point::{ProgramCtx, ProgramPoint};
use crate::features::fixpoint::state_space::StateSpace;
use crate::features::fixpoint::transition_system::TransitionSystem;
use crate::features::fixpoint::worklist::Worklist;
use crate::shared::models::{Addr, Transition};

/// The transfer-function contract the engine drives.
///
/// Given a program point and its incoming state, produce the successors of
/// one evaluation step. Signalling [`EngineError::Unreachable`] means the
/// path is infeasible and contributes no successors; returning an *empty*
/// `Flows` with a live state is an engine-contract violation (a trace can
/// only end in a Halt successor).
pub trait TransferFunction<D: AbstractState> {
    fn eval(&mut self, point: &ProgramCtx, state: D) -> Result<Flows<D>>;
}

/// Interprocedural, context-sensitive worklist fixpoint engine.
pub struct FixpointEngine<D: AbstractState, T: TransferFunction<D>> {
    config: EngineConfig,
    transfer: T,
    states: StateSpace<D>,
    transitions: TransitionSystem,
    entry: Option<ProgramCtx>,
}

impl<D: AbstractState, T: TransferFunction<D>> FixpointEngine<D, T> {
    pub fn new(config: EngineConfig, transfer: T) -> Self {
        Self {
            config,
            transfer,
            states: StateSpace::new(),
            transitions: TransitionSystem::new(),
            entry: None,
        }
    }

    /// Engine with an injected back-edge policy (see
    /// [`crate::features::fixpoint::state_space::address_backedge`] for the
    /// default one).
    pub fn with_state_space(config: EngineConfig, transfer: T, states: StateSpace<D>) -> Self {
        Self {
            config,
            transfer,
            states,
            transitions: TransitionSystem::new(),
            entry: None,
        }
    }

    /// Run the fixpoint iteration from a program entry point with a
    /// bootstrapped initial state.
    ///
    /// The entry is reached through an artificial call from address zero, so
    /// the entry's context already contains one transition and a return in
    /// the root context reads as "return from main".
    pub fn run_from(&mut self, start: Addr, initial: D) -> Result<()> {
        self.config.validate()?;
        let root = CallString::root(self.config.call_string_length);
        let artificial_start = Addr::ZERO;
        let bootstrap_call = Transition::new(artificial_start, start);
        let artificial_entry = ProgramCtx::new(root.clone(), artificial_start);
        let entry = ProgramCtx::new(root.push(bootstrap_call), start);
        self.transitions
            .add_call_transition(artificial_entry, entry.clone());
        self.states.set_initial(entry.clone(), initial);
        self.entry = Some(entry.clone());
        debug!(entry = %entry, "starting fixpoint iteration");

        let mut worklist = Worklist::new(self.config.worklist_order);
        worklist.enqueue(entry);
        let mut steps: u64 = 0;
        while !worklist.is_empty() {
            let current = worklist.dequeue();
            steps += 1;
            trace!(point = %current, pending = worklist.len(), "evaluating");
            let changed = self.resolve_successors(&current)?;
            // reversed so that under the stack policy the first successor
            // of the evaluation ends up on top of the worklist
            for successor in changed.into_iter().rev() {
                worklist.enqueue(successor);
            }
        }
        debug!(steps, states = self.states.len(), "fixpoint reached");
        Ok(())
    }

    /// Evaluate one program point and dispatch its successors. Returns the
    /// points whose state changed and that must be re-enqueued.
    fn resolve_successors(&mut self, current: &ProgramCtx) -> Result<Vec<ProgramCtx>> {
        let state = self
            .states
            .get(current)
            .cloned()
            .expect("dequeued point has a state");
        let flows = match self.transfer.eval(current, state) {
            Ok(flows) => flows,
            // the path is infeasible: it contributes no successors
            Err(EngineError::Unreachable) => {
                trace!(point = %current, "unreachable, no successors");
                return Ok(Vec::new());
            }
            Err(error) => return Err(error),
        };
        if flows.is_empty() {
            // a trace can only be terminated by a Halt successor
            return Err(EngineError::invariant(format!(
                "no successors inferred after evaluating the instruction at {current}"
            )));
        }
        let mut changed = Vec::new();
        for successor in flows {
            match successor.kind() {
                FlowKind::Call => {
                    let target = self.target_of(current, &successor)?;
                    let call = Transition::new(current.address(), target);
                    let callee = ProgramCtx::new(current.call_string().push(call), target);
                    match successor.return_site() {
                        Some(fall_through) => self.transitions.add_call_transition_with_return_site(
                            current.clone(),
                            callee.clone(),
                            fall_through,
                        ),
                        None => self
                            .transitions
                            .add_call_transition(current.clone(), callee.clone()),
                    }
                    self.update(current, callee, successor, false, &mut changed);
                }
                FlowKind::Return => {
                    // a return in the root context is the end of the
                    // analyzed trace ("return from main")
                    if current.call_string().is_root() {
                        trace!(point = %current, "return from main");
                        continue;
                    }
                    let target = self.target_of(current, &successor)?;
                    // unchecked pop: the state here may have merged several
                    // callers, so the concrete call being unwound is unknown
                    let caller = ProgramCtx::new(current.call_string().unsafe_pop(), target);
                    self.transitions
                        .add_return_transition(current.clone(), caller.clone());
                    self.update(current, caller, successor, false, &mut changed);
                }
                FlowKind::Next | FlowKind::Jump => {
                    let target = self.target_of(current, &successor)?;
                    let to = ProgramCtx::new(current.call_string().clone(), target);
                    self.transitions.add_local_transition(
                        current.call_string(),
                        current.clone(),
                        to.clone(),
                    );
                    self.update(current, to, successor, self.config.widening, &mut changed);
                }
                FlowKind::Halt => {
                    // no successor state, but the evaluation may have
                    // produced warnings worth keeping
                    self.states
                        .put_warnings(current, successor.state().context().warnings_channel());
                }
                FlowKind::Error => {
                    self.states
                        .put_warnings(current, successor.state().context().warnings_channel());
                    return Err(EngineError::analysis(
                        current,
                        "transfer function flagged an error successor",
                    ));
                }
            }
        }
        Ok(changed)
    }

    fn target_of(&self, current: &ProgramCtx, successor: &Successor<D>) -> Result<Addr> {
        successor.target().ok_or_else(|| {
            EngineError::invariant(format!(
                "{:?} successor of {current} carries no target address",
                successor.kind()
            ))
        })
    }

    fn update(
        &mut self,
        from: &ProgramCtx,
        to: ProgramCtx,
        successor: Successor<D>,
        use_widening: bool,
        changed: &mut Vec<ProgramCtx>,
    ) {
        let kind = successor.kind();
        if self
            .states
            .update(from, kind, &to, successor.into_state(), use_widening)
        {
            changed.push(to);
        }
    }

    /// The state at an address under a given call-string context
    pub fn state_at(&self, call_string: &CallString, address: Addr) -> Option<&D> {
        self.states
            .get(&ProgramCtx::new(call_string.clone(), address))
    }

    /// The program point the analysis was started at, once it ran
    pub fn entry_context(&self) -> Option<&ProgramCtx> {
        self.entry.as_ref()
    }

    pub fn states(&self) -> &StateSpace<D> {
        &self.states
    }

    pub fn transition_system(&self) -> &TransitionSystem {
        &self.transitions
    }

    pub fn warnings(&self) -> &crate::domain::WarningsMap<ProgramCtx> {
        self.states.warnings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnalysisCtx, WarningMessage};
    use rustc_hash::FxHashMap;

    /// Max-lattice over a counter with widening to top
    #[derive(Debug, Clone)]
    struct Count {
        n: u64,
        ctx: AnalysisCtx,
    }

    impl PartialEq for Count {
        fn eq(&self, other: &Self) -> bool {
            self.n == other.n
        }
    }

    impl Count {
        fn new(n: u64) -> Self {
            Self {
                n,
                ctx: AnalysisCtx::unknown(),
            }
        }
    }

    impl AbstractState for Count {
        fn subset_or_equal(&self, other: &Self) -> bool {
            self.n <= other.n
        }

        fn join(&self, other: &Self) -> Self {
            Self {
                n: self.n.max(other.n),
                ctx: self.ctx.clone(),
            }
        }

        fn widen(&self, other: &Self) -> Self {
            Self {
                n: if other.n > self.n { u64::MAX } else { self.n },
                ctx: self.ctx.clone(),
            }
        }

        fn context(&self) -> &AnalysisCtx {
            &self.ctx
        }

        fn with_context(mut self, ctx: AnalysisCtx) -> Self {
            self.ctx = ctx;
            self
        }
    }

    type Row = Box<dyn Fn(&ProgramCtx, Count) -> Result<Flows<Count>>>;

    /// Transfer function backed by a table of per-address closures
    struct TableTransfer {
        rows: FxHashMap<Addr, Row>,
    }

    impl TableTransfer {
        fn new() -> Self {
            Self {
                rows: FxHashMap::default(),
            }
        }

        fn at(mut self, address: u64, row: Row) -> Self {
            self.rows.insert(Addr::new(address), row);
            self
        }
    }

    impl TransferFunction<Count> for TableTransfer {
        fn eval(&mut self, point: &ProgramCtx, state: Count) -> Result<Flows<Count>> {
            let row = self
                .rows
                .get(&point.address())
                .expect("evaluated address is in the table");
            row(point, state)
        }
    }

    fn engine(transfer: TableTransfer) -> FixpointEngine<Count, TableTransfer> {
        FixpointEngine::new(EngineConfig::default(), transfer)
    }

    #[test]
    fn test_straight_line_program() {
        // 0x10: next 0x14; 0x14: halt
        let transfer = TableTransfer::new()
            .at(0x10, Box::new(|_, state| Ok(Flows::next(Addr::new(0x14), state))))
            .at(0x14, Box::new(|_, state| Ok(Flows::halt(state))));
        let mut engine = engine(transfer);
        engine.run_from(Addr::new(0x10), Count::new(7)).unwrap();

        let entry_cs = engine.entry_context().unwrap().call_string().clone();
        assert_eq!(engine.state_at(&entry_cs, Addr::new(0x10)).unwrap().n, 7);
        assert_eq!(engine.state_at(&entry_cs, Addr::new(0x14)).unwrap().n, 7);
    }

    #[test]
    fn test_self_loop_widens_and_terminates() {
        // 0x10: x += 1; jump 0x10 (back-edge: target == source)
        let transfer = TableTransfer::new().at(
            0x10,
            Box::new(|_, state: Count| {
                let grown = Count {
                    n: state.n.saturating_add(1),
                    ctx: state.ctx,
                };
                Ok(Flows::new().add_jump(Addr::new(0x10), grown))
            }),
        );
        let mut engine = engine(transfer);
        engine.run_from(Addr::new(0x10), Count::new(0)).unwrap();

        let entry = engine.entry_context().unwrap().clone();
        assert!(engine.states().widening_count(&entry) >= 1);
        assert_eq!(engine.states().get(&entry).unwrap().n, u64::MAX);
    }

    #[test]
    fn test_call_and_return_restore_the_caller_context() {
        // 0x10: call 0x100 (returns to 0x14); 0x100: return to 0x14;
        // 0x14: halt
        let transfer = TableTransfer::new()
            .at(
                0x10,
                Box::new(|_, state| {
                    Ok(Flows::new().add_call_with_return_site(
                        Addr::new(0x100),
                        Addr::new(0x14),
                        state,
                    ))
                }),
            )
            .at(
                0x100,
                Box::new(|_, state| Ok(Flows::new().add_return(Addr::new(0x14), state))),
            )
            .at(0x14, Box::new(|_, state| Ok(Flows::halt(state))));
        let mut engine = engine(transfer);
        engine.run_from(Addr::new(0x10), Count::new(1)).unwrap();

        let entry_cs = engine.entry_context().unwrap().call_string().clone();
        // the callee runs under the pushed context
        let callee_cs = entry_cs.push(Transition::new(Addr::new(0x10), Addr::new(0x100)));
        assert!(engine.state_at(&callee_cs, Addr::new(0x100)).is_some());
        // the return lands back in the caller context
        assert_eq!(engine.state_at(&entry_cs, Addr::new(0x14)).unwrap().n, 1);

        let system = engine.transition_system();
        let callee_entry = Addr::new(0x100);
        let sites: Vec<Addr> = system.call_sites_for_procedure(callee_entry).collect();
        assert_eq!(sites, vec![Addr::new(0x10)]);
        let returns: Vec<Addr> = system
            .potential_return_sites_for_procedure(callee_entry)
            .collect();
        assert_eq!(returns, vec![Addr::new(0x14)]);
        let contexts: Vec<_> = system.call_strings_for_procedure(callee_entry).collect();
        assert_eq!(contexts, vec![&callee_cs]);
    }

    #[test]
    fn test_return_from_main_ends_the_trace() {
        // the entry procedure returns: with only the artificial bootstrap
        // call on the string, popping it leaves the root context, whose own
        // return ends the analysis
        let transfer = TableTransfer::new()
            .at(
                0x10,
                Box::new(|_, state| Ok(Flows::new().add_return(Addr::new(0x0), state))),
            )
            .at(
                0x0,
                Box::new(|_, state| Ok(Flows::new().add_return(Addr::new(0x0), state))),
            );
        let mut engine = engine(transfer);
        engine.run_from(Addr::new(0x10), Count::new(1)).unwrap();
        // the pop landed in the root context at the artificial start
        let root = CallString::root(EngineConfig::default().call_string_length);
        assert!(engine.state_at(&root, Addr::new(0x0)).is_some());
    }

    #[test]
    fn test_error_successor_aborts_with_warnings_kept() {
        let transfer = TableTransfer::new().at(
            0x10,
            Box::new(|_, state: Count| {
                state
                    .context()
                    .add_warning(WarningMessage::warning("jump target unresolvable"));
                Ok(Flows::error(state))
            }),
        );
        let mut engine = engine(transfer);
        let result = engine.run_from(Addr::new(0x10), Count::new(1));
        assert!(matches!(result, Err(EngineError::Analysis { .. })));
        assert_eq!(engine.warnings().total_warnings(), 1);
    }

    #[test]
    fn test_empty_flows_is_an_invariant_violation() {
        let transfer = TableTransfer::new().at(0x10, Box::new(|_, _| Ok(Flows::new())));
        let mut engine = engine(transfer);
        let result = engine.run_from(Addr::new(0x10), Count::new(1));
        assert!(matches!(result, Err(EngineError::InvariantViolation(_))));
    }

    #[test]
    fn test_unreachable_contributes_no_successors() {
        let transfer = TableTransfer::new().at(0x10, Box::new(|_, _| Err(EngineError::Unreachable)));
        let mut engine = engine(transfer);
        engine.run_from(Addr::new(0x10), Count::new(1)).unwrap();
        // only the entry itself is in the state space
        assert_eq!(engine.states().len(), 1);
    }

    #[test]
    fn test_branch_rejoin_joins_states() {
        // 0x10: branch to 0x20 (jump) and 0x14 (fall-through), different
        // state growth on each arm; both arms rejoin at 0x20
        let transfer = TableTransfer::new()
            .at(
                0x10,
                Box::new(|_, state: Count| {
                    let taken = Count {
                        n: state.n + 10,
                        ctx: state.ctx.clone(),
                    };
                    let fallthrough = Count {
                        n: state.n + 1,
                        ctx: state.ctx,
                    };
                    Ok(Flows::new()
                        .add_jump(Addr::new(0x20), taken)
                        .add_next(Addr::new(0x14), fallthrough))
                }),
            )
            .at(
                0x14,
                Box::new(|_, state| Ok(Flows::next(Addr::new(0x20), state))),
            )
            .at(0x20, Box::new(|_, state| Ok(Flows::halt(state))));
        let mut engine = engine(transfer);
        engine.run_from(Addr::new(0x10), Count::new(0)).unwrap();

        let entry_cs = engine.entry_context().unwrap().call_string().clone();
        // join of 10 (taken arm) and 1 (fall-through arm)
        assert_eq!(engine.state_at(&entry_cs, Addr::new(0x20)).unwrap().n, 10);
    }
}
