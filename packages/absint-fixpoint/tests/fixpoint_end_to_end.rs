//! End-to-end runs of the fixpoint engine over hand-written control flow:
//! straight-line propagation, loop widening, interprocedural context
//! sensitivity and warning collection.

mod common;

use absint_fixpoint::{
    AbstractState, EngineConfig, FixpointEngine, Flows, WarningMessage, WorklistOrder,
};
use common::{at, Interval, Program};
use pretty_assertions::assert_eq;

#[test]
fn linear_program_propagates_and_transforms_state() {
    // 0x10: x += 3; 0x14: x += 4; 0x18: halt
    let program = Program::new()
        .instruction(0x10, |_, state| Ok(Flows::next(at(0x14), state.shift(3))))
        .instruction(0x14, |_, state| Ok(Flows::next(at(0x18), state.shift(4))))
        .instruction(0x18, |_, state| Ok(Flows::halt(state)));

    let mut engine = FixpointEngine::new(EngineConfig::default(), program);
    engine.run_from(at(0x10), Interval::constant(0)).unwrap();

    let cs = engine.entry_context().unwrap().call_string().clone();
    assert_eq!(engine.state_at(&cs, at(0x10)).unwrap(), &Interval::constant(0));
    assert_eq!(engine.state_at(&cs, at(0x14)).unwrap(), &Interval::constant(3));
    assert_eq!(engine.state_at(&cs, at(0x18)).unwrap(), &Interval::constant(7));
}

fn counting_loop() -> Program {
    // 0x10: loop head; 0x14: x += 1 then either back to 0x10 or fall
    // through to the exit at 0x18
    Program::new()
        .instruction(0x10, |_, state| Ok(Flows::next(at(0x14), state)))
        .instruction(0x14, |_, state| {
            let grown = state.shift(1);
            Ok(Flows::new()
                .add_jump(at(0x10), grown.clone())
                .add_next(at(0x18), grown))
        })
        .instruction(0x18, |_, state| Ok(Flows::halt(state)))
}

#[test]
fn loop_widens_at_the_back_edge_and_terminates() {
    let mut engine = FixpointEngine::new(EngineConfig::default(), counting_loop());
    engine.run_from(at(0x10), Interval::constant(0)).unwrap();

    let entry = engine.entry_context().unwrap().clone();
    let head = engine.states().get(&entry).unwrap();
    // the lower bound is stable, the growing upper bound got widened away
    assert_eq!(head.lo, 0);
    assert_eq!(head.hi, i64::MAX);
    assert!(engine.states().widening_count(&entry) >= 1);
}

#[test]
fn stack_scheduling_reaches_the_same_fixpoint() {
    let config = EngineConfig::new().with_worklist_order(WorklistOrder::Stack);
    let mut engine = FixpointEngine::new(config, counting_loop());
    engine.run_from(at(0x10), Interval::constant(0)).unwrap();

    let entry = engine.entry_context().unwrap().clone();
    let head = engine.states().get(&entry).unwrap();
    assert_eq!(head.lo, 0);
    assert_eq!(head.hi, i64::MAX);
}

#[test]
fn two_call_sites_are_kept_apart_by_their_call_strings() {
    // two calls into the same procedure at 0x100; the callee adds 5 and
    // returns to the site recorded on its call string
    let program = Program::new()
        .instruction(0x10, |_, _| {
            Ok(Flows::new().add_call_with_return_site(at(0x100), at(0x14), Interval::constant(10)))
        })
        .instruction(0x14, |_, _| {
            Ok(Flows::next(at(0x18), Interval::constant(0)))
        })
        .instruction(0x18, |_, _| {
            Ok(Flows::new().add_call_with_return_site(at(0x100), at(0x1c), Interval::constant(20)))
        })
        .instruction(0x1c, |_, state| Ok(Flows::halt(state)))
        .instruction(0x100, |point, state| {
            let call = point.call_string().peek().expect("called context");
            let return_site = at(call.source().base + 4);
            Ok(Flows::new().add_return(return_site, state.shift(5)))
        });

    let mut engine = FixpointEngine::new(EngineConfig::default(), program);
    engine.run_from(at(0x10), Interval::constant(0)).unwrap();

    let entry_cs = engine.entry_context().unwrap().call_string().clone();
    // each call site sees its own summary, not the join of both
    assert_eq!(
        engine.state_at(&entry_cs, at(0x14)).unwrap(),
        &Interval::constant(15)
    );
    assert_eq!(
        engine.state_at(&entry_cs, at(0x1c)).unwrap(),
        &Interval::constant(25)
    );

    let system = engine.transition_system();
    let contexts: Vec<_> = system.call_strings_for_procedure(at(0x100)).collect();
    assert_eq!(contexts.len(), 2);
    for cs in &contexts {
        let callee_state = engine.state_at(cs, at(0x100)).unwrap();
        let site = cs.peek().unwrap().source();
        match site.base {
            0x10 => assert_eq!(callee_state, &Interval::constant(10)),
            0x18 => assert_eq!(callee_state, &Interval::constant(20)),
            other => panic!("unexpected call site {other:#x}"),
        }
    }

    let sites: Vec<_> = system.call_sites_for_procedure(at(0x100)).collect();
    assert_eq!(sites, vec![at(0x10), at(0x18)]);
    let returns: Vec<_> = system
        .potential_return_sites_for_procedure(at(0x100))
        .collect();
    assert_eq!(returns, vec![at(0x14), at(0x1c)]);
}

#[test]
fn warnings_are_recorded_at_their_source_point() {
    let program = Program::new().instruction(0x10, |_, state: Interval| {
        state
            .context()
            .add_warning(WarningMessage::warning("write outside known bounds"));
        Ok(Flows::halt(state))
    });

    let mut engine = FixpointEngine::new(EngineConfig::default(), program);
    engine.run_from(at(0x10), Interval::constant(0)).unwrap();

    let entry = engine.entry_context().unwrap().clone();
    assert_eq!(engine.warnings().total_warnings(), 1);
    let messages = engine.warnings().get(&entry);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].to_string().contains("write outside known bounds"));
}
