use fwr_ast::{
    AccessKind, LVal, Lifetime, Term, Type, Value, access, assign, block, borrow, borrow_mut, boxed, int,
    let_mut, var,
};
use fwr_core::{CheckerConfig, StaticError, StaticErrorKind};
use fwr_ext::{checker, semantics, tuple};
use fwr_machine::{Fault, MachineConfig, State, Strategy};

fn check(stmts: impl FnOnce(&Lifetime) -> Vec<Term>) -> Result<Type, StaticError> {
    let root = Lifetime::root();
    let body = root.fresh_within();
    let stmts = stmts(&body);
    checker(CheckerConfig::default()).check_program(&root, &block(body, stmts))
}

fn run(strategy: Strategy, stmts: impl FnOnce(&Lifetime) -> Vec<Term>) -> Result<(State, Value), Fault> {
    let root = Lifetime::root();
    let body = root.fresh_within();
    let program = block(body.clone(), stmts(&body));
    semantics(strategy, MachineConfig::default()).evaluate(&State::new(), &root, &program)
}

/// Check, then run under both strategies and compare.
fn accept_and_run(stmts: impl Fn(&Lifetime) -> Vec<Term>) -> Value {
    if let Err(err) = check(&stmts) {
        panic!("unexpected error: {}", err.kind);
    }
    let (big_state, big) = run(Strategy::BigStep, &stmts).expect("big-step fault");
    let (small_state, small) = run(Strategy::SmallStep, &stmts).expect("small-step fault");
    assert_eq!(big, small);
    assert_eq!(big_state, small_state);
    assert_eq!(big_state.store.live_count(), 0);
    big
}

fn x() -> LVal {
    LVal::var("x")
}

#[test]
fn tuple_has_compound_type() {
    let ty = check(|_| vec![tuple(vec![int(1), boxed(int(2))])]).expect("borrow check");
    assert_eq!(ty, Type::Compound(vec![Type::Int, Type::boxed(Type::Int)]));
}

#[test]
fn component_read_through_box() {
    let value = accept_and_run(|_| {
        vec![
            let_mut("x", tuple(vec![int(1), boxed(int(2))])),
            access(AccessKind::Inferred, x().index(1).deref()),
        ]
    });
    assert_eq!(value, Value::Int(2));
}

#[test]
fn components_move_independently() {
    let value = accept_and_run(|_| {
        vec![
            let_mut("x", tuple(vec![boxed(int(1)), boxed(int(2))])),
            let_mut("y", access(AccessKind::Inferred, x().index(0))),
            assign(x().index(0), boxed(int(3))),
            let_mut("z", var("x")),
            access(AccessKind::Inferred, LVal::var("z").index(0).deref()),
        ]
    });
    assert_eq!(value, Value::Int(3));
}

#[test]
fn partially_moved_tuple_cannot_be_read() {
    let err = check(|_| {
        vec![
            let_mut("x", tuple(vec![boxed(int(1)), boxed(int(2))])),
            let_mut("y", access(AccessKind::Inferred, x().index(0))),
            let_mut("z", var("x")),
        ]
    })
    .expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::Moved(x()), "unexpected error: {}", err.kind);
}

#[test]
fn earlier_component_borrow_blocks_later_move() {
    let err = check(|_| vec![let_mut("x", boxed(int(1))), tuple(vec![borrow(x()), var("x")])])
        .expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::WriteProhibited(x()));
}

#[test]
fn two_mutable_borrows_in_one_tuple_are_rejected() {
    let err = check(|_| {
        vec![
            let_mut("x", int(1)),
            let_mut("y", tuple(vec![borrow_mut(x()), borrow_mut(x())])),
        ]
    })
    .expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::WriteProhibited(x()));
}

#[test]
fn shared_borrows_in_one_tuple_are_fine() {
    let value = accept_and_run(|_| {
        vec![
            let_mut("x", int(4)),
            let_mut("y", tuple(vec![borrow(x()), borrow(x())])),
            access(AccessKind::Inferred, LVal::var("y").index(1).deref()),
        ]
    });
    assert_eq!(value, Value::Int(4));
}

#[test]
fn small_step_reduces_components_left_to_right() {
    let root = Lifetime::root();
    let mut term = tuple(vec![boxed(int(1)), int(2), boxed(int(3))]);
    let mut state = State::new();
    let semantics = semantics(Strategy::SmallStep, MachineConfig::default());
    let mut trace = Vec::new();
    while !term.is_value() {
        (state, term) = semantics.reduce(&state, &root, &term).expect("fault");
        trace.push(term.to_string());
    }
    assert_eq!(trace, vec!["#30(#0, 2, box 3)", "#30(#0, 2, #1)", "(#0, 2, #1)"]);
    assert_eq!(state.store.live_count(), 2);
}
