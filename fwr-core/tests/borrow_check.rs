use fwr_ast::{
    LVal, Lifetime, Term, Type, Value, assign, block, borrow, borrow_mut, boxed, copy, deref, extension,
    int, let_mut, var,
};
use fwr_core::{Checker, CheckerConfig, StaticError, StaticErrorKind, typecheck};

fn check(stmts: impl FnOnce(&Lifetime) -> Vec<Term>) -> Result<Type, StaticError> {
    let root = Lifetime::root();
    let body = root.fresh_within();
    let stmts = stmts(&body);
    typecheck(&root, &block(body, stmts))
}

fn x() -> LVal {
    LVal::var("x")
}

#[test]
fn move_then_use_is_rejected() {
    let err = check(|_| {
        vec![
            let_mut("x", boxed(int(1))),
            let_mut("y", var("x")),
            let_mut("z", var("x")),
        ]
    })
    .expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::Moved(x()), "unexpected error: {}", err.kind);
}

#[test]
fn assignment_while_mutably_borrowed_is_rejected() {
    let err = check(|_| {
        vec![
            let_mut("x", int(1)),
            let_mut("y", borrow_mut(x())),
            assign(x(), int(2)),
        ]
    })
    .expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::WriteProhibited(x()));
}

#[test]
fn copying_leaves_source_usable() {
    let ty = check(|_| {
        vec![
            let_mut("x", int(1)),
            let_mut("y", var("x")),
            let_mut("z", var("x")),
        ]
    })
    .expect("borrow check");
    assert_eq!(ty, Type::Unit);
}

#[test]
fn borrow_escaping_its_block_is_rejected() {
    let err = check(|_| {
        vec![
            let_mut("x", int(1)),
            let_mut("y", borrow_mut(x())),
            var("y"),
        ]
    })
    .expect_err("expected borrow check error");
    assert!(
        matches!(err.kind, StaticErrorKind::NotWithin(_)),
        "unexpected error: {}",
        err.kind
    );
}

#[test]
fn nested_block_value_is_the_block_type() {
    let ty = check(|l| vec![block(l.fresh_within(), vec![int(1)]), int(123)]).expect("borrow check");
    assert_eq!(ty, Type::Int);
}

#[test]
fn reassigning_a_box_then_reading_through_it() {
    let ty = check(|_| {
        vec![
            let_mut("x", boxed(int(0))),
            assign(x(), boxed(int(1))),
            deref("x", 1),
        ]
    })
    .expect("borrow check");
    assert_eq!(ty, Type::Int);
}

#[test]
fn partially_moved_box_cannot_be_moved_again() {
    let err = check(|_| {
        vec![
            let_mut("x", boxed(boxed(int(1)))),
            let_mut("y", deref("x", 1)),
            let_mut("z", var("x")),
        ]
    })
    .expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::Moved(x()));
}

#[test]
fn partially_moved_box_can_be_refilled() {
    check(|_| {
        vec![
            let_mut("x", boxed(boxed(int(1)))),
            let_mut("y", deref("x", 1)),
            assign(x().deref(), boxed(int(2))),
            let_mut("z", var("x")),
        ]
    })
    .expect("borrow check");
}

#[test]
fn cannot_write_through_a_moved_box() {
    let err = check(|_| {
        vec![
            let_mut("x", boxed(boxed(boxed(int(1))))),
            let_mut("y", deref("x", 1)),
            assign(x().deref().deref(), boxed(int(2))),
        ]
    })
    .expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::NotWritable(x().deref().deref()));
}

#[test]
fn moved_variable_can_be_reassigned() {
    check(|_| {
        vec![
            let_mut("x", boxed(int(1))),
            let_mut("y", var("x")),
            assign(x(), boxed(int(2))),
            let_mut("z", var("x")),
        ]
    })
    .expect("borrow check");
}

#[test]
fn cannot_move_out_through_borrow() {
    let err = check(|_| {
        vec![
            let_mut("x", boxed(int(1))),
            let_mut("y", borrow_mut(x())),
            let_mut("z", deref("y", 1)),
        ]
    })
    .expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::MoveThroughBorrow(x()));
}

#[test]
fn explicit_copy_of_box_is_rejected() {
    let err = check(|_| vec![let_mut("x", boxed(int(1))), let_mut("y", copy(x()))])
        .expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::NotCopy(x()));
}

#[test]
fn undeclared_and_redeclared_variables() {
    let err = check(|_| vec![let_mut("y", var("x"))]).expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::Undeclared("x".into()));

    let err = check(|_| vec![let_mut("x", int(1)), let_mut("x", int(2))])
        .expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::AlreadyDeclared("x".into()));
}

#[test]
fn variables_go_out_of_scope_with_their_block() {
    let err = check(|l| {
        vec![
            block(l.fresh_within(), vec![let_mut("y", int(1))]),
            let_mut("z", var("y")),
        ]
    })
    .expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::Undeclared("y".into()));
}

#[test]
fn reading_mutably_borrowed_variable_is_rejected() {
    let err = check(|_| {
        vec![
            let_mut("x", int(1)),
            let_mut("y", borrow_mut(x())),
            let_mut("z", var("x")),
        ]
    })
    .expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::ReadProhibited(x()));
}

#[test]
fn shared_borrows_coexist_with_reads() {
    check(|_| {
        vec![
            let_mut("x", int(1)),
            let_mut("y", borrow(x())),
            let_mut("z", borrow(x())),
            let_mut("w", var("x")),
            let_mut("v", deref("y", 1)),
        ]
    })
    .expect("borrow check");
}

#[test]
fn mutable_borrow_of_shared_borrowed_is_rejected() {
    let err = check(|_| {
        vec![
            let_mut("x", int(1)),
            let_mut("y", borrow(x())),
            let_mut("z", borrow_mut(x())),
        ]
    })
    .expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::WriteProhibited(x()));
}

#[test]
fn writing_through_shared_borrow_is_rejected() {
    let y = LVal::var("y").deref();
    let err = check(|_| {
        vec![
            let_mut("x", int(1)),
            let_mut("y", borrow(x())),
            assign(y.clone(), int(2)),
        ]
    })
    .expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::NotMutable(y));
}

#[test]
fn writing_through_borrow_is_a_weak_update() {
    // After `*p = v`, `u` may borrow either `a` or `b`.
    let err = check(|_| {
        vec![
            let_mut("a", int(1)),
            let_mut("b", int(1)),
            let_mut("u", borrow_mut(LVal::var("a"))),
            let_mut("v", borrow_mut(LVal::var("b"))),
            let_mut("p", borrow_mut(LVal::var("u"))),
            assign(LVal::var("p").deref(), var("v")),
            let_mut("w", var("b")),
        ]
    })
    .expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::ReadProhibited(LVal::var("b")));
}

#[test]
fn assigning_incompatible_type_is_rejected() {
    let err = check(|_| vec![let_mut("x", int(1)), assign(x(), boxed(int(1)))])
        .expect_err("expected borrow check error");
    assert!(
        matches!(err.kind, StaticErrorKind::Incompatible { .. }),
        "unexpected error: {}",
        err.kind
    );
}

#[test]
fn assigning_shorter_lived_borrow_is_rejected() {
    let err = check(|l| {
        vec![
            let_mut("x", int(1)),
            let_mut("p", borrow(x())),
            block(
                l.fresh_within(),
                vec![let_mut("y", int(1)), assign(LVal::var("p"), borrow(LVal::var("y")))],
            ),
        ]
    })
    .expect_err("expected borrow check error");
    assert!(
        matches!(err.kind, StaticErrorKind::NotWithin(_)),
        "unexpected error: {}",
        err.kind
    );
}

#[test]
fn borrow_of_outer_variable_may_leave_inner_block() {
    let ty = check(|l| {
        vec![
            let_mut("x", int(1)),
            let_mut("y", block(l.fresh_within(), vec![borrow(x())])),
            deref("y", 1),
        ]
    })
    .expect("borrow check");
    assert_eq!(ty, Type::Int);
}

#[test]
fn box_may_leave_its_block() {
    let ty = check(|l| {
        vec![
            let_mut(
                "x",
                block(
                    l.fresh_within(),
                    vec![let_mut("y", boxed(int(1))), var("y")],
                ),
            ),
            deref("x", 1),
        ]
    })
    .expect("borrow check");
    assert_eq!(ty, Type::Int);
}

#[test]
fn runtime_values_and_unknown_extensions_are_rejected() {
    let root = Lifetime::root();
    let err = typecheck(&root, &Term::value(Value::Unit)).expect_err("unit is not source syntax");
    assert!(matches!(err.kind, StaticErrorKind::UnsupportedTerm(_)));

    let err = typecheck(&root, &extension(99, vec![int(1)])).expect_err("no extension registered");
    assert_eq!(err.kind, StaticErrorKind::UnknownTerm(99));
}

#[test]
fn without_copy_inference_reads_move() {
    let root = Lifetime::root();
    let body = root.fresh_within();
    let program = block(
        body,
        vec![
            let_mut("x", int(1)),
            let_mut("y", var("x")),
            let_mut("z", var("x")),
        ],
    );
    let checker = Checker::new(CheckerConfig {
        copy_inference: false,
        ..CheckerConfig::default()
    });
    let err = checker.check_program(&root, &program).expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::Moved(x()));

    // An explicit copy still works.
    let body = root.fresh_within();
    let program = block(
        body,
        vec![
            let_mut("x", int(1)),
            let_mut("y", copy(x())),
            let_mut("z", copy(x())),
        ],
    );
    checker.check_program(&root, &program).expect("borrow check");
}

#[test]
fn reborrow_into_itself_is_rejected() {
    let z = LVal::var("z");
    let err = check(|_| {
        vec![
            let_mut("x", int(1)),
            let_mut("z", borrow_mut(x())),
            assign(z.clone(), borrow_mut(z.clone().deref())),
            deref("z", 1),
        ]
    })
    .expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::WriteProhibited(z));

    // Through a borrow the write would land in `u`, which `**p` reaches.
    let p = LVal::var("p").deref();
    let err = check(|_| {
        vec![
            let_mut("a", int(1)),
            let_mut("u", borrow_mut(LVal::var("a"))),
            let_mut("p", borrow_mut(LVal::var("u"))),
            assign(p.clone(), borrow_mut(p.clone().deref())),
        ]
    })
    .expect_err("expected borrow check error");
    assert_eq!(err.kind, StaticErrorKind::WriteProhibited(p));
}
