#![forbid(unsafe_code)]

use fwr_ast::{Lifetime, Term, TermKind, Type, extension};
use fwr_core::{Checker, Environment, StaticError, StaticErrorKind, TypingExtension};
use fwr_machine::{Fault, Operands, ReductionExtension, Semantics, State, Step, Strategy};

use crate::tuples::carry;

pub const IF_EQ: u32 = 40;
pub const IF_NE: u32 = 41;

/// `if lhs == rhs { .. } else { .. }`, or `!=` when `equal` is false.
pub fn if_else(equal: bool, lhs: Term, rhs: Term, then_block: Term, else_block: Term) -> Term {
    let opcode = if equal { IF_EQ } else { IF_NE };
    extension(opcode, vec![lhs, rhs, then_block, else_block])
}

/// Two-armed conditionals comparing a pair of values.
#[derive(Clone, Copy, Debug, Default)]
pub struct ControlFlow;

fn conditional(term: &Term) -> Option<(u32, &[Term])> {
    match &term.kind {
        TermKind::Extension { opcode, operands } if *opcode == IF_EQ || *opcode == IF_NE => {
            Some((*opcode, operands.as_slice()))
        }
        _ => None,
    }
}

impl TypingExtension for ControlFlow {
    fn name(&self) -> &'static str {
        "control-flow"
    }

    fn check(
        &self,
        checker: &Checker,
        env: &Environment,
        lifetime: &Lifetime,
        term: &Term,
    ) -> Option<Result<(Environment, Type), StaticError>> {
        let (opcode, operands) = conditional(term)?;
        let [lhs, rhs, on_true, on_false] = operands else {
            return Some(Err(StaticError::new(StaticErrorKind::UnknownTerm(opcode), term.span)));
        };
        Some(check_if(checker, env, lifetime, term, [lhs, rhs], on_true, on_false))
    }
}

fn check_if(
    checker: &Checker,
    env: &Environment,
    lifetime: &Lifetime,
    term: &Term,
    condition: [&Term; 2],
    on_true: &Term,
    on_false: &Term,
) -> Result<(Environment, Type), StaticError> {
    let incompatible = |expected: &Type, found: &Type| {
        StaticError::new(
            StaticErrorKind::Incompatible {
                expected: expected.clone(),
                found: found.clone(),
            },
            term.span,
        )
    };

    let condition: Vec<Term> = condition.into_iter().cloned().collect();
    let (env, types) = carry(checker, env, lifetime, &condition)?;
    if let [left, right] = types.as_slice() {
        if !checker.compatible(&env, left, right, &env) {
            return Err(incompatible(left, right));
        }
    }

    let (then_env, then_ty) = checker.apply(&env, lifetime, on_true)?;
    let (else_env, else_ty) = checker.apply(&env, lifetime, on_false)?;
    if !checker.compatible(&then_env, &then_ty, &else_ty, &else_env) {
        return Err(incompatible(&then_ty, &else_ty));
    }
    let joined = checker.join(&then_env, &else_env, term.span)?;
    let ty = then_ty
        .union(&else_ty)
        .ok_or_else(|| incompatible(&then_ty, &else_ty))?;
    Ok((joined, ty))
}

impl ReductionExtension for ControlFlow {
    fn name(&self) -> &'static str {
        "control-flow"
    }

    fn reduce(&self, semantics: &Semantics, state: &State, lifetime: &Lifetime, term: &Term) -> Option<Step> {
        let (opcode, operands) = conditional(term)?;
        let [lhs, rhs, on_true, on_false] = operands else {
            return Some(Err(Fault::Stuck(term.to_string())));
        };
        Some(reduce_if(semantics, state, lifetime, term, opcode, [lhs, rhs, on_true, on_false]))
    }
}

/// R-If: the compared values are dropped before the chosen arm runs.
fn reduce_if(
    semantics: &Semantics,
    state: &State,
    lifetime: &Lifetime,
    term: &Term,
    opcode: u32,
    [lhs, rhs, on_true, on_false]: [&Term; 4],
) -> Step {
    let condition = [lhs.clone(), rhs.clone()];
    match semantics.reduce_operands(state, lifetime, &condition)? {
        (state, Operands::Values(values)) => {
            let [left, right] =
                <[_; 2]>::try_from(values).map_err(|_| Fault::Stuck(term.to_string()))?;
            let equal = left == right;
            let taken = if equal == (opcode == IF_EQ) { on_true } else { on_false };
            let op = if equal { "==" } else { "!=" };
            tracing::trace!(target: "fwr::machine", "R-If {left} {op} {right} => {taken}");
            let store = state.store.drop_value(left, &[&right])?;
            let store = store.drop_value(right, &[])?;
            let state = state.with_store(store);
            match semantics.strategy() {
                Strategy::BigStep => semantics.reduce(&state, lifetime, taken),
                Strategy::SmallStep => Ok((state, taken.clone())),
            }
        }
        (state, Operands::Residual(mut operands)) => {
            operands.push(on_true.clone());
            operands.push(on_false.clone());
            Ok((state, term.with_kind(TermKind::Extension { opcode, operands })))
        }
    }
}
