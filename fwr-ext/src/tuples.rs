#![forbid(unsafe_code)]

use fwr_ast::{Lifetime, Term, TermKind, Type, Value, extension};
use fwr_core::{Checker, Environment, Slot, StaticError, TypingExtension};
use fwr_machine::{Operands, ReductionExtension, Semantics, State, Step};

pub const TUPLE: u32 = 30;

/// `(t1, ..., tn)`
pub fn tuple(elements: Vec<Term>) -> Term {
    extension(TUPLE, elements)
}

/// Tuple construction. Components are read with index paths, e.g. `x.1`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tuples;

impl TypingExtension for Tuples {
    fn name(&self) -> &'static str {
        "tuples"
    }

    fn check(
        &self,
        checker: &Checker,
        env: &Environment,
        lifetime: &Lifetime,
        term: &Term,
    ) -> Option<Result<(Environment, Type), StaticError>> {
        let TermKind::Extension {
            opcode: TUPLE,
            operands,
        } = &term.kind
        else {
            return None;
        };
        Some(carry(checker, env, lifetime, operands).map(|(env, types)| (env, Type::Compound(types))))
    }
}

impl ReductionExtension for Tuples {
    fn name(&self) -> &'static str {
        "tuples"
    }

    fn reduce(&self, semantics: &Semantics, state: &State, lifetime: &Lifetime, term: &Term) -> Option<Step> {
        let TermKind::Extension {
            opcode: TUPLE,
            operands,
        } = &term.kind
        else {
            return None;
        };
        let step = semantics
            .reduce_operands(state, lifetime, operands)
            .map(|(state, operands)| match operands {
                Operands::Values(values) => {
                    tracing::trace!(target: "fwr::machine", "R-Tuple {} components", values.len());
                    (state, Term::value(Value::Compound(values)))
                }
                Operands::Residual(operands) => (
                    state,
                    term.with_kind(TermKind::Extension {
                        opcode: TUPLE,
                        operands,
                    }),
                ),
            });
        Some(step)
    }
}

/// Type operands left to right. Each result is parked in a fresh slot at the
/// root lifetime while later operands are typed, so borrows taken by earlier
/// operands stay in force; the slots are removed afterwards.
pub fn carry(
    checker: &Checker,
    env: &Environment,
    lifetime: &Lifetime,
    operands: &[Term],
) -> Result<(Environment, Vec<Type>), StaticError> {
    let mut env = env.clone();
    let mut temporaries = Vec::with_capacity(operands.len());
    for operand in operands {
        let (next, ty) = checker.apply(&env, lifetime, operand)?;
        let name = next.fresh_name();
        env = next.put(name.clone(), Slot::new(ty, lifetime.global()));
        temporaries.push(name);
    }
    let types = temporaries
        .iter()
        .filter_map(|name| env.get(name).map(|slot| slot.ty.clone()))
        .collect();
    Ok((env.remove_all(temporaries.iter().map(String::as_str)), types))
}
