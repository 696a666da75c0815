#![forbid(unsafe_code)]

use fwr_ast::{AccessKind, LVal, Lifetime, Reference, Term, TermKind, Value};

use crate::error::Fault;
use crate::state::State;

pub type Step = Result<(State, Term), Fault>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Reduce a term to a value in one call.
    BigStep,
    /// Apply one primitive rule per call, returning the residual term.
    SmallStep,
}

#[derive(Clone, Debug)]
pub struct MachineConfig {
    /// Check the heap invariant after every step of [`Semantics::evaluate`].
    pub check_invariants: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            check_invariants: true,
        }
    }
}

/// Reduction rules for syntax the core semantics does not know about.
///
/// Extensions are tried in registration order before the core rules; the
/// first one to return `Some` decides the step.
pub trait ReductionExtension: Send + Sync {
    fn name(&self) -> &'static str;

    fn reduce(&self, semantics: &Semantics, state: &State, lifetime: &Lifetime, term: &Term) -> Option<Step>;
}

/// Operands after one round of left-to-right reduction.
#[derive(Clone, Debug, PartialEq)]
pub enum Operands {
    /// Every operand is a value; the enclosing rule can fire.
    Values(Vec<Value>),
    /// The operand list after one operand took a step.
    Residual(Vec<Term>),
}

pub struct Semantics {
    strategy: Strategy,
    config: MachineConfig,
    extensions: Vec<Box<dyn ReductionExtension>>,
}

impl Semantics {
    pub fn new(strategy: Strategy, config: MachineConfig) -> Self {
        Self {
            strategy,
            config,
            extensions: Vec::new(),
        }
    }

    pub fn big_step() -> Self {
        Self::new(Strategy::BigStep, MachineConfig::default())
    }

    pub fn small_step() -> Self {
        Self::new(Strategy::SmallStep, MachineConfig::default())
    }

    pub fn with_extension(mut self, extension: impl ReductionExtension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// One application of the semantics: a single primitive rule under
    /// small-step, reduction to a value under big-step.
    pub fn reduce(&self, state: &State, lifetime: &Lifetime, term: &Term) -> Step {
        if let Some(step) = self
            .extensions
            .iter()
            .find_map(|ext| ext.reduce(self, state, lifetime, term))
        {
            return step;
        }
        self.reduce_core(state, lifetime, term)
    }

    /// Drive reduction until a value results. With `check_invariants` the
    /// heap invariant is asserted after every step, taking the values left in
    /// the residual term as temporaries.
    pub fn evaluate(&self, state: &State, lifetime: &Lifetime, term: &Term) -> Result<(State, Value), Fault> {
        let mut state = state.clone();
        let mut term = term.clone();
        let mut steps = 0usize;
        loop {
            if let TermKind::Value(v) = &term.kind {
                tracing::debug!(target: "fwr::machine", steps, result = %v, "evaluated");
                return Ok((state, v.clone()));
            }
            let (next_state, next) = self.reduce(&state, lifetime, &term).inspect_err(|fault| {
                tracing::debug!(target: "fwr::machine", %fault, steps, term = %term, "reduction faulted");
            })?;
            if self.config.check_invariants {
                next_state.store.check_heap_invariant(&next.values()).inspect_err(|fault| {
                    tracing::debug!(target: "fwr::machine", %fault, term = %next, "heap invariant broken");
                })?;
            }
            state = next_state;
            term = next;
            steps += 1;
        }
    }

    /// Reduce a list of operands left to right: under big-step all of them
    /// to values, under small-step the first non-value by one step.
    pub fn reduce_operands(
        &self,
        state: &State,
        lifetime: &Lifetime,
        operands: &[Term],
    ) -> Result<(State, Operands), Fault> {
        match self.strategy {
            Strategy::BigStep => {
                let mut state = state.clone();
                let mut values = Vec::with_capacity(operands.len());
                for operand in operands {
                    let (next, value) = self.eval(&state, lifetime, operand)?;
                    state = next;
                    values.push(value);
                }
                Ok((state, Operands::Values(values)))
            }
            Strategy::SmallStep => match operands.iter().position(|t| !t.is_value()) {
                None => {
                    let values = operands.iter().filter_map(Term::as_value).cloned().collect();
                    Ok((state.clone(), Operands::Values(values)))
                }
                Some(i) => {
                    let (state, reduct) = self.reduce(state, lifetime, &operands[i])?;
                    let mut residual = operands.to_vec();
                    residual[i] = reduct;
                    Ok((state, Operands::Residual(residual)))
                }
            },
        }
    }

    /// Reduce `term` all the way to a value without invariant checks; the
    /// enclosing context may still hold temporaries.
    fn eval(&self, state: &State, lifetime: &Lifetime, term: &Term) -> Result<(State, Value), Fault> {
        let mut state = state.clone();
        let mut term = term.clone();
        loop {
            if let TermKind::Value(v) = &term.kind {
                return Ok((state, v.clone()));
            }
            (state, term) = self.reduce(&state, lifetime, &term)?;
        }
    }

    fn congruence(
        &self,
        state: &State,
        lifetime: &Lifetime,
        operand: &Term,
        rebuild: impl FnOnce(Term) -> Term,
        rule: impl FnOnce(&State, Value) -> Step,
    ) -> Step {
        if let Some(v) = operand.as_value() {
            return rule(state, v.clone());
        }
        match self.strategy {
            Strategy::BigStep => {
                let (state, v) = self.eval(state, lifetime, operand)?;
                rule(&state, v)
            }
            Strategy::SmallStep => {
                let (state, reduct) = self.reduce(state, lifetime, operand)?;
                Ok((state, rebuild(reduct)))
            }
        }
    }

    fn reduce_core(&self, state: &State, lifetime: &Lifetime, term: &Term) -> Step {
        match &term.kind {
            TermKind::Value(_) => Ok((state.clone(), term.clone())),
            TermKind::Access { kind, lval } => {
                let (state, value) = self.access(state, *kind, lval)?;
                Ok((state, Term::value(value)))
            }
            TermKind::Borrow { lval, .. } => {
                // R-Borrow
                let location = state.locate(lval)?;
                tracing::trace!(target: "fwr::machine", "R-Borrow {lval} => {location}");
                Ok((state.clone(), Term::value(Value::Ref(location.to_borrow()))))
            }
            TermKind::Box(inner) => self.congruence(
                state,
                lifetime,
                inner,
                |reduct| term.with_kind(TermKind::Box(Box::new(reduct))),
                |state, v| {
                    // R-Box
                    let (store, address) = state.store.allocate(&lifetime.global(), v);
                    tracing::trace!(target: "fwr::machine", "R-Box #{address}");
                    Ok((state.with_store(store), Term::value(Value::Ref(Reference::owned(address)))))
                },
            ),
            TermKind::Let { name, init } => self.congruence(
                state,
                lifetime,
                init,
                |reduct| {
                    term.with_kind(TermKind::Let {
                        name: name.clone(),
                        init: Box::new(reduct),
                    })
                },
                |state, v| {
                    // R-Declare
                    tracing::trace!(target: "fwr::machine", "R-Declare {} = {v}", name.node);
                    Ok((state.declare(&name.node, lifetime, v), Term::value(Value::Unit)))
                },
            ),
            TermKind::Assign { lhs, rhs } => self.congruence(
                state,
                lifetime,
                rhs,
                |reduct| {
                    term.with_kind(TermKind::Assign {
                        lhs: lhs.clone(),
                        rhs: Box::new(reduct),
                    })
                },
                |state, v| self.assign(state, lhs, v),
            ),
            TermKind::Block { lifetime: inner, stmts } => match self.strategy {
                Strategy::BigStep => self.block_big_step(state, inner, stmts),
                Strategy::SmallStep => self.block_small_step(state, term, inner, stmts),
            },
            TermKind::Extension { .. } => Err(Fault::Stuck(term.to_string())),
        }
    }

    /// R-Copy and R-Move. An inferred access moves exactly when the value
    /// owns heap cells.
    fn access(&self, state: &State, kind: AccessKind, lval: &LVal) -> Result<(State, Value), Fault> {
        let location = state.locate(lval)?;
        let value = state.store.read(&location)?;
        if value == Value::Undefined {
            return Err(Fault::UndefinedRead(location.address));
        }
        let moving = match kind {
            AccessKind::Copy => false,
            AccessKind::Move => true,
            AccessKind::Inferred => value.contains_owner(),
        };
        if moving {
            tracing::trace!(target: "fwr::machine", "R-Move {lval} => {value}");
            let store = state.store.write(&location, Value::Undefined)?;
            Ok((state.with_store(store), value))
        } else {
            tracing::trace!(target: "fwr::machine", "R-Copy {lval} => {value}");
            Ok((state.clone(), value))
        }
    }

    /// R-Assign, and R-IndAssign when the lval has a path.
    fn assign(&self, state: &State, lhs: &LVal, value: Value) -> Step {
        let location = state.locate(lhs)?;
        let old = state.store.read(&location)?;
        tracing::trace!(target: "fwr::machine", "R-Assign {lhs} := {value} (drops {old})");
        // The old value leaves the cell before it is finalized.
        let store = state.store.write(&location, value)?;
        let store = store.drop_value(old, &[])?;
        Ok((state.with_store(store), Term::value(Value::Unit)))
    }

    fn block_big_step(&self, state: &State, inner: &Lifetime, stmts: &[Term]) -> Step {
        let outer = state.frame.clone();
        let mut state = state.clone();
        let mut result = Value::Unit;
        for (i, stmt) in stmts.iter().enumerate() {
            let (next, value) = self.eval(&state, inner, stmt)?;
            state = next;
            if i + 1 == stmts.len() {
                result = value;
            } else if value != Value::Unit {
                let store = state.store.drop_value(value, &[])?;
                state = state.with_store(store);
            }
        }
        // R-Block
        let store = state.store.drop_lifetime(inner, &[&result])?;
        Ok((State::from_parts(outer, store), Term::value(result)))
    }

    fn block_small_step(&self, state: &State, term: &Term, inner: &Lifetime, stmts: &[Term]) -> Step {
        let residual = |stmts: Vec<Term>| {
            term.with_kind(TermKind::Block {
                lifetime: inner.clone(),
                stmts,
            })
        };
        match stmts {
            [] => self.exit_block(state, inner, Value::Unit),
            [last] if last.is_value() => {
                let value = last.as_value().cloned().unwrap_or(Value::Unit);
                self.exit_block(state, inner, value)
            }
            [head, rest @ ..] => match head.as_value() {
                Some(value) => {
                    let live: Vec<&Value> = rest.iter().flat_map(Term::values).collect();
                    let store = state.store.drop_value(value.clone(), &live)?;
                    Ok((state.with_store(store), residual(rest.to_vec())))
                }
                None => {
                    let (state, reduct) = self.reduce(state, inner, head)?;
                    let stmts = if reduct.as_value() == Some(&Value::Unit) {
                        rest.to_vec()
                    } else {
                        std::iter::once(reduct).chain(rest.iter().cloned()).collect()
                    };
                    Ok((state, residual(stmts)))
                }
            },
        }
    }

    // R-Block
    fn exit_block(&self, state: &State, inner: &Lifetime, value: Value) -> Step {
        let frame = state.frame.pop(inner);
        let store = state.store.drop_lifetime(inner, &[&value])?;
        Ok((State::from_parts(frame, store), Term::value(value)))
    }
}
