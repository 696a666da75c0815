#![forbid(unsafe_code)]

mod error;
mod frame;
mod semantics;
mod state;
mod store;

use fwr_ast::{Lifetime, Term};

pub use error::Fault;
pub use frame::{Binding, StackFrame};
pub use semantics::{MachineConfig, Operands, ReductionExtension, Semantics, Step, Strategy};
pub use state::State;
pub use store::{Cell, Store};

/// Reduce `term` to a value with the core big-step rules.
pub fn reduce_big_step(state: &State, lifetime: &Lifetime, term: &Term) -> Step {
    Semantics::big_step().reduce(state, lifetime, term)
}

/// Apply a single core small-step rule to `term`.
pub fn reduce_small_step(state: &State, lifetime: &Lifetime, term: &Term) -> Step {
    Semantics::small_step().reduce(state, lifetime, term)
}
