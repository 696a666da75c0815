#![forbid(unsafe_code)]

//! Language extensions plugged into the checker and the abstract machine:
//! tuples and two-armed conditionals.

mod control_flow;
mod tuples;

use fwr_core::{Checker, CheckerConfig};
use fwr_machine::{MachineConfig, Semantics, Strategy};

pub use control_flow::{ControlFlow, IF_EQ, IF_NE, if_else};
pub use tuples::{TUPLE, Tuples, carry, tuple};

/// A checker that understands every extension in this crate.
pub fn checker(config: CheckerConfig) -> Checker {
    Checker::new(config).with_extension(Tuples).with_extension(ControlFlow)
}

/// Semantics that understand every extension in this crate.
pub fn semantics(strategy: Strategy, config: MachineConfig) -> Semantics {
    Semantics::new(strategy, config)
        .with_extension(Tuples)
        .with_extension(ControlFlow)
}
