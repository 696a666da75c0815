#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// A broken machine invariant. Checked programs never produce one, so a
/// fault always points at a hole in the borrow checker.
#[derive(Clone, Debug, PartialEq, Eq, Error, Diagnostic)]
pub enum Fault {
    #[error("variable `{0}` is not bound in the current frame")]
    #[diagnostic(code(fwr::fault::unbound))]
    UnboundVariable(String),

    #[error("address {0} was never allocated")]
    #[diagnostic(code(fwr::fault::address))]
    InvalidAddress(usize),

    #[error("dangling reference to freed address {0}")]
    #[diagnostic(code(fwr::fault::dangling))]
    DanglingReference(usize),

    #[error("cell {address} has {owners} owning references")]
    #[diagnostic(code(fwr::fault::ownership))]
    OwnershipInvariant { address: usize, owners: usize },

    #[error("expected a reference, found `{0}`")]
    #[diagnostic(code(fwr::fault::reference))]
    ExpectedReference(String),

    #[error("path does not fit the value stored at address {0}")]
    #[diagnostic(code(fwr::fault::path))]
    InvalidPath(usize),

    #[error("read of moved-out contents at address {0}")]
    #[diagnostic(code(fwr::fault::undefined))]
    UndefinedRead(usize),

    #[error("no reduction rule applies to `{0}`")]
    #[diagnostic(code(fwr::fault::stuck))]
    Stuck(String),
}
