#![forbid(unsafe_code)]

mod checker;
mod env;
mod error;

use fwr_ast::{Lifetime, Term, Type};

pub use checker::{
    Checker, CheckerConfig, TypingExtension, Variance, read_prohibited, write_prohibited,
};
pub use env::{Environment, Slot};
pub use error::{StaticError, StaticErrorKind};

/// Check a whole program with the core rules and default configuration.
pub fn typecheck(root: &Lifetime, term: &Term) -> Result<Type, StaticError> {
    Checker::default().check_program(root, term)
}
